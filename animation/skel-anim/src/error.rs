use thiserror::Error;

/// Error types for rig construction, controller validation and scene edits
///
/// The per-frame evaluation path never produces these; it degrades to bind
/// pose or a stalled state instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnimError {
    /// A bone's parent does not precede it in the bone list
    #[error("Invalid hierarchy: bone {bone} ('{name}') has parent {parent} which does not precede it")]
    InvalidHierarchy {
        bone: usize,
        name: String,
        parent: usize,
    },

    /// Two bones share a name
    #[error("Duplicate bone name: '{0}'")]
    DuplicateBone(String),

    /// A state, transition or blend tree refers to something that does not exist
    #[error("Reference error: {0}")]
    ReferenceError(String),

    /// Lookup by name failed
    #[error("Unknown state: '{0}'")]
    UnknownState(String),

    /// The entity key is stale or was never issued by this scene
    #[error("Unknown entity")]
    UnknownEntity,

    /// Re-parenting would make an entity its own ancestor
    #[error("Hierarchy cycle: '{child}' cannot be parented under its descendant '{parent}'")]
    HierarchyCycle { child: String, parent: String },
}

/// Result type using AnimError
pub type Result<T> = std::result::Result<T, AnimError>;
