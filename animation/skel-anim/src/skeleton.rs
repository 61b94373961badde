//! Bone hierarchy shared by every instance of a rig
//!
//! A [`Skeleton`] is assembled once by an importer and then wrapped in an
//! `Arc` and handed to every renderer and animator that uses the rig.
//! Bones must be ordered parent-before-child; the hierarchy walkers in
//! [`crate::animation`] rely on it.

use std::collections::HashMap;

use glam::Mat4;

use crate::error::{AnimError, Result};
use crate::math::{Trs, decompose_trs};

/// A single joint of the hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Bone name as authored
    pub name: String,
    /// Index of the parent bone, `None` for roots
    pub parent: Option<usize>,
    /// Bind-pose transform relative to the parent
    pub local_bind: Mat4,
    /// Mesh space to bone space at bind time
    pub inverse_bind: Mat4,
}

/// Ordered bone list with name lookup
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    bind_pose: Vec<Trs>,
    name_lookup: HashMap<String, usize>,
    root_index: Option<usize>,
    global_inverse: Mat4,
}

impl Skeleton {
    pub fn new() -> Self {
        Self {
            global_inverse: Mat4::IDENTITY,
            ..Self::default()
        }
    }

    /// Append a bone and return its index
    ///
    /// The first bone added without a parent becomes the skeleton root.
    /// Ordering is the caller's responsibility; see [`Skeleton::validate`].
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        local_bind: Mat4,
        inverse_bind: Mat4,
    ) -> usize {
        let name = name.into();
        let index = self.bones.len();

        if parent.is_none() && self.root_index.is_none() {
            self.root_index = Some(index);
        }

        self.name_lookup.insert(name.clone(), index);
        self.bind_pose.push(decompose_trs(&local_bind));
        self.bones.push(Bone {
            name,
            parent,
            local_bind,
            inverse_bind,
        });

        index
    }

    /// Look up a bone by name
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.name_lookup.get(name).copied()
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn root_index(&self) -> Option<usize> {
        self.root_index
    }

    /// Inverse of the rig's root world transform at import time
    pub fn global_inverse(&self) -> Mat4 {
        self.global_inverse
    }

    pub fn set_global_inverse(&mut self, global_inverse: Mat4) {
        self.global_inverse = global_inverse;
    }

    /// Bind-pose local transforms, decomposed once when each bone was added
    pub fn bind_pose(&self) -> &[Trs] {
        &self.bind_pose
    }

    /// Bind-pose local transform for one bone, identity if out of range
    pub fn bind_trs(&self, index: usize) -> Trs {
        self.bind_pose.get(index).copied().unwrap_or(Trs::IDENTITY)
    }

    /// Indices of the direct children of `index`, in bone order
    pub fn children_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, bone)| bone.parent == Some(index))
            .map(|(i, _)| i)
    }

    /// Check the parent-before-child ordering and name uniqueness
    pub fn validate(&self) -> Result<()> {
        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(AnimError::InvalidHierarchy {
                        bone: index,
                        name: bone.name.clone(),
                        parent,
                    });
                }
            }
            if self.name_lookup.get(&bone.name) != Some(&index) {
                return Err(AnimError::DuplicateBone(bone.name.clone()));
            }
        }
        Ok(())
    }
}
