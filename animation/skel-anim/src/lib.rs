//! Skeletal animation evaluation for real-time engines.
//!
//! This crate turns keyframed animation clips into per-bone skinning
//! matrices. It covers:
//!
//! - Skeletons with parent-before-child bone ordering ([`Skeleton`])
//! - Clips with position/rotation/scale tracks and timed events ([`AnimationClip`])
//! - Pose sampling, blending and skinning matrix generation ([`animation`])
//! - A parameter-driven state machine with crossfades, 1D blend trees and
//!   root motion extraction ([`Animator`])
//! - A corrective two/three-bone IK pass ([`IkConstraint`])
//! - An arena scene graph that routes one animator's output to every
//!   skinned renderer it drives ([`Scene`])
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use glam::Mat4;
//! use skel_anim::{
//!     AnimationClip, Animator, AnimatorState, FrameContext, Scene, Skeleton,
//!     SkinnedMeshRenderer,
//! };
//!
//! let mut skeleton = Skeleton::new();
//! skeleton.add_bone("Root", None, Mat4::IDENTITY, Mat4::IDENTITY);
//!
//! let mut idle = AnimationClip::new("Idle");
//! idle.set_duration_ticks(25.0);
//!
//! let renderer =
//!     SkinnedMeshRenderer::new(Arc::new(skeleton)).with_clips(vec![Arc::new(idle)]);
//! let mut animator = Animator::new();
//! animator.set_states(vec![AnimatorState::clip("Idle", 0)]);
//!
//! let mut scene = Scene::new();
//! let hero = scene.spawn("Hero");
//! scene.set_skinned(hero, Some(renderer))?;
//! scene.set_animator(hero, Some(animator))?;
//! scene.update(&FrameContext::new(1.0 / 60.0));
//!
//! let matrices = scene
//!     .get(hero)
//!     .and_then(|entity| entity.skinned())
//!     .map(|skinned| skinned.bone_matrices().len());
//! assert_eq!(matrices, Some(1));
//! # Ok::<(), skel_anim::AnimError>(())
//! ```

pub mod animation;
pub mod animator;
pub mod clip;
pub mod error;
pub mod math;
pub mod scene;
pub mod skeleton;

// Re-export common types
pub use animation::LocalPose;
pub use animation::ik::{IkConstraint, IkTargetSpace};
pub use animator::{
    AnimationRig, Animator, AnimatorCondition, AnimatorOwner, AnimatorParameter, AnimatorState,
    AnimatorTransition, BlendTree, ConditionOp, FrameContext, ParameterValue,
};
pub use clip::{AnimationChannel, AnimationClip, AnimationEvent, Keyframe};
pub use error::{AnimError, Result};
pub use math::Trs;
pub use scene::{Entity, EntityId, Scene, SkinnedMeshRenderer, Transform};
pub use skeleton::{Bone, Skeleton};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
