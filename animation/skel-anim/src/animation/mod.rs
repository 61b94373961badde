//! Pose evaluation
//!
//! The building blocks every animator frame runs through:
//! - [`interpolation`] converts seconds to clip ticks and samples key tracks
//! - [`pose`] samples a whole skeleton into a [`LocalPose`] and blends poses
//! - [`bone_transform`] turns a local pose into global or skinning matrices
//! - [`ik`] applies the corrective two/three-bone chain pass

pub mod bone_transform;
pub mod ik;
pub mod interpolation;
pub mod pose;

pub use bone_transform::{
    SkinningComputer, bone_global_transform, build_global_pose, build_skin_matrices,
    pack_matrices_4x3,
};
pub use ik::{IK_ITERATIONS, apply_two_bone_ik};
pub use interpolation::{find_key_index, resolve_clip_ticks, sample_track};
pub use pose::{LocalPose, blend_local_poses, sample_local_pose};
