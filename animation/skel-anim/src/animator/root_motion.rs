//! Root motion extraction
//!
//! Moves the owning entity by the frame-to-frame displacement of the
//! rig's motion bone and pins that bone back to its bind transform so the
//! mesh does not move twice.

use glam::{Quat, Vec3};

use crate::animation::bone_transform::bone_global_transform;
use crate::animation::pose::LocalPose;
use crate::math::decompose_trs;
use crate::scene::Transform;
use crate::skeleton::Skeleton;

/// Root translation beyond this distance from bind counts as animated
const ROOT_MOVE_THRESHOLD: f32 = 0.0005;
/// Names of placeholder roots exported by DCC tools
const GENERIC_ROOT_TOKENS: [&str; 3] = ["root", "armature", "scene"];
/// Names of the bone that actually carries locomotion
const HIPS_TOKENS: [&str; 3] = ["hips", "pelvis", "hip"];

/// Case-insensitive substring match against lowercase ASCII tokens
fn contains_token(name: &str, tokens: &[&str]) -> bool {
    let name = name.as_bytes();
    tokens.iter().any(|token| {
        name.windows(token.len())
            .any(|window| window.eq_ignore_ascii_case(token.as_bytes()))
    })
}

/// Pick the bone whose motion drives the entity
///
/// Normally the skeleton root. A generic, static root (unnamed or named
/// like "Armature") defers to its hips child, or to any hips bone.
pub fn resolve_motion_bone(skeleton: &Skeleton, pose: &LocalPose) -> Option<usize> {
    let root = skeleton.root_index()?;
    let root_bone = skeleton.bone(root)?;

    let root_moves = pose
        .positions
        .get(root)
        .is_some_and(|position| {
            position.distance(skeleton.bind_trs(root).translation) > ROOT_MOVE_THRESHOLD
        });
    let generic_root = !root_moves
        && (root_bone.name.is_empty() || contains_token(&root_bone.name, &GENERIC_ROOT_TOKENS));
    if !generic_root {
        return Some(root);
    }

    let bones = skeleton.bones();
    let direct = bones
        .iter()
        .position(|bone| bone.parent == Some(root) && contains_token(&bone.name, &HIPS_TOKENS));
    let any = || {
        bones
            .iter()
            .position(|bone| contains_token(&bone.name, &HIPS_TOKENS))
    };
    Some(direct.or_else(any).unwrap_or(root))
}

/// Root-motion settings and the baseline carried between frames
#[derive(Debug, Clone, PartialEq)]
pub struct RootMotion {
    pub enabled: bool,
    pub apply_position: bool,
    pub apply_rotation: bool,
    valid: bool,
    prev_time: f32,
    prev_position: Vec3,
    prev_rotation: Quat,
}

impl Default for RootMotion {
    fn default() -> Self {
        Self {
            enabled: false,
            apply_position: true,
            apply_rotation: false,
            valid: false,
            prev_time: 0.0,
            prev_position: Vec3::ZERO,
            prev_rotation: Quat::IDENTITY,
        }
    }
}

impl RootMotion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the baseline; the next extraction only records a new one
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn has_baseline(&self) -> bool {
        self.valid
    }

    /// Extract this frame's displacement into `transform`
    ///
    /// `time` is the playback time the pose was sampled at; a time earlier
    /// than the previous sample (a loop wrap) starts a new baseline. The
    /// motion bone is reset to bind in every case. Returns the applied
    /// position delta.
    pub fn extract(
        &mut self,
        skeleton: &Skeleton,
        pose: &mut LocalPose,
        time: f32,
        transform: &mut Transform,
    ) -> Vec3 {
        if !self.enabled {
            return Vec3::ZERO;
        }
        let Some(bone) = resolve_motion_bone(skeleton, pose) else {
            return Vec3::ZERO;
        };
        if bone >= pose.len() {
            return Vec3::ZERO;
        }

        let current = decompose_trs(&bone_global_transform(skeleton, pose, bone));
        let mut applied = Vec3::ZERO;

        if !self.valid || time < self.prev_time {
            log::trace!("Root motion baseline reset at t={time:.4}");
            self.valid = true;
        } else {
            let delta_position = current.translation - self.prev_position;
            let delta_rotation = current.rotation * self.prev_rotation.inverse();
            if self.apply_position {
                transform.translate(delta_position, true);
                applied = delta_position;
            }
            if self.apply_rotation {
                transform.rotate(delta_rotation, true);
            }
        }

        self.prev_position = current.translation;
        self.prev_rotation = current.rotation;
        self.prev_time = time;
        pose.reset_bone_to_bind(skeleton, bone);

        applied
    }
}
