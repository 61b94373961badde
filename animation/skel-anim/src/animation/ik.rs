//! Corrective two/three-bone IK
//!
//! An iterative look-at pass: each iteration turns the mid bone, then the
//! root bone, so the chain's end effector points further toward the
//! target. It is not an analytic elbow solve and does not preserve segment
//! lengths. The cost is fixed at [`IK_ITERATIONS`] global-pose rebuilds.

use glam::{Mat4, Quat, Vec3};

use super::bone_transform::build_global_pose;
use super::pose::LocalPose;
use crate::math::{decompose_trs, normalize_or_identity};
use crate::skeleton::Skeleton;

/// Fixed number of correction passes
pub const IK_ITERATIONS: usize = 4;
/// Directions closer than this (cosine) need no correction
const PARALLEL_COSINE: f32 = 0.9995;
/// Shorter rotation axes are treated as undefined
const MIN_AXIS_LENGTH: f32 = 0.0001;
/// Weights at or below this skip the solve
const MIN_WEIGHT: f32 = 0.0001;

/// Where an [`IkConstraint`] target is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum IkTargetSpace {
    /// World coordinates
    #[default]
    World,
    /// Coordinates relative to the owning entity
    Local,
}

/// IK settings attached to an animated entity
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct IkConstraint {
    pub root_bone: String,
    pub mid_bone: String,
    pub end_bone: String,
    pub target: Vec3,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub target_space: IkTargetSpace,
    #[cfg_attr(
        feature = "serde-support",
        serde(default = "default_weight", deserialize_with = "clamped_weight")
    )]
    weight: f32,
    #[cfg_attr(feature = "serde-support", serde(default = "default_enabled"))]
    pub enabled: bool,
}

#[cfg(feature = "serde-support")]
fn default_weight() -> f32 {
    1.0
}

#[cfg(feature = "serde-support")]
fn default_enabled() -> bool {
    true
}

#[cfg(feature = "serde-support")]
fn clamped_weight<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    <f32 as serde::Deserialize>::deserialize(deserializer).map(|weight| weight.clamp(0.0, 1.0))
}

impl IkConstraint {
    pub fn new(
        root_bone: impl Into<String>,
        mid_bone: impl Into<String>,
        end_bone: impl Into<String>,
    ) -> Self {
        Self {
            root_bone: root_bone.into(),
            mid_bone: mid_bone.into(),
            end_bone: end_bone.into(),
            target: Vec3::ZERO,
            target_space: IkTargetSpace::World,
            weight: 1.0,
            enabled: true,
        }
    }

    pub fn with_target(mut self, target: Vec3, space: IkTargetSpace) -> Self {
        self.target = target;
        self.target_space = space;
        self
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Set the blend weight, clamped to `[0, 1]`
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    /// Whether the constraint would change anything this frame
    pub fn is_active(&self) -> bool {
        self.enabled && self.weight > MIN_WEIGHT
    }

    /// Resolve the target into the skeleton space of an entity whose world
    /// matrix is `owner_world`
    pub fn target_in_skeleton_space(&self, owner_world: &Mat4) -> Vec3 {
        match self.target_space {
            IkTargetSpace::Local => self.target,
            IkTargetSpace::World => owner_world.inverse().transform_point3(self.target),
        }
    }

    /// Resolve the target into world coordinates
    pub fn target_in_world_space(&self, owner_world: &Mat4) -> Vec3 {
        match self.target_space {
            IkTargetSpace::World => self.target,
            IkTargetSpace::Local => owner_world.transform_point3(self.target),
        }
    }

    /// Look up the chain and run [`apply_two_bone_ik`]
    ///
    /// Returns `false` when the constraint is inactive or a bone name does
    /// not resolve.
    pub fn apply(
        &self,
        skeleton: &Skeleton,
        pose: &mut LocalPose,
        owner_world: &Mat4,
        scratch: &mut Vec<Mat4>,
    ) -> bool {
        if !self.is_active() {
            return false;
        }
        let (Some(root), Some(mid), Some(end)) = (
            skeleton.bone_index(&self.root_bone),
            skeleton.bone_index(&self.mid_bone),
            skeleton.bone_index(&self.end_bone),
        ) else {
            log::trace!(
                "IK chain {}/{}/{} does not resolve against the skeleton",
                self.root_bone,
                self.mid_bone,
                self.end_bone
            );
            return false;
        };

        let target = self.target_in_skeleton_space(owner_world);
        apply_two_bone_ik(skeleton, pose, [root, mid, end], target, self.weight, scratch);
        true
    }
}

/// Rotate `chain = [root, mid, end]` so the end effector approaches `target`
///
/// `target` is in skeleton space. Each of the [`IK_ITERATIONS`] passes
/// rebuilds the global pose once, then corrects the mid bone and the root
/// bone against it. A bone is left alone when its end direction already
/// points at the target or no rotation axis is defined. Out-of-range
/// indices and a weight at or below 0.0001 leave the pose untouched.
pub fn apply_two_bone_ik(
    skeleton: &Skeleton,
    pose: &mut LocalPose,
    chain: [usize; 3],
    target: Vec3,
    weight: f32,
    globals: &mut Vec<Mat4>,
) {
    let bone_count = pose.len().min(skeleton.len());
    if chain.iter().any(|&index| index >= bone_count) {
        return;
    }
    let weight = weight.clamp(0.0, 1.0);
    if weight <= MIN_WEIGHT {
        return;
    }

    let [root, mid, end] = chain;
    for _ in 0..IK_ITERATIONS {
        build_global_pose(skeleton, pose, globals);
        let end_position = globals[end].w_axis.truncate();

        for bone in [mid, root] {
            let bone_global = globals[bone];
            let bone_position = bone_global.w_axis.truncate();

            let to_end = (end_position - bone_position).normalize_or_zero();
            let to_target = (target - bone_position).normalize_or_zero();
            let cos_angle = to_end.dot(to_target).clamp(-1.0, 1.0);
            if cos_angle > PARALLEL_COSINE {
                continue;
            }

            let axis = to_end.cross(to_target);
            if axis.length() < MIN_AXIS_LENGTH {
                continue;
            }

            let angle = cos_angle.acos() * weight;
            let delta = Quat::from_axis_angle(axis.normalize(), angle);

            let bone_rotation = decompose_trs(&bone_global).rotation;
            let parent_rotation = skeleton
                .bone(bone)
                .and_then(|b| b.parent)
                .and_then(|parent| globals.get(parent))
                .map_or(Quat::IDENTITY, |parent| decompose_trs(parent).rotation);

            let new_global = delta * bone_rotation;
            pose.rotations[bone] = normalize_or_identity(parent_rotation.inverse() * new_global);
        }
    }
}
