//! Per-bone local poses: sampling from clips and blending

use glam::{Quat, Vec3};

use super::interpolation::{resolve_clip_ticks, sample_track};
use crate::clip::AnimationClip;
use crate::math::{Interpolate, Trs};
use crate::skeleton::Skeleton;

/// Parent-relative transforms, one entry per bone
///
/// Indexed identically to the skeleton's bone list. Owned by a single
/// animator or renderer and overwritten every frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalPose {
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
}

impl LocalPose {
    pub fn new() -> Self {
        Self::default()
    }

    /// The skeleton's bind pose
    pub fn from_bind(skeleton: &Skeleton) -> Self {
        let mut pose = Self::new();
        pose.set_to_bind(skeleton);
        pose
    }

    /// Number of bones covered by all three arrays
    pub fn len(&self) -> usize {
        self.positions
            .len()
            .min(self.rotations.len())
            .min(self.scales.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize to `count` bones, filling new entries with identity
    pub fn resize(&mut self, count: usize) {
        self.positions.resize(count, Vec3::ZERO);
        self.rotations.resize(count, Quat::IDENTITY);
        self.scales.resize(count, Vec3::ONE);
    }

    /// Overwrite every entry with the bind pose
    pub fn set_to_bind(&mut self, skeleton: &Skeleton) {
        self.resize(skeleton.len());
        for (index, bind) in skeleton.bind_pose().iter().enumerate() {
            self.set_trs(index, *bind);
        }
    }

    /// Bone transform, `None` when out of range
    pub fn trs(&self, index: usize) -> Option<Trs> {
        Some(Trs {
            translation: *self.positions.get(index)?,
            rotation: *self.rotations.get(index)?,
            scale: *self.scales.get(index)?,
        })
    }

    pub fn set_trs(&mut self, index: usize, trs: Trs) {
        if index < self.len() {
            self.positions[index] = trs.translation;
            self.rotations[index] = trs.rotation;
            self.scales[index] = trs.scale;
        }
    }

    /// Put one bone back at its bind transform
    pub fn reset_bone_to_bind(&mut self, skeleton: &Skeleton, index: usize) {
        if index < skeleton.len() {
            self.set_trs(index, skeleton.bind_trs(index));
        }
    }
}

/// Sample `clip` at `seconds` into `out`
///
/// `out` is resized to the skeleton. Bones without a channel, and every
/// bone when `clip` is `None`, take their bind transform.
pub fn sample_local_pose(
    skeleton: &Skeleton,
    clip: Option<&AnimationClip>,
    seconds: f32,
    looping: bool,
    out: &mut LocalPose,
) {
    out.resize(skeleton.len());

    let ticks = clip.map_or(0.0, |clip| resolve_clip_ticks(clip, seconds, looping));

    for (index, bind) in skeleton.bind_pose().iter().enumerate() {
        let channel = clip.and_then(|clip| clip.channel_for_bone(index));

        let trs = match channel {
            Some(channel) => Trs {
                translation: sample_track(&channel.position_keys, ticks, bind.translation),
                rotation: sample_track(&channel.rotation_keys, ticks, bind.rotation),
                scale: sample_track(&channel.scale_keys, ticks, bind.scale),
            },
            None => *bind,
        };

        out.positions[index] = trs.translation;
        out.rotations[index] = trs.rotation;
        out.scales[index] = trs.scale;
    }
}

/// Blend two poses into `out`
///
/// Positions and scales interpolate linearly, rotations spherically. `t` is
/// clamped to `[0, 1]`. Only the first `min(a.len(), b.len())` bones are
/// blended; `out` is resized to that count.
pub fn blend_local_poses(a: &LocalPose, b: &LocalPose, t: f32, out: &mut LocalPose) {
    let t = t.clamp(0.0, 1.0);
    let count = a.len().min(b.len());
    out.resize(count);

    for i in 0..count {
        out.positions[i] = a.positions[i].interpolate(&b.positions[i], t);
        out.rotations[i] = a.rotations[i].interpolate(&b.rotations[i], t);
        out.scales[i] = a.scales[i].interpolate(&b.scales[i], t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{AnimationChannel, Keyframe};
    use glam::Mat4;

    fn skeleton() -> Skeleton {
        let mut skeleton = Skeleton::new();
        let root = skeleton.add_bone("Root", None, Mat4::IDENTITY, Mat4::IDENTITY);
        skeleton.add_bone(
            "Arm",
            Some(root),
            Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)),
            Mat4::IDENTITY,
        );
        skeleton
    }

    fn slide_clip(skeleton: &Skeleton) -> AnimationClip {
        let mut clip = AnimationClip::new("Slide");
        clip.set_duration_ticks(25.0);
        clip.add_channel(AnimationChannel::new("Root").with_position_keys(vec![
            Keyframe::new(0.0, Vec3::ZERO),
            Keyframe::new(25.0, Vec3::new(4.0, 0.0, 0.0)),
        ]));
        clip.rebind_to_skeleton(skeleton);
        clip
    }

    #[test]
    fn test_sample_without_clip_is_bind() {
        let skeleton = skeleton();
        let mut pose = LocalPose::new();
        sample_local_pose(&skeleton, None, 1.0, true, &mut pose);
        assert_eq!(pose, LocalPose::from_bind(&skeleton));
    }

    #[test]
    fn test_sample_channel_and_fallback() {
        let skeleton = skeleton();
        let clip = slide_clip(&skeleton);
        let mut pose = LocalPose::new();
        sample_local_pose(&skeleton, Some(&clip), 0.5, false, &mut pose);

        assert!((pose.positions[0] - Vec3::new(2.0, 0.0, 0.0)).length() < 0.0001);
        // Rotation/scale tracks are empty and fall back to bind
        assert_eq!(pose.rotations[0], Quat::IDENTITY);
        assert_eq!(pose.scales[0], Vec3::ONE);
        // Arm has no channel
        assert!((pose.positions[1] - Vec3::new(0.0, 2.0, 0.0)).length() < 0.0001);
    }

    #[test]
    fn test_blend_identities() {
        let skeleton = skeleton();
        let clip = slide_clip(&skeleton);
        let mut a = LocalPose::new();
        let mut b = LocalPose::new();
        sample_local_pose(&skeleton, Some(&clip), 0.0, false, &mut a);
        sample_local_pose(&skeleton, Some(&clip), 1.0, false, &mut b);

        let mut out = LocalPose::new();
        blend_local_poses(&a, &b, 0.0, &mut out);
        assert_eq!(out, a);
        blend_local_poses(&a, &b, 1.0, &mut out);
        assert_eq!(out.positions, b.positions);

        blend_local_poses(&a, &b, 0.25, &mut out);
        assert!((out.positions[0] - Vec3::new(1.0, 0.0, 0.0)).length() < 0.0001);
    }

    #[test]
    fn test_blend_clamps_factor() {
        let skeleton = skeleton();
        let clip = slide_clip(&skeleton);
        let mut a = LocalPose::new();
        let mut b = LocalPose::new();
        sample_local_pose(&skeleton, Some(&clip), 0.0, false, &mut a);
        sample_local_pose(&skeleton, Some(&clip), 1.0, false, &mut b);

        let mut out = LocalPose::new();
        blend_local_poses(&a, &b, 7.0, &mut out);
        assert_eq!(out.positions, b.positions);
    }

    #[test]
    fn test_reset_bone_to_bind() {
        let skeleton = skeleton();
        let mut pose = LocalPose::from_bind(&skeleton);
        pose.positions[1] = Vec3::splat(9.0);
        pose.reset_bone_to_bind(&skeleton, 1);
        assert_eq!(pose, LocalPose::from_bind(&skeleton));
    }
}
