//! Skinned-mesh renderer component
//!
//! Holds the shared rig (skeleton and clips), the bone matrices handed to
//! the GPU and the playback flags an animator reads from its primary
//! target. A renderer not driven by an animator plays its active clip on
//! its own, with optional crossfades and root motion.

use std::sync::Arc;

use glam::Mat4;

use crate::animation::bone_transform::SkinningComputer;
use crate::animation::pose::{LocalPose, blend_local_poses, sample_local_pose};
use crate::animator::root_motion::RootMotion;
use crate::animator::{AnimationRig, FrameContext, advance_time};
use crate::clip::AnimationClip;
use crate::scene::Transform;
use crate::skeleton::Skeleton;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ClipCrossfade {
    target: usize,
    elapsed: f32,
    duration: f32,
    target_time: f32,
}

/// Rig holder and bone matrix sink
#[derive(Debug, Clone)]
pub struct SkinnedMeshRenderer {
    skeleton: Option<Arc<Skeleton>>,
    clips: Vec<Arc<AnimationClip>>,
    active_clip: Option<usize>,
    time: f32,
    playing: bool,
    looping: bool,
    playback_speed: f32,
    driven_by_animator: bool,
    crossfade: Option<ClipCrossfade>,
    root_motion: RootMotion,

    bone_matrices: Vec<Mat4>,
    prev_bone_matrices: Vec<Mat4>,
    pose: LocalPose,
    fade_pose: LocalPose,
    output_pose: LocalPose,
    skinning: SkinningComputer,
}

impl Default for SkinnedMeshRenderer {
    fn default() -> Self {
        Self {
            skeleton: None,
            clips: Vec::new(),
            active_clip: None,
            time: 0.0,
            playing: true,
            looping: true,
            playback_speed: 1.0,
            driven_by_animator: false,
            crossfade: None,
            root_motion: RootMotion::default(),
            bone_matrices: Vec::new(),
            prev_bone_matrices: Vec::new(),
            pose: LocalPose::new(),
            fade_pose: LocalPose::new(),
            output_pose: LocalPose::new(),
            skinning: SkinningComputer::new(),
        }
    }
}

/// Resolve channel indices against `skeleton`, cloning clips that are
/// shared and out of date
fn rebind_clips(clips: &mut [Arc<AnimationClip>], skeleton: &Skeleton) {
    for clip in clips.iter_mut() {
        if clip.needs_rebind(skeleton) {
            log::debug!("Rebinding clip '{}' to skeleton", clip.name());
            Arc::make_mut(clip).rebind_to_skeleton(skeleton);
        }
    }
}

impl SkinnedMeshRenderer {
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        let mut renderer = Self::default();
        renderer.set_skeleton(Some(skeleton));
        renderer
    }

    pub fn with_clips(mut self, clips: Vec<Arc<AnimationClip>>) -> Self {
        self.set_animation_clips(clips);
        self
    }

    pub fn skeleton(&self) -> Option<&Arc<Skeleton>> {
        self.skeleton.as_ref()
    }

    /// Replace the rig; clips are rebound and matrices reset to identity
    pub fn set_skeleton(&mut self, skeleton: Option<Arc<Skeleton>>) {
        self.skeleton = skeleton;
        match &self.skeleton {
            Some(skeleton) => {
                rebind_clips(&mut self.clips, skeleton);
                self.bone_matrices = vec![Mat4::IDENTITY; skeleton.len()];
                self.prev_bone_matrices.clone_from(&self.bone_matrices);
            }
            None => {
                self.bone_matrices.clear();
                self.prev_bone_matrices.clear();
            }
        }
        self.root_motion.invalidate();
    }

    pub fn clips(&self) -> &[Arc<AnimationClip>] {
        &self.clips
    }

    /// Replace the clip list; the first clip becomes active
    pub fn set_animation_clips(&mut self, mut clips: Vec<Arc<AnimationClip>>) {
        if let Some(skeleton) = &self.skeleton {
            rebind_clips(&mut clips, skeleton);
        }
        self.active_clip = (!clips.is_empty()).then_some(0);
        self.clips = clips;
        self.time = 0.0;
        self.crossfade = None;
        self.root_motion.invalidate();
    }

    pub fn active_clip_index(&self) -> Option<usize> {
        self.active_clip
    }

    pub fn active_clip(&self) -> Option<&AnimationClip> {
        self.active_clip
            .and_then(|index| self.clips.get(index))
            .map(|clip| &**clip)
    }

    /// Play clip `index` from the start, cancelling any crossfade
    pub fn set_active_clip(&mut self, index: usize) -> bool {
        if index >= self.clips.len() {
            return false;
        }
        self.active_clip = Some(index);
        self.time = 0.0;
        self.crossfade = None;
        self.root_motion.invalidate();
        true
    }

    /// Fade from the active clip to clip `index` over `duration` seconds
    ///
    /// Without an active clip, with a non-positive duration or when `index`
    /// is already active the switch is immediate.
    pub fn cross_fade_to_clip(&mut self, index: usize, duration: f32, restart: bool) -> bool {
        if index >= self.clips.len() {
            return false;
        }
        self.root_motion.invalidate();

        if self.active_clip.is_none() || duration <= 0.0 || self.active_clip == Some(index) {
            self.active_clip = Some(index);
            if restart {
                self.time = 0.0;
            }
            self.crossfade = None;
            return true;
        }

        self.crossfade = Some(ClipCrossfade {
            target: index,
            elapsed: 0.0,
            duration,
            target_time: if restart { 0.0 } else { self.time },
        });
        true
    }

    pub fn is_cross_fading(&self) -> bool {
        self.crossfade.is_some()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.time = seconds;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn playback_speed(&self) -> f32 {
        self.playback_speed
    }

    pub fn set_playback_speed(&mut self, speed: f32) {
        self.playback_speed = speed;
    }

    pub fn is_driven_by_animator(&self) -> bool {
        self.driven_by_animator
    }

    pub fn set_driven_by_animator(&mut self, driven: bool) {
        self.driven_by_animator = driven;
    }

    pub fn root_motion(&self) -> &RootMotion {
        &self.root_motion
    }

    pub fn root_motion_mut(&mut self) -> &mut RootMotion {
        &mut self.root_motion
    }

    /// Rig view an animator samples through
    pub fn rig(&self) -> Option<AnimationRig<'_>> {
        let skeleton = self.skeleton.as_deref()?;
        Some(AnimationRig {
            skeleton,
            clips: &self.clips,
            playing: self.playing,
            looping: self.looping,
            playback_speed: self.playback_speed,
        })
    }

    /// Install new matrices, keeping the current set as the previous frame
    pub fn apply_bone_matrices(&mut self, matrices: &[Mat4]) {
        std::mem::swap(&mut self.prev_bone_matrices, &mut self.bone_matrices);
        if self.prev_bone_matrices.is_empty() {
            self.prev_bone_matrices.resize(matrices.len(), Mat4::IDENTITY);
        }
        self.bone_matrices.clear();
        self.bone_matrices.extend_from_slice(matrices);
    }

    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.bone_matrices
    }

    /// Matrices of the frame before the last `apply_bone_matrices`
    pub fn previous_bone_matrices(&self) -> &[Mat4] {
        &self.prev_bone_matrices
    }

    /// Standalone playback; does nothing while an animator drives this
    /// renderer
    ///
    /// Returns whether new matrices were produced.
    pub fn update(&mut self, ctx: &FrameContext, transform: &mut Transform) -> bool {
        if self.driven_by_animator {
            return false;
        }
        let Some(skeleton) = self.skeleton.clone() else {
            return false;
        };
        if skeleton.is_empty() {
            return false;
        }
        let delta = ctx.delta_seconds.max(0.0) * self.playback_speed;

        let active = self.active_clip.and_then(|index| self.clips.get(index).cloned());
        if self.playing {
            if let Some(clip) = &active {
                let duration = clip.duration_seconds();
                if duration > 0.0 {
                    let reached_end = !self.looping && self.time + delta >= duration;
                    self.time = advance_time(self.time, delta, duration, self.looping);
                    if reached_end && self.crossfade.is_none() {
                        self.playing = false;
                    }
                }
            }
        }

        let fade = self
            .crossfade
            .and_then(|fade| Some((fade, self.clips.get(fade.target).cloned()?)));
        match fade {
            Some((mut fade, target_clip)) => {
                if self.playing {
                    fade.target_time = advance_time(
                        fade.target_time,
                        delta,
                        target_clip.duration_seconds(),
                        self.looping,
                    );
                    fade.elapsed = (fade.elapsed + ctx.delta_seconds.max(0.0)).min(fade.duration);
                }
                let alpha = (fade.elapsed / fade.duration).clamp(0.0, 1.0);

                sample_local_pose(&skeleton, active.as_deref(), self.time, self.looping, &mut self.pose);
                sample_local_pose(
                    &skeleton,
                    Some(&*target_clip),
                    fade.target_time,
                    self.looping,
                    &mut self.fade_pose,
                );
                blend_local_poses(&self.pose, &self.fade_pose, alpha, &mut self.output_pose);
                self.root_motion
                    .extract(&skeleton, &mut self.output_pose, self.time, transform);

                if alpha >= 0.999 {
                    self.active_clip = Some(fade.target);
                    self.time = fade.target_time;
                    self.crossfade = None;
                } else {
                    self.crossfade = Some(fade);
                }
            }
            None => {
                self.crossfade = None;
                sample_local_pose(
                    &skeleton,
                    active.as_deref(),
                    self.time,
                    self.looping,
                    &mut self.output_pose,
                );
                self.root_motion
                    .extract(&skeleton, &mut self.output_pose, self.time, transform);
            }
        }

        self.skinning.update(&skeleton, &self.output_pose);
        std::mem::swap(&mut self.prev_bone_matrices, &mut self.bone_matrices);
        self.bone_matrices.clear();
        self.bone_matrices
            .extend_from_slice(self.skinning.skin_matrices());
        true
    }
}
