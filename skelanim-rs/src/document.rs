//! JSON rig documents
//!
//! A document carries everything needed to stand up one animated entity:
//! the bind skeleton (as parent-relative TRS), the clips and the animator
//! controller. Inverse-bind matrices are derived from the bind globals.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use skel_anim::clip::DEFAULT_TICKS_PER_SECOND;
use skel_anim::math::normalize_or_identity;
use skel_anim::{
    AnimationChannel, AnimationClip, AnimationEvent, Animator, AnimatorParameter, AnimatorState,
    AnimatorTransition, BlendTree, EntityId, IkConstraint, Scene, Skeleton, SkinnedMeshRenderer,
};

/// One bone in bind pose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneDesc {
    pub name: String,
    /// Name of an earlier bone
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default)]
    pub rotation: Quat,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

fn default_ticks_per_second() -> f32 {
    DEFAULT_TICKS_PER_SECOND
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipDesc {
    pub name: String,
    pub duration_ticks: f32,
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: f32,
    #[serde(default)]
    pub channels: Vec<AnimationChannel>,
    #[serde(default)]
    pub events: Vec<AnimationEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootMotionDesc {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub apply_position: bool,
    #[serde(default)]
    pub apply_rotation: bool,
}

impl Default for RootMotionDesc {
    fn default() -> Self {
        Self {
            enabled: false,
            apply_position: true,
            apply_rotation: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerDesc {
    #[serde(default)]
    pub parameters: Vec<AnimatorParameter>,
    #[serde(default)]
    pub states: Vec<AnimatorState>,
    #[serde(default)]
    pub transitions: Vec<AnimatorTransition>,
    #[serde(default)]
    pub blend_trees: Vec<BlendTree>,
    #[serde(default)]
    pub default_blend_duration: Option<f32>,
    #[serde(default)]
    pub root_motion: RootMotionDesc,
}

/// Top-level rig document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigDocument {
    #[serde(default)]
    pub name: Option<String>,
    pub skeleton: Vec<BoneDesc>,
    #[serde(default)]
    pub clips: Vec<ClipDesc>,
    #[serde(default)]
    pub controller: ControllerDesc,
    #[serde(default)]
    pub ik: Option<IkConstraint>,
}

impl RigDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse rig document")
    }

    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Loading rig document: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid rig document {}", path.display()))
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("rig")
    }

    /// Build the skeleton, deriving inverse binds from the bind globals
    pub fn build_skeleton(&self) -> Result<Skeleton> {
        let mut skeleton = Skeleton::new();
        let mut globals: Vec<Mat4> = Vec::with_capacity(self.skeleton.len());
        let mut indices: HashMap<&str, usize> = HashMap::new();

        for bone in &self.skeleton {
            let parent = match &bone.parent {
                Some(name) => match indices.get(name.as_str()) {
                    Some(&index) => Some(index),
                    None => bail!(
                        "Bone '{}' names parent '{}' which is not defined before it",
                        bone.name,
                        name
                    ),
                },
                None => None,
            };

            let local = Mat4::from_scale_rotation_translation(
                bone.scale,
                normalize_or_identity(bone.rotation),
                bone.translation,
            );
            let global = parent.map_or(local, |p| globals[p] * local);

            let index = skeleton.add_bone(bone.name.clone(), parent, local, global.inverse());
            globals.push(global);
            indices.insert(&bone.name, index);
        }

        skeleton.validate()?;
        Ok(skeleton)
    }

    /// Build the clips, bound against `skeleton`
    pub fn build_clips(&self, skeleton: &Skeleton) -> Vec<Arc<AnimationClip>> {
        self.clips
            .iter()
            .map(|desc| {
                let mut clip = AnimationClip::new(desc.name.clone());
                clip.set_duration_ticks(desc.duration_ticks);
                clip.set_ticks_per_second(desc.ticks_per_second);
                for channel in &desc.channels {
                    clip.add_channel(channel.clone());
                }
                for event in &desc.events {
                    clip.add_event(event.clone());
                }
                clip.rebind_to_skeleton(skeleton);
                Arc::new(clip)
            })
            .collect()
    }

    pub fn build_animator(&self) -> Animator {
        let controller = &self.controller;
        let mut animator = Animator::new();
        animator.set_parameters(controller.parameters.clone());
        animator.set_blend_trees(controller.blend_trees.clone());
        animator.set_states(controller.states.clone());
        animator.set_transitions(controller.transitions.clone());
        if let Some(seconds) = controller.default_blend_duration {
            animator.set_default_blend_duration(seconds);
        }
        animator.set_root_motion_enabled(controller.root_motion.enabled);
        animator.set_root_motion_position(controller.root_motion.apply_position);
        animator.set_root_motion_rotation(controller.root_motion.apply_rotation);
        animator
    }

    /// Check the skeleton and the controller's references
    pub fn validate(&self) -> Result<()> {
        let skeleton = self.build_skeleton()?;
        self.build_animator()
            .validate(self.clips.len())
            .context("Controller references are invalid")?;
        for clip in self.build_clips(&skeleton) {
            for channel in clip.channels().iter().filter(|c| c.bone_index.is_none()) {
                log::warn!(
                    "Clip '{}' animates unknown bone '{}'",
                    clip.name(),
                    channel.bone_name
                );
            }
        }
        Ok(())
    }

    /// A scene with a single entity carrying the rig, animator and IK
    pub fn build_scene(&self) -> Result<(Scene, EntityId)> {
        let skeleton = Arc::new(self.build_skeleton()?);
        let clips = self.build_clips(&skeleton);
        let animator = self.build_animator();
        animator
            .validate(clips.len())
            .context("Controller references are invalid")?;

        let mut scene = Scene::new();
        let entity = scene.spawn(self.display_name());
        scene.set_skinned(entity, Some(SkinnedMeshRenderer::new(skeleton).with_clips(clips)))?;
        scene.set_animator(entity, Some(animator))?;
        scene.set_ik(entity, self.ik.clone())?;
        Ok((scene, entity))
    }
}
