//! Animator state machine
//!
//! An [`Animator`] owns states, transitions, blend trees and parameters.
//! Each [`Animator::update`] advances the current state, starts or
//! progresses a crossfade, samples and blends poses, extracts root motion,
//! applies IK and builds skinning matrices. Everything it needs from the
//! outside world arrives as arguments: the frame delta in a
//! [`FrameContext`], shared rig data in an [`AnimationRig`] and the owning
//! entity in an [`AnimatorOwner`].

pub mod blend_tree;
pub mod parameters;
pub mod root_motion;
pub mod state;

use std::sync::Arc;

use glam::Mat4;

use crate::animation::bone_transform::SkinningComputer;
use crate::animation::ik::IkConstraint;
use crate::animation::pose::{LocalPose, blend_local_poses, sample_local_pose};
use crate::clip::{AnimationClip, AnimationEvent};
use crate::error::{AnimError, Result};
use crate::scene::Transform;
use crate::skeleton::Skeleton;

pub use blend_tree::{BlendMotion, BlendSelection, BlendTree};
pub use parameters::{AnimatorParameter, ParameterType, ParameterValue, Parameters};
pub use root_motion::{RootMotion, resolve_motion_bone};
pub use state::{
    AnimatorCondition, AnimatorState, AnimatorTransition, ConditionOp,
    DEFAULT_TRANSITION_DURATION, StateMotion,
};

/// Crossfades finish once their blend factor reaches this value
const TRANSITION_COMPLETE_ALPHA: f32 = 0.999;

/// Per-frame input shared by every animated entity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameContext {
    /// Seconds since the previous frame
    pub delta_seconds: f32,
    /// Frame counter, used for logging
    pub frame: u64,
}

impl FrameContext {
    pub fn new(delta_seconds: f32) -> Self {
        Self {
            delta_seconds,
            frame: 0,
        }
    }

    pub fn with_frame(mut self, frame: u64) -> Self {
        self.frame = frame;
        self
    }
}

/// Read-only rig data and playback flags, taken from the primary skinned
/// target
#[derive(Debug, Clone, Copy)]
pub struct AnimationRig<'a> {
    pub skeleton: &'a Skeleton,
    pub clips: &'a [Arc<AnimationClip>],
    pub playing: bool,
    pub looping: bool,
    pub playback_speed: f32,
}

impl<'a> AnimationRig<'a> {
    /// Playing, looping, normal speed
    pub fn new(skeleton: &'a Skeleton, clips: &'a [Arc<AnimationClip>]) -> Self {
        Self {
            skeleton,
            clips,
            playing: true,
            looping: true,
            playback_speed: 1.0,
        }
    }

    pub fn clip(&self, index: usize) -> Option<&'a AnimationClip> {
        self.clips.get(index).map(|clip| &**clip)
    }

    pub fn clip_duration(&self, index: usize) -> f32 {
        self.clip(index).map_or(0.0, AnimationClip::duration_seconds)
    }
}

/// The entity an animator moves and corrects
#[derive(Debug)]
pub struct AnimatorOwner<'a> {
    /// Local transform, receives root motion
    pub transform: &'a mut Transform,
    /// World matrix of the entity's parent, identity for scene roots
    pub parent_world: Mat4,
    pub ik: Option<&'a IkConstraint>,
}

impl<'a> AnimatorOwner<'a> {
    pub fn new(transform: &'a mut Transform) -> Self {
        Self {
            transform,
            parent_world: Mat4::IDENTITY,
            ik: None,
        }
    }

    pub fn with_ik(mut self, ik: Option<&'a IkConstraint>) -> Self {
        self.ik = ik;
        self
    }

    pub fn with_parent_world(mut self, parent_world: Mat4) -> Self {
        self.parent_world = parent_world;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveTransition {
    target: usize,
    elapsed: f32,
    duration: f32,
    target_time: f32,
}

/// Scratch poses for two-clip blend trees
#[derive(Debug, Clone, Default)]
struct BlendScratch {
    lower: LocalPose,
    upper: LocalPose,
}

/// Advance a playback time, wrapping or clamping into `[0, duration]`
pub(crate) fn advance_time(time: f32, delta: f32, duration: f32, looping: bool) -> f32 {
    if duration <= 0.0 {
        return time;
    }
    let advanced = time + delta;
    if looping {
        if (0.0..duration).contains(&advanced) {
            return advanced;
        }
        let wrapped = advanced.rem_euclid(duration);
        if wrapped >= duration { 0.0 } else { wrapped }
    } else {
        advanced.clamp(0.0, duration)
    }
}

/// Samples states against one rig and parameter set
struct StateSampler<'s, 'r> {
    rig: &'s AnimationRig<'r>,
    blend_trees: &'s [BlendTree],
    parameters: &'s Parameters,
}

impl StateSampler<'_, '_> {
    /// Longest contributing clip for blend trees, the clip's length otherwise
    fn duration(&self, motion: StateMotion) -> f32 {
        match motion {
            StateMotion::Clip(clip) => self.rig.clip_duration(clip),
            StateMotion::BlendTree(tree) => self
                .blend_trees
                .get(tree)
                .map_or(0.0, |tree| tree.duration_seconds(|clip| self.rig.clip_duration(clip))),
        }
    }

    fn sample(
        &self,
        motion: StateMotion,
        time: f32,
        looping: bool,
        out: &mut LocalPose,
        scratch: &mut BlendScratch,
    ) {
        let skeleton = self.rig.skeleton;
        let tree = match motion {
            StateMotion::Clip(clip) => {
                sample_local_pose(skeleton, self.rig.clip(clip), time, looping, out);
                return;
            }
            StateMotion::BlendTree(tree) => self.blend_trees.get(tree),
        };

        let selection = tree.map_or(BlendSelection::Empty, |tree| {
            tree.select(self.parameters.float_or_zero(&tree.parameter))
        });
        match selection {
            BlendSelection::Empty => sample_local_pose(skeleton, None, time, looping, out),
            BlendSelection::Single(clip) => {
                sample_local_pose(skeleton, self.rig.clip(clip), time, looping, out);
            }
            BlendSelection::Pair { lower, upper, t } => {
                sample_local_pose(skeleton, self.rig.clip(lower), time, looping, &mut scratch.lower);
                sample_local_pose(skeleton, self.rig.clip(upper), time, looping, &mut scratch.upper);
                blend_local_poses(&scratch.lower, &scratch.upper, t, out);
            }
        }
    }
}

/// Parameter-driven state machine producing skinning matrices
#[derive(Debug, Clone)]
pub struct Animator {
    states: Vec<AnimatorState>,
    transitions: Vec<AnimatorTransition>,
    blend_trees: Vec<BlendTree>,
    parameters: Parameters,

    current_state: usize,
    state_time: f32,
    prev_state_time: f32,
    transition: Option<ActiveTransition>,
    default_blend_duration: f32,
    auto_play: bool,
    paused: bool,
    has_pose: bool,
    root_motion: RootMotion,
    fired_events: Vec<AnimationEvent>,

    output_pose: LocalPose,
    state_pose: LocalPose,
    next_pose: LocalPose,
    blend_scratch: BlendScratch,
    skinning: SkinningComputer,
    ik_scratch: Vec<Mat4>,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}

impl Animator {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            transitions: Vec::new(),
            blend_trees: Vec::new(),
            parameters: Parameters::default(),
            current_state: 0,
            state_time: 0.0,
            prev_state_time: 0.0,
            transition: None,
            default_blend_duration: DEFAULT_TRANSITION_DURATION,
            auto_play: true,
            paused: false,
            has_pose: false,
            root_motion: RootMotion::default(),
            fired_events: Vec::new(),
            output_pose: LocalPose::new(),
            state_pose: LocalPose::new(),
            next_pose: LocalPose::new(),
            blend_scratch: BlendScratch::default(),
            skinning: SkinningComputer::new(),
            ik_scratch: Vec::new(),
        }
    }

    // --- Controller definition ---

    pub fn states(&self) -> &[AnimatorState] {
        &self.states
    }

    /// Replace the states; an out-of-range current state falls back to 0
    pub fn set_states(&mut self, states: Vec<AnimatorState>) {
        self.states = states;
        if self.current_state >= self.states.len() {
            self.current_state = 0;
            self.state_time = 0.0;
            self.prev_state_time = 0.0;
        }
        if self
            .transition
            .is_some_and(|transition| transition.target >= self.states.len())
        {
            self.transition = None;
        }
    }

    pub fn transitions(&self) -> &[AnimatorTransition] {
        &self.transitions
    }

    pub fn set_transitions(&mut self, transitions: Vec<AnimatorTransition>) {
        self.transitions = transitions;
    }

    pub fn blend_trees(&self) -> &[BlendTree] {
        &self.blend_trees
    }

    /// Replace the blend trees; motions are stored sorted by threshold
    pub fn set_blend_trees(&mut self, mut blend_trees: Vec<BlendTree>) {
        for tree in &mut blend_trees {
            tree.sort_motions();
        }
        self.blend_trees = blend_trees;
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: Vec<AnimatorParameter>) {
        self.parameters = Parameters::new(parameters);
    }

    /// Report the first dangling state, clip or blend-tree reference
    pub fn validate(&self, clip_count: usize) -> Result<()> {
        let state_count = self.states.len();

        for state in &self.states {
            match state.motion {
                StateMotion::Clip(clip) if clip >= clip_count => {
                    return Err(AnimError::ReferenceError(format!(
                        "state '{}' uses clip {} but only {} clips exist",
                        state.name, clip, clip_count
                    )));
                }
                StateMotion::BlendTree(tree) if tree >= self.blend_trees.len() => {
                    return Err(AnimError::ReferenceError(format!(
                        "state '{}' uses blend tree {} but only {} exist",
                        state.name,
                        tree,
                        self.blend_trees.len()
                    )));
                }
                _ => {}
            }
        }

        for tree in &self.blend_trees {
            if let Some(motion) = tree.motions.iter().find(|m| m.clip_index >= clip_count) {
                return Err(AnimError::ReferenceError(format!(
                    "blend tree '{}' uses clip {} but only {} clips exist",
                    tree.name, motion.clip_index, clip_count
                )));
            }
            if self.parameters.get(&tree.parameter).is_none() {
                log::warn!(
                    "Blend tree '{}' is driven by unknown parameter '{}'",
                    tree.name,
                    tree.parameter
                );
            }
        }

        for (index, transition) in self.transitions.iter().enumerate() {
            let dangling_source = transition.from.is_some_and(|from| from >= state_count);
            if dangling_source || transition.to >= state_count {
                return Err(AnimError::ReferenceError(format!(
                    "transition {} ({:?} -> {}) references a state outside 0..{}",
                    index, transition.from, transition.to, state_count
                )));
            }
            for condition in &transition.conditions {
                if self.parameters.get(&condition.parameter).is_none() {
                    log::warn!(
                        "Transition {} tests unknown parameter '{}'",
                        index,
                        condition.parameter
                    );
                }
            }
        }

        Ok(())
    }

    // --- Parameters ---

    pub fn set_float(&mut self, name: &str, value: f32) -> bool {
        self.parameters.set(name, ParameterValue::Float(value))
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> bool {
        self.parameters.set(name, ParameterValue::Int(value))
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> bool {
        self.parameters.set(name, ParameterValue::Bool(value))
    }

    /// Raise (or lower) a trigger; it is cleared at the end of the next update
    pub fn set_trigger(&mut self, name: &str, value: bool) -> bool {
        self.parameters.set(name, ParameterValue::Trigger(value))
    }

    // --- Playback state ---

    /// Current state, `None` when no states are defined
    pub fn current_state_index(&self) -> Option<usize> {
        (self.current_state < self.states.len()).then_some(self.current_state)
    }

    pub fn current_state(&self) -> Option<&AnimatorState> {
        self.states.get(self.current_state)
    }

    /// Local time of the current state in seconds
    pub fn state_time(&self) -> f32 {
        self.state_time
    }

    pub fn is_in_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Destination of the active crossfade
    pub fn transition_target(&self) -> Option<usize> {
        self.transition.map(|transition| transition.target)
    }

    /// Blend factor of the active crossfade
    pub fn transition_progress(&self) -> Option<f32> {
        self.transition.map(|transition| {
            if transition.duration > 0.0 {
                (transition.elapsed / transition.duration).clamp(0.0, 1.0)
            } else {
                1.0
            }
        })
    }

    /// Switch to `index`, crossfading over `blend` seconds
    ///
    /// `None` uses the default blend duration. A zero blend, or a switch
    /// to the current state, is immediate; `restart` then rewinds the
    /// state to 0. Returns `false` for an unknown index.
    pub fn set_current_state(&mut self, index: usize, blend: Option<f32>, restart: bool) -> bool {
        if index >= self.states.len() {
            return false;
        }
        let blend = blend.unwrap_or(self.default_blend_duration);
        self.apply_state(index, blend, restart);
        true
    }

    pub fn set_current_state_by_name(
        &mut self,
        name: &str,
        blend: Option<f32>,
        restart: bool,
    ) -> bool {
        match self.states.iter().position(|state| state.name == name) {
            Some(index) => self.set_current_state(index, blend, restart),
            None => false,
        }
    }

    pub fn state_index(&self, name: &str) -> Result<usize> {
        self.states
            .iter()
            .position(|state| state.name == name)
            .ok_or_else(|| AnimError::UnknownState(name.to_string()))
    }

    pub fn default_blend_duration(&self) -> f32 {
        self.default_blend_duration
    }

    pub fn set_default_blend_duration(&mut self, seconds: f32) {
        self.default_blend_duration = seconds.max(0.0);
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    /// When disabled, a newly bound animator holds its first pose until
    /// [`Animator::play`] is called
    pub fn set_auto_play(&mut self, auto_play: bool) {
        self.auto_play = auto_play;
    }

    pub fn play(&mut self) {
        self.paused = false;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn root_motion(&self) -> &RootMotion {
        &self.root_motion
    }

    pub fn set_root_motion_enabled(&mut self, enabled: bool) {
        self.root_motion.enabled = enabled;
        self.root_motion.invalidate();
    }

    pub fn set_root_motion_position(&mut self, apply: bool) {
        self.root_motion.apply_position = apply;
    }

    pub fn set_root_motion_rotation(&mut self, apply: bool) {
        self.root_motion.apply_rotation = apply;
    }

    // --- Outputs ---

    /// Events crossed since the list was last cleared
    pub fn fired_events(&self) -> &[AnimationEvent] {
        &self.fired_events
    }

    pub fn drain_fired_events(&mut self) -> std::vec::Drain<'_, AnimationEvent> {
        self.fired_events.drain(..)
    }

    pub fn clear_fired_events(&mut self) {
        self.fired_events.clear();
    }

    /// Final local pose of the last update
    pub fn pose(&self) -> &LocalPose {
        &self.output_pose
    }

    /// Skinning matrices of the last update, in bone order
    pub fn skin_matrices(&self) -> &[Mat4] {
        self.skinning.skin_matrices()
    }

    /// Skeleton-space bone matrices of the last update
    pub fn global_pose(&self) -> &[Mat4] {
        self.skinning.globals()
    }

    /// Forget the evaluated pose so the next update starts a fresh baseline
    pub fn reset(&mut self) {
        self.state_time = 0.0;
        self.prev_state_time = 0.0;
        self.transition = None;
        self.has_pose = false;
        self.root_motion.invalidate();
        self.skinning.clear();
    }

    // --- Evaluation ---

    /// Run one frame
    ///
    /// Returns `false` when there is nothing to evaluate (no states or an
    /// empty skeleton). Triggers are cleared in every case.
    pub fn update(
        &mut self,
        ctx: &FrameContext,
        rig: &AnimationRig<'_>,
        owner: AnimatorOwner<'_>,
    ) -> bool {
        if self.states.is_empty() || rig.skeleton.is_empty() {
            self.parameters.reset_triggers();
            return false;
        }
        if self.current_state >= self.states.len() {
            self.current_state = 0;
            self.state_time = 0.0;
            self.prev_state_time = 0.0;
        }

        let delta = if ctx.delta_seconds.is_finite() {
            ctx.delta_seconds.max(0.0)
        } else {
            0.0
        };

        if !self.has_pose {
            self.paused = !self.auto_play;
            // Establish time-0 pose and root-motion baseline
            self.step(rig, 0.0, owner.transform);
            self.has_pose = true;
        }
        self.step(rig, delta, owner.transform);

        if let Some(ik) = owner.ik {
            let world = owner.parent_world * owner.transform.matrix();
            ik.apply(rig.skeleton, &mut self.output_pose, &world, &mut self.ik_scratch);
        }

        self.skinning.update(rig.skeleton, &self.output_pose);
        self.parameters.reset_triggers();

        log::trace!(
            "Frame {}: state {} t={:.4} transition={:?}",
            ctx.frame,
            self.current_state,
            self.state_time,
            self.transition_progress()
        );
        true
    }

    fn step(&mut self, rig: &AnimationRig<'_>, delta: f32, transform: &mut Transform) {
        let Some(state) = self.states.get(self.current_state) else {
            return;
        };
        let (motion, speed, state_looping) = (state.motion, state.speed, state.looping);

        let sampler = StateSampler {
            rig,
            blend_trees: &self.blend_trees,
            parameters: &self.parameters,
        };
        let playing = rig.playing && !self.paused;
        let duration = sampler.duration(motion);
        let looping = state_looping && rig.looping;

        self.prev_state_time = self.state_time;
        let advance = if playing && duration > 0.0 {
            speed * rig.playback_speed * delta
        } else {
            0.0
        };
        if playing && duration > 0.0 {
            self.state_time = advance_time(self.state_time, advance, duration, looping);
        }

        if let StateMotion::Clip(clip) = motion {
            if let Some(clip) = rig.clip(clip) {
                clip.events_between(
                    self.prev_state_time,
                    self.state_time,
                    advance,
                    looping,
                    &mut self.fired_events,
                );
            }
        }

        if self.transition.is_none() {
            self.evaluate_transitions(duration);
        }

        let sampler = StateSampler {
            rig,
            blend_trees: &self.blend_trees,
            parameters: &self.parameters,
        };
        let next = self
            .transition
            .and_then(|transition| Some((transition, self.states.get(transition.target)?)));

        match next {
            Some((mut transition, next_state)) => {
                let next_duration = sampler.duration(next_state.motion);
                let next_looping = next_state.looping && rig.looping;
                if playing && next_duration > 0.0 {
                    transition.target_time = advance_time(
                        transition.target_time,
                        next_state.speed * rig.playback_speed * delta,
                        next_duration,
                        next_looping,
                    );
                }
                transition.elapsed = (transition.elapsed + delta).min(transition.duration);
                let alpha = if transition.duration > 0.0 {
                    (transition.elapsed / transition.duration).clamp(0.0, 1.0)
                } else {
                    1.0
                };

                sampler.sample(
                    motion,
                    self.state_time,
                    looping,
                    &mut self.state_pose,
                    &mut self.blend_scratch,
                );
                sampler.sample(
                    next_state.motion,
                    transition.target_time,
                    next_looping,
                    &mut self.next_pose,
                    &mut self.blend_scratch,
                );
                blend_local_poses(&self.state_pose, &self.next_pose, alpha, &mut self.output_pose);

                if alpha >= TRANSITION_COMPLETE_ALPHA {
                    log::debug!(
                        "Transition to '{}' complete at t={:.4}",
                        next_state.name,
                        transition.target_time
                    );
                    self.current_state = transition.target;
                    self.state_time = transition.target_time;
                    self.prev_state_time = transition.target_time;
                    self.transition = None;
                    self.root_motion.invalidate();
                } else {
                    self.transition = Some(transition);
                }
            }
            None => {
                self.transition = None;
                sampler.sample(
                    motion,
                    self.state_time,
                    looping,
                    &mut self.output_pose,
                    &mut self.blend_scratch,
                );
            }
        }

        self.root_motion
            .extract(rig.skeleton, &mut self.output_pose, self.state_time, transform);
    }

    fn evaluate_transitions(&mut self, duration: f32) {
        let normalized = if duration > 0.0 {
            self.state_time / duration
        } else {
            0.0
        };

        let state_count = self.states.len();
        let chosen = self.transitions.iter().find(|transition| {
            transition.to < state_count
                && transition.is_eligible(self.current_state, normalized, &self.parameters)
        });

        if let Some(transition) = chosen {
            let blend = transition.resolved_duration(duration);
            let (to, restart) = (transition.to, transition.restart_destination);
            self.apply_state(to, blend, restart);
        }
    }

    fn apply_state(&mut self, index: usize, blend: f32, restart: bool) {
        if blend > 0.0 && index != self.current_state {
            log::debug!(
                "Transition {} -> {} over {:.3}s",
                self.current_state,
                index,
                blend
            );
            self.transition = Some(ActiveTransition {
                target: index,
                elapsed: 0.0,
                duration: blend,
                target_time: if restart { 0.0 } else { self.state_time },
            });
            self.root_motion.invalidate();
            return;
        }

        log::debug!("State {} -> {} (immediate)", self.current_state, index);
        self.current_state = index;
        self.transition = None;
        if restart {
            self.state_time = 0.0;
            self.prev_state_time = 0.0;
            self.root_motion.invalidate();
        }
    }
}
