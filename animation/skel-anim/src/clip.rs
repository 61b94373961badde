//! Keyframed clip data
//!
//! Clip and key times are in ticks; event times are in seconds. A clip is
//! immutable once imported apart from [`AnimationClip::rebind_to_skeleton`],
//! which resolves bone names against a concrete bone ordering.

use glam::{Quat, Vec3};

use crate::skeleton::Skeleton;

/// Tick rate used when a clip does not define a usable one
pub const DEFAULT_TICKS_PER_SECOND: f32 = 25.0;

/// One (time, value) sample of a track
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Keyframe<T> {
    /// Time in ticks
    pub time: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Position and scale keys
pub type VectorKeyframe = Keyframe<Vec3>;
/// Rotation keys
pub type QuatKeyframe = Keyframe<Quat>;

/// Keyframe tracks for a single bone
///
/// The three tracks are independent and may have different key counts and
/// timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationChannel {
    pub bone_name: String,
    /// Resolved bone index, filled in by [`AnimationClip::rebind_to_skeleton`]
    #[cfg_attr(feature = "serde-support", serde(default, skip_serializing))]
    pub bone_index: Option<usize>,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub position_keys: Vec<VectorKeyframe>,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub rotation_keys: Vec<QuatKeyframe>,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub scale_keys: Vec<VectorKeyframe>,
}

impl AnimationChannel {
    pub fn new(bone_name: impl Into<String>) -> Self {
        Self {
            bone_name: bone_name.into(),
            ..Self::default()
        }
    }

    pub fn with_position_keys(mut self, keys: Vec<VectorKeyframe>) -> Self {
        self.position_keys = keys;
        self
    }

    pub fn with_rotation_keys(mut self, keys: Vec<QuatKeyframe>) -> Self {
        self.rotation_keys = keys;
        self
    }

    pub fn with_scale_keys(mut self, keys: Vec<VectorKeyframe>) -> Self {
        self.scale_keys = keys;
        self
    }
}

/// Named marker fired when playback crosses its time
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationEvent {
    /// Time in seconds
    pub time: f32,
    pub name: String,
}

impl AnimationEvent {
    pub fn new(time: f32, name: impl Into<String>) -> Self {
        Self {
            time,
            name: name.into(),
        }
    }
}

/// A keyframed animation
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    name: String,
    duration_ticks: f32,
    ticks_per_second: f32,
    channels: Vec<AnimationChannel>,
    events: Vec<AnimationEvent>,
    /// Bone index -> channel index, built by `rebind_to_skeleton`
    channel_lookup: Vec<Option<usize>>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration_ticks: 0.0,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            channels: Vec::new(),
            events: Vec::new(),
            channel_lookup: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn duration_ticks(&self) -> f32 {
        self.duration_ticks
    }

    pub fn set_duration_ticks(&mut self, duration: f32) {
        self.duration_ticks = duration;
    }

    pub fn ticks_per_second(&self) -> f32 {
        self.ticks_per_second
    }

    pub fn set_ticks_per_second(&mut self, ticks_per_second: f32) {
        self.ticks_per_second = ticks_per_second;
    }

    /// Duration in seconds, 0 when the tick rate is not positive
    pub fn duration_seconds(&self) -> f32 {
        if self.ticks_per_second <= 0.0 {
            0.0
        } else {
            self.duration_ticks / self.ticks_per_second
        }
    }

    pub fn channels(&self) -> &[AnimationChannel] {
        &self.channels
    }

    /// Append a channel; the bone lookup is dropped until the next rebind
    pub fn add_channel(&mut self, channel: AnimationChannel) {
        self.channels.push(channel);
        self.channel_lookup.clear();
    }

    /// Find the channel animating `bone_index`
    ///
    /// Uses the lookup built by the last rebind, otherwise scans the
    /// channel list.
    pub fn channel_for_bone(&self, bone_index: usize) -> Option<&AnimationChannel> {
        if !self.channel_lookup.is_empty() {
            return self
                .channel_lookup
                .get(bone_index)
                .copied()
                .flatten()
                .and_then(|index| self.channels.get(index));
        }
        self.channels
            .iter()
            .find(|channel| channel.bone_index == Some(bone_index))
    }

    pub fn events(&self) -> &[AnimationEvent] {
        &self.events
    }

    pub fn add_event(&mut self, event: AnimationEvent) {
        self.events.push(event);
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Resolve every channel's bone name against `skeleton`
    ///
    /// Channels naming unknown bones keep `bone_index == None` and are
    /// ignored during sampling.
    pub fn rebind_to_skeleton(&mut self, skeleton: &Skeleton) {
        self.channel_lookup.clear();
        self.channel_lookup.resize(skeleton.len(), None);

        let mut unresolved = 0usize;
        for (channel_index, channel) in self.channels.iter_mut().enumerate() {
            channel.bone_index = skeleton.bone_index(&channel.bone_name);
            match channel.bone_index {
                Some(bone) => {
                    // First channel for a bone wins
                    if self.channel_lookup[bone].is_none() {
                        self.channel_lookup[bone] = Some(channel_index);
                    }
                }
                None => unresolved += 1,
            }
        }

        if unresolved > 0 {
            log::debug!(
                "Clip '{}': {} of {} channels do not match any bone",
                self.name,
                unresolved,
                self.channels.len()
            );
        }
    }

    /// Whether any channel's resolved index disagrees with `skeleton`
    pub fn needs_rebind(&self, skeleton: &Skeleton) -> bool {
        if !self.channels.is_empty() && self.channel_lookup.len() != skeleton.len() {
            return true;
        }
        self.channels
            .iter()
            .any(|channel| channel.bone_index != skeleton.bone_index(&channel.bone_name))
    }

    /// Collect events crossed while playback moved from `prev` to `current`
    ///
    /// `step` is the signed playback advance that produced `current`.
    /// Forward playback fires events in `(prev, current]`; a looping step
    /// that wrapped fires events after `prev` and events at or before
    /// `current`. Reverse playback mirrors this: `[current, prev)`, or
    /// events before `prev` and at or after `current` when it wrapped.
    pub fn events_between(
        &self,
        prev: f32,
        current: f32,
        step: f32,
        looping: bool,
        out: &mut Vec<AnimationEvent>,
    ) {
        if self.events.is_empty() || self.duration_seconds() <= 0.0 || step == 0.0 {
            return;
        }

        let reverse = step < 0.0;
        let wrapped = looping && if reverse { current > prev } else { current < prev };
        for event in &self.events {
            let t = event.time;
            let hit = match (reverse, wrapped) {
                (false, false) => t > prev && t <= current,
                (false, true) => t > prev || t <= current,
                (true, false) => t >= current && t < prev,
                (true, true) => t < prev || t >= current,
            };
            if hit {
                out.push(event.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    fn skeleton() -> Skeleton {
        let mut skeleton = Skeleton::new();
        let root = skeleton.add_bone("Root", None, Mat4::IDENTITY, Mat4::IDENTITY);
        skeleton.add_bone("Arm", Some(root), Mat4::IDENTITY, Mat4::IDENTITY);
        skeleton
    }

    fn clip_with_events() -> AnimationClip {
        let mut clip = AnimationClip::new("Walk");
        clip.set_duration_ticks(50.0);
        clip.add_event(AnimationEvent::new(0.0, "Start"));
        clip.add_event(AnimationEvent::new(0.5, "FootLeft"));
        clip.add_event(AnimationEvent::new(1.5, "FootRight"));
        clip
    }

    fn names(events: &[AnimationEvent]) -> Vec<&str> {
        events.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_duration_seconds() {
        let mut clip = AnimationClip::new("Walk");
        clip.set_duration_ticks(50.0);
        assert!((clip.duration_seconds() - 2.0).abs() < 0.0001);

        clip.set_ticks_per_second(0.0);
        assert_eq!(clip.duration_seconds(), 0.0);
    }

    #[test]
    fn test_rebind_resolves_indices() {
        let mut clip = AnimationClip::new("Wave");
        clip.add_channel(AnimationChannel::new("Arm"));
        clip.add_channel(AnimationChannel::new("Missing"));
        assert!(clip.needs_rebind(&skeleton()));

        clip.rebind_to_skeleton(&skeleton());
        assert_eq!(clip.channels()[0].bone_index, Some(1));
        assert_eq!(clip.channels()[1].bone_index, None);
        assert!(!clip.needs_rebind(&skeleton()));

        assert_eq!(clip.channel_for_bone(1).map(|c| c.bone_name.as_str()), Some("Arm"));
        assert!(clip.channel_for_bone(0).is_none());
        assert!(clip.channel_for_bone(7).is_none());
    }

    #[test]
    fn test_channel_lookup_without_cache() {
        let mut clip = AnimationClip::new("Wave");
        let mut channel = AnimationChannel::new("Arm");
        channel.bone_index = Some(1);
        clip.add_channel(channel);
        assert_eq!(clip.channel_for_bone(1).map(|c| c.bone_name.as_str()), Some("Arm"));
    }

    #[test]
    fn test_events_forward() {
        let clip = clip_with_events();
        let mut out = Vec::new();
        clip.events_between(0.0, 0.5, 0.5, true, &mut out);
        assert_eq!(names(&out), vec!["FootLeft"]);
    }

    #[test]
    fn test_events_wrap() {
        let clip = clip_with_events();
        let mut out = Vec::new();
        clip.events_between(1.2, 0.1, 0.9, true, &mut out);
        assert_eq!(names(&out), vec!["Start", "FootRight"]);
    }

    #[test]
    fn test_events_reverse() {
        let clip = clip_with_events();
        let mut out = Vec::new();
        clip.events_between(1.99, 1.98, -0.01, true, &mut out);
        assert!(out.is_empty());

        clip.events_between(0.6, 0.4, -0.2, true, &mut out);
        assert_eq!(names(&out), vec!["FootLeft"]);
    }

    #[test]
    fn test_events_reverse_wrap() {
        let clip = clip_with_events();
        let mut out = Vec::new();
        clip.events_between(0.1, 1.8, -0.3, true, &mut out);
        assert_eq!(names(&out), vec!["Start"]);

        out.clear();
        clip.events_between(0.1, 1.4, -0.7, true, &mut out);
        assert_eq!(names(&out), vec!["Start", "FootRight"]);
    }

    #[test]
    fn test_events_zero_step() {
        let clip = clip_with_events();
        let mut out = Vec::new();
        clip.events_between(0.5, 0.5, 0.0, true, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_events_zero_duration() {
        let mut clip = clip_with_events();
        clip.set_duration_ticks(0.0);
        let mut out = Vec::new();
        clip.events_between(0.0, 1.0, 1.0, false, &mut out);
        assert!(out.is_empty());
    }
}
