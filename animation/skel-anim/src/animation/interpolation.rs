//! Clip time resolution and keyframe track sampling

use crate::clip::{AnimationClip, DEFAULT_TICKS_PER_SECOND, Keyframe};
use crate::math::Interpolate;

/// Convert a playback time in seconds into clip ticks
///
/// Looping clips wrap into `[0, duration)`, including negative input.
/// Non-looping clips clamp into `[0, duration]`. Clips without a positive
/// duration pass the tick value through unchanged.
pub fn resolve_clip_ticks(clip: &AnimationClip, seconds: f32, looping: bool) -> f32 {
    let ticks_per_second = if clip.ticks_per_second() > 0.0 {
        clip.ticks_per_second()
    } else {
        DEFAULT_TICKS_PER_SECOND
    };

    let ticks = seconds * ticks_per_second;
    let duration = clip.duration_ticks();
    if duration <= 0.0 {
        return ticks;
    }

    if looping {
        let mut wrapped = ticks % duration;
        if wrapped < 0.0 {
            wrapped += duration;
        }
        // A tiny negative remainder can round up to exactly `duration`
        if wrapped >= duration { 0.0 } else { wrapped }
    } else {
        ticks.clamp(0.0, duration)
    }
}

/// Find the index of the last key at or before `time`
///
/// Returns `None` for an empty track. The result is the earlier key of the
/// bracketing pair, so callers interpolate between `[index]` and
/// `[index + 1]`.
pub fn find_key_index<T>(keys: &[Keyframe<T>], time: f32) -> Option<usize> {
    if keys.is_empty() {
        return None;
    }

    let last_index = keys.len() - 1;
    if time >= keys[last_index].time {
        return Some(last_index);
    }

    // Number of keys whose time is <= `time`
    let upper = keys.partition_point(|key| key.time <= time);
    Some(upper.saturating_sub(1))
}

/// Sample a key track at `time` (ticks)
///
/// An empty track yields `fallback`. Times at or outside the first/last
/// key return that key's value exactly.
pub fn sample_track<T: Interpolate>(keys: &[Keyframe<T>], time: f32, fallback: T) -> T {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return fallback;
    };

    if keys.len() == 1 || time <= first.time {
        return first.value;
    }
    if time >= last.time {
        return last.value;
    }

    let Some(index) = find_key_index(keys, time) else {
        return fallback;
    };
    let (Some(a), Some(b)) = (keys.get(index), keys.get(index + 1)) else {
        return last.value;
    };

    let span = b.time - a.time;
    let t = if span > 0.0 {
        (time - a.time) / span
    } else {
        0.0
    };
    a.value.interpolate(&b.value, t)
}
