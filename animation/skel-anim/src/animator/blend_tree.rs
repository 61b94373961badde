//! One-dimensional blend trees

/// One motion of a blend tree
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendMotion {
    pub clip_index: usize,
    pub threshold: f32,
}

impl BlendMotion {
    pub fn new(clip_index: usize, threshold: f32) -> Self {
        Self {
            clip_index,
            threshold,
        }
    }
}

/// Clips spread along one parameter axis
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendTree {
    pub name: String,
    /// Float parameter driving the blend
    pub parameter: String,
    pub motions: Vec<BlendMotion>,
}

/// Which clips to sample for a parameter value, and how to mix them
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendSelection {
    /// Nothing to sample, use the bind pose
    Empty,
    Single(usize),
    /// Blend `lower` toward `upper` by `t`
    Pair { lower: usize, upper: usize, t: f32 },
}

impl BlendTree {
    pub fn new(name: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter: parameter.into(),
            motions: Vec::new(),
        }
    }

    pub fn with_motion(mut self, clip_index: usize, threshold: f32) -> Self {
        self.motions.push(BlendMotion::new(clip_index, threshold));
        self
    }

    /// Stable sort of the motions by threshold
    pub fn sort_motions(&mut self) {
        self.motions
            .sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
    }

    pub fn is_sorted(&self) -> bool {
        self.motions
            .windows(2)
            .all(|pair| pair[0].threshold <= pair[1].threshold)
    }

    /// Pick the motions to sample for `value`
    ///
    /// Motions must be sorted. Values at or beyond either end snap to that
    /// end's motion; values in between blend the bracketing pair.
    pub fn select(&self, value: f32) -> BlendSelection {
        let (Some(first), Some(last)) = (self.motions.first(), self.motions.last()) else {
            return BlendSelection::Empty;
        };

        if self.motions.len() == 1 || value <= first.threshold {
            return BlendSelection::Single(first.clip_index);
        }
        if value >= last.threshold {
            return BlendSelection::Single(last.clip_index);
        }

        // First motion whose threshold reaches the value; index >= 1 here
        let upper = self
            .motions
            .partition_point(|motion| motion.threshold < value)
            .clamp(1, self.motions.len() - 1);
        let a = self.motions[upper - 1];
        let b = self.motions[upper];

        let span = b.threshold - a.threshold;
        let t = if span > 0.0 {
            (value - a.threshold) / span
        } else {
            0.0
        };

        BlendSelection::Pair {
            lower: a.clip_index,
            upper: b.clip_index,
            t,
        }
    }

    /// Longest contributing clip given per-clip durations
    pub fn duration_seconds(&self, clip_duration: impl Fn(usize) -> f32) -> f32 {
        self.motions
            .iter()
            .map(|motion| clip_duration(motion.clip_index))
            .fold(0.0, f32::max)
    }
}
