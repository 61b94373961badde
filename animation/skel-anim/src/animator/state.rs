//! States, transitions and transition conditions

use super::parameters::{ParameterValue, Parameters};

/// Tolerance for float equality conditions
const FLOAT_EQUAL_EPSILON: f32 = 0.0001;

/// Default transition length in seconds
pub const DEFAULT_TRANSITION_DURATION: f32 = 0.25;

/// What a state samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum StateMotion {
    /// Index into the rig's clip list
    Clip(usize),
    /// Index into the animator's blend trees
    BlendTree(usize),
}

/// A node of the state machine
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimatorState {
    pub name: String,
    pub motion: StateMotion,
    /// Playback speed multiplier
    #[cfg_attr(feature = "serde-support", serde(default = "default_speed"))]
    pub speed: f32,
    #[cfg_attr(feature = "serde-support", serde(default = "default_true"))]
    pub looping: bool,
}

#[cfg(feature = "serde-support")]
fn default_speed() -> f32 {
    1.0
}

#[cfg(feature = "serde-support")]
fn default_true() -> bool {
    true
}

#[cfg(feature = "serde-support")]
fn default_duration() -> f32 {
    DEFAULT_TRANSITION_DURATION
}

impl AnimatorState {
    pub fn clip(name: impl Into<String>, clip_index: usize) -> Self {
        Self {
            name: name.into(),
            motion: StateMotion::Clip(clip_index),
            speed: 1.0,
            looping: true,
        }
    }

    pub fn blend_tree(name: impl Into<String>, tree_index: usize) -> Self {
        Self {
            name: name.into(),
            motion: StateMotion::BlendTree(tree_index),
            speed: 1.0,
            looping: true,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionOp {
    IfTrue,
    IfFalse,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    Equal,
    NotEqual,
}

/// A guard over one named parameter
///
/// Numeric comparisons use the threshold matching the parameter's type:
/// `threshold` for floats, `int_threshold` for ints and `bool_threshold`
/// for bools and triggers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimatorCondition {
    pub parameter: String,
    pub op: ConditionOp,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub threshold: f32,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub int_threshold: i32,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub bool_threshold: bool,
}

impl AnimatorCondition {
    /// Float comparison
    pub fn new(parameter: impl Into<String>, op: ConditionOp, threshold: f32) -> Self {
        Self {
            parameter: parameter.into(),
            op,
            threshold,
            int_threshold: 0,
            bool_threshold: false,
        }
    }

    pub fn int(parameter: impl Into<String>, op: ConditionOp, threshold: i32) -> Self {
        Self {
            int_threshold: threshold,
            ..Self::new(parameter, op, 0.0)
        }
    }

    pub fn bool(parameter: impl Into<String>, op: ConditionOp, threshold: bool) -> Self {
        Self {
            bool_threshold: threshold,
            ..Self::new(parameter, op, 0.0)
        }
    }

    pub fn if_true(parameter: impl Into<String>) -> Self {
        Self::new(parameter, ConditionOp::IfTrue, 0.0)
    }

    pub fn if_false(parameter: impl Into<String>) -> Self {
        Self::new(parameter, ConditionOp::IfFalse, 0.0)
    }

    /// Evaluate against the parameter table; a missing parameter fails
    pub fn holds(&self, parameters: &Parameters) -> bool {
        match parameters.value(&self.parameter) {
            Some(value) => self.holds_for(value),
            None => false,
        }
    }

    fn holds_for(&self, value: ParameterValue) -> bool {
        let threshold = match value {
            ParameterValue::Float(_) => self.threshold,
            ParameterValue::Int(_) => self.int_threshold as f32,
            ParameterValue::Bool(_) | ParameterValue::Trigger(_) => {
                if self.bool_threshold {
                    1.0
                } else {
                    0.0
                }
            }
        };
        let number = value.as_f32();

        match self.op {
            ConditionOp::IfTrue => value.as_bool(),
            ConditionOp::IfFalse => !value.as_bool(),
            ConditionOp::Greater => number > threshold,
            ConditionOp::Less => number < threshold,
            ConditionOp::GreaterEqual => number >= threshold,
            ConditionOp::LessEqual => number <= threshold,
            ConditionOp::Equal => self.equals(value),
            ConditionOp::NotEqual => !self.equals(value),
        }
    }

    fn equals(&self, value: ParameterValue) -> bool {
        match value {
            ParameterValue::Float(v) => (v - self.threshold).abs() <= FLOAT_EQUAL_EPSILON,
            ParameterValue::Int(v) => v == self.int_threshold,
            ParameterValue::Bool(flag) | ParameterValue::Trigger(flag) => {
                flag == self.bool_threshold
            }
        }
    }
}

/// A guarded, timed edge between two states
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimatorTransition {
    /// Source state, `None` matches any state
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub from: Option<usize>,
    pub to: usize,
    /// Seconds, or a fraction of the source clip when not `fixed_duration`
    #[cfg_attr(feature = "serde-support", serde(default = "default_duration"))]
    pub duration: f32,
    #[cfg_attr(feature = "serde-support", serde(default = "default_true"))]
    pub fixed_duration: bool,
    /// Minimum normalized source time before the transition may fire
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub exit_time: Option<f32>,
    /// Start the destination from 0 instead of the source's current time
    #[cfg_attr(feature = "serde-support", serde(default = "default_true"))]
    pub restart_destination: bool,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub conditions: Vec<AnimatorCondition>,
}

impl AnimatorTransition {
    pub fn new(from: Option<usize>, to: usize) -> Self {
        Self {
            from,
            to,
            duration: DEFAULT_TRANSITION_DURATION,
            fixed_duration: true,
            exit_time: None,
            restart_destination: true,
            conditions: Vec::new(),
        }
    }

    /// Transition from any state
    pub fn from_any(to: usize) -> Self {
        Self::new(None, to)
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    /// Interpret the duration as a fraction of the source clip's length
    pub fn with_relative_duration(mut self, fraction: f32) -> Self {
        self.duration = fraction;
        self.fixed_duration = false;
        self
    }

    pub fn with_exit_time(mut self, normalized: f32) -> Self {
        self.exit_time = Some(normalized);
        self
    }

    pub fn with_condition(mut self, condition: AnimatorCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn carrying_time(mut self) -> Self {
        self.restart_destination = false;
        self
    }

    /// Source match, exit-time gate and every condition
    pub fn is_eligible(
        &self,
        current_state: usize,
        normalized_time: f32,
        parameters: &Parameters,
    ) -> bool {
        if self.from.is_some_and(|from| from != current_state) {
            return false;
        }
        if self.exit_time.is_some_and(|exit| normalized_time < exit) {
            return false;
        }
        self.conditions.iter().all(|c| c.holds(parameters))
    }

    /// Length in seconds given the source clip's length
    pub fn resolved_duration(&self, source_seconds: f32) -> f32 {
        if !self.fixed_duration && source_seconds > 0.0 {
            self.duration * source_seconds
        } else {
            self.duration
        }
    }
}
