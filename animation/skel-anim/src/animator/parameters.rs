//! Named animator parameters
//!
//! Gameplay code drives the state machine only through these values.

/// Parameter type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterType {
    Float,
    Int,
    Bool,
    /// Boolean cleared at the end of every animator update
    Trigger,
}

/// Typed parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(tag = "type", content = "value"))]
pub enum ParameterValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Trigger(bool),
}

impl ParameterValue {
    /// Zero value for a type
    pub fn default_for(kind: ParameterType) -> Self {
        match kind {
            ParameterType::Float => Self::Float(0.0),
            ParameterType::Int => Self::Int(0),
            ParameterType::Bool => Self::Bool(false),
            ParameterType::Trigger => Self::Trigger(false),
        }
    }

    pub fn kind(&self) -> ParameterType {
        match self {
            Self::Float(_) => ParameterType::Float,
            Self::Int(_) => ParameterType::Int,
            Self::Bool(_) => ParameterType::Bool,
            Self::Trigger(_) => ParameterType::Trigger,
        }
    }

    /// Numeric view: floats as-is, ints converted, flags as 0 or 1
    pub fn as_f32(&self) -> f32 {
        match *self {
            Self::Float(value) => value,
            Self::Int(value) => value as f32,
            Self::Bool(flag) | Self::Trigger(flag) => {
                if flag {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Flag view: bool and trigger flags, non-zero numbers
    pub fn as_bool(&self) -> bool {
        match *self {
            Self::Bool(flag) | Self::Trigger(flag) => flag,
            Self::Int(value) => value != 0,
            Self::Float(value) => value != 0.0,
        }
    }
}

/// A named parameter
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimatorParameter {
    pub name: String,
    pub value: ParameterValue,
}

impl AnimatorParameter {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, ParameterValue::Float(value))
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, ParameterValue::Int(value))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, ParameterValue::Bool(value))
    }

    pub fn trigger(name: impl Into<String>) -> Self {
        Self::new(name, ParameterValue::Trigger(false))
    }

    pub fn kind(&self) -> ParameterType {
        self.value.kind()
    }
}

/// Ordered parameter table with name lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<AnimatorParameter>,
}

impl Parameters {
    pub fn new(entries: Vec<AnimatorParameter>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnimatorParameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AnimatorParameter> {
        self.entries.iter().find(|p| p.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut AnimatorParameter> {
        self.entries.iter_mut().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<ParameterValue> {
        self.get(name).map(|p| p.value)
    }

    /// Numeric value of a parameter, 0 when missing
    pub fn float_or_zero(&self, name: &str) -> f32 {
        self.value(name).map_or(0.0, |value| value.as_f32())
    }

    /// Overwrite a parameter of the same type
    ///
    /// Returns `false` when the parameter does not exist or has another
    /// type.
    pub fn set(&mut self, name: &str, value: ParameterValue) -> bool {
        match self.get_mut(name) {
            Some(param) if param.kind() == value.kind() => {
                param.value = value;
                true
            }
            Some(param) => {
                log::debug!(
                    "Parameter '{}' is {:?}, refusing {:?} value",
                    name,
                    param.kind(),
                    value.kind()
                );
                false
            }
            None => false,
        }
    }

    /// Clear every trigger
    pub fn reset_triggers(&mut self) {
        for param in &mut self.entries {
            if let ParameterValue::Trigger(flag) = &mut param.value {
                *flag = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        Parameters::new(vec![
            AnimatorParameter::float("Speed", 0.0),
            AnimatorParameter::int("Combo", 0),
            AnimatorParameter::bool("Grounded", true),
            AnimatorParameter::trigger("Jump"),
        ])
    }

    #[test]
    fn test_set_matching_type() {
        let mut params = params();
        assert!(params.set("Speed", ParameterValue::Float(2.5)));
        assert_eq!(params.value("Speed"), Some(ParameterValue::Float(2.5)));
        assert!(params.set("Jump", ParameterValue::Trigger(true)));
    }

    #[test]
    fn test_set_rejects_missing_and_mismatched() {
        let mut params = params();
        assert!(!params.set("Missing", ParameterValue::Float(1.0)));
        assert!(!params.set("Combo", ParameterValue::Float(1.0)));
        assert_eq!(params.value("Combo"), Some(ParameterValue::Int(0)));
    }

    #[test]
    fn test_reset_triggers_only() {
        let mut params = params();
        params.set("Jump", ParameterValue::Trigger(true));
        params.reset_triggers();
        assert_eq!(params.value("Jump"), Some(ParameterValue::Trigger(false)));
        assert_eq!(params.value("Grounded"), Some(ParameterValue::Bool(true)));
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(ParameterValue::Int(3).as_f32(), 3.0);
        assert_eq!(ParameterValue::Bool(true).as_f32(), 1.0);
        assert_eq!(ParameterValue::Trigger(false).as_f32(), 0.0);
        assert!(ParameterValue::Int(2).as_bool());
        assert_eq!(params().float_or_zero("Nope"), 0.0);
    }
}
