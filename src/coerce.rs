//! Policy-scoped coercion
//!
//! Coercion only runs when a value's raw shape does not already match the
//! expected primitive. A failed conversion is reported by the caller as a
//! `type` error.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::descriptor::Primitive;

/// How eagerly input values are converted before type checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    #[default]
    None,
    /// Numeric strings to numbers, canonical tokens to booleans
    Safe,
    /// `Safe`, plus scalar-to-array wrapping and stringification
    Aggressive,
}

impl CoercionPolicy {
    pub fn enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Convert `value` towards `target`. `None` means no conversion applies.
    pub fn coerce_primitive(&self, value: &Value, target: Primitive) -> Option<Value> {
        if !self.enabled() || target.accepts(value) {
            return None;
        }
        match target {
            Primitive::Integer => to_integer(value),
            Primitive::Number => to_number(value),
            Primitive::Boolean => to_boolean(value),
            Primitive::String if *self == Self::Aggressive => Some(stringify(value)),
            _ => None,
        }
    }

    /// Wrap a string, number or boolean in a one-element array (aggressive only).
    /// `null` and objects are never wrapped.
    pub fn wrap_scalar(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::Aggressive, Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
                Some(Value::Array(vec![value.clone()]))
            }
            _ => None,
        }
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            s.parse::<f64>().ok().and_then(integral)
        }
        Value::Number(n) => n.as_f64().and_then(integral),
        _ => None,
    }
}

fn integral(f: f64) -> Option<Value> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn stringify(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.clone()),
        Value::Null => Value::String(String::new()),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_none_never_coerces() {
        assert_eq!(
            CoercionPolicy::None.coerce_primitive(&json!("42"), Primitive::Integer),
            None
        );
    }

    #[test]
    fn test_safe_numeric_strings() {
        let p = CoercionPolicy::Safe;
        assert_eq!(p.coerce_primitive(&json!("42"), Primitive::Integer), Some(json!(42)));
        assert_eq!(p.coerce_primitive(&json!("4.0"), Primitive::Integer), Some(json!(4)));
        assert_eq!(p.coerce_primitive(&json!("4.5"), Primitive::Integer), None);
        assert_eq!(p.coerce_primitive(&json!("2.5"), Primitive::Number), Some(json!(2.5)));
        assert_eq!(p.coerce_primitive(&json!("abc"), Primitive::Number), None);
    }

    #[test]
    fn test_safe_booleans() {
        let p = CoercionPolicy::Safe;
        assert_eq!(p.coerce_primitive(&json!("TRUE"), Primitive::Boolean), Some(json!(true)));
        assert_eq!(p.coerce_primitive(&json!("off"), Primitive::Boolean), Some(json!(false)));
        assert_eq!(p.coerce_primitive(&json!("maybe"), Primitive::Boolean), None);
    }

    #[test]
    fn test_safe_leaves_numbers_for_booleans() {
        let p = CoercionPolicy::Safe;
        assert_eq!(p.coerce_primitive(&json!(1), Primitive::Boolean), None);
        assert_eq!(p.coerce_primitive(&json!(0), Primitive::Boolean), None);
    }

    #[test]
    fn test_safe_does_not_stringify() {
        assert_eq!(CoercionPolicy::Safe.coerce_primitive(&json!(5), Primitive::String), None);
        assert_eq!(CoercionPolicy::Safe.wrap_scalar(&json!(5)), None);
    }

    #[test]
    fn test_aggressive() {
        let p = CoercionPolicy::Aggressive;
        assert_eq!(p.coerce_primitive(&json!(5), Primitive::String), Some(json!("5")));
        assert_eq!(
            p.coerce_primitive(&json!({"a": 1}), Primitive::String),
            Some(json!("{\"a\":1}"))
        );
        assert_eq!(p.wrap_scalar(&json!("x")), Some(json!(["x"])));
        assert_eq!(p.wrap_scalar(&json!(["x"])), None);
    }

    #[test]
    fn test_aggressive_wraps_only_scalars() {
        let p = CoercionPolicy::Aggressive;
        assert_eq!(p.wrap_scalar(&json!(3)), Some(json!([3])));
        assert_eq!(p.wrap_scalar(&json!(false)), Some(json!([false])));
        assert_eq!(p.wrap_scalar(&json!({"a": 1})), None);
        assert_eq!(p.wrap_scalar(&Value::Null), None);
    }
}
