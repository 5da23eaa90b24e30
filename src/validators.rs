//! User-supplied functions attached to schemas
//!
//! Field validators, model validators and computed-field functions are stored
//! as reference-counted closures so definitions stay cheap to clone and can be
//! shared across threads. Returning `Err` from one of these closures is the
//! equivalent of raising: the pipeline decides per stage whether that is
//! recovered or propagated.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::input::Record;
use crate::report::ValidationError;

/// What a validator function returned
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Accept the current value unchanged
    Pass,
    /// Accept, replacing the value (or record) with this one
    Replace(Value),
    /// Reject with a reason
    Fail(String),
    /// Reject with a pre-built error
    Reject(ValidationError),
    /// Anything that is not a recognized verdict shape
    Other(Value),
}

impl Verdict {
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }

    /// Interpret a loosely typed return value.
    ///
    /// `true` and `null` pass, `{"ok": true, "value": v}` replaces,
    /// `{"ok": false, "error": "..."}` fails. Everything else is `Other`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Bool(true) | Value::Null => Self::Pass,
            Value::Object(mut map) => match map.get("ok") {
                Some(Value::Bool(true)) => match map.remove("value") {
                    Some(v) => Self::Replace(v),
                    None => Self::Pass,
                },
                Some(Value::Bool(false)) => match map.get("error").and_then(Value::as_str) {
                    Some(reason) => Self::Fail(reason.to_string()),
                    None => Self::Other(Value::Object(map)),
                },
                _ => Self::Other(Value::Object(map)),
            },
            other => Self::Other(other),
        }
    }
}

impl From<bool> for Verdict {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Pass
        } else {
            Self::Other(Value::Bool(false))
        }
    }
}

type FieldFn = dyn Fn(&Value) -> anyhow::Result<Verdict> + Send + Sync;
type RecordFn = dyn Fn(&Record) -> anyhow::Result<Verdict> + Send + Sync;
type DeriveFn = dyn Fn(&Record) -> anyhow::Result<Value> + Send + Sync;

/// Custom validator attached to a type descriptor
#[derive(Clone)]
pub struct FieldValidator {
    name: String,
    func: Arc<FieldFn>,
}

impl FieldValidator {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Verdict> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Predicate validator failing with a fixed message
    pub fn check<F>(name: impl Into<String>, message: impl Into<String>, pred: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        Self::new(name, move |v| {
            Ok(if pred(v) {
                Verdict::Pass
            } else {
                Verdict::Fail(message.clone())
            })
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, value: &Value) -> anyhow::Result<Verdict> {
        (self.func)(value)
    }
}

impl fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldValidator").field("name", &self.name).finish()
    }
}

/// Whole-record validator run after the field stage
#[derive(Clone)]
pub struct ModelValidator {
    name: String,
    func: Arc<RecordFn>,
}

impl ModelValidator {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<Verdict> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, record: &Record) -> anyhow::Result<Verdict> {
        (self.func)(record)
    }
}

impl fmt::Debug for ModelValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelValidator").field("name", &self.name).finish()
    }
}

/// Function deriving a computed field from the validated record
#[derive(Clone)]
pub struct ComputedFn(Arc<DeriveFn>);

impl ComputedFn {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(func))
    }

    pub fn call(&self, record: &Record) -> anyhow::Result<Value> {
        (self.0)(record)
    }
}

impl fmt::Debug for ComputedFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComputedFn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_from_value() {
        assert_eq!(Verdict::from_value(json!(true)), Verdict::Pass);
        assert_eq!(Verdict::from_value(Value::Null), Verdict::Pass);
        assert_eq!(
            Verdict::from_value(json!({"ok": true, "value": 3})),
            Verdict::Replace(json!(3))
        );
        assert_eq!(
            Verdict::from_value(json!({"ok": false, "error": "nope"})),
            Verdict::Fail("nope".to_string())
        );
        assert_eq!(Verdict::from_value(json!(42)), Verdict::Other(json!(42)));
    }

    #[test]
    fn test_check_validator() {
        let v = FieldValidator::check("even", "must be even", |v| {
            v.as_i64().map(|n| n % 2 == 0).unwrap_or(false)
        });
        assert_eq!(v.call(&json!(4)).unwrap(), Verdict::Pass);
        assert_eq!(v.call(&json!(3)).unwrap(), Verdict::fail("must be even"));
    }
}
