//! Constraint & coercion evaluator
//!
//! Evaluation of one descriptor against one value runs in three steps:
//! shape (coercion, type check, recursion into composites), builtin
//! constraints in attachment order, then custom validators in attachment
//! order. The first failing constraint or validator ends evaluation of that
//! value. Composite shapes may report several errors, one per failing child.
//!
//! Custom validator faults are not recovered here: they abort the whole
//! validation call as [`SchemaError::ValidatorFault`].

use serde_json::Value;
use tracing::trace;

use crate::coerce::CoercionPolicy;
use crate::descriptor::{
    Constraint, ConstraintKind, ObjectField, Primitive, TypeDescriptor, TypeKind,
};
use crate::error::{Result, SchemaError};
use crate::input::RawInput;
use crate::pipeline::Pipeline;
use crate::registry::SchemaRegistry;
use crate::report::{render_path, ErrorCode, PathSegment, ValidationError};
use crate::validators::Verdict;

/// Normalized value, or the errors that prevented it
pub type Evaluation = std::result::Result<Value, Vec<ValidationError>>;

/// JSON type name of a value, for messages
pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn child(path: &[PathSegment], segment: impl Into<PathSegment>) -> Vec<PathSegment> {
    let mut out = path.to_vec();
    out.push(segment.into());
    out
}

/// Evaluates descriptors against values
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    coercion: CoercionPolicy,
    registry: Option<&'a SchemaRegistry>,
}

impl<'a> Evaluator<'a> {
    pub fn new(coercion: CoercionPolicy) -> Self {
        Self {
            coercion,
            registry: None,
        }
    }

    /// Resolve `SchemaRef` descriptors through `registry`
    pub fn with_registry(mut self, registry: Option<&'a SchemaRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn coercion(&self) -> CoercionPolicy {
        self.coercion
    }

    /// Evaluate `value` against `descriptor`, reporting errors under `path`
    pub fn evaluate(
        &self,
        descriptor: &TypeDescriptor,
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluation> {
        let mut current = match self.shape(descriptor, value, path)? {
            Ok(v) => v,
            Err(errors) => return Ok(Err(errors)),
        };

        // Object output drops undeclared keys; whole-object bounds see the input.
        let raw_object = matches!(descriptor.kind(), TypeKind::Object(_));
        for constraint in descriptor.constraints() {
            let subject = if raw_object { value } else { &current };
            if let Some(default_message) = check_constraint(constraint, subject) {
                let message = match descriptor.custom_message(constraint.kind()) {
                    Some(custom) => custom.to_string(),
                    None => default_message,
                };
                return Ok(Err(vec![ValidationError::new(
                    path.to_vec(),
                    constraint.code(),
                    message,
                )]));
            }
        }

        for validator in descriptor.validators() {
            let verdict = validator
                .call(&current)
                .map_err(|source| SchemaError::ValidatorFault {
                    path: render_path(path),
                    source,
                })?;
            match verdict {
                Verdict::Pass => {}
                Verdict::Replace(v) => current = v,
                Verdict::Fail(reason) => {
                    return Ok(Err(vec![ValidationError::new(
                        path.to_vec(),
                        ErrorCode::CustomValidation,
                        reason,
                    )]));
                }
                Verdict::Reject(error) => return Ok(Err(vec![error.prefixed(path)])),
                Verdict::Other(returned) => {
                    return Ok(Err(vec![ValidationError::new(
                        path.to_vec(),
                        ErrorCode::CustomValidation,
                        format!(
                            "validator '{}' returned an invalid result: {}",
                            validator.name(),
                            returned
                        ),
                    )]));
                }
            }
        }

        Ok(Ok(current))
    }

    fn type_error(
        &self,
        descriptor: &TypeDescriptor,
        value: &Value,
        path: &[PathSegment],
    ) -> Evaluation {
        let message = match descriptor.custom_message(ConstraintKind::Type) {
            Some(custom) => custom.to_string(),
            None => format!("expected {}, got {}", descriptor.describe(), value_type(value)),
        };
        Err(vec![ValidationError::new(path.to_vec(), ErrorCode::Type, message)])
    }

    fn shape(
        &self,
        descriptor: &TypeDescriptor,
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluation> {
        match descriptor.kind() {
            TypeKind::Primitive(p) => Ok(self.shape_primitive(descriptor, *p, value, path)),
            TypeKind::Array(items) => self.shape_array(descriptor, items, value, path),
            TypeKind::Mapping { key, value: inner } => {
                self.shape_mapping(descriptor, key, inner, value, path)
            }
            TypeKind::Tuple(items) => self.shape_tuple(descriptor, items, value, path),
            TypeKind::Union(alternatives) => {
                self.shape_union(descriptor, alternatives, value, path)
            }
            TypeKind::Object(fields) => self.shape_object(descriptor, fields, value, path),
            TypeKind::SchemaRef(name) => self.shape_ref(descriptor, name, value, path),
        }
    }

    fn shape_primitive(
        &self,
        descriptor: &TypeDescriptor,
        primitive: Primitive,
        value: &Value,
        path: &[PathSegment],
    ) -> Evaluation {
        if primitive.accepts(value) {
            return Ok(value.clone());
        }
        match self.coercion.coerce_primitive(value, primitive) {
            Some(coerced) => {
                trace!(path = %render_path(path), from = %value, to = %coerced, "coerced value");
                Ok(coerced)
            }
            None => self.type_error(descriptor, value, path),
        }
    }

    fn shape_array(
        &self,
        descriptor: &TypeDescriptor,
        items: &TypeDescriptor,
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluation> {
        let wrapped;
        let elements = match value {
            Value::Array(elements) => elements,
            other => match self.coercion.wrap_scalar(other) {
                Some(Value::Array(w)) => {
                    wrapped = w;
                    &wrapped
                }
                _ => return Ok(self.type_error(descriptor, value, path)),
            },
        };

        let mut out = Vec::with_capacity(elements.len());
        let mut errors = Vec::new();
        for (i, element) in elements.iter().enumerate() {
            match self.evaluate(items, element, &child(path, i))? {
                Ok(v) => out.push(v),
                Err(mut element_errors) => {
                    errors.append(&mut element_errors);
                    if !descriptor.collects_all_items() {
                        break;
                    }
                }
            }
        }
        Ok(if errors.is_empty() {
            Ok(Value::Array(out))
        } else {
            Err(errors)
        })
    }

    fn shape_mapping(
        &self,
        descriptor: &TypeDescriptor,
        key_descriptor: &TypeDescriptor,
        value_descriptor: &TypeDescriptor,
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluation> {
        let Value::Object(map) = value else {
            return Ok(self.type_error(descriptor, value, path));
        };

        let mut out = serde_json::Map::new();
        let mut errors = Vec::new();
        for (k, v) in map {
            let entry_path = child(path, k.as_str());
            let key = match self.evaluate(key_descriptor, &Value::String(k.clone()), &entry_path)? {
                Ok(Value::String(s)) => Some(s),
                Ok(other) => Some(other.to_string()),
                Err(mut key_errors) => {
                    errors.append(&mut key_errors);
                    None
                }
            };
            match self.evaluate(value_descriptor, v, &entry_path)? {
                Ok(normalized) => {
                    if let Some(key) = key {
                        out.insert(key, normalized);
                    }
                }
                Err(mut value_errors) => errors.append(&mut value_errors),
            }
        }
        Ok(if errors.is_empty() {
            Ok(Value::Object(out))
        } else {
            Err(errors)
        })
    }

    fn shape_tuple(
        &self,
        descriptor: &TypeDescriptor,
        items: &[TypeDescriptor],
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluation> {
        let Value::Array(elements) = value else {
            return Ok(self.type_error(descriptor, value, path));
        };
        if elements.len() != items.len() {
            return Ok(Err(vec![ValidationError::new(
                path.to_vec(),
                ErrorCode::Type,
                format!(
                    "expected tuple of {} items, got {}",
                    items.len(),
                    elements.len()
                ),
            )]));
        }

        let mut out = Vec::with_capacity(elements.len());
        let mut errors = Vec::new();
        for (i, (item, element)) in items.iter().zip(elements).enumerate() {
            match self.evaluate(item, element, &child(path, i))? {
                Ok(v) => out.push(v),
                Err(mut item_errors) => errors.append(&mut item_errors),
            }
        }
        Ok(if errors.is_empty() {
            Ok(Value::Array(out))
        } else {
            Err(errors)
        })
    }

    fn shape_union(
        &self,
        descriptor: &TypeDescriptor,
        alternatives: &[TypeDescriptor],
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluation> {
        let mut last = None;
        for alternative in alternatives {
            match self.evaluate(alternative, value, path)? {
                Ok(v) => return Ok(Ok(v)),
                Err(errors) => last = Some(errors),
            }
        }
        Ok(match last {
            Some(errors) => Err(errors),
            None => self.type_error(descriptor, value, path),
        })
    }

    fn shape_object(
        &self,
        descriptor: &TypeDescriptor,
        fields: &[ObjectField],
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluation> {
        let Value::Object(map) = value else {
            return Ok(self.type_error(descriptor, value, path));
        };

        let mut out = serde_json::Map::new();
        let mut errors = Vec::new();
        for field in fields {
            let field_path = child(path, field.name.as_str());
            match map.get(&field.name) {
                Some(v) => match self.evaluate(&field.descriptor, v, &field_path)? {
                    Ok(normalized) => {
                        out.insert(field.name.clone(), normalized);
                    }
                    Err(mut field_errors) => errors.append(&mut field_errors),
                },
                None if field.required => errors.push(ValidationError::new(
                    field_path,
                    ErrorCode::Required,
                    "field required",
                )),
                None => {}
            }
        }
        Ok(if errors.is_empty() {
            Ok(Value::Object(out))
        } else {
            Err(errors)
        })
    }

    fn shape_ref(
        &self,
        descriptor: &TypeDescriptor,
        name: &str,
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluation> {
        let Some(registry) = self.registry else {
            return Err(SchemaError::UnknownSchema {
                name: name.to_string(),
                suggestion: None,
            });
        };
        let schema = registry.require(name)?;
        let Some(input) = RawInput::from_value(value) else {
            return Ok(self.type_error(descriptor, value, path));
        };

        let nested = Pipeline::new().with_registry(registry).validate(schema, &input)?;
        Ok(match nested {
            Ok(validated) => Ok(Value::Object(validated.record)),
            Err(errors) => Err(errors.into_iter().map(|e| e.prefixed(path)).collect()),
        })
    }
}

/// Measured length: characters, elements or entries
fn measure(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        Value::Object(o) => Some(o.len()),
        _ => None,
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

/// `None` when the constraint holds or does not apply to the value's type;
/// otherwise the default failure message.
fn check_constraint(constraint: &Constraint, value: &Value) -> Option<String> {
    match constraint {
        Constraint::MinLength(n) => measure(value)
            .filter(|len| len < n)
            .map(|_| format!("should have at least {} characters", n)),
        Constraint::MaxLength(n) => measure(value)
            .filter(|len| len > n)
            .map(|_| format!("should have at most {} characters", n)),
        Constraint::MinItems(n) => measure(value)
            .filter(|len| len < n)
            .map(|_| format!("should have at least {} items", n)),
        Constraint::MaxItems(n) => measure(value)
            .filter(|len| len > n)
            .map(|_| format!("should have at most {} items", n)),
        Constraint::Size(n) => measure(value)
            .filter(|len| len != n)
            .map(|len| format!("should have size {}, got {}", n, len)),
        Constraint::Gt(bound) => value
            .as_f64()
            .filter(|x| x <= bound)
            .map(|_| format!("should be greater than {}", bound)),
        Constraint::Lt(bound) => value
            .as_f64()
            .filter(|x| x >= bound)
            .map(|_| format!("should be less than {}", bound)),
        Constraint::Gteq(bound) => value
            .as_f64()
            .filter(|x| x < bound)
            .map(|_| format!("should be greater than or equal to {}", bound)),
        Constraint::Lteq(bound) => value
            .as_f64()
            .filter(|x| x > bound)
            .map(|_| format!("should be less than or equal to {}", bound)),
        Constraint::Choices(choices) => {
            if choices.iter().any(|c| same_value(c, value)) {
                None
            } else {
                let listed: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                Some(format!("should be one of: {}", listed.join(", ")))
            }
        }
        Constraint::Pattern(pattern) => value
            .as_str()
            .filter(|s| !pattern.is_match(s))
            .map(|_| format!("should match pattern '{}'", pattern.as_str())),
        Constraint::Format(format) => value
            .as_str()
            .filter(|s| !format.matches(s))
            .map(|_| format!("should be a valid {}", format.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::StringFormat;
    use crate::validators::FieldValidator;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn eval(d: &TypeDescriptor, v: Value) -> Evaluation {
        Evaluator::new(CoercionPolicy::None)
            .evaluate(d, &v, &[])
            .expect("no validator fault")
    }

    fn codes(result: &Evaluation) -> Vec<ErrorCode> {
        result
            .as_ref()
            .err()
            .map(|errs| errs.iter().map(|e| e.code).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_primitive_type_error() {
        let result = eval(&TypeDescriptor::integer(), json!("42"));
        assert_eq!(codes(&result), vec![ErrorCode::Type]);
        assert_eq!(result.unwrap_err()[0].message, "expected integer, got string");
    }

    #[test]
    fn test_coercion_then_constraints() {
        let d = TypeDescriptor::integer().gt(10.0);
        let safe = Evaluator::new(CoercionPolicy::Safe);
        assert_eq!(safe.evaluate(&d, &json!("42"), &[]).unwrap(), Ok(json!(42)));
        let low = safe.evaluate(&d, &json!("3"), &[]).unwrap();
        assert_eq!(codes(&low), vec![ErrorCode::Gt]);
        let bad = safe.evaluate(&d, &json!("x"), &[]).unwrap();
        assert_eq!(codes(&bad), vec![ErrorCode::Type]);
    }

    #[test]
    fn test_first_constraint_short_circuits() {
        let d = TypeDescriptor::string().min_length(5).pattern("^[0-9]+$").unwrap();
        let result = eval(&d, json!("ab"));
        assert_eq!(codes(&result), vec![ErrorCode::MinLength]);

        let reordered = TypeDescriptor::string().pattern("^[0-9]+$").unwrap().min_length(5);
        assert_eq!(codes(&eval(&reordered, json!("ab"))), vec![ErrorCode::Format]);
    }

    #[test]
    fn test_validators_skipped_after_constraint_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let d = TypeDescriptor::string()
            .min_length(3)
            .validator(FieldValidator::new("count", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Verdict::Pass)
            }));
        assert!(eval(&d, json!("a")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(eval(&d, json!("abc")).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validator_chain_transforms() {
        let d = TypeDescriptor::string()
            .validator(FieldValidator::new("trim", |v| {
                Ok(Verdict::Replace(json!(v.as_str().unwrap_or("").trim())))
            }))
            .validator(FieldValidator::new("upper", |v| {
                Ok(Verdict::Replace(json!(v.as_str().unwrap_or("").to_uppercase())))
            }));
        assert_eq!(eval(&d, json!("  abc ")), Ok(json!("ABC")));
    }

    #[test]
    fn test_validator_invalid_return() {
        let d = TypeDescriptor::string().validator(FieldValidator::new("odd", |_| {
            Ok(Verdict::Other(json!(7)))
        }));
        let errors = eval(&d, json!("x")).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::CustomValidation);
        assert!(errors[0].message.contains('7'));
    }

    #[test]
    fn test_validator_fault_propagates() {
        let d = TypeDescriptor::string().validator(FieldValidator::new("boom", |_| {
            Err(anyhow::anyhow!("boom"))
        }));
        let result =
            Evaluator::new(CoercionPolicy::None).evaluate(&d, &json!("x"), &["name".into()]);
        assert!(matches!(
            result,
            Err(SchemaError::ValidatorFault { ref path, .. }) if path == "name"
        ));
    }

    #[test]
    fn test_custom_message_override() {
        let d = TypeDescriptor::string()
            .format(StringFormat::Email)
            .message(ConstraintKind::Format, "not an email");
        assert_eq!(eval(&d, json!("nope")).unwrap_err()[0].message, "not an email");
    }

    #[test]
    fn test_array_collects_per_element() {
        let d = TypeDescriptor::array(TypeDescriptor::integer().gteq(0.0));
        let errors = eval(&d, json!([1, -1, "x", 3])).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path, vec![PathSegment::Index(1)]);
        assert_eq!(errors[0].code, ErrorCode::Gteq);
        assert_eq!(errors[1].path, vec![PathSegment::Index(2)]);
        assert_eq!(errors[1].code, ErrorCode::Type);

        let first_only = d.clone().all_items(false);
        assert_eq!(eval(&first_only, json!([1, -1, "x"])).unwrap_err().len(), 1);
    }

    #[test]
    fn test_aggressive_wraps_scalar() {
        let d = TypeDescriptor::array(TypeDescriptor::string());
        let aggressive = Evaluator::new(CoercionPolicy::Aggressive);
        assert_eq!(aggressive.evaluate(&d, &json!(5), &[]).unwrap(), Ok(json!(["5"])));
    }

    #[test]
    fn test_aggressive_leaves_objects_and_null_unwrapped() {
        let d = TypeDescriptor::array(TypeDescriptor::any());
        let aggressive = Evaluator::new(CoercionPolicy::Aggressive);
        let object = aggressive.evaluate(&d, &json!({"a": 1}), &[]).unwrap();
        assert_eq!(codes(&object), vec![ErrorCode::Type]);
        let null = aggressive.evaluate(&d, &Value::Null, &[]).unwrap();
        assert_eq!(codes(&null), vec![ErrorCode::Type]);
    }

    #[test]
    fn test_safe_rejects_numeric_booleans() {
        let safe = Evaluator::new(CoercionPolicy::Safe);
        let result = safe.evaluate(&TypeDescriptor::boolean(), &json!(1), &[]).unwrap();
        assert_eq!(codes(&result), vec![ErrorCode::Type]);
        assert_eq!(
            safe.evaluate(&TypeDescriptor::boolean(), &json!("yes"), &[]).unwrap(),
            Ok(json!(true))
        );
    }

    #[test]
    fn test_type_message_override() {
        let d = TypeDescriptor::integer()
            .message(ConstraintKind::Type, "age must be a whole number");
        let errors = eval(&d, json!("old")).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::Type);
        assert_eq!(errors[0].message, "age must be a whole number");
    }

    #[test]
    fn test_validator_reject_keeps_error_under_path() {
        let d = TypeDescriptor::any().validator(FieldValidator::new("window", |_| {
            Ok(Verdict::Reject(ValidationError::new(
                vec!["end".into()],
                ErrorCode::CustomValidation,
                "end must follow start",
            )))
        }));
        let errors = Evaluator::new(CoercionPolicy::None)
            .evaluate(&d, &json!({"start": 2, "end": 1}), &["range".into()])
            .unwrap()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path_string(), "range.end");
        assert_eq!(errors[0].code, ErrorCode::CustomValidation);
        assert_eq!(errors[0].message, "end must follow start");
    }

    #[test]
    fn test_mapping() {
        let d = TypeDescriptor::mapping(
            TypeDescriptor::string().min_length(2),
            TypeDescriptor::integer(),
        );
        assert!(eval(&d, json!({"ab": 1, "cd": 2})).is_ok());
        let errors = eval(&d, json!({"a": 1, "cd": "x"})).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].code, ErrorCode::MinLength);
        assert_eq!(errors[0].path, vec![PathSegment::from("a")]);
        assert_eq!(errors[1].path, vec![PathSegment::from("cd")]);
    }

    #[test]
    fn test_tuple_arity_first() {
        let d = TypeDescriptor::tuple(vec![TypeDescriptor::string(), TypeDescriptor::integer()]);
        assert_eq!(eval(&d, json!(["a", 1])), Ok(json!(["a", 1])));
        let errors = eval(&d, json!([1])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected tuple of 2 items, got 1");
        let positional = eval(&d, json!([1, "a"])).unwrap_err();
        assert_eq!(positional.len(), 2);
    }

    #[test]
    fn test_union_first_match_and_last_error() {
        let d = TypeDescriptor::union(vec![
            TypeDescriptor::integer(),
            TypeDescriptor::string().min_length(3),
        ]);
        assert_eq!(eval(&d, json!(5)), Ok(json!(5)));
        assert_eq!(eval(&d, json!("abc")), Ok(json!("abc")));
        assert_eq!(codes(&eval(&d, json!("a"))), vec![ErrorCode::MinLength]);
    }

    #[test]
    fn test_object_is_lenient() {
        let d = TypeDescriptor::object(vec![
            ObjectField::required("x", TypeDescriptor::integer()),
            ObjectField::optional("y", TypeDescriptor::integer()),
        ]);
        assert_eq!(eval(&d, json!({"x": 1, "z": "ignored"})), Ok(json!({"x": 1})));
        let errors = eval(&d, json!({"y": 2})).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::Required);
        assert_eq!(errors[0].path, vec![PathSegment::from("x")]);
    }

    #[test]
    fn test_object_size_constraint() {
        let d = TypeDescriptor::object(vec![ObjectField::optional("x", TypeDescriptor::integer())])
            .size(1);
        assert_eq!(codes(&eval(&d, json!({"x": 1, "z": 2}))), vec![ErrorCode::Size]);
    }

    #[test]
    fn test_choices_numeric_equality() {
        let d = TypeDescriptor::number().choices([1, 2]);
        assert!(eval(&d, json!(2.0)).is_ok());
        assert_eq!(codes(&eval(&d, json!(3))), vec![ErrorCode::Choices]);
    }

    #[test]
    fn test_schema_ref_without_registry_is_fault() {
        let d = TypeDescriptor::schema_ref("Address");
        let result = Evaluator::new(CoercionPolicy::None).evaluate(&d, &json!({}), &[]);
        assert!(matches!(result, Err(SchemaError::UnknownSchema { .. })));
    }

    #[test]
    fn test_evaluation_is_pure() {
        let d = TypeDescriptor::array(TypeDescriptor::string().max_length(2));
        let v = json!(["a", "abc", "b"]);
        assert_eq!(eval(&d, v.clone()), eval(&d, v));
    }
}
