//! Validation pipeline
//!
//! Stages run in a fixed order and the error list of a failed call always
//! comes from exactly one of them:
//!
//! 1. field stage: every declared field is attempted, errors accumulate
//! 2. strict check: unmatched input keys (only when stage 1 was clean)
//! 3. model validators: sequential, first failure stops the stage
//! 4. computed fields: all attempted, errors accumulate
//!
//! Model validator faults and panics are recovered into `model_validation`
//! errors. Field-level validator faults are not: they surface as the outer
//! `Err` of [`Pipeline::validate`].

use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::evaluate::{value_type, Evaluator};
use crate::input::{KeyMatcher, RawInput, Record};
use crate::registry::SchemaRegistry;
use crate::report::{
    ErrorCode, PathSegment, Validated, ValidationError, ValidationErrors, ValidationResult,
};
use crate::schema::{ExtraPolicy, SchemaDefinition};
use crate::validators::{ModelValidator, Verdict};

/// Drives the validation stages over a schema
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline<'r> {
    registry: Option<&'r SchemaRegistry>,
}

struct FieldStage {
    record: Record,
    extras: Record,
}

impl<'r> Pipeline<'r> {
    pub fn new() -> Self {
        Self { registry: None }
    }

    /// Resolve nested schema references through `registry`
    pub fn with_registry(mut self, registry: &'r SchemaRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate a JSON value; anything but an object is a root `type` error
    pub fn validate_value(
        &self,
        schema: &SchemaDefinition,
        value: &Value,
    ) -> Result<ValidationResult> {
        match RawInput::from_value(value) {
            Some(input) => self.validate(schema, &input),
            None => Ok(Err(ValidationErrors::single(ValidationError::root(
                ErrorCode::Type,
                format!("expected object, got {}", value_type(value)),
            )))),
        }
    }

    /// Validate one input record against `schema`
    pub fn validate(
        &self,
        schema: &SchemaDefinition,
        input: &RawInput,
    ) -> Result<ValidationResult> {
        let config = schema.config();
        let matcher = KeyMatcher::new(config.case_sensitive);
        let evaluator = Evaluator::new(config.coercion).with_registry(self.registry);

        debug!(schema = schema.name(), keys = input.len(), "field stage");
        let stage = match self.field_stage(schema, input, &matcher, &evaluator)? {
            Ok(stage) => stage,
            Err(errors) => {
                debug!(schema = schema.name(), errors = errors.len(), "field stage failed");
                return Ok(Err(errors));
            }
        };

        let record = match run_model_validators(schema, stage.record) {
            Ok(record) => record,
            Err(error) => {
                debug!(schema = schema.name(), code = %error.code, "model validation failed");
                return Ok(Err(ValidationErrors::single(error)));
            }
        };

        let record = match self.computed_stage(schema, record, &evaluator)? {
            Ok(record) => record,
            Err(errors) => {
                debug!(schema = schema.name(), errors = errors.len(), "computed fields failed");
                return Ok(Err(errors));
            }
        };

        debug!(schema = schema.name(), fields = record.len(), "validated");
        Ok(Ok(Validated {
            record,
            extras: stage.extras,
        }))
    }

    fn field_stage(
        &self,
        schema: &SchemaDefinition,
        input: &RawInput,
        matcher: &KeyMatcher,
        evaluator: &Evaluator<'_>,
    ) -> Result<std::result::Result<FieldStage, ValidationErrors>> {
        let mut record = Record::new();
        let mut errors = Vec::new();

        for field in schema.fields() {
            let path = vec![PathSegment::Field(field.name.clone())];
            match matcher.lookup(input, &field.name) {
                Some((_, value)) => {
                    trace!(field = %field.name, "validating field");
                    match evaluator.evaluate(&field.descriptor, value, &path)? {
                        Ok(normalized) => {
                            record.insert(field.name.clone(), normalized);
                        }
                        Err(mut field_errors) => errors.append(&mut field_errors),
                    }
                }
                None if field.is_required() => {
                    errors.push(ValidationError::new(path, ErrorCode::Required, "field required"));
                }
                None => {
                    if let Some(default) = &field.default {
                        trace!(field = %field.name, "using default");
                        record.insert(field.name.clone(), default.clone());
                    }
                }
            }
        }

        if let Some(errors) = ValidationErrors::from_vec(errors) {
            return Ok(Err(errors));
        }

        let config = schema.config();
        let declared = schema.fields().iter().map(|f| f.name.as_str());
        let unmatched = matcher.unmatched(input, declared);

        let mut extras = Record::new();
        if !unmatched.is_empty() {
            if config.is_strict() {
                let names: Vec<&str> = unmatched.iter().map(|k| k.as_text()).collect();
                return Ok(Err(ValidationErrors::single(ValidationError::root(
                    ErrorCode::AdditionalProperties,
                    format!("unexpected fields: {}", names.join(", ")),
                ))));
            }
            if config.extra == ExtraPolicy::Allow {
                for (key, value) in input.entries() {
                    if unmatched.contains(&key) {
                        extras.insert(key.as_text().to_string(), value.clone());
                    }
                }
            }
        }

        Ok(Ok(FieldStage { record, extras }))
    }

    fn computed_stage(
        &self,
        schema: &SchemaDefinition,
        record: Record,
        evaluator: &Evaluator<'_>,
    ) -> Result<std::result::Result<Record, ValidationErrors>> {
        let mut computed = Vec::with_capacity(schema.computed_fields().len());
        let mut errors = Vec::new();

        for field in schema.computed_fields() {
            let path = vec![PathSegment::Field(field.name.clone())];
            let value = match field.function.call(&record) {
                Ok(value) => value,
                Err(e) => {
                    errors.push(ValidationError::new(
                        path,
                        ErrorCode::ComputedField,
                        format!("computed field '{}' failed: {}", field.name, e),
                    ));
                    continue;
                }
            };
            match evaluator.evaluate(&field.descriptor, &value, &path)? {
                Ok(normalized) => computed.push((field.name.clone(), normalized)),
                Err(type_errors) => errors.push(ValidationError::new(
                    path,
                    ErrorCode::ComputedFieldType,
                    format!(
                        "computed field '{}' returned {}, expected {}: {}",
                        field.name,
                        value_type(&value),
                        field.descriptor.describe(),
                        type_errors[0].message
                    ),
                )),
            }
        }

        if let Some(errors) = ValidationErrors::from_vec(errors) {
            return Ok(Err(errors));
        }

        let mut record = record;
        for (name, value) in computed {
            if !record.contains_key(&name) {
                record.insert(name, value);
            }
        }
        Ok(Ok(record))
    }
}

/// Run model validators in order; the first failure is the only error.
fn run_model_validators(
    schema: &SchemaDefinition,
    record: Record,
) -> std::result::Result<Record, ValidationError> {
    let mut record = record;
    for validator in schema.model_validators() {
        trace!(schema = schema.name(), validator = validator.name(), "model validator");
        record = apply_model_validator(validator, record)?;
    }
    Ok(record)
}

fn apply_model_validator(
    validator: &ModelValidator,
    record: Record,
) -> std::result::Result<Record, ValidationError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| validator.call(&record)));
    let verdict = match outcome {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(fault)) => {
            warn!(validator = validator.name(), error = %fault, "model validator raised");
            return Err(ValidationError::root(
                ErrorCode::ModelValidation,
                format!("model validator '{}' raised: {}", validator.name(), fault),
            ));
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(validator = validator.name(), %reason, "model validator panicked");
            return Err(ValidationError::root(
                ErrorCode::ModelValidation,
                format!("model validator '{}' panicked: {}", validator.name(), reason),
            ));
        }
    };

    match verdict {
        Verdict::Pass => Ok(record),
        Verdict::Replace(Value::Object(replacement)) => Ok(replacement),
        Verdict::Replace(other) => Err(ValidationError::root(
            ErrorCode::ModelValidation,
            format!(
                "model validator '{}' must return a record, got {}",
                validator.name(),
                value_type(&other)
            ),
        )),
        Verdict::Fail(reason) => Err(ValidationError::root(ErrorCode::ModelValidation, reason)),
        Verdict::Reject(error) => Err(ValidationError {
            code: ErrorCode::ModelValidation,
            ..error
        }),
        Verdict::Other(returned) => Err(ValidationError::root(
            ErrorCode::ModelValidation,
            format!(
                "model validator '{}' returned an invalid result: {}",
                validator.name(),
                returned
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SchemaBuilder;
    use crate::descriptor::TypeDescriptor;
    use serde_json::json;

    fn person() -> SchemaDefinition {
        SchemaBuilder::new("Person")
            .required("name", TypeDescriptor::string().min_length(2))
            .optional("age", TypeDescriptor::integer().gteq(0.0))
            .optional_with_default("active", TypeDescriptor::boolean(), json!(true))
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults_and_unset_optionals() {
        let result = Pipeline::new()
            .validate(&person(), &RawInput::new().text("name", "Al"))
            .unwrap()
            .unwrap();
        assert_eq!(result.get("name"), Some(&json!("Al")));
        assert_eq!(result.get("active"), Some(&json!(true)));
        assert!(result.get("age").is_none());
    }

    #[test]
    fn test_all_fields_attempted() {
        let errors = Pipeline::new()
            .validate(&person(), &RawInput::new().text("age", -1).text("active", "yes"))
            .unwrap()
            .unwrap_err();
        assert_eq!(
            errors.codes(),
            vec![ErrorCode::Required, ErrorCode::Gteq, ErrorCode::Type]
        );
    }

    #[test]
    fn test_non_object_input() {
        let errors = Pipeline::new()
            .validate_value(&person(), &json!([1]))
            .unwrap()
            .unwrap_err();
        assert_eq!(errors.first().code, ErrorCode::Type);
        assert!(errors.first().path.is_empty());
    }

    #[test]
    fn test_extra_allow_keeps_extras_aside() {
        let schema = SchemaBuilder::new("Loose")
            .required("a", TypeDescriptor::integer())
            .extra(ExtraPolicy::Allow)
            .build()
            .unwrap();
        let validated = Pipeline::new()
            .validate(&schema, &RawInput::new().text("a", 1).text("b", 2))
            .unwrap()
            .unwrap();
        assert!(validated.record.get("b").is_none());
        assert_eq!(validated.extras.get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_extra_forbid_is_strict() {
        let schema = SchemaBuilder::new("Closed")
            .required("a", TypeDescriptor::integer())
            .extra(ExtraPolicy::Forbid)
            .build()
            .unwrap();
        let errors = Pipeline::new()
            .validate(&schema, &RawInput::new().text("a", 1).text("b", 2))
            .unwrap()
            .unwrap_err();
        assert_eq!(errors.codes(), vec![ErrorCode::AdditionalProperties]);
    }

    #[test]
    fn test_model_validator_panic_is_recovered() {
        let schema = SchemaBuilder::new("Panicky")
            .required("a", TypeDescriptor::integer())
            .model_validator(ModelValidator::new("explode", |_| panic!("kaboom")))
            .build()
            .unwrap();
        let errors = Pipeline::new()
            .validate(&schema, &RawInput::new().text("a", 1))
            .unwrap()
            .unwrap_err();
        assert_eq!(errors.codes(), vec![ErrorCode::ModelValidation]);
        assert!(errors.first().message.contains("kaboom"));
    }

    #[test]
    fn test_model_validator_replacement_must_be_record() {
        let schema = SchemaBuilder::new("Shape")
            .required("a", TypeDescriptor::integer())
            .model_validator(ModelValidator::new("scalar", |_| Ok(Verdict::Replace(json!(1)))))
            .build()
            .unwrap();
        let errors = Pipeline::new()
            .validate(&schema, &RawInput::new().text("a", 1))
            .unwrap()
            .unwrap_err();
        assert_eq!(errors.codes(), vec![ErrorCode::ModelValidation]);
        assert!(errors.first().message.contains("must return a record"));
    }

    #[test]
    fn test_reject_keeps_validator_path() {
        let schema = SchemaBuilder::new("Range")
            .required("start", TypeDescriptor::integer())
            .required("end", TypeDescriptor::integer())
            .model_validator(ModelValidator::new("ordered", |r| {
                if r["start"].as_i64() <= r["end"].as_i64() {
                    Ok(Verdict::Pass)
                } else {
                    Ok(Verdict::Reject(ValidationError::new(
                        vec!["end".into()],
                        ErrorCode::CustomValidation,
                        "end before start",
                    )))
                }
            }))
            .build()
            .unwrap();
        let errors = Pipeline::new()
            .validate(&schema, &RawInput::new().text("start", 5).text("end", 1))
            .unwrap()
            .unwrap_err();
        assert_eq!(errors.first().code, ErrorCode::ModelValidation);
        assert_eq!(errors.first().path_string(), "end");
    }
}
