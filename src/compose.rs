//! Dynamic schema composition
//!
//! [`compose`] builds a [`SchemaDefinition`] from field specs plus ordered
//! model validators and computed fields. [`SchemaBuilder`] is the fluent
//! front end over the same function, and the schema-file loader goes through
//! it too, so every definition the engine sees has the same shape.

use serde_json::Value;
use std::collections::HashSet;

use crate::coerce::CoercionPolicy;
use crate::descriptor::TypeDescriptor;
use crate::error::{Result, SchemaError};
use crate::schema::{
    ComputedFieldDefinition, ExtraPolicy, FieldDefinition, ModelConfig, SchemaDefinition,
};
use crate::validators::{ComputedFn, ModelValidator};

/// Input to composition for one declared field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub example: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: true,
            default: None,
            description: None,
            example: None,
        }
    }

    pub fn optional(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            required: false,
            ..Self::required(name, descriptor)
        }
    }

    /// Set a default; this makes the field optional
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// Everything besides the field list
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub config: ModelConfig,
    pub title: Option<String>,
    pub description: Option<String>,
    pub model_validators: Vec<ModelValidator>,
    pub computed_fields: Vec<ComputedFieldDefinition>,
}

impl ComposeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn model_validator(mut self, validator: ModelValidator) -> Self {
        self.model_validators.push(validator);
        self
    }

    /// Attach a `(name, descriptor, function)` computed field
    pub fn computed<F>(
        mut self,
        name: impl Into<String>,
        descriptor: TypeDescriptor,
        func: F,
    ) -> Self
    where
        F: Fn(&crate::input::Record) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.computed_fields
            .push(ComputedFieldDefinition::new(name, descriptor, ComputedFn::new(func)));
        self
    }

    pub fn computed_field(mut self, field: ComputedFieldDefinition) -> Self {
        self.computed_fields.push(field);
        self
    }
}

/// Build a schema definition from field specs and options
pub fn compose(
    name: impl Into<String>,
    fields: Vec<FieldSpec>,
    options: ComposeOptions,
) -> Result<SchemaDefinition> {
    let name = name.into();
    let invalid = |reason: String| SchemaError::InvalidDefinition {
        schema: name.clone(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("schema name must not be empty".to_string()));
    }

    let mut config = options.config;
    config.check()?;
    if options.title.is_some() {
        config.title = options.title;
    }
    if options.description.is_some() {
        config.description = options.description;
    }

    let mut seen = HashSet::new();
    let mut definitions = Vec::with_capacity(fields.len());
    for spec in fields {
        if spec.name.is_empty() {
            return Err(invalid("field name must not be empty".to_string()));
        }
        if !seen.insert(spec.name.clone()) {
            return Err(SchemaError::DuplicateField {
                schema: name.clone(),
                field: spec.name,
            });
        }
        if spec.required && spec.default.is_some() {
            return Err(invalid(format!(
                "required field '{}' cannot have a default",
                spec.name
            )));
        }
        definitions.push(FieldDefinition {
            name: spec.name,
            descriptor: spec.descriptor,
            required: spec.required,
            default: spec.default,
            description: spec.description,
            example: spec.example,
        });
    }

    for computed in &options.computed_fields {
        if !seen.insert(computed.name.clone()) {
            return Err(SchemaError::DuplicateField {
                schema: name.clone(),
                field: computed.name.clone(),
            });
        }
    }

    Ok(SchemaDefinition::from_parts(
        name,
        definitions,
        options.model_validators,
        options.computed_fields,
        config,
    ))
}

/// Fluent schema authoring
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldSpec>,
    options: ComposeOptions,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            options: ComposeOptions::default(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn required(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.field(FieldSpec::required(name, descriptor))
    }

    pub fn optional(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.field(FieldSpec::optional(name, descriptor))
    }

    pub fn optional_with_default(
        self,
        name: impl Into<String>,
        descriptor: TypeDescriptor,
        default: impl Into<Value>,
    ) -> Self {
        self.field(FieldSpec::optional(name, descriptor).with_default(default))
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.options.config = config;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.config.strict = strict;
        self
    }

    pub fn extra(mut self, extra: ExtraPolicy) -> Self {
        self.options.config.extra = extra;
        self
    }

    pub fn coercion(mut self, coercion: CoercionPolicy) -> Self {
        self.options.config.coercion = coercion;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.options.config.case_sensitive = case_sensitive;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.options = self.options.title(title);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.options = self.options.description(description);
        self
    }

    pub fn model_validator(mut self, validator: ModelValidator) -> Self {
        self.options = self.options.model_validator(validator);
        self
    }

    pub fn computed<F>(
        mut self,
        name: impl Into<String>,
        descriptor: TypeDescriptor,
        func: F,
    ) -> Self
    where
        F: Fn(&crate::input::Record) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.options = self.options.computed(name, descriptor, func);
        self
    }

    pub fn computed_field(mut self, field: ComputedFieldDefinition) -> Self {
        self.options = self.options.computed_field(field);
        self
    }

    pub fn build(self) -> Result<SchemaDefinition> {
        compose(self.name, self.fields, self.options)
    }
}
