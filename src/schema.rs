//! Schema definitions
//!
//! A [`SchemaDefinition`] is created once, by [`crate::compose::compose`] or
//! [`crate::compose::SchemaBuilder`], and is read-only afterwards. The
//! pipeline and the resolver both consume it; neither knows how it was built.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::CoercionPolicy;
use crate::descriptor::TypeDescriptor;
use crate::error::{Result, SchemaError};
use crate::report::ErrorFormat;
use crate::validators::{ComputedFn, ModelValidator};

/// What happens to input keys that match no declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraPolicy {
    /// Keep them aside in [`crate::report::Validated::extras`]
    Allow,
    /// Reject them (same as strict mode)
    Forbid,
    /// Drop them silently
    #[default]
    Ignore,
}

/// Per-schema behaviour switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub extra: ExtraPolicy,

    #[serde(default)]
    pub coercion: CoercionPolicy,

    #[serde(default = "default_true")]
    pub case_sensitive: bool,

    #[serde(default)]
    pub error_format: ErrorFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            strict: false,
            extra: ExtraPolicy::Ignore,
            coercion: CoercionPolicy::None,
            case_sensitive: true,
            error_format: ErrorFormat::Detailed,
            title: None,
            description: None,
        }
    }
}

impl ModelConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_extra(mut self, extra: ExtraPolicy) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_coercion(mut self, coercion: CoercionPolicy) -> Self {
        self.coercion = coercion;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_error_format(mut self, format: ErrorFormat) -> Self {
        self.error_format = format;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether unknown keys are rejected
    pub fn is_strict(&self) -> bool {
        self.strict || self.extra == ExtraPolicy::Forbid
    }

    /// Reject mutually exclusive combinations
    pub fn check(&self) -> Result<()> {
        if self.strict && self.extra == ExtraPolicy::Allow {
            return Err(SchemaError::InvalidConfig(
                "strict mode cannot be combined with extra = allow".to_string(),
            ));
        }
        Ok(())
    }
}

/// A declared input field
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub required: bool,
    /// Only ever set on optional fields
    pub default: Option<Value>,
    pub description: Option<String>,
    pub example: Option<Value>,
}

impl FieldDefinition {
    /// Required for the field stage and listed in the document's `required`
    pub fn is_required(&self) -> bool {
        self.required && self.default.is_none()
    }
}

/// A derived, output-only field
#[derive(Debug, Clone)]
pub struct ComputedFieldDefinition {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub function: ComputedFn,
    pub description: Option<String>,
}

impl ComputedFieldDefinition {
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor, function: ComputedFn) -> Self {
        Self {
            name: name.into(),
            descriptor,
            function,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Immutable schema: fields, model validators, computed fields, config
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    name: String,
    fields: Vec<FieldDefinition>,
    model_validators: Vec<ModelValidator>,
    computed_fields: Vec<ComputedFieldDefinition>,
    config: ModelConfig,
}

impl SchemaDefinition {
    /// Assemble a definition. Invariants are checked by the composition layer.
    pub(crate) fn from_parts(
        name: String,
        fields: Vec<FieldDefinition>,
        model_validators: Vec<ModelValidator>,
        computed_fields: Vec<ComputedFieldDefinition>,
        config: ModelConfig,
    ) -> Self {
        Self {
            name,
            fields,
            model_validators,
            computed_fields,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn model_validators(&self) -> &[ModelValidator] {
        &self.model_validators
    }

    pub fn computed_fields(&self) -> &[ComputedFieldDefinition] {
        &self.computed_fields
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Title for rendering; falls back to the schema name
    pub fn title(&self) -> &str {
        self.config.title.as_deref().unwrap_or(&self.name)
    }

    /// Declared fields that must be present in input
    pub fn required_field_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Schema names referenced by any field or computed field
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .fields
            .iter()
            .flat_map(|f| f.descriptor.references())
            .chain(self.computed_fields.iter().flat_map(|c| c.descriptor.references()))
            .collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }
}
