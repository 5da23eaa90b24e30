//! Validation error reporting
//!
//! A failed validation produces a non-empty, ordered list of path-tagged,
//! coded errors. Rendering to text is controlled by [`ErrorFormat`] and never
//! changes what the engine reports.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::input::Record;

/// Closed vocabulary of error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Required,
    Type,
    MinLength,
    MaxLength,
    MinItems,
    MaxItems,
    Gt,
    Lt,
    Gteq,
    Lteq,
    Format,
    Choices,
    Size,
    CustomValidation,
    ModelValidation,
    ComputedField,
    ComputedFieldType,
    AdditionalProperties,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Type => "type",
            Self::MinLength => "min_length",
            Self::MaxLength => "max_length",
            Self::MinItems => "min_items",
            Self::MaxItems => "max_items",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gteq => "gteq",
            Self::Lteq => "lteq",
            Self::Format => "format",
            Self::Choices => "choices",
            Self::Size => "size",
            Self::CustomValidation => "custom_validation",
            Self::ModelValidation => "model_validation",
            Self::ComputedField => "computed_field",
            Self::ComputedFieldType => "computed_field_type",
            Self::AdditionalProperties => "additional_properties",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One segment of an error path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{}", name),
            Self::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Field(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        Self::Field(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// Render a path as `a.b[0].c`; the empty path renders as `__root__`
pub fn render_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "__root__".to_string();
    }
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathSegment::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: Vec<PathSegment>,
    pub code: ErrorCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: Vec<PathSegment>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            path,
            code,
            message: message.into(),
        }
    }

    /// Error with an empty (schema-level) path
    pub fn root(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Vec::new(), code, message)
    }

    /// Prepend `prefix` to this error's path
    pub fn prefixed(mut self, prefix: &[PathSegment]) -> Self {
        if !prefix.is_empty() {
            let mut path = prefix.to_vec();
            path.append(&mut self.path);
            self.path = path;
        }
        self
    }

    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }

    /// Render according to the configured error format
    pub fn render(&self, format: ErrorFormat) -> String {
        match format {
            ErrorFormat::Detailed => {
                format!("{}: {} [{}]", self.path_string(), self.message, self.code)
            }
            ErrorFormat::Simple => format!("{}: {}", self.path_string(), self.message),
            ErrorFormat::Minimal => self.message.clone(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(ErrorFormat::Detailed))
    }
}

/// How errors are rendered to text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    #[default]
    Detailed,
    Simple,
    Minimal,
}

/// Non-empty ordered list of validation errors
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Build from a list; `None` when the list is empty
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list holds no errors
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn first(&self) -> &ValidationError {
        &self.0[0]
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.0.iter().map(|e| e.code).collect()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }

    pub fn render(&self, format: ErrorFormat) -> Vec<String> {
        self.0.iter().map(|e| e.render(format)).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.0.len() == 1 { "error" } else { "errors" };
        writeln!(f, "{} validation {}", self.0.len(), noun)?;
        for error in &self.0 {
            writeln!(f, "  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A successfully validated record
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Validated {
    /// Declared fields plus computed fields
    pub record: Record,
    /// Unknown input keys, retained only under `extra = allow`
    #[serde(skip_serializing_if = "Record::is_empty")]
    pub extras: Record,
}

impl Validated {
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.record.get(field)
    }
}

/// Outcome of validating one input
pub type ValidationResult = std::result::Result<Validated, ValidationErrors>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rendering() {
        let path = vec![
            PathSegment::from("tags"),
            PathSegment::from(2usize),
            PathSegment::from("label"),
        ];
        assert_eq!(render_path(&path), "tags[2].label");
        assert_eq!(render_path(&[]), "__root__");
    }

    #[test]
    fn test_render_formats() {
        let err = ValidationError::new(vec!["name".into()], ErrorCode::MinLength, "too short");
        assert_eq!(err.render(ErrorFormat::Detailed), "name: too short [min_length]");
        assert_eq!(err.render(ErrorFormat::Simple), "name: too short");
        assert_eq!(err.render(ErrorFormat::Minimal), "too short");
    }

    #[test]
    fn test_errors_never_empty() {
        assert!(ValidationErrors::from_vec(Vec::new()).is_none());
        let errors = ValidationErrors::single(ValidationError::root(ErrorCode::Type, "bad"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.codes(), vec![ErrorCode::Type]);
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_prefixed() {
        let err = ValidationError::new(vec!["city".into()], ErrorCode::Required, "missing")
            .prefixed(&["address".into()]);
        assert_eq!(err.path_string(), "address.city");
    }
}
