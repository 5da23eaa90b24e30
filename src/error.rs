//! Error types for the model engine
//!
//! These are engine faults: broken definitions, unresolved references,
//! validator faults and I/O. Failed validation is not an error here, it is
//! reported through [`crate::report::ValidationErrors`].

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Engine errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema not found: {name}{}", suggestion_suffix(.suggestion))]
    UnknownSchema {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Schema already registered: {name}")]
    AlreadyExists { name: String },

    #[error("Duplicate field '{field}' in schema {schema}")]
    DuplicateField { schema: String, field: String },

    #[error("Invalid schema definition {schema}: {reason}")]
    InvalidDefinition { schema: String, reason: String },

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Validator for '{path}' failed: {source}")]
    ValidatorFault {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unresolved schema reference '{reference}' in {schema}")]
    UnresolvedReference { schema: String, reference: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}
