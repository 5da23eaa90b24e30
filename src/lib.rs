//! Familiar Models
//!
//! Runtime model validation and schema composition for the Familiar platform.
//!
//! ## Features
//!
//! - **Composable Descriptors**: primitives, arrays, mappings, tuples, unions,
//!   fixed-shape objects and named schema references, each with ordered constraints
//! - **Staged Validation**: field validation, strict-mode checks, cross-field model
//!   validators and computed fields, with path-annotated error reporting
//! - **Coercion Policies**: `none`, `safe` and `aggressive` input conversion
//! - **Interchange Documents**: JSON-Schema-compatible rendering with provider
//!   compatibility profiles
//!
//! ## Architecture
//!
//! ```text
//! compose / SchemaBuilder / loader
//!            │
//!            ▼
//!     SchemaDefinition ──────────────┐
//!            │                       │
//!            ▼                       ▼
//!   Pipeline ──► Evaluator       Resolver ──► document
//!      │             │
//!      ▼             ▼
//!  ValidationResult  SchemaRegistry (SchemaRef lookup)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use familiar_models::{Pipeline, RawInput, SchemaBuilder, TypeDescriptor};
//!
//! let schema = SchemaBuilder::new("Person")
//!     .required("name", TypeDescriptor::string().min_length(2))
//!     .optional("age", TypeDescriptor::integer())
//!     .build()
//!     .unwrap();
//!
//! let result = Pipeline::new()
//!     .validate(&schema, &RawInput::new().text("name", "Al"))
//!     .unwrap();
//! assert!(result.is_ok());
//! ```

pub mod coerce;
pub mod compose;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod evaluate;
pub mod input;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod validators;

pub use coerce::CoercionPolicy;
pub use compose::{compose, ComposeOptions, FieldSpec, SchemaBuilder};
pub use config::EngineConfig;
pub use descriptor::{
    Constraint, ConstraintKind, ObjectField, Pattern, Primitive, StringFormat, TypeDescriptor,
    TypeKind,
};
pub use error::{Result, SchemaError};
pub use evaluate::Evaluator;
pub use input::{FieldKey, KeyMatcher, RawInput, Record};
pub use pipeline::Pipeline;
pub use registry::SchemaRegistry;
pub use report::{
    ErrorCode, ErrorFormat, PathSegment, Validated, ValidationError, ValidationErrors,
    ValidationResult,
};
pub use resolve::{ProviderProfile, RefMode, ResolveOptions, Resolver};
pub use schema::{
    ComputedFieldDefinition, ExtraPolicy, FieldDefinition, ModelConfig, SchemaDefinition,
};
pub use validators::{ComputedFn, FieldValidator, ModelValidator, Verdict};
