//! Schema file loading
//!
//! Reads schema definitions from JSON files of the form
//!
//! ```json
//! {
//!   "schemas": [
//!     {
//!       "name": "User",
//!       "title": "A user",
//!       "config": { "strict": true },
//!       "fields": [
//!         { "name": "name", "type": "string", "constraints": [{ "min_length": 2 }] },
//!         { "name": "tags", "type": "array", "items": { "type": "string" }, "required": false },
//!         { "name": "address", "type": "ref", "schema": "Address" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Files only describe shapes. Validators and computed fields are code and
//! are attached through [`crate::compose`].

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::compose::{compose, ComposeOptions, FieldSpec};
use crate::descriptor::{Constraint, ConstraintKind, ObjectField, TypeDescriptor};
use crate::error::Result;
use crate::registry::SchemaRegistry;
use crate::schema::{ModelConfig, SchemaDefinition};

/// Top-level file layout
#[derive(Debug, Deserialize)]
pub struct SchemaFile {
    pub schemas: Vec<SchemaDoc>,
}

/// One schema as written in a file
#[derive(Debug, Deserialize)]
pub struct SchemaDoc {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: Option<ModelConfig>,
    #[serde(default)]
    pub fields: Vec<FieldDoc>,
}

/// One field as written in a file
#[derive(Debug, Deserialize)]
pub struct FieldDoc {
    pub name: String,
    #[serde(flatten)]
    pub ty: TypeDoc,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub example: Option<Value>,
}

fn default_true() -> bool {
    true
}

/// A type as written in a file
#[derive(Debug, Deserialize)]
pub struct TypeDoc {
    #[serde(flatten)]
    pub kind: KindDoc,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub messages: BTreeMap<ConstraintKind, String>,
    #[serde(default = "default_true")]
    pub all_items: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KindDoc {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    Any,
    Array {
        items: Box<TypeDoc>,
    },
    Mapping {
        #[serde(default)]
        keys: Option<Box<TypeDoc>>,
        values: Box<TypeDoc>,
    },
    Tuple {
        items: Vec<TypeDoc>,
    },
    Union {
        #[serde(rename = "anyOf")]
        any_of: Vec<TypeDoc>,
    },
    Object {
        fields: Vec<FieldDoc>,
    },
    Ref {
        schema: String,
    },
}

impl TypeDoc {
    pub fn into_descriptor(self) -> TypeDescriptor {
        let mut descriptor = match self.kind {
            KindDoc::String => TypeDescriptor::string(),
            KindDoc::Integer => TypeDescriptor::integer(),
            KindDoc::Number => TypeDescriptor::number(),
            KindDoc::Boolean => TypeDescriptor::boolean(),
            KindDoc::Null => TypeDescriptor::null(),
            KindDoc::Any => TypeDescriptor::any(),
            KindDoc::Array { items } => TypeDescriptor::array(items.into_descriptor()),
            KindDoc::Mapping { keys, values } => TypeDescriptor::mapping(
                keys.map(|k| k.into_descriptor())
                    .unwrap_or_else(TypeDescriptor::string),
                values.into_descriptor(),
            ),
            KindDoc::Tuple { items } => {
                TypeDescriptor::tuple(items.into_iter().map(TypeDoc::into_descriptor).collect())
            }
            KindDoc::Union { any_of } => {
                TypeDescriptor::union(any_of.into_iter().map(TypeDoc::into_descriptor).collect())
            }
            KindDoc::Object { fields } => TypeDescriptor::object(
                fields
                    .into_iter()
                    .map(|f| ObjectField {
                        name: f.name,
                        required: f.required,
                        descriptor: f.ty.into_descriptor(),
                    })
                    .collect(),
            ),
            KindDoc::Ref { schema } => TypeDescriptor::schema_ref(schema),
        };
        for constraint in self.constraints {
            descriptor = descriptor.with(constraint);
        }
        for (kind, message) in self.messages {
            descriptor = descriptor.message(kind, message);
        }
        descriptor.all_items(self.all_items)
    }
}

impl FieldDoc {
    fn into_spec(self) -> FieldSpec {
        let descriptor = self.ty.into_descriptor();
        let mut spec = if self.required && self.default.is_none() {
            FieldSpec::required(self.name, descriptor)
        } else {
            FieldSpec::optional(self.name, descriptor)
        };
        if let Some(default) = self.default {
            spec = spec.with_default(default);
        }
        spec.description = self.description;
        spec.example = self.example;
        spec
    }
}

impl SchemaDoc {
    /// Compose into a definition; `defaults` applies when the doc has no config
    pub fn into_definition(self, defaults: &ModelConfig) -> Result<SchemaDefinition> {
        let config = self.config.unwrap_or_else(|| defaults.clone());
        let mut options = ComposeOptions::new().config(config);
        options.title = self.title;
        options.description = self.description;
        let fields = self.fields.into_iter().map(FieldDoc::into_spec).collect();
        compose(self.name, fields, options)
    }
}

/// Parse schema definitions from JSON text
pub fn parse_schema_file(content: &str, defaults: &ModelConfig) -> Result<Vec<SchemaDefinition>> {
    let file: SchemaFile = serde_json::from_str(content)?;
    file.schemas
        .into_iter()
        .map(|doc| doc.into_definition(defaults))
        .collect()
}

/// Load schema definitions from a JSON file
pub fn load_schema_file(
    path: impl AsRef<Path>,
    defaults: &ModelConfig,
) -> Result<Vec<SchemaDefinition>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let schemas = parse_schema_file(&content, defaults)?;
    debug!(path = %path.display(), count = schemas.len(), "loaded schema file");
    Ok(schemas)
}

/// Load a file into `registry` and check that every reference resolves
pub fn load_into(
    registry: &mut SchemaRegistry,
    path: impl AsRef<Path>,
    defaults: &ModelConfig,
) -> Result<()> {
    registry.register_all(load_schema_file(path, defaults)?)?;
    registry.check_references()
}
