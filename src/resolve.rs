//! Interchange document resolver
//!
//! Renders a [`SchemaDefinition`] into a JSON-Schema-compatible document.
//! Field classification mirrors the pipeline exactly: declared fields become
//! properties (required unless they have a default), computed fields become
//! read-only properties that are never required.
//!
//! A [`ProviderProfile`] narrows the output for consumers with a restricted
//! JSON Schema dialect: it caps `anyOf` length, drops unsupported `format`
//! keywords, and inlines references up to a maximum depth, replacing deeper
//! subtrees with bare stubs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::descriptor::{Constraint, Primitive, TypeDescriptor, TypeKind};
use crate::error::{Result, SchemaError};
use crate::registry::SchemaRegistry;
use crate::schema::SchemaDefinition;

/// Marker set on computed (derived) properties
pub const COMPUTED_MARKER: &str = "x-computed";
/// Number of model validators attached to the schema
pub const MODEL_VALIDATORS_KEY: &str = "x-model-validators";
/// Number of computed fields attached to the schema
pub const COMPUTED_FIELDS_KEY: &str = "x-computed-fields";

/// How `SchemaRef` descriptors are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefMode {
    /// Embed the referenced schema in place (recursive schemas still use `$ref`)
    Inline,
    /// Emit `{"$ref": "#/$defs/Name"}` and collect definitions under `$defs`
    #[default]
    Reference,
}

/// Restrictions of a document consumer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Filled from the table key when loaded from configuration
    #[serde(default)]
    pub name: String,

    /// Keep at most this many `anyOf` alternatives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_union_variants: Option<usize>,

    /// `format` values the consumer rejects
    #[serde(default)]
    pub unsupported_formats: Vec<String>,

    /// Deepest nesting level rendered in full
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl ProviderProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn max_union_variants(mut self, n: usize) -> Self {
        self.max_union_variants = Some(n);
        self
    }

    pub fn unsupported_format(mut self, format: impl Into<String>) -> Self {
        self.unsupported_formats.push(format.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    fn supports_format(&self, format: &str) -> bool {
        !self.unsupported_formats.iter().any(|f| f == format)
    }
}

/// Rendering options
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolveOptions {
    #[serde(default)]
    pub ref_mode: RefMode,

    #[serde(default)]
    pub provider: Option<ProviderProfile>,
}

impl ResolveOptions {
    pub fn inline() -> Self {
        Self {
            ref_mode: RefMode::Inline,
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: ProviderProfile) -> Self {
        self.provider = Some(provider);
        self
    }
}

/// Renders schema definitions to interchange documents
pub struct Resolver<'a> {
    registry: Option<&'a SchemaRegistry>,
    options: &'a ResolveOptions,
    recursive: HashSet<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a SchemaRegistry, options: &'a ResolveOptions) -> Self {
        Self {
            registry: Some(registry),
            options,
            recursive: registry.recursive_schemas(),
        }
    }

    /// Resolver for schemas without references
    pub fn standalone(options: &'a ResolveOptions) -> Self {
        Self {
            registry: None,
            options,
            recursive: HashSet::new(),
        }
    }

    /// Render `schema` as a document
    pub fn resolve(&self, schema: &SchemaDefinition) -> Result<Value> {
        let mut defs = Map::new();
        let mut stack = vec![schema.name().to_string()];
        let mut doc = self.schema_object(schema, 0, &mut defs, &mut stack)?;
        if !defs.is_empty() {
            if let Value::Object(map) = &mut doc {
                map.insert("$defs".to_string(), Value::Object(defs));
            }
        }
        Ok(doc)
    }

    /// Field names listed as required in a rendered document
    pub fn required_fields(document: &Value) -> Vec<String> {
        document
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn schema_object(
        &self,
        schema: &SchemaDefinition,
        depth: usize,
        defs: &mut Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Result<Value> {
        let config = schema.config();
        let mut doc = Map::new();
        doc.insert("type".to_string(), json!("object"));
        doc.insert("title".to_string(), json!(schema.title()));
        if let Some(description) = &config.description {
            doc.insert("description".to_string(), json!(description));
        }

        let mut properties = Map::new();
        for field in schema.fields() {
            let mut rendered = self.descriptor(&field.descriptor, depth + 1, defs, stack)?;
            if let Value::Object(prop) = &mut rendered {
                if let Some(description) = &field.description {
                    prop.insert("description".to_string(), json!(description));
                }
                if let Some(default) = &field.default {
                    prop.insert("default".to_string(), default.clone());
                }
                if let Some(example) = &field.example {
                    prop.insert("examples".to_string(), json!([example]));
                }
            }
            properties.insert(field.name.clone(), rendered);
        }
        for computed in schema.computed_fields() {
            let mut rendered = self.descriptor(&computed.descriptor, depth + 1, defs, stack)?;
            if let Value::Object(prop) = &mut rendered {
                prop.insert("readOnly".to_string(), json!(true));
                prop.insert(COMPUTED_MARKER.to_string(), json!(true));
                let description = computed
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Computed field '{}'", computed.name));
                prop.insert("description".to_string(), json!(description));
            }
            properties.insert(computed.name.clone(), rendered);
        }
        doc.insert("properties".to_string(), Value::Object(properties));
        doc.insert("required".to_string(), json!(schema.required_field_names()));

        if config.is_strict() {
            doc.insert("additionalProperties".to_string(), json!(false));
        }
        if !schema.model_validators().is_empty() || !schema.computed_fields().is_empty() {
            doc.insert(
                MODEL_VALIDATORS_KEY.to_string(),
                json!(schema.model_validators().len()),
            );
            doc.insert(
                COMPUTED_FIELDS_KEY.to_string(),
                json!(schema.computed_fields().len()),
            );
        }
        Ok(Value::Object(doc))
    }

    fn truncated(&self, depth: usize) -> bool {
        matches!(
            self.options.provider.as_ref().and_then(|p| p.max_depth),
            Some(max) if depth > max
        )
    }

    fn inline_ref(&self, name: &str) -> bool {
        let inline = self.options.ref_mode == RefMode::Inline && !self.recursive.contains(name);
        self.depth_capped() || inline
    }

    fn descriptor(
        &self,
        descriptor: &TypeDescriptor,
        depth: usize,
        defs: &mut Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Result<Value> {
        if self.truncated(depth) {
            let stub = match descriptor.kind() {
                TypeKind::Object(_) | TypeKind::SchemaRef(_) | TypeKind::Mapping { .. } => {
                    Some(json!({"type": "object"}))
                }
                TypeKind::Array(_) | TypeKind::Tuple(_) => Some(json!({"type": "array"})),
                TypeKind::Union(_) => Some(json!({})),
                TypeKind::Primitive(_) => None,
            };
            if let Some(stub) = stub {
                return Ok(stub);
            }
        }

        let mut rendered = match descriptor.kind() {
            TypeKind::Primitive(p) => primitive(*p),
            TypeKind::Array(items) => {
                json!({"type": "array", "items": self.descriptor(items, depth + 1, defs, stack)?})
            }
            TypeKind::Mapping { key, value } => {
                let mut map = Map::new();
                map.insert("type".to_string(), json!("object"));
                map.insert(
                    "additionalProperties".to_string(),
                    self.descriptor(value, depth + 1, defs, stack)?,
                );
                if !key.constraints().is_empty() {
                    map.insert(
                        "propertyNames".to_string(),
                        self.descriptor(key, depth + 1, defs, stack)?,
                    );
                }
                Value::Object(map)
            }
            TypeKind::Tuple(items) => {
                let mut prefix = Vec::with_capacity(items.len());
                for item in items {
                    prefix.push(self.descriptor(item, depth + 1, defs, stack)?);
                }
                json!({
                    "type": "array",
                    "prefixItems": prefix,
                    "minItems": items.len(),
                    "maxItems": items.len(),
                })
            }
            TypeKind::Union(alternatives) => {
                let limit = self
                    .options
                    .provider
                    .as_ref()
                    .and_then(|p| p.max_union_variants)
                    .unwrap_or(alternatives.len());
                let mut any_of = Vec::new();
                for alternative in alternatives.iter().take(limit) {
                    any_of.push(self.descriptor(alternative, depth, defs, stack)?);
                }
                json!({"anyOf": any_of})
            }
            TypeKind::Object(fields) => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    properties.insert(
                        field.name.clone(),
                        self.descriptor(&field.descriptor, depth + 1, defs, stack)?,
                    );
                    if field.required {
                        required.push(field.name.clone());
                    }
                }
                json!({"type": "object", "properties": properties, "required": required})
            }
            TypeKind::SchemaRef(name) => self.reference(name, depth, defs, stack)?,
        };

        if let Value::Object(map) = &mut rendered {
            self.apply_constraints(descriptor, map);
        }
        Ok(rendered)
    }

    fn reference(
        &self,
        name: &str,
        depth: usize,
        defs: &mut Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Result<Value> {
        let registry = self.registry.ok_or_else(|| SchemaError::UnknownSchema {
            name: name.to_string(),
            suggestion: None,
        })?;
        let schema = registry.require(name)?;

        // Without a depth cap, re-entering a schema being inlined would never end.
        let reentrant = stack.iter().any(|s| s == name) && !self.depth_capped();
        if self.inline_ref(name) && !reentrant {
            stack.push(name.to_string());
            let inlined = self.schema_object(schema, depth, defs, stack);
            stack.pop();
            return inlined;
        }

        if !defs.contains_key(name) {
            // Placeholder first so recursive references terminate.
            defs.insert(name.to_string(), Value::Null);
            stack.push(name.to_string());
            let body = self.schema_object(schema, 0, defs, stack);
            stack.pop();
            defs.insert(name.to_string(), body?);
        }
        Ok(json!({"$ref": format!("#/$defs/{}", name)}))
    }

    fn depth_capped(&self) -> bool {
        self.options
            .provider
            .as_ref()
            .map_or(false, |p| p.max_depth.is_some())
    }

    fn apply_constraints(&self, descriptor: &TypeDescriptor, map: &mut Map<String, Value>) {
        let properties_family = matches!(
            descriptor.kind(),
            TypeKind::Object(_) | TypeKind::Mapping { .. } | TypeKind::SchemaRef(_)
        );
        let items_family = matches!(descriptor.kind(), TypeKind::Array(_) | TypeKind::Tuple(_));
        let (min_items, max_items) = if properties_family {
            ("minProperties", "maxProperties")
        } else {
            ("minItems", "maxItems")
        };

        for constraint in descriptor.constraints() {
            match constraint {
                Constraint::MinLength(n) => {
                    map.insert("minLength".to_string(), json!(n));
                }
                Constraint::MaxLength(n) => {
                    map.insert("maxLength".to_string(), json!(n));
                }
                Constraint::MinItems(n) => {
                    map.insert(min_items.to_string(), json!(n));
                }
                Constraint::MaxItems(n) => {
                    map.insert(max_items.to_string(), json!(n));
                }
                Constraint::Size(n) => {
                    let (lo, hi) = if properties_family || items_family {
                        (min_items, max_items)
                    } else {
                        ("minLength", "maxLength")
                    };
                    map.insert(lo.to_string(), json!(n));
                    map.insert(hi.to_string(), json!(n));
                }
                Constraint::Gt(b) => {
                    map.insert("exclusiveMinimum".to_string(), bound(*b));
                }
                Constraint::Lt(b) => {
                    map.insert("exclusiveMaximum".to_string(), bound(*b));
                }
                Constraint::Gteq(b) => {
                    map.insert("minimum".to_string(), bound(*b));
                }
                Constraint::Lteq(b) => {
                    map.insert("maximum".to_string(), bound(*b));
                }
                Constraint::Choices(choices) => {
                    map.insert("enum".to_string(), Value::Array(choices.clone()));
                }
                Constraint::Pattern(pattern) => {
                    map.insert("pattern".to_string(), json!(pattern.as_str()));
                }
                Constraint::Format(format) => {
                    let supported = self
                        .options
                        .provider
                        .as_ref()
                        .map_or(true, |p| p.supports_format(format.as_str()));
                    if supported {
                        map.insert("format".to_string(), json!(format.as_str()));
                    }
                }
            }
        }
    }
}

fn primitive(p: Primitive) -> Value {
    match p {
        Primitive::Any => json!({}),
        other => json!({"type": other.as_str()}),
    }
}

/// Integral bounds render as integers
fn bound(b: f64) -> Value {
    if b.fract() == 0.0 && b.abs() < i64::MAX as f64 {
        json!(b as i64)
    } else {
        json!(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SchemaBuilder;
    use crate::descriptor::StringFormat;

    #[test]
    fn test_constraints_render() {
        let schema = SchemaBuilder::new("Item")
            .required("sku", TypeDescriptor::string().min_length(3).pattern("^[A-Z]+$").unwrap())
            .required("qty", TypeDescriptor::integer().gt(0.0).lteq(99.5))
            .optional("tags", TypeDescriptor::array(TypeDescriptor::string()).max_items(5))
            .build()
            .unwrap();
        let options = ResolveOptions::default();
        let doc = Resolver::standalone(&options).resolve(&schema).unwrap();
        assert_eq!(
            doc["properties"]["sku"],
            json!({"type": "string", "minLength": 3, "pattern": "^[A-Z]+$"})
        );
        assert_eq!(
            doc["properties"]["qty"],
            json!({"type": "integer", "exclusiveMinimum": 0, "maximum": 99.5})
        );
        assert_eq!(doc["properties"]["tags"]["maxItems"], json!(5));
        assert_eq!(doc["required"], json!(["sku", "qty"]));
    }

    #[test]
    fn test_strict_sets_additional_properties() {
        let schema = SchemaBuilder::new("S")
            .required("a", TypeDescriptor::string())
            .strict(true)
            .build()
            .unwrap();
        let options = ResolveOptions::default();
        let doc = Resolver::standalone(&options).resolve(&schema).unwrap();
        assert_eq!(doc["additionalProperties"], json!(false));
        assert!(doc.get(MODEL_VALIDATORS_KEY).is_none());
    }

    #[test]
    fn test_provider_caps_unions_and_formats() {
        let schema = SchemaBuilder::new("P")
            .required(
                "v",
                TypeDescriptor::union(vec![
                    TypeDescriptor::string(),
                    TypeDescriptor::integer(),
                    TypeDescriptor::boolean(),
                ]),
            )
            .required("site", TypeDescriptor::string().format(StringFormat::Uri))
            .build()
            .unwrap();
        let options = ResolveOptions::default().with_provider(
            ProviderProfile::new("restricted")
                .max_union_variants(2)
                .unsupported_format("uri"),
        );
        let doc = Resolver::standalone(&options).resolve(&schema).unwrap();
        assert_eq!(doc["properties"]["v"]["anyOf"].as_array().unwrap().len(), 2);
        assert_eq!(doc["properties"]["site"], json!({"type": "string"}));
    }

    #[test]
    fn test_tuple_and_mapping() {
        let schema = SchemaBuilder::new("T")
            .required(
                "point",
                TypeDescriptor::tuple(vec![TypeDescriptor::number(), TypeDescriptor::number()]),
            )
            .required(
                "scores",
                TypeDescriptor::mapping(TypeDescriptor::string(), TypeDescriptor::integer()),
            )
            .build()
            .unwrap();
        let options = ResolveOptions::default();
        let doc = Resolver::standalone(&options).resolve(&schema).unwrap();
        assert_eq!(doc["properties"]["point"]["prefixItems"].as_array().unwrap().len(), 2);
        assert_eq!(doc["properties"]["point"]["minItems"], json!(2));
        assert_eq!(
            doc["properties"]["scores"],
            json!({"type": "object", "additionalProperties": {"type": "integer"}})
        );
    }

    #[test]
    fn test_provider_without_depth_keeps_references() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                SchemaBuilder::new("A")
                    .required("x", TypeDescriptor::integer())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                SchemaBuilder::new("Holder")
                    .required("a", TypeDescriptor::schema_ref("A"))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let options = ResolveOptions::default()
            .with_provider(ProviderProfile::new("narrow").max_union_variants(3));
        let doc = registry.render("Holder", &options).unwrap();
        assert_eq!(doc["properties"]["a"], json!({"$ref": "#/$defs/A"}));
        assert_eq!(doc["$defs"]["A"]["required"], json!(["x"]));

        let capped = ResolveOptions::default()
            .with_provider(ProviderProfile::new("shallow").max_depth(3));
        let doc = registry.render("Holder", &capped).unwrap();
        assert_eq!(doc["properties"]["a"]["type"], json!("object"));
        assert!(doc.get("$defs").is_none());
    }

    #[test]
    fn test_required_fields_helper() {
        let doc = json!({"required": ["a", "b"]});
        assert_eq!(Resolver::required_fields(&doc), vec!["a", "b"]);
        assert!(Resolver::required_fields(&json!({})).is_empty());
    }
}
