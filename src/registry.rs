//! Schema Registry
//!
//! Append-only store of named schema definitions. Nested `SchemaRef`
//! descriptors resolve through it, and its reference graph tells the
//! resolver which schemas are recursive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::input::RawInput;
use crate::pipeline::Pipeline;
use crate::report::ValidationResult;
use crate::resolve::{ResolveOptions, Resolver};
use crate::schema::SchemaDefinition;

/// Named, immutable schema definitions
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Definitions in registration order
    schemas: Vec<Arc<SchemaDefinition>>,
    /// Name -> position in `schemas`
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Names are never reused.
    pub fn register(&mut self, schema: SchemaDefinition) -> Result<Arc<SchemaDefinition>> {
        let name = schema.name().to_string();
        if self.index.contains_key(&name) {
            return Err(SchemaError::AlreadyExists { name });
        }
        let schema = Arc::new(schema);
        self.index.insert(name.clone(), self.schemas.len());
        self.schemas.push(schema.clone());
        debug!(schema = %name, total = self.schemas.len(), "registered schema");
        Ok(schema)
    }

    /// Register several definitions, stopping at the first failure
    pub fn register_all<I>(&mut self, schemas: I) -> Result<()>
    where
        I: IntoIterator<Item = SchemaDefinition>,
    {
        for schema in schemas {
            self.register(schema)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<SchemaDefinition>> {
        self.index.get(name).map(|&i| &self.schemas[i])
    }

    /// Like [`get`](Self::get), but a miss is an error with a suggestion
    pub fn require(&self, name: &str) -> Result<&Arc<SchemaDefinition>> {
        self.get(name).ok_or_else(|| SchemaError::UnknownSchema {
            name: name.to_string(),
            suggestion: self.suggest(name),
        })
    }

    /// Closest registered name to `query`
    pub fn suggest(&self, query: &str) -> Option<String> {
        let matcher = SkimMatcherV2::default().ignore_case();
        self.schemas
            .iter()
            .filter_map(|s| matcher.fuzzy_match(s.name(), query).map(|score| (score, s.name())))
            .max_by_key(|(score, _)| *score)
            .map(|(_, name)| name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SchemaDefinition>> {
        self.schemas.iter()
    }

    /// Every `SchemaRef` must name a registered schema
    pub fn check_references(&self) -> Result<()> {
        for schema in &self.schemas {
            for reference in schema.references() {
                if !self.contains(reference) {
                    return Err(SchemaError::UnresolvedReference {
                        schema: schema.name().to_string(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn reference_graph(&self) -> DiGraph<&str, ()> {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = self.schemas.iter().map(|s| graph.add_node(s.name())).collect();
        for (from, schema) in self.schemas.iter().enumerate() {
            for reference in schema.references() {
                if let Some(&to) = self.index.get(reference) {
                    graph.add_edge(nodes[from], nodes[to], ());
                }
            }
        }
        graph
    }

    /// Schemas that can reach themselves through references
    pub fn recursive_schemas(&self) -> HashSet<String> {
        let graph = self.reference_graph();
        let mut recursive = HashSet::new();
        for scc in kosaraju_scc(&graph) {
            let cyclic = scc.len() > 1 || graph.contains_edge(scc[0], scc[0]);
            if cyclic {
                for idx in scc {
                    recursive.insert(graph[idx].to_string());
                }
            }
        }
        recursive
    }

    /// Validate input against a registered schema
    pub fn validate(&self, name: &str, input: &RawInput) -> Result<ValidationResult> {
        let schema = self.require(name)?;
        Pipeline::new().with_registry(self).validate(schema, input)
    }

    /// Validate a JSON value against a registered schema
    pub fn validate_value(&self, name: &str, value: &Value) -> Result<ValidationResult> {
        let schema = self.require(name)?;
        Pipeline::new().with_registry(self).validate_value(schema, value)
    }

    /// Render a registered schema's interchange document
    pub fn render(&self, name: &str, options: &ResolveOptions) -> Result<Value> {
        let schema = self.require(name)?;
        Resolver::new(self, options).resolve(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SchemaBuilder;
    use crate::descriptor::TypeDescriptor;
    use crate::report::ErrorCode;
    use serde_json::json;

    fn address() -> SchemaDefinition {
        SchemaBuilder::new("Address")
            .required("city", TypeDescriptor::string().min_length(1))
            .build()
            .unwrap()
    }

    fn customer() -> SchemaDefinition {
        SchemaBuilder::new("Customer")
            .required("name", TypeDescriptor::string())
            .required("address", TypeDescriptor::schema_ref("Address"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_is_append_only() {
        let mut registry = SchemaRegistry::new();
        registry.register(address()).unwrap();
        let err = registry.register(address()).unwrap_err();
        assert!(matches!(err, SchemaError::AlreadyExists { .. }));
        assert_eq!(registry.names(), vec!["Address"]);
    }

    #[test]
    fn test_nested_validation_prefixes_paths() {
        let mut registry = SchemaRegistry::new();
        registry.register_all([address(), customer()]).unwrap();
        let ok = registry
            .validate_value("Customer", &json!({"name": "A", "address": {"city": "Oslo", "x": 1}}))
            .unwrap()
            .unwrap();
        assert_eq!(ok.get("address"), Some(&json!({"city": "Oslo"})));

        let errors = registry
            .validate_value("Customer", &json!({"name": "A", "address": {"city": ""}}))
            .unwrap()
            .unwrap_err();
        assert_eq!(errors.first().code, ErrorCode::MinLength);
        assert_eq!(errors.first().path_string(), "address.city");
    }

    #[test]
    fn test_unknown_schema_suggests() {
        let mut registry = SchemaRegistry::new();
        registry.register(address()).unwrap();
        match registry.require("Adress") {
            Err(SchemaError::UnknownSchema { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("Address"));
            }
            other => panic!("expected UnknownSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_check_references() {
        let mut registry = SchemaRegistry::new();
        registry.register(customer()).unwrap();
        assert!(matches!(
            registry.check_references(),
            Err(SchemaError::UnresolvedReference { .. })
        ));
        registry.register(address()).unwrap();
        assert!(registry.check_references().is_ok());
    }

    #[test]
    fn test_recursive_schemas() {
        let node = SchemaBuilder::new("Node")
            .required("value", TypeDescriptor::integer())
            .optional("children", TypeDescriptor::array(TypeDescriptor::schema_ref("Node")))
            .build()
            .unwrap();
        let mut registry = SchemaRegistry::new();
        registry.register_all([node, address()]).unwrap();
        let recursive = registry.recursive_schemas();
        assert!(recursive.contains("Node"));
        assert!(!recursive.contains("Address"));

        let errors = registry
            .validate_value("Node", &json!({"value": 1, "children": [{"value": "x"}]}))
            .unwrap()
            .unwrap_err();
        assert_eq!(errors.first().path_string(), "children[0].value");
    }
}
