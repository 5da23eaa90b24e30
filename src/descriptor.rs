//! Type descriptors
//!
//! A [`TypeDescriptor`] is an immutable description of an expected value
//! shape: its [`TypeKind`], an ordered list of [`Constraint`]s, optional
//! message overrides and custom validators. Composite kinds nest other
//! descriptors; nothing is ever mutated after construction.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Result, SchemaError};
use crate::report::ErrorCode;
use crate::validators::FieldValidator;

/// Primitive value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    Any,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Any => "any",
        }
    }

    /// Does `value` already have this primitive's shape?
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
            Self::Any => true,
        }
    }
}

/// Field of a fixed-shape object descriptor
#[derive(Debug, Clone)]
pub struct ObjectField {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub required: bool,
}

impl ObjectField {
    pub fn required(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: false,
        }
    }
}

/// Shape variants
#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(Primitive),
    Array(Box<TypeDescriptor>),
    Mapping {
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
    Tuple(Vec<TypeDescriptor>),
    Union(Vec<TypeDescriptor>),
    Object(Vec<ObjectField>),
    SchemaRef(String),
}

/// Named string formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringFormat {
    Email,
    Uuid,
    Date,
    DateTime,
    Uri,
    Ipv4,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"))
}

fn uuid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .expect("uuid regex")
    })
}

fn uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:[^\s]+$").expect("uri regex"))
}

impl StringFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Uuid => "uuid",
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Uri => "uri",
            Self::Ipv4 => "ipv4",
        }
    }

    pub fn matches(&self, s: &str) -> bool {
        match self {
            Self::Email => email_regex().is_match(s),
            Self::Uuid => uuid_regex().is_match(s),
            Self::Date => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            Self::DateTime => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            Self::Uri => uri_regex().is_match(s),
            Self::Ipv4 => s.parse::<std::net::Ipv4Addr>().is_ok(),
        }
    }
}

/// Compiled regular expression that serializes as its source text
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|source| SchemaError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.0.is_match(s)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.0.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Regex::new(&source).map(Self).map_err(serde::de::Error::custom)
    }
}

/// A single builtin check attached to a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    MinLength(usize),
    MaxLength(usize),
    MinItems(usize),
    MaxItems(usize),
    Size(usize),
    Gt(f64),
    Lt(f64),
    Gteq(f64),
    Lteq(f64),
    Choices(Vec<Value>),
    Pattern(Pattern),
    Format(StringFormat),
}

/// Constraint discriminant, used to key message overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    MinLength,
    MaxLength,
    MinItems,
    MaxItems,
    Size,
    Gt,
    Lt,
    Gteq,
    Lteq,
    Choices,
    Pattern,
    Format,
    /// Overrides the message of a failed type check
    Type,
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::MinLength(_) => ConstraintKind::MinLength,
            Self::MaxLength(_) => ConstraintKind::MaxLength,
            Self::MinItems(_) => ConstraintKind::MinItems,
            Self::MaxItems(_) => ConstraintKind::MaxItems,
            Self::Size(_) => ConstraintKind::Size,
            Self::Gt(_) => ConstraintKind::Gt,
            Self::Lt(_) => ConstraintKind::Lt,
            Self::Gteq(_) => ConstraintKind::Gteq,
            Self::Lteq(_) => ConstraintKind::Lteq,
            Self::Choices(_) => ConstraintKind::Choices,
            Self::Pattern(_) => ConstraintKind::Pattern,
            Self::Format(_) => ConstraintKind::Format,
        }
    }

    /// Error code reported when this constraint fails
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MinLength(_) => ErrorCode::MinLength,
            Self::MaxLength(_) => ErrorCode::MaxLength,
            Self::MinItems(_) => ErrorCode::MinItems,
            Self::MaxItems(_) => ErrorCode::MaxItems,
            Self::Size(_) => ErrorCode::Size,
            Self::Gt(_) => ErrorCode::Gt,
            Self::Lt(_) => ErrorCode::Lt,
            Self::Gteq(_) => ErrorCode::Gteq,
            Self::Lteq(_) => ErrorCode::Lteq,
            Self::Choices(_) => ErrorCode::Choices,
            Self::Pattern(_) | Self::Format(_) => ErrorCode::Format,
        }
    }
}

/// Immutable description of an expected value shape
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    kind: TypeKind,
    constraints: Vec<Constraint>,
    messages: BTreeMap<ConstraintKind, String>,
    validators: Vec<FieldValidator>,
    all_items: bool,
}

impl TypeDescriptor {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            constraints: Vec::new(),
            messages: BTreeMap::new(),
            validators: Vec::new(),
            all_items: true,
        }
    }

    pub fn primitive(p: Primitive) -> Self {
        Self::new(TypeKind::Primitive(p))
    }

    pub fn string() -> Self {
        Self::primitive(Primitive::String)
    }

    pub fn integer() -> Self {
        Self::primitive(Primitive::Integer)
    }

    pub fn number() -> Self {
        Self::primitive(Primitive::Number)
    }

    pub fn boolean() -> Self {
        Self::primitive(Primitive::Boolean)
    }

    pub fn null() -> Self {
        Self::primitive(Primitive::Null)
    }

    pub fn any() -> Self {
        Self::primitive(Primitive::Any)
    }

    pub fn array(items: TypeDescriptor) -> Self {
        Self::new(TypeKind::Array(Box::new(items)))
    }

    pub fn mapping(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::new(TypeKind::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn tuple(items: Vec<TypeDescriptor>) -> Self {
        Self::new(TypeKind::Tuple(items))
    }

    pub fn union(alternatives: Vec<TypeDescriptor>) -> Self {
        Self::new(TypeKind::Union(alternatives))
    }

    /// `T | null`
    pub fn nullable(inner: TypeDescriptor) -> Self {
        Self::union(vec![inner, Self::null()])
    }

    pub fn object(fields: Vec<ObjectField>) -> Self {
        Self::new(TypeKind::Object(fields))
    }

    pub fn schema_ref(name: impl Into<String>) -> Self {
        Self::new(TypeKind::SchemaRef(name.into()))
    }

    // --- constraint builders ---

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn min_length(self, n: usize) -> Self {
        self.with(Constraint::MinLength(n))
    }

    pub fn max_length(self, n: usize) -> Self {
        self.with(Constraint::MaxLength(n))
    }

    pub fn min_items(self, n: usize) -> Self {
        self.with(Constraint::MinItems(n))
    }

    pub fn max_items(self, n: usize) -> Self {
        self.with(Constraint::MaxItems(n))
    }

    pub fn size(self, n: usize) -> Self {
        self.with(Constraint::Size(n))
    }

    pub fn gt(self, bound: f64) -> Self {
        self.with(Constraint::Gt(bound))
    }

    pub fn lt(self, bound: f64) -> Self {
        self.with(Constraint::Lt(bound))
    }

    pub fn gteq(self, bound: f64) -> Self {
        self.with(Constraint::Gteq(bound))
    }

    pub fn lteq(self, bound: f64) -> Self {
        self.with(Constraint::Lteq(bound))
    }

    pub fn choices<I, V>(self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(Constraint::Choices(choices.into_iter().map(Into::into).collect()))
    }

    pub fn pattern(self, pattern: &str) -> Result<Self> {
        Ok(self.with(Constraint::Pattern(Pattern::new(pattern)?)))
    }

    pub fn format(self, format: StringFormat) -> Self {
        self.with(Constraint::Format(format))
    }

    /// Override the message reported when `kind` fails
    pub fn message(mut self, kind: ConstraintKind, message: impl Into<String>) -> Self {
        self.messages.insert(kind, message.into());
        self
    }

    pub fn validator(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// For arrays: report every failing element (true) or only the first (false)
    pub fn all_items(mut self, all: bool) -> Self {
        self.all_items = all;
        self
    }

    // --- accessors ---

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn messages(&self) -> &BTreeMap<ConstraintKind, String> {
        &self.messages
    }

    pub fn custom_message(&self, kind: ConstraintKind) -> Option<&str> {
        self.messages.get(&kind).map(String::as_str)
    }

    pub fn validators(&self) -> &[FieldValidator] {
        &self.validators
    }

    pub fn collects_all_items(&self) -> bool {
        self.all_items
    }

    /// The expected primitive, if this is a primitive descriptor
    pub fn expected_primitive(&self) -> Option<Primitive> {
        match self.kind {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// Schema names referenced anywhere in this descriptor
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            TypeKind::Primitive(_) => {}
            TypeKind::Array(items) => items.collect_references(out),
            TypeKind::Mapping { key, value } => {
                key.collect_references(out);
                value.collect_references(out);
            }
            TypeKind::Tuple(items) | TypeKind::Union(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            TypeKind::Object(fields) => {
                for field in fields {
                    field.descriptor.collect_references(out);
                }
            }
            TypeKind::SchemaRef(name) => out.push(name),
        }
    }

    /// Short human-readable type name, used in messages
    pub fn describe(&self) -> String {
        match &self.kind {
            TypeKind::Primitive(p) => p.as_str().to_string(),
            TypeKind::Array(items) => format!("array[{}]", items.describe()),
            TypeKind::Mapping { key, value } => {
                format!("mapping[{}, {}]", key.describe(), value.describe())
            }
            TypeKind::Tuple(items) => format!(
                "tuple[{}]",
                items.iter().map(|d| d.describe()).collect::<Vec<_>>().join(", ")
            ),
            TypeKind::Union(items) => items
                .iter()
                .map(|d| d.describe())
                .collect::<Vec<_>>()
                .join(" | "),
            TypeKind::Object(_) => "object".to_string(),
            TypeKind::SchemaRef(name) => name.clone(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
