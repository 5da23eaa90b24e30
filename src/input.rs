//! Input records and field-key matching
//!
//! Callers may key input either by a field's native identifier or by its
//! textual form. [`KeyMatcher`] is the one place where keys are normalized;
//! field lookup and strict-mode extras detection both go through it.

use serde_json::Value;
use std::fmt;

/// Validated output record, keyed by field name in declaration order
pub type Record = serde_json::Map<String, Value>;

/// A key in a raw input mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// The schema's native identifier form
    Ident(String),
    /// The textual form (e.g. a key parsed out of JSON)
    Text(String),
}

impl FieldKey {
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(name.into())
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::Text(name.into())
    }

    /// The textual form of this key
    pub fn as_text(&self) -> &str {
        match self {
            Self::Ident(s) | Self::Text(s) => s,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Ident(_))
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, ":{}", s),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Raw, unvalidated input: ordered key/value entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    entries: Vec<(FieldKey, Value)>,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry keyed by native identifier
    pub fn ident(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(FieldKey::Ident(name.into()), value.into());
        self
    }

    /// Add an entry keyed by text
    pub fn text(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(FieldKey::Text(name.into()), value.into());
        self
    }

    /// Insert or replace an entry; identical keys replace in place
    pub fn insert(&mut self, key: FieldKey, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn entries(&self) -> &[(FieldKey, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Interpret a JSON value as input. Only objects qualify; their keys are textual.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|map| Self::from(map.clone()))
    }
}

impl From<serde_json::Map<String, Value>> for RawInput {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(k, v)| (FieldKey::Text(k), v))
                .collect(),
        }
    }
}

impl FromIterator<(FieldKey, Value)> for RawInput {
    fn from_iter<I: IntoIterator<Item = (FieldKey, Value)>>(iter: I) -> Self {
        let mut input = Self::new();
        for (k, v) in iter {
            input.insert(k, v);
        }
        input
    }
}

/// Key normalization shared by field lookup and strict-mode extras detection
#[derive(Debug, Clone, Copy)]
pub struct KeyMatcher {
    case_sensitive: bool,
}

impl Default for KeyMatcher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl KeyMatcher {
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    /// Normalized textual form used for every comparison
    pub fn normalize(&self, text: &str) -> String {
        if self.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }

    fn matches(&self, key: &str, field: &str) -> bool {
        if self.case_sensitive {
            key == field
        } else {
            key.to_lowercase() == field.to_lowercase()
        }
    }

    /// Find the entry for `field`: native form first, then textual form.
    /// Returns the entry's index in the input.
    pub fn lookup<'a>(&self, input: &'a RawInput, field: &str) -> Option<(usize, &'a Value)> {
        let entries = input.entries();
        let native = entries
            .iter()
            .position(|(k, _)| k.is_native() && self.matches(k.as_text(), field));
        let found = native.or_else(|| {
            entries
                .iter()
                .position(|(k, _)| !k.is_native() && self.matches(k.as_text(), field))
        });
        found.map(|i| (i, &entries[i].1))
    }

    /// Input keys whose normalized form matches no declared field, in input order.
    /// Both key forms of a declared field count as matched.
    pub fn unmatched<'a, I>(&self, input: &'a RawInput, declared: I) -> Vec<&'a FieldKey>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let declared: std::collections::HashSet<String> = declared
            .into_iter()
            .map(|name| self.normalize(name.as_ref()))
            .collect();
        input
            .entries()
            .iter()
            .map(|(k, _)| k)
            .filter(|k| !declared.contains(&self.normalize(k.as_text())))
            .collect()
    }
}
