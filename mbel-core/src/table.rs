//! The compiled artifact: a flat, string-keyed table of translations.
//!
//! Ordinary keys hold a [`CompiledValue`]. Cross-cutting data lives in
//! dedicated fields that serialize under the reserved keys `__meta`,
//! `__terms`, `__ai` and `__imports`; no translation key may begin with
//! `__`, so the two never collide.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const META_KEY: &str = "__meta";
pub const TERMS_KEY: &str = "__terms";
pub const ANNOTATIONS_KEY: &str = "__ai";
pub const IMPORTS_KEY: &str = "__imports";
/// Bucket in `__ai` for annotations that precede no key.
pub const GLOBAL_ANNOTATIONS: &str = "__global";

pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with("__")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompiledValue {
    Text(String),
    Block(LogicBlock),
}

/// A compiled `name(argument) { ... }` expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicBlock {
    /// Control variable name, e.g. `n` in `items(n)`.
    pub argument: String,
    /// Keyword and integer conditions, keyed by their literal text.
    #[serde(default)]
    pub cases: BTreeMap<String, String>,
    /// Range conditions in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<RangeCase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeCase {
    pub start: i64,
    pub end: i64,
    pub value: String,
}

impl RangeCase {
    pub fn contains(&self, n: i64) -> bool {
        self.start <= n && n <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledTable {
    #[serde(rename = "__meta", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    #[serde(rename = "__terms", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub terms: BTreeMap<String, String>,
    /// Annotations grouped by target key, or under `__global`.
    #[serde(rename = "__ai", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Vec<AnnotationEntry>>,
    #[serde(rename = "__imports", default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(flatten)]
    entries: BTreeMap<String, CompiledValue>,
}

impl CompiledTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CompiledValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &CompiledValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Language from `@lang`, if the source declared one.
    pub fn language(&self) -> Option<&str> {
        self.meta.get("lang").map(String::as_str)
    }

    /// Insert a translation. Reserved and already-present keys are rejected.
    pub fn insert(&mut self, key: String, value: CompiledValue, line: u32) -> Result<(), CoreError> {
        if is_reserved_key(&key) {
            return Err(CoreError::ReservedKey { key, line });
        }
        if self.entries.contains_key(&key) {
            return Err(CoreError::DuplicateKey { key, line });
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Merge `other` into this table, prefixing its translation keys and
    /// annotation targets with `namespace`.
    ///
    /// Nothing is merged if a prefixed key already exists.
    pub fn merge_namespaced(&mut self, other: CompiledTable, namespace: Option<&str>) -> Result<(), CoreError> {
        let prefix = |key: &str| match namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}.{key}"),
            _ => key.to_string(),
        };

        if let Some(key) = other
            .entries
            .keys()
            .map(|key| prefix(key))
            .find(|key| self.entries.contains_key(key))
        {
            return Err(CoreError::DuplicateKey { key, line: 0 });
        }

        for (key, value) in other.entries {
            self.entries.insert(prefix(&key), value);
        }
        for (target, entries) in other.annotations {
            let target = if target == GLOBAL_ANNOTATIONS {
                target
            } else {
                prefix(&target)
            };
            self.annotations.entry(target).or_default().extend(entries);
        }
        self.meta.extend(other.meta);
        self.terms.extend(other.terms);
        for import in other.imports {
            if !self.imports.contains(&import) {
                self.imports.push(import);
            }
        }
        Ok(())
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, CoreError> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CompiledValue {
        CompiledValue::Text(s.to_string())
    }

    #[test]
    fn rejects_reserved_and_duplicate_keys() {
        let mut table = CompiledTable::new();
        table.insert("title".into(), text("A"), 1).expect("insert");
        assert!(matches!(
            table.insert("title".into(), text("B"), 2),
            Err(CoreError::DuplicateKey { line: 2, .. })
        ));
        assert!(matches!(
            table.insert("__meta".into(), text("x"), 3),
            Err(CoreError::ReservedKey { .. })
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn json_uses_reserved_keys_for_side_data() {
        let mut table = CompiledTable::new();
        table.meta.insert("lang".into(), "pl".into());
        table.terms.insert("brand".into(), "Acme".into());
        table.imports.push("common".into());
        table.insert("title".into(), text("Tytuł"), 1).expect("insert");
        table
            .insert(
                "items".into(),
                CompiledValue::Block(LogicBlock {
                    argument: "n".into(),
                    cases: BTreeMap::from([("one".to_string(), "jeden".to_string())]),
                    ranges: vec![RangeCase {
                        start: 2,
                        end: 4,
                        value: "kilka".into(),
                    }],
                }),
                2,
            )
            .expect("insert");

        let value: serde_json::Value =
            serde_json::from_str(&table.to_json(false).expect("json")).expect("parse json");
        assert_eq!(value["__meta"]["lang"], "pl");
        assert_eq!(value["__terms"]["brand"], "Acme");
        assert_eq!(value["__imports"][0], "common");
        assert_eq!(value["title"], "Tytuł");
        assert_eq!(value["items"]["argument"], "n");
        assert_eq!(value["items"]["ranges"][0]["end"], 4);
        assert!(value.get("__ai").is_none());
    }

    #[test]
    fn json_reads_back_into_a_table() {
        let json = r#"{
            "__meta": {"lang": "en"},
            "greeting": "Hi {name}",
            "items": {"argument": "n", "cases": {"one": "1 item", "other": "{n} items"}}
        }"#;
        let table = CompiledTable::from_json(json).expect("table");
        assert_eq!(table.language(), Some("en"));
        assert_eq!(table.get("greeting"), Some(&text("Hi {name}")));
        let Some(CompiledValue::Block(block)) = table.get("items") else {
            panic!("expected block");
        };
        assert_eq!(block.cases["other"], "{n} items");
        assert!(block.ranges.is_empty());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn merge_prefixes_keys_and_annotation_targets() {
        let mut unit = CompiledTable::new();
        unit.insert("title".into(), text("Login"), 1).expect("insert");
        unit.annotations.insert(
            "title".into(),
            vec![AnnotationEntry {
                kind: "Context".into(),
                value: "header".into(),
            }],
        );
        unit.annotations.insert(GLOBAL_ANNOTATIONS.into(), vec![]);
        unit.meta.insert("lang".into(), "en".into());

        let mut merged = CompiledTable::new();
        merged
            .merge_namespaced(unit.clone(), Some("auth"))
            .expect("merge");
        assert!(merged.contains_key("auth.title"));
        assert!(merged.annotations.contains_key("auth.title"));
        assert!(merged.annotations.contains_key(GLOBAL_ANNOTATIONS));
        assert_eq!(merged.language(), Some("en"));

        let err = merged.merge_namespaced(unit, Some("auth")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { key, .. } if key == "auth.title"));
    }
}
