//! Shared typed models used across indexing, reconciliation, and storage.
//!
//! A descriptor file is the `schema.yml`-style document that sits next to a
//! group of model sources. Only the keys the engine reasons about are typed;
//! everything else is carried through untouched in the `rest` mappings so a
//! round trip never drops user content. Entries write `name` and
//! `description` first and every other key where it was read.

use indexmap::IndexMap;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

// ---------------------------------------------------------------------------
// Contract constants
// ---------------------------------------------------------------------------

/// Placeholder description for a model nobody documented yet.
pub const MODEL_NOT_DOCUMENTED: &str = "No description for this model.";

/// Placeholder description for a column nobody documented yet.
pub const COLUMN_NOT_DOCUMENTED: &str = "No description for this column.";

/// `version:` written into freshly created descriptor files.
pub const DESCRIPTOR_VERSION: u64 = 2;

/// Integrity tests injected for a declared primary key.
pub const UNIQUE_TEST: &str = "unique";
pub const NOT_NULL_TEST: &str = "not_null";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Merge two identifier lists, `incoming` first, dropping repeats while
/// keeping first-seen order.
pub fn merge_identifiers(incoming: &[String], existing: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(incoming.len() + existing.len());
    for identifier in incoming.iter().chain(existing.iter()) {
        if !merged.contains(identifier) {
            merged.push(identifier.clone());
        }
    }
    merged
}

/// True when a description carries real content rather than the sentinel.
pub fn is_documented_description(description: Option<&str>) -> bool {
    match description {
        Some(text) => !text.trim().is_empty() && text != COLUMN_NOT_DOCUMENTED,
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Key layout
// ---------------------------------------------------------------------------

/// Order in which an entry's keys were read, so they can be written back in
/// place. Layout alone never makes two entries unequal.
#[derive(Clone, Debug, Default)]
pub struct KeyOrder(Vec<String>);

impl PartialEq for KeyOrder {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl KeyOrder {
    fn of(map: &Mapping) -> Self {
        Self(
            map.keys()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        )
    }

    /// Keys never read sort after every known key.
    fn position(&self, key: &Value) -> usize {
        key.as_str()
            .and_then(|key| self.0.iter().position(|k| k == key))
            .unwrap_or(usize::MAX)
    }
}

/// A raw mapping being split into typed fields; what is left is `rest`.
struct RawEntry {
    rest: Mapping,
    order: KeyOrder,
}

impl RawEntry {
    fn read<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rest = Mapping::deserialize(deserializer)?;
        let order = KeyOrder::of(&rest);
        Ok(Self { rest, order })
    }

    /// Remove `key` and decode it; a missing key and a null value are `None`.
    fn take<T: DeserializeOwned, E: de::Error>(&mut self, key: &str) -> Result<Option<T>, E> {
        let Some(value) = self.rest.get(key).cloned() else {
            return Ok(None);
        };
        // Rebuilt rather than removed in place so the remaining keys keep their order.
        self.rest = std::mem::take(&mut self.rest)
            .into_iter()
            .filter(|(k, _)| k.as_str() != Some(key))
            .collect();
        serde_yaml::from_value::<Option<T>>(value).map_err(E::custom)
    }
}

fn to_value<T: Serialize, E: ser::Error>(value: &T) -> Result<Value, E> {
    serde_yaml::to_value(value).map_err(E::custom)
}

/// Lay out an entry: `leading` keys first, then `fields` and `rest` in the
/// order they were read. Keys added since go last.
fn layout(
    leading: Vec<(&str, Value)>,
    fields: Vec<(&str, Value)>,
    rest: &Mapping,
    order: &KeyOrder,
) -> Mapping {
    let mut trailing: Vec<(Value, Value)> = fields
        .into_iter()
        .map(|(key, value)| (Value::from(key), value))
        .chain(rest.iter().map(|(key, value)| (key.clone(), value.clone())))
        .collect();
    trailing.sort_by_key(|(key, _)| order.position(key));
    leading
        .into_iter()
        .map(|(key, value)| (Value::from(key), value))
        .chain(trailing)
        .collect()
}

// ---------------------------------------------------------------------------
// TestSpec
// ---------------------------------------------------------------------------

/// One entry of a column's `tests:` list.
///
/// dbt accepts either a bare name (`- unique`) or a single-key mapping with
/// arguments (`- accepted_values: {values: [a, b]}`); both are kept verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestSpec(pub Value);

impl TestSpec {
    pub fn named(name: &str) -> Self {
        Self(Value::String(name.to_string()))
    }

    /// The test identifier, if the entry has a recognisable shape.
    pub fn name(&self) -> Option<&str> {
        match &self.0 {
            Value::String(name) => Some(name.as_str()),
            Value::Mapping(map) => map.keys().next().and_then(Value::as_str),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnEntry
// ---------------------------------------------------------------------------

/// A documented column of a model.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnEntry {
    pub name: String,
    pub description: Option<String>,
    pub tests: Option<Vec<TestSpec>>,
    pub tags: Option<Vec<String>>,
    pub rest: Mapping,
    pub order: KeyOrder,
}

impl<'de> Deserialize<'de> for ColumnEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = RawEntry::read(deserializer)?;
        let name = raw
            .take::<String, D::Error>("name")?
            .ok_or_else(|| <D::Error as de::Error>::missing_field("name"))?;
        let description = raw.take::<String, D::Error>("description")?;
        let tests = raw.take::<Vec<TestSpec>, D::Error>("tests")?;
        let tags = raw.take::<Vec<String>, D::Error>("tags")?;
        Ok(Self {
            name,
            description,
            tests,
            tags,
            rest: raw.rest,
            order: raw.order,
        })
    }
}

impl Serialize for ColumnEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut leading = vec![("name", Value::from(self.name.as_str()))];
        if let Some(description) = &self.description {
            leading.push(("description", Value::from(description.as_str())));
        }
        let mut fields = Vec::new();
        if let Some(tests) = &self.tests {
            fields.push(("tests", to_value::<_, S::Error>(tests)?));
        }
        if let Some(tags) = &self.tags {
            fields.push(("tags", to_value::<_, S::Error>(tags)?));
        }
        layout(leading, fields, &self.rest, &self.order).serialize(serializer)
    }
}

impl ColumnEntry {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            tests: None,
            tags: None,
            rest: Mapping::new(),
            order: KeyOrder::default(),
        }
    }

    /// Description with the sentinel standing in for a missing one.
    pub fn description_or_sentinel(&self) -> &str {
        self.description.as_deref().unwrap_or(COLUMN_NOT_DOCUMENTED)
    }

    pub fn is_documented(&self) -> bool {
        is_documented_description(self.description.as_deref())
    }

    pub fn test_names(&self) -> Vec<String> {
        self.tests
            .iter()
            .flatten()
            .filter_map(TestSpec::name)
            .map(str::to_string)
            .collect()
    }

    pub fn has_test(&self, name: &str) -> bool {
        self.tests
            .iter()
            .flatten()
            .any(|spec| spec.name() == Some(name))
    }

    /// Merge test names into the column, `incoming` first. An incoming name
    /// that already exists keeps its original spec (and its arguments).
    pub fn merge_tests(&mut self, incoming: &[String]) {
        if incoming.is_empty() {
            return;
        }
        let existing = self.tests.take().unwrap_or_default();
        let mut merged: Vec<TestSpec> = Vec::with_capacity(existing.len() + incoming.len());
        let mut seen: Vec<String> = Vec::new();

        for name in incoming {
            if seen.contains(name) {
                continue;
            }
            let spec = existing
                .iter()
                .find(|spec| spec.name() == Some(name.as_str()))
                .cloned()
                .unwrap_or_else(|| TestSpec::named(name));
            seen.push(name.clone());
            merged.push(spec);
        }
        for spec in existing {
            match spec.name() {
                Some(name) if seen.iter().any(|s| s == name) => continue,
                Some(name) => seen.push(name.to_string()),
                None => {}
            }
            merged.push(spec);
        }
        self.tests = Some(merged);
    }

    pub fn merge_tags(&mut self, incoming: &[String]) {
        if incoming.is_empty() {
            return;
        }
        let existing = self.tags.take().unwrap_or_default();
        self.tags = Some(merge_identifiers(incoming, &existing));
    }

    /// Drop the named tests; the `tests` key disappears once it is empty.
    /// Returns whether anything was removed.
    pub fn remove_tests(&mut self, names: &[String]) -> bool {
        let Some(tests) = self.tests.as_mut() else {
            return false;
        };
        let before = tests.len();
        tests.retain(|spec| match spec.name() {
            Some(name) => !names.iter().any(|n| n == name),
            None => true,
        });
        let removed = tests.len() != before;
        if tests.is_empty() {
            self.tests = None;
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// ModelEntry
// ---------------------------------------------------------------------------

/// One model's documentation entry inside a descriptor file.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelEntry {
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<ColumnEntry>,
    pub rest: Mapping,
    pub order: KeyOrder,
}

impl<'de> Deserialize<'de> for ModelEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = RawEntry::read(deserializer)?;
        let name = raw
            .take::<String, D::Error>("name")?
            .ok_or_else(|| <D::Error as de::Error>::missing_field("name"))?;
        let description = raw.take::<String, D::Error>("description")?;
        let columns = raw
            .take::<Vec<ColumnEntry>, D::Error>("columns")?
            .unwrap_or_default();
        Ok(Self {
            name,
            description,
            columns,
            rest: raw.rest,
            order: raw.order,
        })
    }
}

impl Serialize for ModelEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut leading = vec![("name", Value::from(self.name.as_str()))];
        if let Some(description) = &self.description {
            leading.push(("description", Value::from(description.as_str())));
        }
        let mut fields = Vec::new();
        if !self.columns.is_empty() {
            fields.push(("columns", to_value::<_, S::Error>(&self.columns)?));
        }
        layout(leading, fields, &self.rest, &self.order).serialize(serializer)
    }
}

impl ModelEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(MODEL_NOT_DOCUMENTED.to_string()),
            columns: Vec::new(),
            rest: Mapping::new(),
            order: KeyOrder::default(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnEntry> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnEntry> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Append a column unless one with the same name already exists.
    pub fn push_column(&mut self, column: ColumnEntry) -> bool {
        if self.has_column(&column.name) {
            return false;
        }
        self.columns.push(column);
        true
    }
}

// ---------------------------------------------------------------------------
// DescriptorFile
// ---------------------------------------------------------------------------

/// A parsed descriptor document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DescriptorFile {
    pub version: Option<Value>,
    pub models: Vec<ModelEntry>,
    pub rest: Mapping,
    pub order: KeyOrder,
}

impl<'de> Deserialize<'de> for DescriptorFile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = RawEntry::read(deserializer)?;
        let version = raw.take::<Value, D::Error>("version")?;
        let models = raw
            .take::<Vec<ModelEntry>, D::Error>("models")?
            .unwrap_or_default();
        Ok(Self {
            version,
            models,
            rest: raw.rest,
            order: raw.order,
        })
    }
}

impl Serialize for DescriptorFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut fields = Vec::new();
        if let Some(version) = &self.version {
            fields.push(("version", version.clone()));
        }
        if !self.models.is_empty() {
            fields.push(("models", to_value::<_, S::Error>(&self.models)?));
        }
        layout(Vec::new(), fields, &self.rest, &self.order).serialize(serializer)
    }
}

impl DescriptorFile {
    /// A fresh envelope carrying the current format version.
    pub fn new() -> Self {
        Self {
            version: Some(Value::Number(DESCRIPTOR_VERSION.into())),
            models: Vec::new(),
            rest: Mapping::new(),
            order: KeyOrder::default(),
        }
    }

    pub fn model(&self, name: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut ModelEntry> {
        self.models.iter_mut().find(|m| m.name == name)
    }

    pub fn contains_model(&self, name: &str) -> bool {
        self.model(name).is_some()
    }

    /// Append a model entry unless one with the same name already exists.
    pub fn push_model(&mut self, model: ModelEntry) -> bool {
        if self.contains_model(&model.name) {
            return false;
        }
        self.models.push(model);
        true
    }
}

// ---------------------------------------------------------------------------
// Column update payload
// ---------------------------------------------------------------------------

/// What the collector decided for one column during a documentation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Column name to update, in collection order.
pub type ColumnUpdatePayload = IndexMap<String, ColumnUpdate>;

/// Tests recorded for a column, as the index remembers them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnTests {
    pub name: String,
    pub tests: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> DescriptorFile {
        serde_yaml::from_str(source).unwrap()
    }

    #[test]
    fn test_merge_identifiers_incoming_first() {
        let merged = merge_identifiers(
            &["hi".to_string(), "you".to_string()],
            &["hi".to_string(), "hey".to_string()],
        );
        assert_eq!(merged, vec!["hi", "you", "hey"]);
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let doc = parse(
            "version: 2\nsources:\n  - name: raw\nmodels:\n  - name: orders\n    config:\n      materialized: table\n    columns:\n      - name: id\n        meta:\n          owner: data\n",
        );
        assert!(doc.rest.contains_key("sources"));
        let orders = doc.model("orders").unwrap();
        assert!(orders.rest.contains_key("config"));
        assert!(orders.column("id").unwrap().rest.contains_key("meta"));

        let dumped = serde_yaml::to_string(&doc).unwrap();
        let reparsed = parse(&dumped);
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_test_spec_names() {
        let column: ColumnEntry = serde_yaml::from_str(
            "name: status\ntests:\n  - not_null\n  - accepted_values:\n      values: [a, b]\n",
        )
        .unwrap();
        assert_eq!(column.test_names(), vec!["not_null", "accepted_values"]);
        assert!(column.has_test("accepted_values"));
        assert!(!column.has_test("unique"));
    }

    #[test]
    fn test_merge_tests_keeps_existing_arguments() {
        let mut column: ColumnEntry = serde_yaml::from_str(
            "name: status\ntests:\n  - accepted_values:\n      values: [a, b]\n",
        )
        .unwrap();
        column.merge_tests(&["unique".to_string(), "accepted_values".to_string()]);
        let tests = column.tests.as_ref().unwrap();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0], TestSpec::named("unique"));
        assert!(matches!(tests[1].0, Value::Mapping(_)));
    }

    #[test]
    fn test_remove_tests_drops_empty_key() {
        let mut column = ColumnEntry::new("id", "the id");
        column.merge_tests(&["unique".to_string()]);
        assert!(column.remove_tests(&["unique".to_string()]));
        assert!(column.tests.is_none());
        assert!(!column.remove_tests(&["unique".to_string()]));
    }

    #[test]
    fn test_push_enforces_unique_names() {
        let mut model = ModelEntry::new("orders");
        assert!(model.push_column(ColumnEntry::new("id", COLUMN_NOT_DOCUMENTED)));
        assert!(!model.push_column(ColumnEntry::new("id", "other")));
        assert_eq!(model.columns.len(), 1);

        let mut doc = DescriptorFile::new();
        assert!(doc.push_model(ModelEntry::new("orders")));
        assert!(!doc.push_model(ModelEntry::new("orders")));
    }

    #[test]
    fn test_is_documented() {
        assert!(ColumnEntry::new("a", "real").is_documented());
        assert!(!ColumnEntry::new("a", COLUMN_NOT_DOCUMENTED).is_documented());
        let bare: ColumnEntry = serde_yaml::from_str("name: a").unwrap();
        assert!(!bare.is_documented());
        assert_eq!(bare.description_or_sentinel(), COLUMN_NOT_DOCUMENTED);
    }
}
