//! Structured tables and record-level changes
//!
//! A structured dataset file (`.gtab`) is a JSON document holding one table:
//! a key-field name and a list of rows. Rows are maps from field name to
//! [`FieldValue`]; geometry travels as an ordinary blob field, base64-encoded
//! on the wire just as geodiff changesets encode geometry payloads.
//!
//! Record identity is the key field's value, never the row position:
//! reordering rows produces an empty diff.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::RecordKey;

// ============================================================================
// FieldValue
// ============================================================================

/// A single field value within a record
///
/// The closed set of value types a structured table can hold. Comparison is
/// bytewise: two `Real` values are equal only if their bit patterns are.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    /// Binary payload (geometry WKB, attachments); base64 in JSON
    Blob(Vec<u8>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            // bytewise comparison, so NaN payloads and -0.0 vs 0.0 both count
            (FieldValue::Real(a), FieldValue::Real(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Blob(a), FieldValue::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    /// Canonical string rendering used to derive a [`RecordKey`]
    ///
    /// Only value types usable as primary keys render; `Null` and `Blob`
    /// are rejected.
    pub fn canonical_key(&self) -> Result<String, DomainError> {
        match self {
            FieldValue::Int(n) => Ok(n.to_string()),
            FieldValue::Text(s) => Ok(s.clone()),
            FieldValue::Bool(b) => Ok(b.to_string()),
            FieldValue::Real(r) => Ok(r.to_string()),
            FieldValue::Null | FieldValue::Blob(_) => Err(DomainError::InvalidRecordKey(
                "null and blob values cannot serve as record keys".to_string(),
            )),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(n) => Value::from(*n),
            FieldValue::Real(r) => {
                // JSON cannot carry NaN/Inf; degrade to null
                serde_json::Number::from_f64(*r).map(Value::Number).unwrap_or(Value::Null)
            }
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Blob(bytes) => {
                let mut map = serde_json::Map::with_capacity(1);
                map.insert("$blob".to_string(), Value::String(BASE64.encode(bytes)));
                Value::Object(map)
            }
        }
    }

    fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FieldValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(FieldValue::Real(f))
                } else {
                    Err(format!("unrepresentable number: {n}"))
                }
            }
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Object(map) => match map.get("$blob") {
                Some(Value::String(b64)) if map.len() == 1 => BASE64
                    .decode(b64)
                    .map(FieldValue::Blob)
                    .map_err(|e| format!("invalid base64 blob: {e}")),
                _ => Err("objects other than {\"$blob\": ...} are not field values".to_string()),
            },
            Value::Array(_) => Err("arrays are not field values".to_string()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        FieldValue::from_json(&value).map_err(D::Error::custom)
    }
}

/// A record: field name to value
pub type Row = BTreeMap<String, FieldValue>;

// ============================================================================
// Table
// ============================================================================

/// A parsed structured table file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name (layer name)
    pub name: String,
    /// Name of the key field providing record identity
    pub key: String,
    /// Records; order is not significant
    pub rows: Vec<Row>,
}

impl Table {
    /// Parse a `.gtab` file's bytes
    pub fn from_json_bytes(path: &str, bytes: &[u8]) -> Result<Self, DomainError> {
        let table: Table =
            serde_json::from_slice(bytes).map_err(|e| DomainError::InvalidTable {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        if table.key.is_empty() {
            return Err(DomainError::InvalidTable {
                path: path.to_string(),
                reason: "missing key field name".to_string(),
            });
        }
        Ok(table)
    }

    /// Serialize deterministically: rows sorted by record key
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, DomainError> {
        let mut sorted = self.clone();
        let keys: Result<Vec<_>, _> =
            sorted.rows.iter().map(|row| self.record_key(row)).collect();
        let keys = keys?;
        let mut paired: Vec<_> = keys.into_iter().zip(sorted.rows).collect();
        paired.sort_by(|(a, _), (b, _)| a.cmp(b));
        sorted.rows = paired.into_iter().map(|(_, row)| row).collect();
        serde_json::to_vec_pretty(&sorted).map_err(|e| DomainError::InvalidTable {
            path: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// The record key of a single row
    pub fn record_key(&self, row: &Row) -> Result<RecordKey, DomainError> {
        let value = row.get(&self.key).ok_or_else(|| DomainError::InvalidTable {
            path: self.name.clone(),
            reason: format!("row is missing key field '{}'", self.key),
        })?;
        RecordKey::new(value.canonical_key()?)
    }

    /// Index rows by record key; duplicate keys are invalid
    pub fn by_key(&self) -> Result<BTreeMap<RecordKey, Row>, DomainError> {
        let mut out = BTreeMap::new();
        for row in &self.rows {
            let key = self.record_key(row)?;
            if out.insert(key.clone(), row.clone()).is_some() {
                return Err(DomainError::InvalidTable {
                    path: self.name.clone(),
                    reason: format!("duplicate record key '{key}'"),
                });
            }
        }
        Ok(out)
    }

    /// Apply a record-level diff, producing the resulting table
    pub fn apply(&self, diff: &TableDiff) -> Result<Table, DomainError> {
        let mut rows = self.by_key()?;
        for (key, change) in &diff.rows {
            match change {
                RecordChange::Inserted { fields } => {
                    rows.insert(key.clone(), fields.clone());
                }
                RecordChange::Deleted { .. } => {
                    rows.remove(key);
                }
                RecordChange::Updated { new, .. } => {
                    let row = rows.get_mut(key).ok_or_else(|| DomainError::InvalidTable {
                        path: self.name.clone(),
                        reason: format!("update for unknown record '{key}'"),
                    })?;
                    for (field, value) in new {
                        row.insert(field.clone(), value.clone());
                    }
                }
            }
        }
        Ok(Table {
            name: self.name.clone(),
            key: self.key.clone(),
            rows: rows.into_values().collect(),
        })
    }
}

// ============================================================================
// RecordChange and TableDiff
// ============================================================================

/// One record's change between two table states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RecordChange {
    /// Record key is new: carries the full row
    Inserted { fields: Row },
    /// Record key vanished: carries the full prior row
    Deleted { old: Row },
    /// Record exists on both sides with differing values; `old` and `new`
    /// carry only the changed fields
    Updated { old: Row, new: Row },
}

impl RecordChange {
    /// Names of the fields this change touches
    pub fn touched_fields(&self) -> Vec<&str> {
        match self {
            RecordChange::Inserted { fields } => fields.keys().map(String::as_str).collect(),
            RecordChange::Deleted { old } => old.keys().map(String::as_str).collect(),
            RecordChange::Updated { new, .. } => new.keys().map(String::as_str).collect(),
        }
    }
}

/// Record-level diff of one structured table, keyed by record identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDiff {
    /// Key field both sides agreed on
    pub key_field: String,
    pub rows: BTreeMap<RecordKey, RecordChange>,
}

impl TableDiff {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            rows: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sequential composition: `self` applied first, then `next`
    ///
    /// Used to collapse a run of remote per-version diffs into one cumulative
    /// change relative to the base version.
    #[must_use]
    pub fn compose(&self, next: &TableDiff) -> TableDiff {
        let mut rows = self.rows.clone();
        for (key, second) in &next.rows {
            let merged = match (rows.remove(key), second) {
                (None, change) => Some(change.clone()),
                // insert then update: still an insert, with updated fields folded in
                (Some(RecordChange::Inserted { mut fields }), RecordChange::Updated { new, .. }) => {
                    for (f, v) in new {
                        fields.insert(f.clone(), v.clone());
                    }
                    Some(RecordChange::Inserted { fields })
                }
                // insert then delete: cancels out
                (Some(RecordChange::Inserted { .. }), RecordChange::Deleted { .. }) => None,
                (Some(RecordChange::Updated { old: old1, new: new1 }), RecordChange::Updated { old: old2, new: new2 }) => {
                    let mut old = old2.clone();
                    // fields touched by the first update keep their original old values
                    for (f, v) in &old1 {
                        old.insert(f.clone(), v.clone());
                    }
                    let mut new = new1.clone();
                    for (f, v) in new2 {
                        new.insert(f.clone(), v.clone());
                    }
                    Some(RecordChange::Updated { old, new })
                }
                (Some(RecordChange::Updated { old: old1, .. }), RecordChange::Deleted { old }) => {
                    let mut old = old.clone();
                    for (f, v) in &old1 {
                        old.insert(f.clone(), v.clone());
                    }
                    Some(RecordChange::Deleted { old })
                }
                // delete then re-insert: relative to the original base this is an update
                (Some(RecordChange::Deleted { old }), RecordChange::Inserted { fields }) => {
                    Some(RecordChange::Updated {
                        old,
                        new: fields.clone(),
                    })
                }
                // remaining pairings are inconsistent histories; the later
                // change is authoritative
                (Some(_), change) => Some(change.clone()),
            };
            if let Some(change) = merged {
                rows.insert(key.clone(), change);
            }
        }
        TableDiff {
            key_field: self.key_field.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, FieldValue)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn sample_table() -> Table {
        Table {
            name: "rivers".to_string(),
            key: "id".to_string(),
            rows: vec![
                row(&[
                    ("id", FieldValue::Int(1)),
                    ("name", FieldValue::Text("Vltava".into())),
                    ("geom", FieldValue::Blob(vec![1, 2, 3])),
                ]),
                row(&[
                    ("id", FieldValue::Int(2)),
                    ("name", FieldValue::Text("Labe".into())),
                    ("geom", FieldValue::Null),
                ]),
            ],
        }
    }

    #[test]
    fn test_field_value_bytewise_equality() {
        assert_eq!(FieldValue::Real(1.5), FieldValue::Real(1.5));
        assert_ne!(FieldValue::Real(0.0), FieldValue::Real(-0.0));
        assert_ne!(FieldValue::Int(1), FieldValue::Real(1.0));
    }

    #[test]
    fn test_field_value_json_roundtrip() {
        for value in [
            FieldValue::Null,
            FieldValue::Bool(true),
            FieldValue::Int(-42),
            FieldValue::Real(2.25),
            FieldValue::Text("říčka".into()),
            FieldValue::Blob(vec![0, 255, 9]),
        ] {
            let json = serde_json::to_string(&value).unwrap();
            let back: FieldValue = serde_json::from_str(&json).unwrap();
            assert_eq!(value, back, "roundtrip failed for {json}");
        }
    }

    #[test]
    fn test_blob_encodes_as_base64_object() {
        let json = serde_json::to_value(FieldValue::Blob(vec![1, 2, 3])).unwrap();
        assert_eq!(json["$blob"], serde_json::json!("AQID"));
    }

    #[test]
    fn test_table_roundtrip_and_key_index() {
        let table = sample_table();
        let bytes = table.to_json_bytes().unwrap();
        let back = Table::from_json_bytes("rivers.gtab", &bytes).unwrap();
        assert_eq!(back.key, "id");
        let by_key = back.by_key().unwrap();
        assert!(by_key.contains_key(&RecordKey::new("1").unwrap()));
        assert!(by_key.contains_key(&RecordKey::new("2").unwrap()));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut table = sample_table();
        table.rows.push(row(&[("id", FieldValue::Int(1))]));
        assert!(table.by_key().is_err());
    }

    #[test]
    fn test_apply_insert_update_delete() {
        let table = sample_table();
        let mut diff = TableDiff::new("id");
        diff.rows.insert(
            RecordKey::new("3").unwrap(),
            RecordChange::Inserted {
                fields: row(&[("id", FieldValue::Int(3)), ("name", FieldValue::Text("Morava".into()))]),
            },
        );
        diff.rows.insert(
            RecordKey::new("1").unwrap(),
            RecordChange::Updated {
                old: row(&[("name", FieldValue::Text("Vltava".into()))]),
                new: row(&[("name", FieldValue::Text("Moldau".into()))]),
            },
        );
        diff.rows.insert(
            RecordKey::new("2").unwrap(),
            RecordChange::Deleted {
                old: row(&[("id", FieldValue::Int(2))]),
            },
        );

        let result = table.apply(&diff).unwrap();
        let by_key = result.by_key().unwrap();
        assert_eq!(by_key.len(), 2);
        assert_eq!(
            by_key[&RecordKey::new("1").unwrap()]["name"],
            FieldValue::Text("Moldau".into())
        );
        assert!(by_key.contains_key(&RecordKey::new("3").unwrap()));
    }

    #[test]
    fn test_apply_update_unknown_record_fails() {
        let table = sample_table();
        let mut diff = TableDiff::new("id");
        diff.rows.insert(
            RecordKey::new("99").unwrap(),
            RecordChange::Updated {
                old: Row::new(),
                new: row(&[("name", FieldValue::Text("x".into()))]),
            },
        );
        assert!(table.apply(&diff).is_err());
    }

    #[test]
    fn test_compose_insert_then_update() {
        let key = RecordKey::new("5").unwrap();
        let mut first = TableDiff::new("id");
        first.rows.insert(
            key.clone(),
            RecordChange::Inserted {
                fields: row(&[("id", FieldValue::Int(5)), ("name", FieldValue::Text("a".into()))]),
            },
        );
        let mut second = TableDiff::new("id");
        second.rows.insert(
            key.clone(),
            RecordChange::Updated {
                old: row(&[("name", FieldValue::Text("a".into()))]),
                new: row(&[("name", FieldValue::Text("b".into()))]),
            },
        );
        let composed = first.compose(&second);
        match &composed.rows[&key] {
            RecordChange::Inserted { fields } => {
                assert_eq!(fields["name"], FieldValue::Text("b".into()));
            }
            other => panic!("expected Inserted, got {other:?}"),
        }
    }

    #[test]
    fn test_compose_insert_then_delete_cancels() {
        let key = RecordKey::new("5").unwrap();
        let mut first = TableDiff::new("id");
        first.rows.insert(
            key.clone(),
            RecordChange::Inserted { fields: Row::new() },
        );
        let mut second = TableDiff::new("id");
        second
            .rows
            .insert(key.clone(), RecordChange::Deleted { old: Row::new() });
        let composed = first.compose(&second);
        assert!(composed.is_empty());
    }

    #[test]
    fn test_compose_update_then_update_keeps_original_old() {
        let key = RecordKey::new("1").unwrap();
        let mut first = TableDiff::new("id");
        first.rows.insert(
            key.clone(),
            RecordChange::Updated {
                old: row(&[("name", FieldValue::Text("A".into()))]),
                new: row(&[("name", FieldValue::Text("B".into()))]),
            },
        );
        let mut second = TableDiff::new("id");
        second.rows.insert(
            key.clone(),
            RecordChange::Updated {
                old: row(&[("name", FieldValue::Text("B".into()))]),
                new: row(&[("name", FieldValue::Text("C".into()))]),
            },
        );
        let composed = first.compose(&second);
        match &composed.rows[&key] {
            RecordChange::Updated { old, new } => {
                assert_eq!(old["name"], FieldValue::Text("A".into()));
                assert_eq!(new["name"], FieldValue::Text("C".into()));
            }
            other => panic!("expected Updated, got {other:?}"),
        }
    }
}
