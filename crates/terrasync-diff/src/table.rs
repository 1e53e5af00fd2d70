//! Record-level table diffing
//!
//! Rows are matched by record key, never by position: reordering unchanged
//! rows produces an empty diff. A record counts as updated if any field
//! value differs bytewise from the base snapshot's stored value.

use terrasync_core::domain::errors::DomainError;
use terrasync_core::domain::record::{RecordChange, Row, Table, TableDiff};

/// Diff two table states (base → current)
///
/// `Updated` entries carry only the changed fields, old and new. Fields
/// present in base but absent in current are treated as set to null.
pub fn diff_tables(base: &Table, current: &Table) -> Result<TableDiff, DomainError> {
    if base.key != current.key {
        return Err(DomainError::InvalidTable {
            path: current.name.clone(),
            reason: format!(
                "key field changed from '{}' to '{}'",
                base.key, current.key
            ),
        });
    }

    let base_rows = base.by_key()?;
    let current_rows = current.by_key()?;

    let mut diff = TableDiff::new(&base.key);

    for (key, row) in &current_rows {
        match base_rows.get(key) {
            None => {
                diff.rows.insert(
                    key.clone(),
                    RecordChange::Inserted { fields: row.clone() },
                );
            }
            Some(base_row) => {
                if let Some((old, new)) = changed_fields(base_row, row) {
                    diff.rows.insert(key.clone(), RecordChange::Updated { old, new });
                }
            }
        }
    }

    for (key, base_row) in &base_rows {
        if !current_rows.contains_key(key) {
            diff.rows.insert(
                key.clone(),
                RecordChange::Deleted { old: base_row.clone() },
            );
        }
    }

    Ok(diff)
}

/// Collect fields whose values differ; `None` if the rows are identical
fn changed_fields(base: &Row, current: &Row) -> Option<(Row, Row)> {
    use terrasync_core::domain::record::FieldValue;

    let mut old = Row::new();
    let mut new = Row::new();

    for (field, value) in current {
        match base.get(field) {
            Some(base_value) if base_value == value => {}
            Some(base_value) => {
                old.insert(field.clone(), base_value.clone());
                new.insert(field.clone(), value.clone());
            }
            None => {
                old.insert(field.clone(), FieldValue::Null);
                new.insert(field.clone(), value.clone());
            }
        }
    }
    for (field, base_value) in base {
        if !current.contains_key(field) && *base_value != FieldValue::Null {
            old.insert(field.clone(), base_value.clone());
            new.insert(field.clone(), FieldValue::Null);
        }
    }

    if new.is_empty() {
        None
    } else {
        Some((old, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrasync_core::domain::newtypes::RecordKey;
    use terrasync_core::domain::record::FieldValue;

    fn row(pairs: &[(&str, FieldValue)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn table(rows: Vec<Row>) -> Table {
        Table {
            name: "rivers".to_string(),
            key: "id".to_string(),
            rows,
        }
    }

    #[test]
    fn test_identical_tables_empty_diff() {
        let t = table(vec![row(&[
            ("id", FieldValue::Int(1)),
            ("name", FieldValue::Text("Vltava".into())),
        ])]);
        assert!(diff_tables(&t, &t.clone()).unwrap().is_empty());
    }

    #[test]
    fn test_reordering_rows_is_no_change() {
        let a = row(&[("id", FieldValue::Int(1)), ("name", FieldValue::Text("a".into()))]);
        let b = row(&[("id", FieldValue::Int(2)), ("name", FieldValue::Text("b".into()))]);
        let base = table(vec![a.clone(), b.clone()]);
        let reordered = table(vec![b, a]);
        assert!(diff_tables(&base, &reordered).unwrap().is_empty());
    }

    #[test]
    fn test_insert_update_delete_classification() {
        let base = table(vec![
            row(&[("id", FieldValue::Int(1)), ("name", FieldValue::Text("a".into()))]),
            row(&[("id", FieldValue::Int(2)), ("name", FieldValue::Text("b".into()))]),
        ]);
        let current = table(vec![
            row(&[("id", FieldValue::Int(1)), ("name", FieldValue::Text("a2".into()))]),
            row(&[("id", FieldValue::Int(3)), ("name", FieldValue::Text("c".into()))]),
        ]);

        let diff = diff_tables(&base, &current).unwrap();
        assert_eq!(diff.rows.len(), 3);
        assert!(matches!(
            diff.rows[&RecordKey::new("1").unwrap()],
            RecordChange::Updated { .. }
        ));
        assert!(matches!(
            diff.rows[&RecordKey::new("2").unwrap()],
            RecordChange::Deleted { .. }
        ));
        assert!(matches!(
            diff.rows[&RecordKey::new("3").unwrap()],
            RecordChange::Inserted { .. }
        ));
    }

    #[test]
    fn test_update_carries_only_changed_fields() {
        let base = table(vec![row(&[
            ("id", FieldValue::Int(1)),
            ("name", FieldValue::Text("a".into())),
            ("geom", FieldValue::Blob(vec![1])),
        ])]);
        let current = table(vec![row(&[
            ("id", FieldValue::Int(1)),
            ("name", FieldValue::Text("b".into())),
            ("geom", FieldValue::Blob(vec![1])),
        ])]);

        let diff = diff_tables(&base, &current).unwrap();
        match &diff.rows[&RecordKey::new("1").unwrap()] {
            RecordChange::Updated { old, new } => {
                assert_eq!(old.len(), 1);
                assert_eq!(new.len(), 1);
                assert_eq!(new["name"], FieldValue::Text("b".into()));
            }
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[test]
    fn test_removed_field_becomes_null() {
        let base = table(vec![row(&[
            ("id", FieldValue::Int(1)),
            ("name", FieldValue::Text("a".into())),
        ])]);
        let current = table(vec![row(&[("id", FieldValue::Int(1))])]);

        let diff = diff_tables(&base, &current).unwrap();
        match &diff.rows[&RecordKey::new("1").unwrap()] {
            RecordChange::Updated { new, .. } => {
                assert_eq!(new["name"], FieldValue::Null);
            }
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[test]
    fn test_key_field_change_is_error() {
        let base = table(vec![]);
        let mut current = table(vec![]);
        current.key = "fid".to_string();
        assert!(diff_tables(&base, &current).is_err());
    }
}
