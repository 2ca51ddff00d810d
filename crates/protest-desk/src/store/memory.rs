use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{ensure_id, record_id, seed_demo_referrer, DataStore, Filter, Record, StoreError};
use crate::workflows::graph::EntityKind;

type Tables = BTreeMap<EntityKind, Vec<Record>>;

/// In-process store that enforces the schema's foreign keys and unique
/// columns the way the hosted database does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with one confirmed referrer account.
    pub fn with_demo_seed() -> Result<Self, StoreError> {
        let store = Self::new();
        seed_demo_referrer(&store)?;
        Ok(store)
    }

    pub fn count(&self, table: EntityKind) -> usize {
        self.lock()
            .map(|tables| tables.get(&table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn check_unique(
    tables: &Tables,
    table: EntityKind,
    record: &Record,
    replacing: Option<&str>,
) -> Result<(), StoreError> {
    let rows = tables.get(&table).map(Vec::as_slice).unwrap_or_default();
    let others = rows
        .iter()
        .filter(|row| replacing.is_none() || record_id(row) != replacing);

    for row in others {
        if record_id(row).is_some() && record_id(row) == record_id(record) {
            return Err(StoreError::UniqueViolation {
                table,
                column: "id".to_string(),
            });
        }
        for column in table.unique_columns() {
            let candidate = record.get(*column).filter(|value| !value.is_null());
            if candidate.is_some() && row.get(*column) == candidate {
                return Err(StoreError::UniqueViolation {
                    table,
                    column: column.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn check_parents(tables: &Tables, table: EntityKind, record: &Record) -> Result<(), StoreError> {
    for key in table.references() {
        let Some(value) = record.get(key.column).filter(|value| !value.is_null()) else {
            continue;
        };
        let exists = tables
            .get(&key.parent)
            .map(|rows| rows.iter().any(|row| row.get("id") == Some(value)))
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::ForeignKeyViolation {
                table,
                detail: format!("{} {} not present in {}", key.column, value, key.parent),
            });
        }
    }
    Ok(())
}

fn check_children(tables: &Tables, table: EntityKind, doomed: &[Value]) -> Result<(), StoreError> {
    for (child, key) in table.referenced_by() {
        let Some(rows) = tables.get(&child) else {
            continue;
        };
        let orphan = rows.iter().find(|row| {
            row.get(key.column)
                .map(|value| doomed.contains(value))
                .unwrap_or(false)
        });
        if let Some(row) = orphan {
            return Err(StoreError::ForeignKeyViolation {
                table,
                detail: format!(
                    "{}.{} on row {} still references it",
                    child,
                    key.column,
                    record_id(row).unwrap_or("?")
                ),
            });
        }
    }
    Ok(())
}

impl DataStore for MemoryStore {
    fn insert(&self, table: EntityKind, mut record: Record) -> Result<Record, StoreError> {
        let mut tables = self.lock()?;
        ensure_id(&mut record);
        check_unique(&tables, table, &record, None)?;
        check_parents(&tables, table, &record)?;
        tables.entry(table).or_default().push(record.clone());
        Ok(record)
    }

    fn upsert(
        &self,
        table: EntityKind,
        record: Record,
        conflict_key: &str,
    ) -> Result<Record, StoreError> {
        let key_value = record
            .get(conflict_key)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| StoreError::MissingConflictKey {
                table,
                column: conflict_key.to_string(),
            })?;

        let mut tables = self.lock()?;
        let existing = tables.get(&table).and_then(|rows| {
            rows.iter()
                .position(|row| row.get(conflict_key) == Some(&key_value))
        });

        let Some(index) = existing else {
            drop(tables);
            return self.insert(table, record);
        };

        let rows = tables.entry(table).or_default();
        let mut merged = rows[index].clone();
        let current_id = record_id(&merged).map(str::to_string);
        for (column, value) in record {
            if column == "id" && current_id.is_some() {
                continue;
            }
            merged.insert(column, value);
        }

        check_unique(&tables, table, &merged, current_id.as_deref())?;
        check_parents(&tables, table, &merged)?;
        let rows = tables.entry(table).or_default();
        rows[index] = merged.clone();
        Ok(merged)
    }

    fn select(&self, table: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete(&self, table: EntityKind, filter: &Filter) -> Result<usize, StoreError> {
        let mut tables = self.lock()?;
        let doomed: Vec<Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .filter_map(|row| row.get("id").cloned())
                    .collect()
            })
            .unwrap_or_default();
        if doomed.is_empty() {
            return Ok(0);
        }

        check_children(&tables, table, &doomed)?;

        let rows = tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok(before - rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn seed_profile(store: &MemoryStore, id: &str, email: &str) {
        store
            .insert(
                EntityKind::Profile,
                record(json!({ "id": id, "email": email, "first_name": "A", "last_name": "B", "role": "customer" })),
            )
            .expect("profile inserts");
    }

    #[test]
    fn insert_assigns_ids_and_rejects_missing_parents() {
        let store = MemoryStore::new();
        seed_profile(&store, "u1", "a@x.com");

        let owner = store
            .insert(
                EntityKind::Owner,
                record(json!({ "name": "A B", "owner_type": "individual", "created_by": "u1" })),
            )
            .expect("owner inserts");
        assert!(record_id(&owner).is_some());

        let err = store
            .insert(
                EntityKind::Owner,
                record(json!({ "name": "X", "owner_type": "individual", "created_by": "ghost" })),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { table: EntityKind::Owner, .. }));
    }

    #[test]
    fn unique_columns_are_enforced() {
        let store = MemoryStore::new();
        seed_profile(&store, "u1", "a@x.com");
        let err = store
            .insert(
                EntityKind::Profile,
                record(json!({ "id": "u2", "email": "a@x.com", "first_name": "C", "last_name": "D", "role": "customer" })),
            )
            .unwrap_err();
        assert!(
            matches!(err, StoreError::UniqueViolation { ref column, .. } if column == "email")
        );
    }

    #[test]
    fn delete_refuses_to_orphan_children() {
        let store = MemoryStore::new();
        seed_profile(&store, "u1", "a@x.com");
        store
            .insert(
                EntityKind::VerificationCode,
                record(json!({ "user_id": "u1", "code": "123456" })),
            )
            .expect("code inserts");

        let err = store
            .delete(EntityKind::Profile, &Filter::eq("id", "u1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));

        let removed = store
            .delete(EntityKind::VerificationCode, &Filter::eq("user_id", "u1"))
            .expect("children delete");
        assert_eq!(removed, 1);
        let removed = store
            .delete(EntityKind::Profile, &Filter::eq("id", "u1"))
            .expect("profile deletes");
        assert_eq!(removed, 1);
        assert_eq!(store.count(EntityKind::Profile), 0);
    }

    #[test]
    fn upsert_merges_into_existing_rows() {
        let store = MemoryStore::new();
        seed_profile(&store, "u1", "a@x.com");

        let updated = store
            .upsert(
                EntityKind::Profile,
                record(json!({ "id": "u1", "first_name": "Alex" })),
                "id",
            )
            .expect("upsert succeeds");
        assert_eq!(updated.get("first_name"), Some(&json!("Alex")));
        assert_eq!(updated.get("email"), Some(&json!("a@x.com")));
        assert_eq!(store.count(EntityKind::Profile), 1);
    }

    #[test]
    fn demo_seed_contains_referrer() {
        let store = MemoryStore::with_demo_seed().expect("seed loads");
        let rows = store
            .select(EntityKind::Profile, &Filter::eq("referral_code", "DEMO2024"))
            .expect("select works");
        assert_eq!(rows.len(), 1);
    }
}
