use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode};
use serde_json::{Number, Value};

use super::migrations::{self, v001_initial::BOOLEAN_COLUMNS};
use super::{ensure_id, DataStore, Filter, Record, StoreError};
use crate::workflows::graph::EntityKind;

/// SQLite-backed store with foreign keys switched on.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        tracing::info!(path = %path.display(), "opening sqlite store");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

fn checked_column(name: &str) -> Result<&str, StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Ok(name)
    } else {
        Err(StoreError::InvalidColumn(name.to_string()))
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(table: EntityKind, column: &str, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(int) => {
            let is_boolean = BOOLEAN_COLUMNS
                .iter()
                .any(|(t, c)| *t == table.table_name() && *c == column);
            if is_boolean {
                Value::Bool(int != 0)
            } else {
                Value::Number(int.into())
            }
        }
        ValueRef::Real(real) => Number::from_f64(real).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn where_clause(filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String, StoreError> {
    Ok(match filter {
        Filter::Eq { column, value } => {
            params.push(to_sql(value));
            format!("{} = ?", checked_column(column)?)
        }
        Filter::In { column, values } if values.is_empty() => {
            checked_column(column)?;
            "0".to_string()
        }
        Filter::In { column, values } => {
            params.extend(values.iter().map(to_sql));
            let slots = vec!["?"; values.len()].join(", ");
            format!("{} IN ({slots})", checked_column(column)?)
        }
        Filter::Any(filters) if filters.is_empty() => "0".to_string(),
        Filter::All(filters) if filters.is_empty() => "1".to_string(),
        Filter::Any(filters) | Filter::All(filters) => {
            let joiner = if matches!(filter, Filter::Any(_)) {
                " OR "
            } else {
                " AND "
            };
            let parts = filters
                .iter()
                .map(|inner| where_clause(inner, params))
                .collect::<Result<Vec<_>, _>>()?;
            format!("({})", parts.join(joiner))
        }
    })
}

fn map_error(table: EntityKind, err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            let detail = message.unwrap_or_else(|| code.to_string());
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    StoreError::ForeignKeyViolation { table, detail }
                }
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    // "UNIQUE constraint failed: properties.address"
                    let column = detail
                        .rsplit('.')
                        .next()
                        .unwrap_or(detail.as_str())
                        .to_string();
                    StoreError::UniqueViolation { table, column }
                }
                _ => StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, Some(detail))),
            }
        }
        other => StoreError::Sqlite(other),
    }
}

fn select_rows(
    conn: &Connection,
    table: EntityKind,
    filter: &Filter,
) -> Result<Vec<Record>, StoreError> {
    let mut params = Vec::new();
    let clause = where_clause(filter, &mut params)?;
    let sql = format!("SELECT * FROM {} WHERE {clause}", table.table_name());

    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        let mut record = Record::new();
        for (index, name) in names.iter().enumerate() {
            record.insert(name.clone(), from_sql(table, name, row.get_ref(index)?));
        }
        Ok(record)
    })?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::Sqlite)
}

fn insert_row(
    conn: &Connection,
    table: EntityKind,
    record: &Record,
    conflict_key: Option<&str>,
) -> Result<(), StoreError> {
    let columns = record
        .keys()
        .map(|key| checked_column(key))
        .collect::<Result<Vec<_>, _>>()?;
    let slots = vec!["?"; columns.len()].join(", ");
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({slots})",
        table.table_name(),
        columns.join(", ")
    );

    if let Some(key) = conflict_key {
        let key = checked_column(key)?;
        let updates: Vec<String> = columns
            .iter()
            .copied()
            .filter(|column| *column != key && *column != "id")
            .map(|column| format!("{column} = excluded.{column}"))
            .collect();
        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT({key}) DO NOTHING"));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT({key}) DO UPDATE SET {}",
                updates.join(", ")
            ));
        }
    }

    let values: Vec<SqlValue> = record.values().map(to_sql).collect();
    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(|err| map_error(table, err))?;
    Ok(())
}

impl DataStore for SqliteStore {
    fn insert(&self, table: EntityKind, mut record: Record) -> Result<Record, StoreError> {
        let conn = self.lock()?;
        let id = ensure_id(&mut record);
        insert_row(&conn, table, &record, None)?;
        Ok(select_rows(&conn, table, &Filter::eq("id", id))?
            .into_iter()
            .next()
            .unwrap_or(record))
    }

    fn upsert(
        &self,
        table: EntityKind,
        mut record: Record,
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

        let conn = self.lock()?;
        ensure_id(&mut record);
        insert_row(&conn, table, &record, Some(conflict_key))?;
        Ok(
            select_rows(&conn, table, &Filter::eq(conflict_key, key_value))?
                .into_iter()
                .next()
                .unwrap_or(record),
        )
    }

    fn select(&self, table: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let conn = self.lock()?;
        select_rows(&conn, table, filter)
    }

    fn delete(&self, table: EntityKind, filter: &Filter) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let mut params = Vec::new();
        let clause = where_clause(filter, &mut params)?;
        let sql = format!("DELETE FROM {} WHERE {clause}", table.table_name());
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(|err| map_error(table, err))
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

    #[test]
    fn open_at_runs_migrations_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("desk.db");
        let store = SqliteStore::open_at(&path).expect("store opens");
        let rows = store
            .select(EntityKind::Profile, &Filter::All(Vec::new()))
            .expect("profiles table exists");
        assert!(rows.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn booleans_round_trip_through_integer_columns() {
        let store = SqliteStore::open_in_memory().expect("store opens");
        let stored = store
            .insert(
                EntityKind::Profile,
                record(json!({
                    "id": "u1",
                    "email": "a@x.com",
                    "first_name": "A",
                    "last_name": "B",
                    "role": "customer",
                    "is_authenticated": true
                })),
            )
            .expect("insert succeeds");
        assert_eq!(stored.get("is_authenticated"), Some(&json!(true)));
        assert_eq!(stored.get("phone"), Some(&Value::Null));
    }

    #[test]
    fn constraint_failures_map_to_store_errors() {
        let store = SqliteStore::open_in_memory().expect("store opens");
        let err = store
            .insert(
                EntityKind::Owner,
                record(json!({ "name": "X", "owner_type": "individual", "created_by": "ghost" })),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }), "{err:?}");

        let profile = json!({ "email": "a@x.com", "first_name": "A", "last_name": "B", "role": "customer" });
        store
            .insert(EntityKind::Profile, record(profile.clone()))
            .expect("first insert");
        let err = store
            .insert(EntityKind::Profile, record(profile))
            .unwrap_err();
        assert!(
            matches!(err, StoreError::UniqueViolation { ref column, .. } if column == "email"),
            "{err:?}"
        );
    }

    #[test]
    fn rejects_unsafe_column_names() {
        let store = SqliteStore::open_in_memory().expect("store opens");
        let err = store
            .select(EntityKind::Profile, &Filter::eq("id; DROP TABLE profiles", "x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidColumn(_)));
    }

    #[test]
    fn upsert_updates_on_conflict_key() {
        let store = SqliteStore::open_in_memory().expect("store opens");
        let base = json!({ "id": "u1", "email": "a@x.com", "first_name": "A", "last_name": "B", "role": "customer" });
        store.upsert(EntityKind::Profile, record(base), "id").expect("insert path");
        let updated = store
            .upsert(
                EntityKind::Profile,
                record(json!({ "id": "u1", "email": "a@x.com", "first_name": "Alex", "last_name": "B", "role": "customer" })),
                "id",
            )
            .expect("update path");
        assert_eq!(updated.get("first_name"), Some(&json!("Alex")));
        let all = store
            .select(EntityKind::Profile, &Filter::All(Vec::new()))
            .expect("select");
        assert_eq!(all.len(), 1);
    }
}
