//! Relational data access consumed by the workflows.
//!
//! Rows are JSON objects keyed by column name. Two backends ship with the
//! crate and are chosen when the service is constructed: [`MemoryStore`] for
//! demos and tests, and [`SqliteStore`] for a persistent file.

mod memory;
pub mod migrations;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::workflows::graph::{Entity, EntityKind};

/// A single row as column → value.
pub type Record = Map<String, Value>;

/// Row predicate understood by every backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    Any(Vec<Filter>),
    All(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn any(filters: Vec<Filter>) -> Self {
        Self::Any(filters)
    }

    /// SQL-style evaluation: a null never equals anything.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Eq { column, value } => match record.get(column) {
                Some(Value::Null) | None => false,
                Some(found) => !value.is_null() && found == value,
            },
            Filter::In { column, values } => match record.get(column) {
                Some(Value::Null) | None => false,
                Some(found) => values.iter().any(|value| value == found),
            },
            Filter::Any(filters) => filters.iter().any(|filter| filter.matches(record)),
            Filter::All(filters) => filters.iter().all(|filter| filter.matches(record)),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            Filter::Eq { column, .. } | Filter::In { column, .. } => vec![column.as_str()],
            Filter::Any(filters) | Filter::All(filters) => {
                filters.iter().flat_map(Filter::columns).collect()
            }
        }
    }
}

/// Storage abstraction shared by the intake, deletion and protest workflows.
pub trait DataStore: Send + Sync {
    /// Insert a row, assigning an `id` when the record carries none.
    fn insert(&self, table: EntityKind, record: Record) -> Result<Record, StoreError>;
    /// Insert or overwrite the row whose `conflict_key` column matches.
    fn upsert(
        &self,
        table: EntityKind,
        record: Record,
        conflict_key: &str,
    ) -> Result<Record, StoreError>;
    fn select(&self, table: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError>;
    /// Remove matching rows and report how many went.
    fn delete(&self, table: EntityKind, filter: &Filter) -> Result<usize, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("foreign key violation on {table}: {detail}")]
    ForeignKeyViolation { table: EntityKind, detail: String },
    #[error("duplicate value for {table}.{column}")]
    UniqueViolation { table: EntityKind, column: String },
    #[error("invalid column name '{0}'")]
    InvalidColumn(String),
    #[error("conflict key '{column}' missing from {table} record")]
    MissingConflictKey { table: EntityKind, column: String },
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub fn encode<T: Serialize>(row: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Encoding(serde::ser::Error::custom(format!(
            "expected an object, found {other}"
        )))),
    }
}

pub fn decode<T: DeserializeOwned>(record: Record) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

pub fn insert_entity<S, E>(store: &S, row: &E) -> Result<E, StoreError>
where
    S: DataStore + ?Sized,
    E: Entity,
{
    let stored = store.insert(E::KIND, encode(row)?)?;
    decode(stored)
}

pub fn upsert_entity<S, E>(store: &S, row: &E, conflict_key: &str) -> Result<E, StoreError>
where
    S: DataStore + ?Sized,
    E: Entity,
{
    let stored = store.upsert(E::KIND, encode(row)?, conflict_key)?;
    decode(stored)
}

pub fn select_entities<S, E>(store: &S, filter: &Filter) -> Result<Vec<E>, StoreError>
where
    S: DataStore + ?Sized,
    E: Entity,
{
    store
        .select(E::KIND, filter)?
        .into_iter()
        .map(decode)
        .collect()
}

pub fn find_entity<S, E>(store: &S, id: &str) -> Result<Option<E>, StoreError>
where
    S: DataStore + ?Sized,
    E: Entity,
{
    Ok(select_entities(store, &Filter::eq("id", id))?.into_iter().next())
}

/// Id of the confirmed account seeded for demos.
pub const DEMO_REFERRER_ID: &str = "demo-referrer";
/// Referral code owned by the demo account.
pub const DEMO_REFERRAL_CODE: &str = "DEMO2024";

/// Insert the demo referrer unless it is already present. Returns whether a
/// row was written.
pub fn seed_demo_referrer<S>(store: &S) -> Result<bool, StoreError>
where
    S: DataStore + ?Sized,
{
    let existing = store.select(EntityKind::Profile, &Filter::eq("id", DEMO_REFERRER_ID))?;
    if !existing.is_empty() {
        return Ok(false);
    }

    let mut profile = Record::new();
    profile.insert("id".into(), DEMO_REFERRER_ID.into());
    profile.insert("email".into(), "referrals@protestdesk.test".into());
    profile.insert("first_name".into(), "Demo".into());
    profile.insert("last_name".into(), "Referrer".into());
    profile.insert("phone".into(), Value::Null);
    profile.insert("role".into(), "customer".into());
    profile.insert("is_authenticated".into(), true.into());
    profile.insert("referral_code".into(), DEMO_REFERRAL_CODE.into());
    profile.insert("created_at".into(), chrono::Utc::now().to_rfc3339().into());
    store.insert(EntityKind::Profile, profile)?;
    tracing::debug!("seeded demo referrer profile");
    Ok(true)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn ensure_id(record: &mut Record) -> String {
    match record_id(record) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = new_id();
            record.insert("id".to_string(), Value::String(id.clone()));
            id
        }
    }
}
