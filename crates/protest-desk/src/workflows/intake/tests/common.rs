use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::gateways::{
    InMemoryIdentityDirectory, JobDispatcher, JobError, JobRequest, RecordingJobDispatcher,
};
use crate::store::{DataStore, Filter, MemoryStore, Record, StoreError};
use crate::workflows::graph::EntityKind;
use crate::workflows::intake::{IntakePayload, IntakeSettings, IntakeWorkflow};

pub(super) type MemoryWorkflow =
    IntakeWorkflow<MemoryStore, InMemoryIdentityDirectory, RecordingJobDispatcher>;

pub(super) fn payload() -> IntakePayload {
    IntakePayload {
        email: "Jordan.Reyes@Example.com".to_string(),
        first_name: "Jordan".to_string(),
        last_name: "Reyes".to_string(),
        phone: "512-555-0188".to_string(),
        property_address: "4410 Shoal Creek Blvd, Austin, TX 78756".to_string(),
        county: Some("Travis".to_string()),
        parcel_number: Some("0123450607".to_string()),
        assessed_value: Some(612_000.0),
        estimated_savings: Some(1_850.0),
        tax_year: Some(2025),
        signature: Some("Jordan Reyes".to_string()),
        password: Some("correct horse".to_string()),
        ..IntakePayload::default()
    }
}

pub(super) fn trust_payload() -> IntakePayload {
    IntakePayload {
        email: "trustee@example.com".to_string(),
        property_address: "9 Barton Hills Dr, Austin, TX 78704".to_string(),
        is_trust_entity: true,
        entity_name: Some("Acme Trust".to_string()),
        entity_type: Some("Trust".to_string()),
        ..payload()
    }
}

pub(super) struct Harness {
    pub store: Arc<MemoryStore>,
    pub identity: Arc<InMemoryIdentityDirectory>,
    pub jobs: Arc<RecordingJobDispatcher>,
    pub workflow: Arc<MemoryWorkflow>,
}

pub(super) fn harness() -> Harness {
    harness_with(MemoryStore::with_demo_seed().expect("seeded store"), IntakeSettings::default())
}

pub(super) fn harness_with(store: MemoryStore, settings: IntakeSettings) -> Harness {
    let store = Arc::new(store);
    let identity = Arc::new(InMemoryIdentityDirectory::new());
    let jobs = Arc::new(RecordingJobDispatcher::default());
    let workflow = Arc::new(IntakeWorkflow::new(
        store.clone(),
        identity.clone(),
        jobs.clone(),
        settings,
    ));
    Harness {
        store,
        identity,
        jobs,
        workflow,
    }
}

/// Counts rows in every table the intake writes to.
pub(super) fn intake_row_counts(store: &MemoryStore) -> Vec<(EntityKind, usize)> {
    crate::workflows::intake::INTAKE_TABLES
        .iter()
        .map(|kind| (*kind, store.count(*kind)))
        .collect()
}

/// Memory store that refuses inserts into one table.
pub(super) struct FailingStore {
    pub inner: MemoryStore,
    pub fail_on: EntityKind,
}

impl DataStore for FailingStore {
    fn insert(&self, table: EntityKind, record: Record) -> Result<Record, StoreError> {
        if table == self.fail_on {
            return Err(StoreError::Unavailable(format!("{table} is read-only")));
        }
        self.inner.insert(table, record)
    }

    fn upsert(
        &self,
        table: EntityKind,
        record: Record,
        conflict_key: &str,
    ) -> Result<Record, StoreError> {
        if table == self.fail_on {
            return Err(StoreError::Unavailable(format!("{table} is read-only")));
        }
        self.inner.upsert(table, record, conflict_key)
    }

    fn select(&self, table: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        self.inner.select(table, filter)
    }

    fn delete(&self, table: EntityKind, filter: &Filter) -> Result<usize, StoreError> {
        self.inner.delete(table, filter)
    }
}

/// Job runner that is always down.
#[derive(Default)]
pub(super) struct OfflineJobs;

impl JobDispatcher for OfflineJobs {
    fn invoke(&self, _job: JobRequest) -> Result<(), JobError> {
        Err(JobError::Unavailable("connection refused".to_string()))
    }
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn assert_error_code(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let body = json_body(response).await;
    assert_eq!(body["code"], code);
    assert!(body["error"].is_string());
}
