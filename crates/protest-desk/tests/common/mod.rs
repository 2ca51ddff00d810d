#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use protest_desk::gateways::{InMemoryIdentityDirectory, RecordingJobDispatcher};
use protest_desk::store::{insert_entity, DataStore, Filter, MemoryStore, Record, SqliteStore};
use protest_desk::workflows::graph::{
    Bill, BillStatus, Communication, CommunicationProperty, CreditTransaction, Document,
    EntityKind, ReferralRelationship, ReferralStatus, VerificationCode,
};
use protest_desk::workflows::intake::{IntakePayload, IntakeReceipt, IntakeSettings, IntakeWorkflow};
use tempfile::TempDir;

pub type Workflow = IntakeWorkflow<dyn DataStore, InMemoryIdentityDirectory, RecordingJobDispatcher>;

/// A store under test. The temp dir keeps the SQLite file alive.
pub struct Backend {
    pub name: &'static str,
    pub store: Arc<dyn DataStore>,
    _dir: Option<TempDir>,
}

pub fn backends() -> Vec<Backend> {
    let dir = tempfile::tempdir().expect("temp dir");
    let sqlite = SqliteStore::open_at(&dir.path().join("desk.db")).expect("sqlite opens");
    vec![
        Backend {
            name: "memory",
            store: Arc::new(MemoryStore::with_demo_seed().expect("seeded store")),
            _dir: None,
        },
        Backend {
            name: "sqlite",
            store: {
                protest_desk::store::seed_demo_referrer(&sqlite).expect("seeded sqlite");
                Arc::new(sqlite)
            },
            _dir: Some(dir),
        },
    ]
}

pub fn workflow(store: Arc<dyn DataStore>, identity: Arc<InMemoryIdentityDirectory>) -> Workflow {
    IntakeWorkflow::new(
        store,
        identity,
        Arc::new(RecordingJobDispatcher::default()),
        IntakeSettings::default(),
    )
}

pub fn individual(email: &str, address: &str) -> IntakePayload {
    IntakePayload {
        email: email.to_string(),
        first_name: "First".to_string(),
        last_name: "Last".to_string(),
        phone: "512-555-0100".to_string(),
        property_address: address.to_string(),
        county: Some("Travis".to_string()),
        assessed_value: Some(400_000.0),
        tax_year: Some(2025),
        password: Some("s3cret-pass".to_string()),
        ..IntakePayload::default()
    }
}

pub fn trust(email: &str, address: &str) -> IntakePayload {
    IntakePayload {
        is_trust_entity: true,
        entity_name: Some("Acme Trust".to_string()),
        entity_type: Some("trust".to_string()),
        ..individual(email, address)
    }
}

pub fn all_rows(store: &dyn DataStore, table: EntityKind) -> Vec<Record> {
    store.select(table, &Filter::All(Vec::new())).expect("select all")
}

pub fn count(store: &dyn DataStore, table: EntityKind) -> usize {
    all_rows(store, table).len()
}

pub fn counts(store: &dyn DataStore) -> Vec<(EntityKind, usize)> {
    EntityKind::ALL
        .iter()
        .map(|kind| (*kind, count(store, *kind)))
        .collect()
}

/// Hang one row off every table that can reference the customer.
pub fn attach_full_graph(store: &dyn DataStore, receipt: &IntakeReceipt) {
    let now = Some(Utc::now());
    insert_entity(
        store,
        &Bill {
            id: String::new(),
            user_id: receipt.profile_id.clone(),
            owner_id: receipt.owner_id.clone(),
            protest_id: Some(receipt.protest_id.clone()),
            amount: 450.0,
            status: BillStatus::Pending,
            created_at: now,
        },
    )
    .expect("bill");
    insert_entity(
        store,
        &Document {
            id: String::new(),
            user_id: receipt.profile_id.clone(),
            property_id: Some(receipt.property_id.clone()),
            document_type: "appointment_of_agent".to_string(),
            storage_path: Some("documents/aoa.pdf".to_string()),
            created_at: now,
        },
    )
    .expect("document");
    let communication = insert_entity(
        store,
        &Communication {
            id: String::new(),
            contact_id: receipt.contact_id.clone(),
            channel: "email".to_string(),
            body: Some("Your protest has been filed.".to_string()),
            created_at: now,
        },
    )
    .expect("communication");
    insert_entity(
        store,
        &CommunicationProperty {
            id: String::new(),
            communication_id: communication.id,
            property_id: receipt.property_id.clone(),
        },
    )
    .expect("communication link");
    insert_entity(
        store,
        &CreditTransaction {
            id: String::new(),
            user_id: receipt.profile_id.clone(),
            amount: 25.0,
            reason: Some("referral bonus".to_string()),
        },
    )
    .expect("credit");
    insert_entity(
        store,
        &VerificationCode {
            id: String::new(),
            user_id: receipt.profile_id.clone(),
            code: "482913".to_string(),
            expires_at: now,
        },
    )
    .expect("verification code");
}

pub fn refer(store: &dyn DataStore, referrer_id: &str, referee_id: &str) {
    insert_entity(
        store,
        &ReferralRelationship {
            id: String::new(),
            referrer_id: referrer_id.to_string(),
            referee_id: referee_id.to_string(),
            referral_code: "MANUAL01".to_string(),
            status: ReferralStatus::Credited,
            created_at: Some(Utc::now()),
        },
    )
    .expect("referral");
}
