mod common;

use std::sync::Arc;

use common::*;
use protest_desk::gateways::InMemoryIdentityDirectory;
use protest_desk::store::{find_entity, insert_entity, DataStore, Filter, Record, StoreError};
use protest_desk::workflows::graph::{EntityKind, Owner, Property};
use protest_desk::workflows::intake::{IntakeError, IntakeRejection};

#[test]
fn fresh_intake_creates_exactly_one_row_per_table() {
    for backend in backends() {
        let store = backend.store.clone();
        let identity = Arc::new(InMemoryIdentityDirectory::new());
        let before = counts(store.as_ref());

        let receipt = workflow(store.clone(), identity.clone())
            .submit(individual("first.last@example.com", "100 Congress Ave, Austin, TX"))
            .unwrap_or_else(|err| panic!("{}: intake failed: {err}", backend.name));

        for (kind, previous) in before {
            let expected = match kind {
                EntityKind::Profile
                | EntityKind::Contact
                | EntityKind::Owner
                | EntityKind::Property
                | EntityKind::Application
                | EntityKind::Protest => previous + 1,
                _ => previous,
            };
            assert_eq!(
                count(store.as_ref(), kind),
                expected,
                "{}: {kind}",
                backend.name
            );
        }

        let owner: Owner = find_entity(store.as_ref(), &receipt.owner_id)
            .expect("lookup")
            .expect("owner");
        assert_eq!(owner.name, "First Last", "{}", backend.name);
        assert_eq!(owner.owner_type, "individual");
        assert!(identity.contains(&receipt.profile_id));
    }
}

#[test]
fn trust_intake_records_entity_owner() {
    for backend in backends() {
        let store = backend.store.clone();
        let receipt = workflow(store.clone(), Arc::new(InMemoryIdentityDirectory::new()))
            .submit(trust("trustee@example.com", "500 E 4th St, Austin, TX"))
            .unwrap_or_else(|err| panic!("{}: intake failed: {err}", backend.name));

        let owner: Owner = find_entity(store.as_ref(), &receipt.owner_id)
            .expect("lookup")
            .expect("owner");
        assert_eq!(owner.name, "Acme Trust", "{}", backend.name);
        assert_eq!(owner.owner_type, "trust");
        assert_eq!(owner.entity_name.as_deref(), Some("Acme Trust"));
    }
}

#[test]
fn duplicates_are_rejected_with_zero_new_rows() {
    for backend in backends() {
        let store = backend.store.clone();
        let identity = Arc::new(InMemoryIdentityDirectory::new());
        let intake = workflow(store.clone(), identity.clone());
        intake
            .submit(individual("pending@example.com", "1 Pending Pl"))
            .expect("first intake");
        let before = counts(store.as_ref());

        let cases = [
            (
                individual("pending@example.com", "2 Other Pl"),
                "EMAIL_EXISTS_PENDING",
            ),
            (
                individual("referrals@protestdesk.test", "3 Other Pl"),
                "EMAIL_EXISTS_AUTHENTICATED",
            ),
            (
                individual("someone@example.com", "1  Pending Pl"),
                "DUPLICATE_PROPERTY",
            ),
        ];
        for (payload, code) in cases {
            match intake.submit(payload) {
                Err(IntakeError::Rejected(rejection)) => {
                    assert_eq!(rejection.code(), code, "{}", backend.name)
                }
                other => panic!("{}: expected {code}, got {other:?}", backend.name),
            }
            assert_eq!(counts(store.as_ref()), before, "{}: {code}", backend.name);
        }
        assert_eq!(identity.len(), 1);
    }
}

#[test]
fn stores_enforce_unique_address_at_write_time() {
    for backend in backends() {
        let store = backend.store.clone();
        let receipt = workflow(store.clone(), Arc::new(InMemoryIdentityDirectory::new()))
            .submit(individual("unique@example.com", "7 Unique Way"))
            .expect("intake");

        let original: Property = find_entity(store.as_ref(), &receipt.property_id)
            .expect("lookup")
            .expect("property");
        let copy = Property {
            id: String::new(),
            ..original
        };
        let err = insert_entity(store.as_ref(), &copy).expect_err("duplicate address");
        assert!(
            matches!(err, StoreError::UniqueViolation { table: EntityKind::Property, .. }),
            "{}: {err:?}",
            backend.name
        );
    }
}

/// Store whose duplicate lookups see nothing, as when a concurrent submission
/// commits between the pre-check and the write.
struct RacingStore {
    inner: Arc<dyn DataStore>,
}

impl DataStore for RacingStore {
    fn insert(&self, table: EntityKind, record: Record) -> Result<Record, StoreError> {
        self.inner.insert(table, record)
    }

    fn upsert(
        &self,
        table: EntityKind,
        record: Record,
        conflict_key: &str,
    ) -> Result<Record, StoreError> {
        self.inner.upsert(table, record, conflict_key)
    }

    fn select(&self, table: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let columns = filter.columns();
        if columns.contains(&"email") || columns.contains(&"address") {
            return Ok(Vec::new());
        }
        self.inner.select(table, filter)
    }

    fn delete(&self, table: EntityKind, filter: &Filter) -> Result<usize, StoreError> {
        self.inner.delete(table, filter)
    }
}

#[test]
fn write_time_duplicates_unwind_into_rejections() {
    for backend in backends() {
        let store = backend.store.clone();
        workflow(store.clone(), Arc::new(InMemoryIdentityDirectory::new()))
            .submit(individual("first@example.com", "8 Race Track Rd"))
            .expect("first intake");
        let before = counts(store.as_ref());

        let identity = Arc::new(InMemoryIdentityDirectory::new());
        let racing: Arc<dyn DataStore> = Arc::new(RacingStore {
            inner: store.clone(),
        });
        let intake = workflow(racing, identity.clone());

        let cases = [
            (
                individual("second@example.com", "8 Race Track Rd"),
                "DUPLICATE_PROPERTY",
            ),
            (
                individual("first@example.com", "9 Race Track Rd"),
                "EMAIL_EXISTS_PENDING",
            ),
        ];
        for (payload, code) in cases {
            match intake.submit(payload) {
                Err(IntakeError::Rejected(rejection)) => {
                    assert_eq!(rejection.code(), code, "{}", backend.name)
                }
                other => panic!("{}: expected {code}, got {other:?}", backend.name),
            }
            assert_eq!(counts(store.as_ref()), before, "{}: {code}", backend.name);
        }
        assert!(identity.is_empty(), "{}", backend.name);
    }
}

#[test]
fn missing_parent_is_a_foreign_key_violation() {
    for backend in backends() {
        let orphan = Property {
            id: String::new(),
            user_id: "nobody".to_string(),
            owner_id: "no-owner".to_string(),
            contact_id: None,
            address: "0 Nowhere".to_string(),
            parcel_number: None,
            county: None,
            assessed_value: None,
            estimated_savings: None,
            created_at: None,
        };
        let err = insert_entity(backend.store.as_ref(), &orphan).expect_err("orphan row");
        assert!(
            matches!(err, StoreError::ForeignKeyViolation { .. }),
            "{}: {err:?}",
            backend.name
        );
    }
}

#[test]
fn rejection_codes_are_stable() {
    assert_eq!(
        IntakeRejection::DuplicateProperty {
            address: "x".to_string()
        }
        .code(),
        "DUPLICATE_PROPERTY"
    );
}
