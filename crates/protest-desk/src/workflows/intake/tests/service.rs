use std::sync::Arc;

use super::common::*;
use crate::gateways::{IdentityMetadata, InMemoryIdentityDirectory, RecordingJobDispatcher};
use crate::store::{find_entity, select_entities, Filter, MemoryStore};
use crate::workflows::graph::{
    creation_order, respects_dependencies, Application, ApplicationStatus, EntityKind, Owner, Profile, Property,
    Protest, ReferralRelationship,
};
use crate::workflows::intake::{
    creation_plan, DocumentKind, IntakeError, IntakePayload, IntakeRejection, IntakeSettings,
    IntakeStep, IntakeWorkflow, INTAKE_TABLES,
};
use crate::workflows::protest::ProtestStatus;
use crate::workflows::saga::CompensationPolicy;

#[test]
fn creation_plan_writes_parents_first() {
    let tables: Vec<EntityKind> = creation_plan()
        .into_iter()
        .filter_map(IntakeStep::entity)
        .collect();
    assert_eq!(tables.len(), INTAKE_TABLES.len());
    assert_eq!(tables.first(), Some(&EntityKind::Profile));
    assert_eq!(tables.last(), Some(&EntityKind::Protest));
    respects_dependencies(&tables).expect("plan follows foreign keys");
    assert_eq!(
        tables,
        creation_order(&INTAKE_TABLES).expect("schema is acyclic")
    );
}

#[test]
fn every_intake_table_has_a_write_step() {
    for kind in INTAKE_TABLES {
        let step = IntakeStep::creating(kind).unwrap_or_else(|| panic!("no step writes {kind}"));
        assert_eq!(step.entity(), Some(kind));
    }
    assert_eq!(IntakeStep::creating(EntityKind::Bill), None);
}

#[test]
fn workflow_writes_rows_in_plan_order() {
    let h = harness();
    assert_eq!(h.workflow.plan(), creation_plan().as_slice());

    let identity = Arc::new(InMemoryIdentityDirectory::new());
    for (position, step) in creation_plan().into_iter().enumerate() {
        let kind = step.entity().expect("plan holds write steps");
        let (store, workflow) =
            failing_workflow(kind, CompensationPolicy::LeavePartial, identity.clone());
        let email = format!("order{position}@example.com");
        let address = format!("{position} Plan Order Rd");
        let err = workflow
            .submit(IntakePayload {
                email,
                property_address: address,
                ..payload()
            })
            .expect_err("write refused");
        match err {
            IntakeError::Step { step: failed, .. } => assert_eq!(failed, step),
            other => panic!("unexpected error: {other:?}"),
        }
        for earlier in creation_plan().into_iter().take(position) {
            let table = earlier.entity().expect("write step");
            assert_eq!(store.inner.count(table), 1, "{table} written before {kind}");
        }
    }
}

#[test]
fn individual_intake_creates_linked_graph() {
    let h = harness();
    let receipt = h.workflow.submit(payload()).expect("intake succeeds");

    assert!(receipt.requires_email_confirmation);
    assert!(!receipt.referral_linked);
    assert_eq!(
        receipt.documents_requested,
        vec![DocumentKind::AppointmentOfAgent, DocumentKind::ServiceAgreement]
    );

    let store = h.store.as_ref();
    let profile: Profile = find_entity(store, &receipt.profile_id)
        .expect("lookup")
        .expect("profile row");
    assert_eq!(profile.email, "jordan.reyes@example.com");
    assert!(!profile.is_authenticated);
    assert!(profile.referral_code.is_some());
    assert!(h.identity.contains(&receipt.profile_id));

    let owner: Owner = find_entity(store, &receipt.owner_id)
        .expect("lookup")
        .expect("owner row");
    assert_eq!(owner.name, "Jordan Reyes");
    assert_eq!(owner.owner_type, "individual");
    assert_eq!(owner.entity_name, None);
    assert_eq!(owner.created_by, receipt.profile_id);
    assert_eq!(
        owner.mailing_address.as_deref(),
        Some("4410 Shoal Creek Blvd, Austin, TX 78756")
    );

    let property: Property = find_entity(store, &receipt.property_id)
        .expect("lookup")
        .expect("property row");
    assert_eq!(property.user_id, receipt.profile_id);
    assert_eq!(property.owner_id, receipt.owner_id);
    assert_eq!(property.contact_id.as_deref(), Some(receipt.contact_id.as_str()));

    let application: Application = find_entity(store, &receipt.application_id)
        .expect("lookup")
        .expect("application row");
    assert_eq!(application.status, ApplicationStatus::Submitted);
    assert!(!application.is_verified);

    let protest: Protest = find_entity(store, &receipt.protest_id)
        .expect("lookup")
        .expect("protest row");
    assert_eq!(protest.property_id, receipt.property_id);
    assert_eq!(protest.appeal_status, ProtestStatus::Pending);
    assert_eq!(protest.tax_year, 2025);

    let jobs = h.jobs.jobs();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.name == "generate-pdf"));
    assert_eq!(jobs[0].payload["document_type"], "appointment_of_agent");
    assert_eq!(jobs[0].payload["property_id"], receipt.property_id.as_str());
}

#[test]
fn trust_intake_names_owner_after_entity() {
    let h = harness();
    let receipt = h.workflow.submit(trust_payload()).expect("intake succeeds");

    let owner: Owner = find_entity(h.store.as_ref(), &receipt.owner_id)
        .expect("lookup")
        .expect("owner row");
    assert_eq!(owner.name, "Acme Trust");
    assert_eq!(owner.owner_type, "trust");
    assert_eq!(owner.entity_name.as_deref(), Some("Acme Trust"));
}

#[test]
fn resubmitting_pending_email_is_rejected_without_writes() {
    let h = harness();
    h.workflow.submit(payload()).expect("first intake succeeds");
    let before = intake_row_counts(&h.store);

    let again = IntakePayload {
        email: "  JORDAN.REYES@example.com".to_string(),
        property_address: "1 Other Rd".to_string(),
        ..payload()
    };
    let err = h.workflow.submit(again).expect_err("duplicate email");
    match err {
        IntakeError::Rejected(rejection) => {
            assert_eq!(rejection, IntakeRejection::EmailExistsPending);
            assert_eq!(rejection.code(), "EMAIL_EXISTS_PENDING");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(intake_row_counts(&h.store), before);
    assert_eq!(h.identity.len(), 1);
}

#[test]
fn authenticated_email_must_sign_in() {
    let h = harness();
    let before = intake_row_counts(&h.store);
    let existing = IntakePayload {
        email: "referrals@protestdesk.test".to_string(),
        ..payload()
    };

    let err = h.workflow.submit(existing).expect_err("account exists");
    assert!(matches!(
        err,
        IntakeError::Rejected(IntakeRejection::EmailExistsAuthenticated)
    ));
    assert_eq!(intake_row_counts(&h.store), before);
    assert!(h.identity.is_empty());
}

#[test]
fn duplicate_address_is_rejected_after_whitespace_normalization() {
    let h = harness();
    h.workflow.submit(payload()).expect("first intake succeeds");
    let before = intake_row_counts(&h.store);

    let neighbour = IntakePayload {
        email: "someone.else@example.com".to_string(),
        property_address: "  4410 Shoal Creek Blvd,  Austin, TX 78756 ".to_string(),
        ..payload()
    };
    let err = h.workflow.submit(neighbour).expect_err("duplicate property");
    match err {
        IntakeError::Rejected(rejection) => assert_eq!(rejection.code(), "DUPLICATE_PROPERTY"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(intake_row_counts(&h.store), before);
    assert_eq!(h.identity.len(), 1);
}

#[test]
fn missing_required_field_writes_nothing() {
    let h = harness();
    let incomplete = IntakePayload {
        last_name: String::new(),
        ..payload()
    };

    let err = h.workflow.submit(incomplete).expect_err("incomplete form");
    assert!(matches!(
        err,
        IntakeError::Rejected(IntakeRejection::MissingField("last_name"))
    ));
    assert!(h.identity.is_empty());
    assert_eq!(h.store.count(EntityKind::Property), 0);
}

fn failing_workflow(
    fail_on: EntityKind,
    policy: CompensationPolicy,
    identity: Arc<InMemoryIdentityDirectory>,
) -> (
    Arc<FailingStore>,
    IntakeWorkflow<FailingStore, InMemoryIdentityDirectory, RecordingJobDispatcher>,
) {
    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
        fail_on,
    });
    let workflow = IntakeWorkflow::new(
        store.clone(),
        identity,
        Arc::new(RecordingJobDispatcher::default()),
        IntakeSettings {
            compensation: policy,
            ..IntakeSettings::default()
        },
    );
    (store, workflow)
}

#[test]
fn failed_step_rolls_back_every_completed_write() {
    let identity = Arc::new(InMemoryIdentityDirectory::new());
    let (store, workflow) =
        failing_workflow(EntityKind::Protest, CompensationPolicy::Rollback, identity.clone());

    let err = workflow.submit(payload()).expect_err("protest insert fails");
    match err {
        IntakeError::Step {
            step,
            compensation,
            ..
        } => {
            assert_eq!(step, IntakeStep::CreateProtest);
            assert!(compensation.is_clean(), "{compensation:?}");
            assert_eq!(compensation.undone.len(), 6);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    for kind in INTAKE_TABLES {
        assert_eq!(store.inner.count(kind), 0, "{kind} left behind");
    }
    assert!(identity.is_empty());
}

#[test]
fn leave_partial_policy_keeps_completed_writes() {
    let identity = Arc::new(InMemoryIdentityDirectory::new());
    let (store, workflow) = failing_workflow(
        EntityKind::Application,
        CompensationPolicy::LeavePartial,
        identity.clone(),
    );

    let err = workflow.submit(payload()).expect_err("application insert fails");
    match err {
        IntakeError::Step {
            step, compensation, ..
        } => {
            assert_eq!(step, IntakeStep::CreateApplication);
            assert_eq!(compensation.policy, CompensationPolicy::LeavePartial);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.inner.count(EntityKind::Property), 1);
    assert_eq!(store.inner.count(EntityKind::Application), 0);
    assert_eq!(identity.len(), 1);
}

#[test]
fn reused_identity_survives_rollback_and_skips_confirmation() {
    let identity = Arc::new(InMemoryIdentityDirectory::new());
    let existing_id = identity.register("jordan.reyes@example.com", IdentityMetadata::default());

    let (_, failing) =
        failing_workflow(EntityKind::Owner, CompensationPolicy::Rollback, identity.clone());
    failing.submit(payload()).expect_err("owner insert fails");
    assert!(identity.contains(&existing_id));

    let h = harness();
    h.identity
        .register("jordan.reyes@example.com", IdentityMetadata::default());
    let receipt = h.workflow.submit(payload()).expect("intake succeeds");
    assert!(!receipt.requires_email_confirmation);
}

#[test]
fn referral_code_links_referrer() {
    let h = harness();
    let receipt = h
        .workflow
        .submit(IntakePayload {
            referral_code: Some("demo2024".to_string()),
            ..payload()
        })
        .expect("intake succeeds");
    assert!(receipt.referral_linked);

    let links: Vec<ReferralRelationship> = select_entities(
        h.store.as_ref(),
        &Filter::eq("referee_id", receipt.profile_id.as_str()),
    )
    .expect("lookup");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].referrer_id, "demo-referrer");
}

#[test]
fn unknown_referral_code_does_not_block_intake() {
    let h = harness();
    let receipt = h
        .workflow
        .submit(IntakePayload {
            referral_code: Some("NOSUCH".to_string()),
            ..payload()
        })
        .expect("intake succeeds");
    assert!(!receipt.referral_linked);
    assert_eq!(h.store.count(EntityKind::ReferralRelationship), 0);
}

#[test]
fn offline_job_runner_does_not_fail_intake() {
    let store = Arc::new(MemoryStore::new());
    let workflow = IntakeWorkflow::new(
        store.clone(),
        Arc::new(InMemoryIdentityDirectory::new()),
        Arc::new(OfflineJobs),
        IntakeSettings::default(),
    );

    let receipt = workflow.submit(payload()).expect("intake succeeds");
    assert!(receipt.documents_requested.is_empty());
    assert_eq!(store.count(EntityKind::Protest), 1);
}

#[test]
fn configured_document_types_limit_jobs() {
    let h = harness_with(
        MemoryStore::new(),
        IntakeSettings {
            document_types: vec![DocumentKind::ServiceAgreement],
            ..IntakeSettings::default()
        },
    );
    let receipt = h.workflow.submit(payload()).expect("intake succeeds");
    assert_eq!(receipt.documents_requested, vec![DocumentKind::ServiceAgreement]);
    assert_eq!(h.jobs.jobs().len(), 1);
}
