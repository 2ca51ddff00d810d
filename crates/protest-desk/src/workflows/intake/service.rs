use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde_json::json;

use super::domain::{
    DocumentKind, IntakeError, IntakePayload, IntakeReceipt, IntakeRejection, IntakeSettings,
    IntakeStep, StepFailure,
};
use super::referral::{generate_referral_code, link_referral};
use crate::gateways::{
    Credentials, IdentityMetadata, IdentityProvider, JobDispatcher, JobRequest,
};
use crate::store::{
    encode, find_entity, insert_entity, select_entities, upsert_entity, DataStore, Filter, StoreError,
};
use crate::workflows::graph::{
    creation_order, Application, ApplicationStatus, Contact, Entity, EntityKind, ExemptionStatus,
    Owner, Profile, Property, Protest,
};
use crate::workflows::protest::ProtestStatus;
use crate::workflows::saga::{Compensation, CompensationLedger, CompensationReport};

/// Tables written by a successful intake, in no particular order.
pub const INTAKE_TABLES: [EntityKind; 6] = [
    EntityKind::Protest,
    EntityKind::Application,
    EntityKind::Property,
    EntityKind::Owner,
    EntityKind::Contact,
    EntityKind::Profile,
];

/// Write steps for [`INTAKE_TABLES`], parents first, as the graph schema
/// orders them.
pub fn creation_plan() -> Vec<IntakeStep> {
    // The schema is a static DAG, so ordering cannot hit a cycle.
    creation_order(&INTAKE_TABLES)
        .unwrap_or_else(|_| INTAKE_TABLES.iter().rev().copied().collect())
        .into_iter()
        .filter_map(IntakeStep::creating)
        .collect()
}

const DOCUMENT_JOB: &str = "generate-pdf";

type StepResult<T> = Result<T, (IntakeStep, StepFailure)>;

fn at<T, E: Into<StepFailure>>(step: IntakeStep, result: Result<T, E>) -> StepResult<T> {
    result.map_err(|err| (step, err.into()))
}

struct CreatedGraph {
    profile: Profile,
    identity_is_new: bool,
    contact_id: String,
    owner_id: String,
    property_id: String,
    application_id: String,
    protest_id: String,
}

/// Rows written so far while walking the creation plan.
#[derive(Default)]
struct DraftGraph {
    profile: Option<Profile>,
    identity_is_new: bool,
    contact_id: Option<String>,
    owner_id: Option<String>,
    property_id: Option<String>,
    application_id: Option<String>,
    protest_id: Option<String>,
}

/// A row the current step depends on, which an earlier step must have written.
fn written<T: Clone>(step: IntakeStep, table: EntityKind, row: &Option<T>) -> StepResult<T> {
    row.clone()
        .ok_or((step, StepFailure::NotWritten(table)))
}

impl DraftGraph {
    fn profile_id(&self, step: IntakeStep) -> StepResult<String> {
        written(step, EntityKind::Profile, &self.profile).map(|profile| profile.id)
    }

    fn finish(self) -> StepResult<CreatedGraph> {
        let last = IntakeStep::CreateProtest;
        Ok(CreatedGraph {
            profile: written(last, EntityKind::Profile, &self.profile)?,
            identity_is_new: self.identity_is_new,
            contact_id: written(last, EntityKind::Contact, &self.contact_id)?,
            owner_id: written(last, EntityKind::Owner, &self.owner_id)?,
            property_id: written(last, EntityKind::Property, &self.property_id)?,
            application_id: written(last, EntityKind::Application, &self.application_id)?,
            protest_id: written(last, EntityKind::Protest, &self.protest_id)?,
        })
    }
}

/// Turns a customer submission into the linked profile, owner, property,
/// application and protest rows, undoing partial writes on failure.
pub struct IntakeWorkflow<S: ?Sized, I: ?Sized, J: ?Sized> {
    store: Arc<S>,
    identity: Arc<I>,
    jobs: Arc<J>,
    settings: IntakeSettings,
    plan: Vec<IntakeStep>,
}

impl<S, I, J> IntakeWorkflow<S, I, J>
where
    S: DataStore + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
    J: JobDispatcher + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, identity: Arc<I>, jobs: Arc<J>, settings: IntakeSettings) -> Self {
        Self {
            store,
            identity,
            jobs,
            settings,
            plan: creation_plan(),
        }
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    /// Write steps in the order `submit` runs them.
    pub fn plan(&self) -> &[IntakeStep] {
        &self.plan
    }

    pub fn submit(&self, payload: IntakePayload) -> Result<IntakeReceipt, IntakeError> {
        payload.validate()?;
        let email = payload.normalized_email();
        let address = payload.normalized_address();

        self.check_email(&email)?;
        self.check_address(&address)?;

        let mut ledger = CompensationLedger::new();
        let created = match self.create_graph(&payload, &email, &address, &mut ledger) {
            Ok(created) => created,
            Err((step, failure)) => return Err(self.fail(step, failure, ledger, &email, &address)),
        };

        let documents_requested = self.request_documents(&created);
        let referral_linked = payload
            .referral()
            .map(|code| link_referral(self.store.as_ref(), code, &created.profile))
            .unwrap_or(false);

        tracing::info!(
            profile_id = %created.profile.id,
            property_id = %created.property_id,
            protest_id = %created.protest_id,
            documents = documents_requested.len(),
            referral_linked,
            "intake completed"
        );

        Ok(IntakeReceipt {
            profile_id: created.profile.id,
            property_id: created.property_id,
            owner_id: created.owner_id,
            contact_id: created.contact_id,
            application_id: created.application_id,
            protest_id: created.protest_id,
            requires_email_confirmation: created.identity_is_new,
            documents_requested,
            referral_linked,
        })
    }

    fn check_email(&self, email: &str) -> Result<(), IntakeError> {
        let existing: Vec<Profile> = select_entities(self.store.as_ref(), &Filter::eq("email", email))
            .map_err(|err| precheck_failure(IntakeStep::CheckEmail, err))?;

        match existing.first() {
            Some(profile) if profile.is_authenticated => {
                Err(IntakeRejection::EmailExistsAuthenticated.into())
            }
            Some(_) => Err(IntakeRejection::EmailExistsPending.into()),
            None => Ok(()),
        }
    }

    fn check_address(&self, address: &str) -> Result<(), IntakeError> {
        let existing: Vec<Property> =
            select_entities(self.store.as_ref(), &Filter::eq("address", address))
                .map_err(|err| precheck_failure(IntakeStep::CheckAddress, err))?;

        if existing.is_empty() {
            Ok(())
        } else {
            Err(IntakeRejection::DuplicateProperty {
                address: address.to_string(),
            }
            .into())
        }
    }

    fn create_graph(
        &self,
        payload: &IntakePayload,
        email: &str,
        address: &str,
        ledger: &mut CompensationLedger,
    ) -> StepResult<CreatedGraph> {
        let now = Utc::now();
        let phone = Some(payload.phone.trim().to_string());
        let first_name = payload.first_name.trim().to_string();
        let last_name = payload.last_name.trim().to_string();
        let mut graph = DraftGraph::default();

        for &step in &self.plan {
            match step {
                IntakeStep::UpsertProfile => {
                    let (profile, identity_is_new) =
                        self.create_profile(payload, email, phone.clone(), ledger)?;
                    graph.profile = Some(profile);
                    graph.identity_is_new = identity_is_new;
                }
                IntakeStep::CreateContact => {
                    let contact = self.create(
                        step,
                        ledger,
                        &Contact {
                            id: String::new(),
                            first_name: first_name.clone(),
                            last_name: last_name.clone(),
                            email: Some(email.to_string()),
                            phone: phone.clone(),
                            contact_type: "customer".to_string(),
                            created_at: Some(now),
                        },
                    )?;
                    graph.contact_id = Some(contact.id);
                }
                IntakeStep::CreateOwner => {
                    let owner = self.create(
                        step,
                        ledger,
                        &Owner {
                            id: String::new(),
                            name: payload.owner_name(),
                            owner_type: payload.owner_type(),
                            entity_name: payload.is_trust_entity.then(|| payload.owner_name()),
                            mailing_address: Some(
                                payload
                                    .mailing_address
                                    .clone()
                                    .filter(|value| !value.trim().is_empty())
                                    .unwrap_or_else(|| address.to_string()),
                            ),
                            created_by: graph.profile_id(step)?,
                            created_at: Some(now),
                        },
                    )?;
                    graph.owner_id = Some(owner.id);
                }
                IntakeStep::CreateProperty => {
                    let property = self.create(
                        step,
                        ledger,
                        &Property {
                            id: String::new(),
                            user_id: graph.profile_id(step)?,
                            owner_id: written(step, EntityKind::Owner, &graph.owner_id)?,
                            contact_id: Some(written(step, EntityKind::Contact, &graph.contact_id)?),
                            address: address.to_string(),
                            parcel_number: payload.parcel_number.clone(),
                            county: payload.county.clone(),
                            assessed_value: payload.assessed_value,
                            estimated_savings: payload.estimated_savings,
                            created_at: Some(now),
                        },
                    )?;
                    graph.property_id = Some(property.id);
                }
                IntakeStep::CreateApplication => {
                    let application = self.create(
                        step,
                        ledger,
                        &Application {
                            id: String::new(),
                            property_id: written(step, EntityKind::Property, &graph.property_id)?,
                            user_id: graph.profile_id(step)?,
                            signature: payload.signature.clone(),
                            is_verified: false,
                            status: ApplicationStatus::Submitted,
                            created_at: Some(now),
                        },
                    )?;
                    graph.application_id = Some(application.id);
                }
                IntakeStep::CreateProtest => {
                    let protest = self.create(
                        step,
                        ledger,
                        &Protest {
                            id: String::new(),
                            property_id: written(step, EntityKind::Property, &graph.property_id)?,
                            tax_year: payload.tax_year.unwrap_or_else(|| now.year()),
                            appeal_status: ProtestStatus::Pending,
                            exemption_status: ExemptionStatus::Pending,
                            assessed_value: payload.assessed_value,
                            market_value: None,
                            protest_amount: None,
                            offer_amount: None,
                            recommendation: None,
                            hearing_date: None,
                            savings_amount: payload.estimated_savings.unwrap_or(0.0),
                            created_at: Some(now),
                        },
                    )?;
                    graph.protest_id = Some(protest.id);
                }
                IntakeStep::CheckEmail | IntakeStep::CheckAddress | IntakeStep::CreateIdentity => {}
            }
        }

        graph.finish()
    }

    /// Login identity first, then the profile row keyed on its id. A profile
    /// left behind by an earlier attempt is overwritten and restored on undo.
    fn create_profile(
        &self,
        payload: &IntakePayload,
        email: &str,
        phone: Option<String>,
        ledger: &mut CompensationLedger,
    ) -> StepResult<(Profile, bool)> {
        let store = self.store.as_ref();
        let credentials = Credentials {
            password: payload
                .password
                .clone()
                .filter(|password| !password.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()),
        };
        let metadata = IdentityMetadata {
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            phone: phone.clone(),
        };
        let grant = at(
            IntakeStep::CreateIdentity,
            self.identity.create_identity(email, &credentials, &metadata),
        )?;
        if grant.is_new() {
            ledger.record(Compensation::RemoveIdentity {
                identity_id: grant.identity_id().to_string(),
            });
        }

        let profile_id = grant.identity_id().to_string();
        let prior: Option<Profile> = at(IntakeStep::UpsertProfile, find_entity(store, &profile_id))?;
        let profile = Profile {
            id: profile_id,
            email: email.to_string(),
            first_name: metadata.first_name,
            last_name: metadata.last_name,
            phone,
            role: "customer".to_string(),
            is_authenticated: prior.as_ref().is_some_and(|p| p.is_authenticated),
            referral_code: prior
                .as_ref()
                .and_then(|p| p.referral_code.clone())
                .or_else(|| Some(generate_referral_code())),
            created_at: prior.as_ref().and_then(|p| p.created_at).or(Some(Utc::now())),
        };
        let profile = at(IntakeStep::UpsertProfile, upsert_entity(store, &profile, "id"))?;
        match prior {
            None => record_created(ledger, &profile),
            Some(previous) => ledger.record(Compensation::RestoreRows {
                table: EntityKind::Profile,
                rows: vec![at(IntakeStep::UpsertProfile, encode(&previous))?],
            }),
        }
        Ok((profile, grant.is_new()))
    }

    fn create<E: Entity>(
        &self,
        step: IntakeStep,
        ledger: &mut CompensationLedger,
        draft: &E,
    ) -> StepResult<E> {
        let stored = at(step, insert_entity(self.store.as_ref(), draft))?;
        record_created(ledger, &stored);
        tracing::debug!(step = %step, table = %E::KIND, id = stored.id(), "intake row created");
        Ok(stored)
    }

    fn fail(
        &self,
        step: IntakeStep,
        failure: StepFailure,
        ledger: CompensationLedger,
        email: &str,
        address: &str,
    ) -> IntakeError {
        let compensation = ledger.unwind(
            self.settings.compensation,
            self.store.as_ref(),
            self.identity.as_ref(),
        );

        // A concurrent submission can win the race between pre-check and write.
        if let StepFailure::Store(StoreError::UniqueViolation { table, .. }) = &failure {
            let rejection = match table {
                EntityKind::Profile => match self.check_email(email) {
                    Err(IntakeError::Rejected(rejection)) => Some(rejection),
                    _ => Some(IntakeRejection::EmailExistsPending),
                },
                EntityKind::Property => Some(IntakeRejection::DuplicateProperty {
                    address: address.to_string(),
                }),
                _ => None,
            };
            if let Some(rejection) = rejection {
                tracing::info!(step = %step, code = rejection.code(), "intake rejected at write time");
                return IntakeError::Rejected(rejection);
            }
        }

        tracing::error!(
            step = %step,
            error = %failure,
            undone = compensation.undone.len(),
            compensation_failures = compensation.failures.len(),
            "intake failed"
        );
        IntakeError::Step {
            step,
            source: failure,
            compensation,
        }
    }

    fn request_documents(&self, created: &CreatedGraph) -> Vec<DocumentKind> {
        self.settings
            .document_types
            .iter()
            .copied()
            .filter(|kind| {
                let job = JobRequest {
                    name: DOCUMENT_JOB.to_string(),
                    payload: json!({
                        "document_type": kind.label(),
                        "user_id": created.profile.id,
                        "property_id": created.property_id,
                        "protest_id": created.protest_id,
                    }),
                };
                match self.jobs.invoke(job) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(
                            document = kind.label(),
                            property_id = %created.property_id,
                            error = %err,
                            "document generation request failed"
                        );
                        false
                    }
                }
            })
            .collect()
    }
}

fn record_created<E: Entity>(ledger: &mut CompensationLedger, row: &E) {
    ledger.record(Compensation::DeleteRow {
        table: E::KIND,
        id: row.id().to_string(),
    });
}

fn precheck_failure(step: IntakeStep, err: StoreError) -> IntakeError {
    IntakeError::Step {
        step,
        source: err.into(),
        compensation: CompensationReport::default(),
    }
}
