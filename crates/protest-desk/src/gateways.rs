//! Outbound collaborators: the hosted identity service and the async job
//! runner used for document generation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sign-up credentials handed to the identity service.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub password: String,
}

/// Profile metadata stored alongside the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMetadata {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Result of asking the identity service for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityGrant {
    /// A brand-new identity; the customer still has to confirm their email.
    Created { identity_id: String },
    /// The email already had an identity, which is reused as-is.
    Existing { identity_id: String },
}

impl IdentityGrant {
    pub fn identity_id(&self) -> &str {
        match self {
            IdentityGrant::Created { identity_id } | IdentityGrant::Existing { identity_id } => {
                identity_id
            }
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, IdentityGrant::Created { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity {0} not found")]
    NotFound(String),
    #[error("identity operation not permitted: {0}")]
    Forbidden(String),
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// Authentication backend that owns customer identities.
pub trait IdentityProvider: Send + Sync {
    fn create_identity(
        &self,
        email: &str,
        credentials: &Credentials,
        metadata: &IdentityMetadata,
    ) -> Result<IdentityGrant, IdentityError>;

    /// May legitimately fail when the caller's credentials cannot delete users.
    fn remove_identity(&self, identity_id: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Clone)]
struct StoredIdentity {
    id: String,
    metadata: IdentityMetadata,
}

/// Identity directory held in process memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIdentityDirectory {
    identities: Arc<Mutex<HashMap<String, StoredIdentity>>>,
    removal_forbidden: bool,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mimics a client holding only the public key: removals are refused.
    pub fn without_admin_rights() -> Self {
        Self {
            removal_forbidden: true,
            ..Self::default()
        }
    }

    /// Register an identity up front, as if the customer had signed up earlier.
    pub fn register(&self, email: &str, metadata: IdentityMetadata) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(mut identities) = self.identities.lock() {
            identities.insert(
                normalize_email(email),
                StoredIdentity {
                    id: id.clone(),
                    metadata,
                },
            );
        }
        id
    }

    pub fn contains(&self, identity_id: &str) -> bool {
        self.identities
            .lock()
            .map(|identities| identities.values().any(|stored| stored.id == identity_id))
            .unwrap_or(false)
    }

    pub fn metadata_for(&self, email: &str) -> Option<IdentityMetadata> {
        self.identities.lock().ok().and_then(|identities| {
            identities
                .get(&normalize_email(email))
                .map(|stored| stored.metadata.clone())
        })
    }

    pub fn len(&self) -> usize {
        self.identities
            .lock()
            .map(|identities| identities.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl IdentityProvider for InMemoryIdentityDirectory {
    fn create_identity(
        &self,
        email: &str,
        credentials: &Credentials,
        metadata: &IdentityMetadata,
    ) -> Result<IdentityGrant, IdentityError> {
        if credentials.password.is_empty() {
            return Err(IdentityError::Forbidden("password must not be empty".to_string()));
        }

        let mut identities = self
            .identities
            .lock()
            .map_err(|_| IdentityError::Unavailable("identity lock poisoned".to_string()))?;

        let key = normalize_email(email);
        if let Some(existing) = identities.get(&key) {
            return Ok(IdentityGrant::Existing {
                identity_id: existing.id.clone(),
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        identities.insert(
            key,
            StoredIdentity {
                id: id.clone(),
                metadata: metadata.clone(),
            },
        );
        Ok(IdentityGrant::Created { identity_id: id })
    }

    fn remove_identity(&self, identity_id: &str) -> Result<(), IdentityError> {
        if self.removal_forbidden {
            return Err(IdentityError::Forbidden(
                "admin privileges required to delete users".to_string(),
            ));
        }

        let mut identities = self
            .identities
            .lock()
            .map_err(|_| IdentityError::Unavailable("identity lock poisoned".to_string()))?;
        let before = identities.len();
        identities.retain(|_, stored| stored.id != identity_id);
        if identities.len() == before {
            return Err(IdentityError::NotFound(identity_id.to_string()));
        }
        Ok(())
    }
}

/// A named background job with its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub name: String,
    pub payload: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job runner rejected {name}: {reason}")]
    Rejected { name: String, reason: String },
    #[error("job runner unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget job runner. Callers log failures and move on.
pub trait JobDispatcher: Send + Sync {
    fn invoke(&self, job: JobRequest) -> Result<(), JobError>;
}

/// Dispatcher that only writes each job to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJobDispatcher;

impl JobDispatcher for TracingJobDispatcher {
    fn invoke(&self, job: JobRequest) -> Result<(), JobError> {
        tracing::info!(job = %job.name, payload = %job.payload, "dispatched background job");
        Ok(())
    }
}

/// Dispatcher that keeps every job so callers can inspect them.
#[derive(Debug, Default, Clone)]
pub struct RecordingJobDispatcher {
    jobs: Arc<Mutex<Vec<JobRequest>>>,
}

impl RecordingJobDispatcher {
    pub fn jobs(&self) -> Vec<JobRequest> {
        self.jobs
            .lock()
            .map(|jobs| jobs.clone())
            .unwrap_or_default()
    }
}

impl JobDispatcher for RecordingJobDispatcher {
    fn invoke(&self, job: JobRequest) -> Result<(), JobError> {
        self.jobs
            .lock()
            .map_err(|_| JobError::Unavailable("job log lock poisoned".to_string()))?
            .push(job);
        Ok(())
    }
}
