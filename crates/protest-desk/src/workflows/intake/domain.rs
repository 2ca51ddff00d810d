use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gateways::IdentityError;
use crate::store::StoreError;
use crate::workflows::graph::EntityKind;
use crate::workflows::saga::{CompensationPolicy, CompensationReport};

/// Customer form submission, already validated client-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakePayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    /// Situs address of the parcel being protested.
    pub property_address: String,
    #[serde(default)]
    pub mailing_address: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub parcel_number: Option<String>,
    #[serde(default)]
    pub assessed_value: Option<f64>,
    #[serde(default)]
    pub estimated_savings: Option<f64>,
    #[serde(default)]
    pub tax_year: Option<i32>,
    #[serde(default)]
    pub is_trust_entity: bool,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl IntakePayload {
    pub fn validate(&self) -> Result<(), IntakeRejection> {
        let required = [
            ("email", self.email.as_str()),
            ("first_name", self.first_name.as_str()),
            ("last_name", self.last_name.as_str()),
            ("phone", self.phone.as_str()),
            ("property_address", self.property_address.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(IntakeRejection::MissingField(field));
        }
        if !self.email.contains('@') {
            return Err(IntakeRejection::MissingField("email"));
        }
        if self.is_trust_entity && non_blank(self.entity_name.as_deref()).is_none() {
            return Err(IntakeRejection::MissingField("entity_name"));
        }
        Ok(())
    }

    pub fn normalized_email(&self) -> String {
        self.email.trim().to_ascii_lowercase()
    }

    pub fn normalized_address(&self) -> String {
        self.property_address
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Entity name for trusts and companies, otherwise "First Last".
    pub fn owner_name(&self) -> String {
        match non_blank(self.entity_name.as_deref()) {
            Some(entity) if self.is_trust_entity => entity.to_string(),
            _ => format!("{} {}", self.first_name.trim(), self.last_name.trim()),
        }
    }

    pub fn owner_type(&self) -> String {
        if !self.is_trust_entity {
            return "individual".to_string();
        }
        non_blank(self.entity_type.as_deref())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "entity".to_string())
    }

    pub fn referral(&self) -> Option<&str> {
        non_blank(self.referral_code.as_deref())
    }
}

/// Paperwork generated asynchronously once intake commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    AppointmentOfAgent,
    ServiceAgreement,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AppointmentOfAgent => "appointment_of_agent",
            Self::ServiceAgreement => "service_agreement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "appointment_of_agent" | "form_50_162" => Some(Self::AppointmentOfAgent),
            "service_agreement" => Some(Self::ServiceAgreement),
            _ => None,
        }
    }
}

/// Tunables for the intake workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeSettings {
    pub document_types: Vec<DocumentKind>,
    pub compensation: CompensationPolicy,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            document_types: vec![DocumentKind::AppointmentOfAgent, DocumentKind::ServiceAgreement],
            compensation: CompensationPolicy::default(),
        }
    }
}

/// Identifiers produced by a successful intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeReceipt {
    pub profile_id: String,
    pub property_id: String,
    pub owner_id: String,
    pub contact_id: String,
    pub application_id: String,
    pub protest_id: String,
    /// True for a new account that must confirm its email before signing in.
    pub requires_email_confirmation: bool,
    pub documents_requested: Vec<DocumentKind>,
    pub referral_linked: bool,
}

/// Expected, user-facing refusals. Each carries a stable code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeRejection {
    #[error("an account already exists for this email; please sign in")]
    EmailExistsAuthenticated,
    #[error("an application for this email is already awaiting confirmation")]
    EmailExistsPending,
    #[error("the property at {address} has already been submitted")]
    DuplicateProperty { address: String },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl IntakeRejection {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmailExistsAuthenticated => "EMAIL_EXISTS_AUTHENTICATED",
            Self::EmailExistsPending => "EMAIL_EXISTS_PENDING",
            Self::DuplicateProperty { .. } => "DUPLICATE_PROPERTY",
            Self::MissingField(_) => "MISSING_REQUIRED_FIELD",
        }
    }
}

/// Named stages of an intake run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStep {
    CheckEmail,
    CheckAddress,
    CreateIdentity,
    UpsertProfile,
    CreateContact,
    CreateOwner,
    CreateProperty,
    CreateApplication,
    CreateProtest,
}

impl IntakeStep {
    pub const ALL: [Self; 9] = [
        Self::CheckEmail,
        Self::CheckAddress,
        Self::CreateIdentity,
        Self::UpsertProfile,
        Self::CreateContact,
        Self::CreateOwner,
        Self::CreateProperty,
        Self::CreateApplication,
        Self::CreateProtest,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::CheckEmail => "check_email",
            Self::CheckAddress => "check_address",
            Self::CreateIdentity => "create_identity",
            Self::UpsertProfile => "upsert_profile",
            Self::CreateContact => "create_contact",
            Self::CreateOwner => "create_owner",
            Self::CreateProperty => "create_property",
            Self::CreateApplication => "create_application",
            Self::CreateProtest => "create_protest",
        }
    }

    pub const fn entity(self) -> Option<EntityKind> {
        match self {
            Self::UpsertProfile => Some(EntityKind::Profile),
            Self::CreateContact => Some(EntityKind::Contact),
            Self::CreateOwner => Some(EntityKind::Owner),
            Self::CreateProperty => Some(EntityKind::Property),
            Self::CreateApplication => Some(EntityKind::Application),
            Self::CreateProtest => Some(EntityKind::Protest),
            Self::CheckEmail | Self::CheckAddress | Self::CreateIdentity => None,
        }
    }

    /// The step that writes `kind`, if intake writes it at all.
    pub fn creating(kind: EntityKind) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.entity() == Some(kind))
    }
}

impl fmt::Display for IntakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepFailure {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("{0} row was needed before it was written")]
    NotWritten(EntityKind),
}

/// Error raised by the intake workflow.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Rejected(#[from] IntakeRejection),
    #[error("intake failed at {step}: {source}")]
    Step {
        step: IntakeStep,
        #[source]
        source: StepFailure,
        compensation: CompensationReport,
    },
}
