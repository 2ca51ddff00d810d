//! Batch intake from a CSV export of the sign-up form.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{IntakeError, IntakePayload, IntakeReceipt};
use super::service::IntakeWorkflow;
use crate::gateways::{IdentityProvider, JobDispatcher};
use crate::store::DataStore;

#[derive(Debug)]
pub enum IntakeImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for IntakeImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntakeImportError::Io(err) => write!(f, "failed to read intake export: {}", err),
            IntakeImportError::Csv(err) => write!(f, "invalid intake CSV data: {}", err),
        }
    }
}

impl std::error::Error for IntakeImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IntakeImportError::Io(err) => Some(err),
            IntakeImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for IntakeImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for IntakeImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Row-level outcome for anything other than a clean intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportIssue {
    /// 1-based data row, not counting the header.
    pub row: usize,
    pub email: Option<String>,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub accepted: Vec<IntakeReceipt>,
    pub rejected: Vec<ImportIssue>,
    pub failed: Vec<ImportIssue>,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len() + self.failed.len()
    }
}

#[derive(Debug, Deserialize)]
struct IntakeRow {
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    property_address: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    mailing_address: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    county: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    parcel_number: Option<String>,
    #[serde(default)]
    assessed_value: Option<f64>,
    #[serde(default)]
    estimated_savings: Option<f64>,
    #[serde(default)]
    tax_year: Option<i32>,
    #[serde(default, deserialize_with = "flag")]
    is_trust_entity: bool,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    entity_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    entity_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    referral_code: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    signature: Option<String>,
}

impl From<IntakeRow> for IntakePayload {
    fn from(row: IntakeRow) -> Self {
        IntakePayload {
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            property_address: row.property_address,
            mailing_address: row.mailing_address,
            county: row.county,
            parcel_number: row.parcel_number,
            assessed_value: row.assessed_value,
            estimated_savings: row.estimated_savings,
            tax_year: row.tax_year,
            is_trust_entity: row.is_trust_entity,
            entity_name: row.entity_name,
            entity_type: row.entity_type,
            referral_code: row.referral_code,
            signature: row.signature,
            password: None,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(matches!(
        opt.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "yes" | "y" | "1")
    ))
}

impl<S, I, J> IntakeWorkflow<S, I, J>
where
    S: DataStore + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
    J: JobDispatcher + ?Sized + 'static,
{
    pub fn import_path<P: AsRef<Path>>(&self, path: P) -> Result<ImportSummary, IntakeImportError> {
        let file = std::fs::File::open(path)?;
        self.import_reader(file)
    }

    /// Run every row through [`IntakeWorkflow::submit`]. Row failures are
    /// collected; only unreadable input aborts the batch.
    pub fn import_reader<R: Read>(&self, reader: R) -> Result<ImportSummary, IntakeImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut summary = ImportSummary::default();

        for (index, record) in csv_reader.deserialize::<IntakeRow>().enumerate() {
            let row = index + 1;
            let payload: IntakePayload = match record {
                Ok(parsed) => parsed.into(),
                Err(err) if err.is_io_error() => return Err(err.into()),
                Err(err) => {
                    summary.failed.push(ImportIssue {
                        row,
                        email: None,
                        code: "INVALID_ROW".to_string(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            let email = Some(payload.normalized_email());

            match self.submit(payload) {
                Ok(receipt) => summary.accepted.push(receipt),
                Err(IntakeError::Rejected(rejection)) => summary.rejected.push(ImportIssue {
                    row,
                    email,
                    code: rejection.code().to_string(),
                    message: rejection.to_string(),
                }),
                Err(err @ IntakeError::Step { .. }) => summary.failed.push(ImportIssue {
                    row,
                    email,
                    code: "INTAKE_FAILED".to_string(),
                    message: err.to_string(),
                }),
            }
        }

        tracing::info!(
            accepted = summary.accepted.len(),
            rejected = summary.rejected.len(),
            failed = summary.failed.len(),
            "intake import finished"
        );
        Ok(summary)
    }
}
