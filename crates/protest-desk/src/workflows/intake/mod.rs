//! Customer intake: one form submission becomes an identity plus the linked
//! profile, contact, owner, property, application and protest rows.
//!
//! Duplicate emails and addresses are refused before anything is written.
//! Once writes begin, each step registers its undo in a compensation ledger
//! that is unwound if a later step fails.

pub mod domain;
pub mod import;
mod referral;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    DocumentKind, IntakeError, IntakePayload, IntakeReceipt, IntakeRejection, IntakeSettings,
    IntakeStep, StepFailure,
};
pub use import::{ImportIssue, ImportSummary, IntakeImportError};
pub use router::intake_router;
pub use service::{creation_plan, IntakeWorkflow, INTAKE_TABLES};
