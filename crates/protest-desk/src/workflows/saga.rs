//! Compensation ledger for multi-step writes.
//!
//! Every completed step records how to undo itself. When a later step fails
//! the ledger is unwound newest-first; undo failures are collected, never
//! raised, so one stuck row does not prevent the rest from being restored.

use serde::{Deserialize, Serialize};

use crate::gateways::IdentityProvider;
use crate::store::{DataStore, Filter, Record};
use crate::workflows::graph::EntityKind;

/// What a workflow does with already-completed steps when a later one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationPolicy {
    /// Undo completed steps in reverse order.
    #[default]
    Rollback,
    /// Leave the store as the failing step found it.
    LeavePartial,
}

impl CompensationPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rollback" | "compensate" => Some(Self::Rollback),
            "leave_partial" | "partial" | "none" => Some(Self::LeavePartial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Compensation {
    DeleteRow { table: EntityKind, id: String },
    /// Written back by id, so rows that still exist are overwritten.
    RestoreRows { table: EntityKind, rows: Vec<Record> },
    RemoveIdentity { identity_id: String },
}

/// Outcome of unwinding a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompensationReport {
    pub policy: CompensationPolicy,
    /// Undo actions that completed, newest first.
    pub undone: Vec<String>,
    pub failures: Vec<String>,
}

impl CompensationReport {
    pub fn skipped() -> Self {
        Self {
            policy: CompensationPolicy::LeavePartial,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.policy == CompensationPolicy::Rollback && self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct CompensationLedger {
    actions: Vec<Compensation>,
}

impl CompensationLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, action: Compensation) {
        self.actions.push(action);
    }

    pub(crate) fn unwind<S, I>(
        self,
        policy: CompensationPolicy,
        store: &S,
        identity: &I,
    ) -> CompensationReport
    where
        S: DataStore + ?Sized,
        I: IdentityProvider + ?Sized,
    {
        if policy == CompensationPolicy::LeavePartial {
            tracing::warn!(
                pending = self.actions.len(),
                "compensation disabled; leaving partial writes in place"
            );
            return CompensationReport::skipped();
        }

        let mut report = CompensationReport {
            policy,
            ..CompensationReport::default()
        };

        for action in self.actions.into_iter().rev() {
            let (label, outcome) = match action {
                Compensation::DeleteRow { table, id } => (
                    format!("delete {table} {id}"),
                    store
                        .delete(table, &Filter::eq("id", id.as_str()))
                        .map(|_| ())
                        .map_err(|err| err.to_string()),
                ),
                Compensation::RestoreRows { table, rows } => {
                    let label = format!("restore {} {table} rows", rows.len());
                    let outcome = rows
                        .into_iter()
                        .try_for_each(|row| store.upsert(table, row, "id").map(|_| ()))
                        .map_err(|err| err.to_string());
                    (label, outcome)
                }
                Compensation::RemoveIdentity { identity_id } => (
                    format!("remove identity {identity_id}"),
                    identity
                        .remove_identity(&identity_id)
                        .map_err(|err| err.to_string()),
                ),
            };

            match outcome {
                Ok(()) => {
                    tracing::debug!(action = %label, "compensated");
                    report.undone.push(label);
                }
                Err(reason) => {
                    tracing::warn!(action = %label, %reason, "compensation failed");
                    report.failures.push(format!("{label}: {reason}"));
                }
            }
        }

        report
    }
}
