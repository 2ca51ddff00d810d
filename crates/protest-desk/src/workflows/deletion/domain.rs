use std::fmt;

use serde::Serialize;

use crate::store::StoreError;
use crate::workflows::graph::{EntityKind, SchemaError};
use crate::workflows::saga::CompensationReport;

/// Rows removed from one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: EntityKind,
    pub deleted: usize,
}

/// Outcome of removing one customer and everything hanging off them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub user_id: String,
    pub display_name: String,
    /// One entry per table, in the order the tables were cleared.
    pub counts: Vec<TableCount>,
    pub identity_removed: bool,
    pub warnings: Vec<String>,
}

impl DeletionReport {
    pub fn deleted(&self, table: EntityKind) -> usize {
        self.counts
            .iter()
            .find(|count| count.table == table)
            .map_or(0, |count| count.deleted)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|count| count.deleted).sum()
    }

    pub fn is_noop(&self) -> bool {
        self.total() == 0
    }

    pub fn summary(&self) -> String {
        let tables: Vec<String> = self
            .counts
            .iter()
            .filter(|count| count.deleted > 0)
            .map(|count| format!("{} {}", count.deleted, count.table))
            .collect();

        let mut summary = if tables.is_empty() {
            format!(
                "No records found for {} ({})",
                self.display_name, self.user_id
            )
        } else {
            format!(
                "Deleted {} records for {} ({}): {}",
                self.total(),
                self.display_name,
                self.user_id,
                tables.join(", ")
            )
        };
        if !self.identity_removed {
            summary.push_str("; login identity was not removed");
        }
        summary
    }
}

/// Read-only lookups made before anything is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStage {
    Profile,
    Properties,
    Protests,
    Communications,
    Owners,
}

impl fmt::Display for DiscoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiscoveryStage::Profile => "profile",
            DiscoveryStage::Properties => "properties",
            DiscoveryStage::Protests => "protests",
            DiscoveryStage::Communications => "communications",
            DiscoveryStage::Owners => "owners",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("could not look up {stage}: {source}")]
    Discovery {
        stage: DiscoveryStage,
        #[source]
        source: StoreError,
    },
    #[error("failed to delete from {table}: {source}")]
    Step {
        table: EntityKind,
        #[source]
        source: StoreError,
        completed: Vec<TableCount>,
        compensation: CompensationReport,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
