use std::sync::Arc;

use super::discovery::CustomerFootprint;
use super::domain::{DeletionError, DeletionReport, DiscoveryStage, TableCount};
use crate::gateways::{IdentityError, IdentityProvider};
use crate::store::{find_entity, DataStore};
use crate::workflows::graph::{deletion_order, EntityKind, Profile};
use crate::workflows::saga::{Compensation, CompensationLedger, CompensationPolicy};

/// Removes a customer's full record graph, children before parents, then
/// their login identity.
pub struct CustomerDeletion<S: ?Sized, I: ?Sized> {
    store: Arc<S>,
    identity: Arc<I>,
    policy: CompensationPolicy,
}

impl<S, I> CustomerDeletion<S, I>
where
    S: DataStore + ?Sized + 'static,
    I: IdentityProvider + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, identity: Arc<I>, policy: CompensationPolicy) -> Self {
        Self {
            store,
            identity,
            policy,
        }
    }

    pub fn discover(&self, user_id: &str) -> Result<CustomerFootprint, DeletionError> {
        CustomerFootprint::discover(self.store.as_ref(), user_id)
    }

    /// Safe to repeat: a second run finds nothing and reports zero counts.
    pub fn delete_customer(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<DeletionReport, DeletionError> {
        let store = self.store.as_ref();
        let display_name = match display_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => find_entity::<_, Profile>(store, user_id)
                .map_err(|source| DeletionError::Discovery {
                    stage: DiscoveryStage::Profile,
                    source,
                })?
                .map(|profile| profile.display_name())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| user_id.to_string()),
        };

        let footprint = self.discover(user_id)?;
        tracing::info!(
            user_id,
            properties = footprint.property_ids.len(),
            protests = footprint.protest_ids.len(),
            contacts = footprint.contact_ids.len(),
            owners = footprint.owner_ids.len(),
            "customer deletion started"
        );

        let mut ledger = CompensationLedger::new();
        let mut counts = Vec::with_capacity(EntityKind::ALL.len());

        for table in deletion_order(&EntityKind::ALL)? {
            let Some(filter) = footprint.filter_for(table) else {
                counts.push(TableCount { table, deleted: 0 });
                continue;
            };

            let outcome = store.select(table, &filter).and_then(|snapshot| {
                let deleted = store.delete(table, &filter)?;
                Ok((snapshot, deleted))
            });

            match outcome {
                Ok((snapshot, deleted)) => {
                    if !snapshot.is_empty() {
                        ledger.record(Compensation::RestoreRows {
                            table,
                            rows: snapshot,
                        });
                    }
                    tracing::debug!(user_id, table = %table, deleted, "customer rows deleted");
                    counts.push(TableCount { table, deleted });
                }
                Err(source) => {
                    let compensation = ledger.unwind(self.policy, store, self.identity.as_ref());
                    tracing::error!(
                        user_id,
                        table = %table,
                        error = %source,
                        restored = compensation.undone.len(),
                        "customer deletion failed"
                    );
                    return Err(DeletionError::Step {
                        table,
                        source,
                        completed: counts,
                        compensation,
                    });
                }
            }
        }

        let mut warnings = Vec::new();
        let identity_removed = match self.identity.remove_identity(user_id) {
            Ok(()) => true,
            Err(IdentityError::NotFound(_)) => {
                tracing::debug!(user_id, "login identity already absent");
                false
            }
            Err(err) => {
                tracing::warn!(user_id, error = %err, "could not remove login identity");
                warnings.push(format!("login identity not removed: {err}"));
                false
            }
        };

        let report = DeletionReport {
            user_id: user_id.to_string(),
            display_name,
            counts,
            identity_removed,
            warnings,
        };
        tracing::info!(user_id, total = report.total(), "{}", report.summary());
        Ok(report)
    }
}
