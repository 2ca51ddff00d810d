use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::offer::resolve_offer_amount;
use super::status::{ProtestStatus, TransitionError};
use crate::store::{find_entity, insert_entity, upsert_entity, DataStore, Filter, StoreError};
use crate::workflows::graph::{Bill, BillStatus, EntityKind, Property, Protest};

/// Share of the achieved savings invoiced to the customer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillingPolicy {
    pub contingency_rate: f64,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            contingency_rate: 0.25,
        }
    }
}

impl BillingPolicy {
    pub fn fee_for(&self, savings: f64) -> f64 {
        ((savings * self.contingency_rate) * 100.0).round() / 100.0
    }
}

/// What an administrator may do with a protest right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewActions {
    pub protest_id: String,
    pub status: ProtestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_amount: Option<f64>,
    pub can_accept: bool,
    pub can_reject: bool,
    pub next_statuses: Vec<ProtestStatus>,
}

/// Result of accepting a county offer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferResolution {
    pub protest: Protest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill: Option<Bill>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtestError {
    #[error("protest {0} not found")]
    NotFound(String),
    #[error("property {0} for protest not found")]
    MissingProperty(String),
    #[error("no county offer amount recorded for protest {0}")]
    OfferUnavailable(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Administrator actions over a protest's appeal status.
pub struct ProtestReviewService<S: ?Sized> {
    store: Arc<S>,
    billing: BillingPolicy,
}

impl<S> ProtestReviewService<S>
where
    S: DataStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, billing: BillingPolicy) -> Self {
        Self { store, billing }
    }

    fn load(&self, protest_id: &str) -> Result<Protest, ProtestError> {
        find_entity(self.store.as_ref(), protest_id)?
            .ok_or_else(|| ProtestError::NotFound(protest_id.to_string()))
    }

    pub fn review_actions(&self, protest_id: &str) -> Result<ReviewActions, ProtestError> {
        let protest = self.load(protest_id)?;
        let status = protest.appeal_status;
        let offer_amount = resolve_offer_amount(&protest);

        Ok(ReviewActions {
            protest_id: protest.id,
            status,
            offer_amount,
            can_accept: offer_amount.is_some() && status.can_transition_to(ProtestStatus::Accepted),
            can_reject: offer_amount.is_some() && status.can_transition_to(ProtestStatus::Rejected),
            next_statuses: status.successors().to_vec(),
        })
    }

    /// Status dropdown. Accept and reject go through the offer-gated paths.
    pub fn set_status(
        &self,
        protest_id: &str,
        next: ProtestStatus,
    ) -> Result<Protest, ProtestError> {
        match next {
            ProtestStatus::Accepted => Ok(self.accept_offer(protest_id)?.protest),
            ProtestStatus::Rejected => self.reject_offer(protest_id),
            _ => {
                let mut protest = self.load(protest_id)?;
                protest.appeal_status = protest.appeal_status.transition(next)?;
                let stored = upsert_entity(self.store.as_ref(), &protest, "id")?;
                tracing::info!(protest_id, status = %next, "protest status updated");
                Ok(stored)
            }
        }
    }

    pub fn accept_offer(&self, protest_id: &str) -> Result<OfferResolution, ProtestError> {
        let mut protest = self.load(protest_id)?;
        let offer = resolve_offer_amount(&protest)
            .ok_or_else(|| ProtestError::OfferUnavailable(protest_id.to_string()))?;
        protest.appeal_status = protest.appeal_status.transition(ProtestStatus::Accepted)?;

        let property: Property = find_entity(self.store.as_ref(), &protest.property_id)?
            .ok_or_else(|| ProtestError::MissingProperty(protest.property_id.clone()))?;
        let assessed = protest.assessed_value.or(property.assessed_value);
        let savings = assessed.map_or(0.0, |value| (value - offer).max(0.0));

        protest.offer_amount = Some(offer);
        protest.savings_amount = savings;

        // Bill first: a protest is never accepted without its invoice.
        let bill = if savings > 0.0 {
            let draft = Bill {
                id: String::new(),
                user_id: property.user_id.clone(),
                owner_id: property.owner_id.clone(),
                protest_id: Some(protest.id.clone()),
                amount: self.billing.fee_for(savings),
                status: BillStatus::Pending,
                created_at: Some(Utc::now()),
            };
            Some(insert_entity(self.store.as_ref(), &draft)?)
        } else {
            None
        };

        let protest = match upsert_entity(self.store.as_ref(), &protest, "id") {
            Ok(stored) => stored,
            Err(err) => {
                if let Some(bill) = &bill {
                    self.withdraw_bill(bill);
                }
                return Err(err.into());
            }
        };

        tracing::info!(
            protest_id,
            offer,
            savings,
            billed = bill.is_some(),
            "county offer accepted"
        );
        Ok(OfferResolution { protest, bill })
    }

    fn withdraw_bill(&self, bill: &Bill) {
        let filter = Filter::eq("id", bill.id.as_str());
        if let Err(err) = self.store.delete(EntityKind::Bill, &filter) {
            tracing::error!(bill_id = %bill.id, error = %err, "orphaned bill left after failed acceptance");
        }
    }

    pub fn reject_offer(&self, protest_id: &str) -> Result<Protest, ProtestError> {
        let mut protest = self.load(protest_id)?;
        if resolve_offer_amount(&protest).is_none() {
            return Err(ProtestError::OfferUnavailable(protest_id.to_string()));
        }
        protest.appeal_status = protest.appeal_status.transition(ProtestStatus::Rejected)?;
        let stored = upsert_entity(self.store.as_ref(), &protest, "id")?;
        tracing::info!(protest_id, "county offer rejected");
        Ok(stored)
    }
}
