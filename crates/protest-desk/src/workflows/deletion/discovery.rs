use std::collections::BTreeSet;

use serde::Serialize;

use super::domain::{DeletionError, DiscoveryStage};
use crate::store::{select_entities, DataStore, Filter};
use crate::workflows::graph::{Communication, EntityKind, Owner, Property, Protest};

/// Ids of every row reachable from a customer, gathered before any delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerFootprint {
    pub user_id: String,
    pub property_ids: Vec<String>,
    pub protest_ids: Vec<String>,
    pub contact_ids: Vec<String>,
    pub communication_ids: Vec<String>,
    pub owner_ids: Vec<String>,
}

fn stage<T>(
    stage: DiscoveryStage,
    result: Result<T, crate::store::StoreError>,
) -> Result<T, DeletionError> {
    result.map_err(|source| DeletionError::Discovery { stage, source })
}

fn ids_filter(column: &str, ids: &[String]) -> Option<Filter> {
    (!ids.is_empty()).then(|| Filter::is_in(column, ids.iter().map(String::as_str)))
}

fn any_of(filters: impl IntoIterator<Item = Option<Filter>>) -> Option<Filter> {
    let filters: Vec<Filter> = filters.into_iter().flatten().collect();
    match filters.len() {
        0 => None,
        1 => filters.into_iter().next(),
        _ => Some(Filter::any(filters)),
    }
}

impl CustomerFootprint {
    pub fn discover<S>(store: &S, user_id: &str) -> Result<Self, DeletionError>
    where
        S: DataStore + ?Sized,
    {
        let properties: Vec<Property> = stage(
            DiscoveryStage::Properties,
            select_entities(store, &Filter::eq("user_id", user_id)),
        )?;
        let property_ids: Vec<String> = properties.iter().map(|p| p.id.clone()).collect();
        let contact_ids: Vec<String> = properties
            .iter()
            .filter_map(|p| p.contact_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let protest_ids = match ids_filter("property_id", &property_ids) {
            Some(filter) => stage(
                DiscoveryStage::Protests,
                select_entities::<_, Protest>(store, &filter),
            )?
            .into_iter()
            .map(|p| p.id)
            .collect(),
            None => Vec::new(),
        };

        let communication_ids = match ids_filter("contact_id", &contact_ids) {
            Some(filter) => stage(
                DiscoveryStage::Communications,
                select_entities::<_, Communication>(store, &filter),
            )?
            .into_iter()
            .map(|c| c.id)
            .collect(),
            None => Vec::new(),
        };

        let owner_ids = stage(
            DiscoveryStage::Owners,
            select_entities::<_, Owner>(store, &Filter::eq("created_by", user_id)),
        )?
        .into_iter()
        .map(|o| o.id)
        .collect();

        Ok(Self {
            user_id: user_id.to_string(),
            property_ids,
            protest_ids,
            contact_ids,
            communication_ids,
            owner_ids,
        })
    }

    /// Rows of `table` that belong to this customer, or `None` when the id
    /// set the table is keyed on turned out empty.
    pub fn filter_for(&self, table: EntityKind) -> Option<Filter> {
        let user = || Some(Filter::eq("user_id", self.user_id.as_str()));
        match table {
            EntityKind::Bill => any_of([
                user(),
                ids_filter("protest_id", &self.protest_ids),
                ids_filter("owner_id", &self.owner_ids),
            ]),
            EntityKind::Document => {
                any_of([user(), ids_filter("property_id", &self.property_ids)])
            }
            EntityKind::CommunicationProperty => any_of([
                ids_filter("property_id", &self.property_ids),
                ids_filter("communication_id", &self.communication_ids),
            ]),
            EntityKind::Communication => ids_filter("id", &self.communication_ids),
            EntityKind::Protest => ids_filter("id", &self.protest_ids),
            EntityKind::Application => {
                any_of([user(), ids_filter("property_id", &self.property_ids)])
            }
            EntityKind::Property => ids_filter("id", &self.property_ids),
            EntityKind::Contact => ids_filter("id", &self.contact_ids),
            EntityKind::Owner => ids_filter("id", &self.owner_ids),
            EntityKind::CreditTransaction | EntityKind::VerificationCode => user(),
            EntityKind::ReferralRelationship => Some(Filter::any(vec![
                Filter::eq("referrer_id", self.user_id.as_str()),
                Filter::eq("referee_id", self.user_id.as_str()),
            ])),
            EntityKind::Profile => Some(Filter::eq("id", self.user_id.as_str())),
        }
    }
}
