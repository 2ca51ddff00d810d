use chrono::Utc;

use crate::store::{insert_entity, select_entities, DataStore, Filter, StoreError};
use crate::workflows::graph::{Profile, ReferralRelationship, ReferralStatus};

const CODE_LEN: usize = 8;

/// Short shareable code handed to every new profile.
pub(crate) fn generate_referral_code() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(CODE_LEN)
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Record who referred `referee`. Never fails the caller: an unknown code, a
/// self-referral or a store error only yields `false`.
pub(crate) fn link_referral<S>(store: &S, code: &str, referee: &Profile) -> bool
where
    S: DataStore + ?Sized,
{
    match try_link(store, code, referee) {
        Ok(linked) => linked,
        Err(err) => {
            tracing::warn!(referee_id = %referee.id, code, error = %err, "referral link failed");
            false
        }
    }
}

fn try_link<S>(store: &S, code: &str, referee: &Profile) -> Result<bool, StoreError>
where
    S: DataStore + ?Sized,
{
    let code = code.trim().to_ascii_uppercase();
    let referrer = select_entities::<_, Profile>(store, &Filter::eq("referral_code", code.as_str()))?
        .into_iter()
        .next();

    let Some(referrer) = referrer else {
        tracing::debug!(code = %code, "unknown referral code");
        return Ok(false);
    };
    if referrer.id == referee.id || referrer.email.eq_ignore_ascii_case(&referee.email) {
        tracing::debug!(code = %code, "ignoring self-referral");
        return Ok(false);
    }

    let existing: Vec<ReferralRelationship> =
        select_entities(store, &Filter::eq("referee_id", referee.id.as_str()))?;
    if !existing.is_empty() {
        return Ok(false);
    }

    insert_entity(
        store,
        &ReferralRelationship {
            id: String::new(),
            referrer_id: referrer.id.clone(),
            referee_id: referee.id.clone(),
            referral_code: code,
            status: ReferralStatus::Pending,
            created_at: Some(Utc::now()),
        },
    )?;
    tracing::info!(referrer_id = %referrer.id, referee_id = %referee.id, "referral linked");
    Ok(true)
}
