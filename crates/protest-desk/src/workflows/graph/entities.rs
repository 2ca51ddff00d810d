//! Typed rows for every table in the customer record graph.
//!
//! Rows travel through [`crate::store::DataStore`] as JSON maps. An empty `id`
//! on a draft row is omitted so the store assigns one on insert.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::schema::EntityKind;
use crate::workflows::protest::ProtestStatus;

/// Binds a row type to the table it lives in.
pub trait Entity: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

macro_rules! entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: String,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub contact_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub owner_type: String,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub mailing_address: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub contact_id: Option<String>,
    pub address: String,
    #[serde(default)]
    pub parcel_number: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub assessed_value: Option<f64>,
    #[serde(default)]
    pub estimated_savings: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Pending,
    Verified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub property_id: String,
    pub user_id: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub property_id: String,
    pub tax_year: i32,
    pub appeal_status: ProtestStatus,
    pub exemption_status: ExemptionStatus,
    #[serde(default)]
    pub assessed_value: Option<f64>,
    #[serde(default)]
    pub market_value: Option<f64>,
    #[serde(default)]
    pub protest_amount: Option<f64>,
    #[serde(default)]
    pub offer_amount: Option<f64>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub hearing_date: Option<NaiveDate>,
    #[serde(default)]
    pub savings_amount: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Pending,
    Paid,
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub protest_id: Option<String>,
    pub amount: f64,
    pub status: BillStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub property_id: Option<String>,
    pub document_type: String,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Communication {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub contact_id: String,
    pub channel: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationProperty {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub communication_id: String,
    pub property_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCode {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub code: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Credited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRelationship {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub referrer_id: String,
    pub referee_id: String,
    pub referral_code: String,
    pub status: ReferralStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

entity!(Profile, EntityKind::Profile);
entity!(Contact, EntityKind::Contact);
entity!(Owner, EntityKind::Owner);
entity!(Property, EntityKind::Property);
entity!(Application, EntityKind::Application);
entity!(Protest, EntityKind::Protest);
entity!(Bill, EntityKind::Bill);
entity!(Document, EntityKind::Document);
entity!(Communication, EntityKind::Communication);
entity!(CommunicationProperty, EntityKind::CommunicationProperty);
entity!(CreditTransaction, EntityKind::CreditTransaction);
entity!(VerificationCode, EntityKind::VerificationCode);
entity!(ReferralRelationship, EntityKind::ReferralRelationship);
