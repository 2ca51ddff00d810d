//! The customer record graph: table identities, foreign keys and typed rows.

mod entities;
pub mod schema;

pub use entities::{
    Application, ApplicationStatus, Bill, BillStatus, Communication, CommunicationProperty,
    Contact, CreditTransaction, Document, Entity, ExemptionStatus, Owner, Profile, Property,
    Protest, ReferralRelationship, ReferralStatus, VerificationCode,
};
pub use schema::{
    creation_order, deletion_order, dependency_order, respects_dependencies, EntityKind,
    ForeignKey, SchemaError,
};
