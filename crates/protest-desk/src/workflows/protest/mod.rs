//! Appeal-status state machine and the administrator review actions built on it.

mod offer;
pub mod router;
mod service;
mod status;

pub use offer::{parse_dollar_amount, resolve_offer_amount};
pub use router::protest_router;
pub use service::{BillingPolicy, OfferResolution, ProtestError, ProtestReviewService, ReviewActions};
pub use status::{ProtestStatus, TransitionError};
