use std::fmt;

use serde::{Deserialize, Serialize};

/// Appeal status of a protest. Moves only on explicit administrator action,
/// apart from the initial `pending` written at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtestStatus {
    Pending,
    Filed,
    OfferReceived,
    NeedsReview,
    HearingScheduled,
    EmailReplyRequired,
    Accepted,
    Rejected,
    Completed,
}

impl ProtestStatus {
    pub const ALL: [Self; 9] = [
        Self::Pending,
        Self::Filed,
        Self::OfferReceived,
        Self::NeedsReview,
        Self::HearingScheduled,
        Self::EmailReplyRequired,
        Self::Accepted,
        Self::Rejected,
        Self::Completed,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Filed => "filed",
            Self::OfferReceived => "offer_received",
            Self::NeedsReview => "needs_review",
            Self::HearingScheduled => "hearing_scheduled",
            Self::EmailReplyRequired => "email_reply_required",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|status| status.label() == wanted)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Completed)
    }

    pub const fn successors(self) -> &'static [ProtestStatus] {
        use ProtestStatus::*;
        match self {
            Pending => &[Filed],
            Filed => &[OfferReceived, HearingScheduled],
            OfferReceived => &[
                NeedsReview,
                HearingScheduled,
                EmailReplyRequired,
                Accepted,
                Rejected,
            ],
            NeedsReview => &[EmailReplyRequired, HearingScheduled, Accepted, Rejected],
            HearingScheduled => &[OfferReceived, Accepted, Rejected, Completed],
            EmailReplyRequired => &[NeedsReview, Accepted, Rejected],
            Accepted | Rejected | Completed => &[],
        }
    }

    pub fn can_transition_to(self, next: ProtestStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Validate a move, returning the new status.
    pub fn transition(self, next: ProtestStatus) -> Result<ProtestStatus, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal { from: self });
        }
        if !self.can_transition_to(next) {
            return Err(TransitionError::NotAllowed { from: self, to: next });
        }
        Ok(next)
    }
}

impl fmt::Display for ProtestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("protest is already {from}")]
    Terminal { from: ProtestStatus },
    #[error("cannot move protest from {from} to {to}")]
    NotAllowed {
        from: ProtestStatus,
        to: ProtestStatus,
    },
}
