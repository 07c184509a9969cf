//! The deal transition table.
//!
//! ```text
//! created --fund--> funded --release--> completed
//!    |                 |
//!    +----dispute------+--dispute--> disputed --resolve--> completed
//!    |                                   |
//!    +-------------cancel----------------+--cancel--> cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. Entry into `created` happens only
//! through materialization of a confirmed draft, never through a trigger.

use crate::domain::deal::DealStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Proof of payment accepted.
    Fund,
    Release,
    Dispute,
    /// Operator settles a dispute in favour of release.
    Resolve,
    /// Operator terminates the deal.
    Cancel,
}

/// Who is allowed to fire a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anyone,
    Operator,
}

impl Trigger {
    pub const ALL: [Trigger; 5] = [
        Trigger::Fund,
        Trigger::Release,
        Trigger::Dispute,
        Trigger::Resolve,
        Trigger::Cancel,
    ];

    pub fn required_actor(&self) -> Actor {
        match self {
            Trigger::Fund | Trigger::Release | Trigger::Dispute => Actor::Anyone,
            Trigger::Resolve | Trigger::Cancel => Actor::Operator,
        }
    }

    /// The status this trigger moves `from` to, or `None` when the pair is not
    /// in the table.
    pub fn target(&self, from: DealStatus) -> Option<DealStatus> {
        use DealStatus::*;
        match (self, from) {
            (Trigger::Fund, Created) => Some(Funded),
            (Trigger::Release, Funded) => Some(Completed),
            (Trigger::Dispute, Created | Funded) => Some(Disputed),
            (Trigger::Resolve, Disputed) => Some(Completed),
            (Trigger::Cancel, Disputed | Created) => Some(Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Fund => "accept payment",
            Trigger::Release => "release payment",
            Trigger::Dispute => "raise a dispute",
            Trigger::Resolve => "resolve the dispute",
            Trigger::Cancel => "cancel the deal",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every trigger that is legal from `status`, in table order.
pub fn available_triggers(status: DealStatus) -> Vec<Trigger> {
    Trigger::ALL
        .into_iter()
        .filter(|trigger| trigger.target(status).is_some())
        .collect()
}
