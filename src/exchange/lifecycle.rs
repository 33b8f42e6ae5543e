//! Exchange lifecycle: who may move an exchange between statuses, and what a
//! new proposal must carry.
//!
//! ```text
//! proposed ──┬─> negotiating ──┬─> accepted ──> completed
//!            │   (terms edit)  │       │
//!            └─────────────────┴───────┴──> cancelled
//! ```
//!
//! `disputed` is only entered by raising a dispute, never through a status
//! change.

use crate::exchange::model::{ExchangeStatus, ExchangeType, Offer, OfferType};
use crate::exchange::roles::ExchangeRole;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusChangeError {
    #[error("cannot move an exchange from {from} to {to}")]
    NotAllowed {
        from: ExchangeStatus,
        to: ExchangeStatus,
    },

    #[error("the {role} cannot move an exchange to {to}")]
    WrongParty {
        role: ExchangeRole,
        to: ExchangeStatus,
    },
}

/// Check that `role` may move an exchange from `from` to `to`.
///
/// The initiator cannot accept their own untouched proposal.
pub fn check_status_change(
    from: ExchangeStatus,
    to: ExchangeStatus,
    role: ExchangeRole,
) -> Result<(), StatusChangeError> {
    use ExchangeStatus::*;

    match (from, to) {
        (Proposed, Accepted) if role == ExchangeRole::Initiator => {
            Err(StatusChangeError::WrongParty { role, to })
        }
        (Proposed | Negotiating, Accepted)
        | (Accepted, Completed)
        | (Proposed | Negotiating | Accepted, Cancelled) => Ok(()),
        _ => Err(StatusChangeError::NotAllowed { from, to }),
    }
}

/// Validate the offers of a new proposal against its exchange type.
///
/// `skill_for_money` needs exactly one money offer; `skill_for_skill` needs
/// none.
pub fn check_offers(
    exchange_type: ExchangeType,
    initiator_offer: Option<&Offer>,
    recipient_offer: Option<&Offer>,
) -> Result<(), String> {
    let money_offers = [initiator_offer, recipient_offer]
        .into_iter()
        .flatten()
        .filter(|o| o.offer_type == OfferType::Money)
        .count();

    match exchange_type {
        ExchangeType::SkillForSkill if money_offers == 0 => Ok(()),
        ExchangeType::SkillForSkill => {
            Err("skill_for_skill exchanges cannot include a money offer".into())
        }
        ExchangeType::SkillForMoney if money_offers == 1 => Ok(()),
        ExchangeType::SkillForMoney => {
            Err("skill_for_money exchanges need exactly one money offer".into())
        }
        ExchangeType::Other => Err("unsupported exchange type".into()),
    }
}
