//! Exchange shape as seen by role resolution
//!
//! Offer and exchange types are closed enums so role decisions are exhaustive
//! matches. Exchange types added later deserialize into `ExchangeType::Other`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::exchange::roles::ExchangeRole;

/// What the two sides of an exchange trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeType {
    SkillForSkill,
    SkillForMoney,
    /// Any exchange type this build does not model yet
    #[serde(other)]
    Other,
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeType::SkillForSkill => write!(f, "skill_for_skill"),
            ExchangeType::SkillForMoney => write!(f, "skill_for_money"),
            ExchangeType::Other => write!(f, "other"),
        }
    }
}

/// Kind of contribution a participant brings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    Skill,
    Money,
}

/// A participant's contribution to an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(rename = "type")]
    pub offer_type: OfferType,

    /// Listed skill being offered (skill offers)
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "skill_id")]
    pub skill_id: Option<String>,

    /// Amount offered (money offers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Offer {
    pub fn skill(skill_id: impl Into<String>) -> Self {
        Self {
            offer_type: OfferType::Skill,
            skill_id: Some(skill_id.into()),
            amount: None,
            currency: None,
        }
    }

    pub fn money(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            offer_type: OfferType::Money,
            skill_id: None,
            amount: Some(amount),
            currency: Some(currency.into()),
        }
    }
}

/// One side of an exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Identity-provider subject of this participant
    #[serde(alias = "id", alias = "user_id")]
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "display_name")]
    pub display_name: Option<String>,
}

impl Participant {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
        }
    }
}

/// Lifecycle of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    #[default]
    Proposed,
    Negotiating,
    Accepted,
    Completed,
    Cancelled,
    Disputed,
}

impl ExchangeStatus {
    /// Terms stay editable until both sides have accepted
    pub fn allows_terms_edit(self) -> bool {
        matches!(self, ExchangeStatus::Proposed | ExchangeStatus::Negotiating)
    }

    /// Disputes only make sense once work or payment is under way
    pub fn allows_dispute(self) -> bool {
        matches!(self, ExchangeStatus::Accepted | ExchangeStatus::Completed)
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExchangeStatus::Proposed => "proposed",
            ExchangeStatus::Negotiating => "negotiating",
            ExchangeStatus::Accepted => "accepted",
            ExchangeStatus::Completed => "completed",
            ExchangeStatus::Cancelled => "cancelled",
            ExchangeStatus::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// Read-only view of an exchange's parties and offers.
///
/// Implemented by the bare [`Exchange`] shape and by the stored document, so
/// role resolution never needs to copy a document.
pub trait ExchangeView {
    fn exchange_type(&self) -> ExchangeType;
    fn initiator(&self) -> &Participant;
    fn recipient(&self) -> &Participant;
    fn offer_of(&self, role: ExchangeRole) -> Option<&Offer>;
}

/// Minimal exchange record: type, both parties, and their offers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub exchange_type: ExchangeType,
    pub initiator: Participant,
    pub recipient: Participant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_offer: Option<Offer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_offer: Option<Offer>,
}

impl ExchangeView for Exchange {
    fn exchange_type(&self) -> ExchangeType {
        self.exchange_type
    }

    fn initiator(&self) -> &Participant {
        &self.initiator
    }

    fn recipient(&self) -> &Participant {
        &self.recipient
    }

    fn offer_of(&self, role: ExchangeRole) -> Option<&Offer> {
        match role {
            ExchangeRole::Initiator => self.initiator_offer.as_ref(),
            ExchangeRole::Recipient => self.recipient_offer.as_ref(),
        }
    }
}
