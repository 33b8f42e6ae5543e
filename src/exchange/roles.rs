//! Exchange role resolution
//!
//! Classifies a participant twice: by structural position (who proposed the
//! exchange) and by business role (what they contribute). Only the business
//! role drives edit permissions.
//!
//! `resolve` is total. A caller that is neither party lands on the recipient
//! side, so callers must check [`is_participant`] first when the answer gates
//! a mutation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::exchange::model::{ExchangeType, ExchangeView, OfferType};

/// Structural position in an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeRole {
    Initiator,
    Recipient,
}

impl fmt::Display for ExchangeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeRole::Initiator => write!(f, "initiator"),
            ExchangeRole::Recipient => write!(f, "recipient"),
        }
    }
}

/// Functional position in an exchange, independent of who proposed it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessRole {
    SkillProvider,
    MoneyProvider,
}

impl BusinessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessRole::SkillProvider => "skill_provider",
            BusinessRole::MoneyProvider => "money_provider",
        }
    }
}

impl fmt::Display for BusinessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for role names that are not business roles
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown business role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for BusinessRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skill_provider" => Ok(BusinessRole::SkillProvider),
            "money_provider" => Ok(BusinessRole::MoneyProvider),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Result of resolving a participant's roles in one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResolution {
    pub exchange_role: ExchangeRole,
    pub business_role: BusinessRole,
    /// Always `exchange_role == Initiator`
    pub is_initiator: bool,
}

/// Resolve `participant_id`'s structural and business role in `exchange`.
pub fn resolve<E>(exchange: &E, participant_id: &str) -> RoleResolution
where
    E: ExchangeView + ?Sized,
{
    let is_initiator = exchange.initiator().user_id == participant_id;
    let exchange_role = if is_initiator {
        ExchangeRole::Initiator
    } else {
        ExchangeRole::Recipient
    };

    let business_role = match exchange.exchange_type() {
        ExchangeType::SkillForSkill => BusinessRole::SkillProvider,
        ExchangeType::SkillForMoney => match exchange.offer_of(exchange_role) {
            Some(offer) => match offer.offer_type {
                OfferType::Money => BusinessRole::MoneyProvider,
                OfferType::Skill => BusinessRole::SkillProvider,
            },
            None => BusinessRole::SkillProvider,
        },
        ExchangeType::Other => BusinessRole::SkillProvider,
    };

    RoleResolution {
        exchange_role,
        business_role,
        is_initiator,
    }
}

/// Whether `user_id` is either party of `exchange`
pub fn is_participant<E>(exchange: &E, user_id: &str) -> bool
where
    E: ExchangeView + ?Sized,
{
    exchange.initiator().user_id == user_id || exchange.recipient().user_id == user_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::model::{Exchange, Offer, Participant};

    fn exchange(
        exchange_type: ExchangeType,
        initiator_offer: Option<Offer>,
        recipient_offer: Option<Offer>,
    ) -> Exchange {
        Exchange {
            exchange_type,
            initiator: Participant::new("u1"),
            recipient: Participant::new("u2"),
            initiator_offer,
            recipient_offer,
        }
    }

    #[test]
    fn test_skill_for_skill_always_skill_provider() {
        let ex = exchange(
            ExchangeType::SkillForSkill,
            Some(Offer::skill("guitar")),
            Some(Offer::skill("spanish")),
        );

        for id in ["u1", "u2"] {
            assert_eq!(resolve(&ex, id).business_role, BusinessRole::SkillProvider);
        }
    }

    #[test]
    fn test_skill_for_money_initiator_pays() {
        let ex = exchange(
            ExchangeType::SkillForMoney,
            Some(Offer::money(50.0, "USD")),
            Some(Offer::skill("plumbing")),
        );

        assert_eq!(resolve(&ex, "u1").business_role, BusinessRole::MoneyProvider);
        assert_eq!(resolve(&ex, "u2").business_role, BusinessRole::SkillProvider);
    }

    #[test]
    fn test_skill_for_money_recipient_pays() {
        let ex = exchange(
            ExchangeType::SkillForMoney,
            Some(Offer::skill("tutoring")),
            Some(Offer::money(20.0, "EUR")),
        );

        assert_eq!(
            resolve(&ex, "u1"),
            RoleResolution {
                exchange_role: ExchangeRole::Initiator,
                business_role: BusinessRole::SkillProvider,
                is_initiator: true,
            }
        );
        assert_eq!(
            resolve(&ex, "u2"),
            RoleResolution {
                exchange_role: ExchangeRole::Recipient,
                business_role: BusinessRole::MoneyProvider,
                is_initiator: false,
            }
        );
    }

    #[test]
    fn test_missing_offer_defaults_to_skill_provider() {
        let ex = exchange(ExchangeType::SkillForMoney, None, None);
        assert_eq!(resolve(&ex, "u1").business_role, BusinessRole::SkillProvider);
        assert_eq!(resolve(&ex, "u2").business_role, BusinessRole::SkillProvider);
    }

    #[test]
    fn test_unknown_exchange_type_defaults_to_skill_provider() {
        let ex = exchange(
            ExchangeType::Other,
            Some(Offer::money(10.0, "USD")),
            Some(Offer::money(10.0, "USD")),
        );
        assert_eq!(resolve(&ex, "u1").business_role, BusinessRole::SkillProvider);
    }

    #[test]
    fn test_non_participant_falls_through_to_recipient() {
        let ex = exchange(
            ExchangeType::SkillForMoney,
            Some(Offer::skill("design")),
            Some(Offer::money(30.0, "USD")),
        );

        let outsider = resolve(&ex, "intruder");
        assert_eq!(outsider.exchange_role, ExchangeRole::Recipient);
        assert_eq!(outsider.business_role, BusinessRole::MoneyProvider);
        assert!(!is_participant(&ex, "intruder"));
        assert!(is_participant(&ex, "u1"));
        assert!(is_participant(&ex, "u2"));
    }

    #[test]
    fn test_is_initiator_matches_exchange_role() {
        let ex = exchange(ExchangeType::SkillForSkill, None, None);
        for id in ["u1", "u2", "u3"] {
            let r = resolve(&ex, id);
            assert_eq!(r.is_initiator, r.exchange_role == ExchangeRole::Initiator);
        }
    }

    #[test]
    fn test_business_role_parse() {
        assert_eq!(
            "money_provider".parse::<BusinessRole>(),
            Ok(BusinessRole::MoneyProvider)
        );
        assert!("nonexistent_role".parse::<BusinessRole>().is_err());
    }

    #[test]
    fn test_resolution_serializes_camel_case() {
        let r = RoleResolution {
            exchange_role: ExchangeRole::Initiator,
            business_role: BusinessRole::SkillProvider,
            is_initiator: true,
        };
        let json = serde_json::to_value(r).unwrap();
        assert_eq!(json["exchangeRole"], "initiator");
        assert_eq!(json["businessRole"], "skill_provider");
        assert_eq!(json["isInitiator"], true);
    }
}
