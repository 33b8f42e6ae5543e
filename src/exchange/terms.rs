//! Negotiated terms and the edit gate
//!
//! An update is a JSON object of term fields. It is accepted as a whole or
//! rejected as a whole: one field outside the caller's business role rejects
//! the entire update.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::exchange::model::{ExchangeStatus, ExchangeView};
use crate::exchange::permissions::can_edit_field;
use crate::exchange::roles::{resolve, BusinessRole, RoleResolution};

/// Requested changes to terms, keyed by field name
pub type TermsUpdate = Map<String, Value>;

/// Terms under negotiation. Field names match the permission table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Terms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverables: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,

    /// ISO-8601 date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,

    /// Delivery method (in person, remote, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_timeline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TermsError {
    #[error("no fields to update")]
    Empty,

    #[error("{role} may not edit: {}", .fields.join(", "))]
    FieldsNotEditable {
        role: BusinessRole,
        fields: Vec<String>,
    },

    #[error("terms are locked while the exchange is {0}")]
    Locked(ExchangeStatus),

    #[error("invalid term value: {0}")]
    InvalidValue(String),
}

/// Check every field of `update` against `role`'s editable set
pub fn authorize_terms_update(role: BusinessRole, update: &TermsUpdate) -> Result<(), TermsError> {
    if update.is_empty() {
        return Err(TermsError::Empty);
    }

    let mut denied: Vec<String> = update
        .keys()
        .filter(|field| !can_edit_field(role, field))
        .cloned()
        .collect();

    if denied.is_empty() {
        Ok(())
    } else {
        denied.sort();
        Err(TermsError::FieldsNotEditable {
            role,
            fields: denied,
        })
    }
}

/// Merge `update` into `terms`. A `null` value clears the field.
pub fn apply_terms_update(terms: &Terms, update: &TermsUpdate) -> Result<Terms, TermsError> {
    let mut merged = match serde_json::to_value(terms) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return Err(TermsError::InvalidValue(e.to_string())),
    };

    for (field, value) in update {
        merged.insert(field.clone(), value.clone());
    }

    serde_json::from_value(Value::Object(merged))
        .map_err(|e| TermsError::InvalidValue(e.to_string()))
}

/// Resolve `participant_id`, gate the update, and return the new terms.
///
/// The caller must have checked participancy.
pub fn negotiate_terms<E>(
    exchange: &E,
    status: ExchangeStatus,
    current: &Terms,
    participant_id: &str,
    update: &TermsUpdate,
) -> Result<(RoleResolution, Terms), TermsError>
where
    E: ExchangeView + ?Sized,
{
    if !status.allows_terms_edit() {
        return Err(TermsError::Locked(status));
    }

    let resolution = resolve(exchange, participant_id);
    authorize_terms_update(resolution.business_role, update)?;
    let terms = apply_terms_update(current, update)?;

    Ok((resolution, terms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::model::{Exchange, ExchangeType, Offer, Participant};
    use serde_json::json;

    fn update(value: Value) -> TermsUpdate {
        match value {
            Value::Object(map) => map,
            _ => panic!("update must be an object"),
        }
    }

    fn paid_exchange() -> Exchange {
        Exchange {
            exchange_type: ExchangeType::SkillForMoney,
            initiator: Participant::new("u1"),
            recipient: Participant::new("u2"),
            initiator_offer: Some(Offer::skill("carpentry")),
            recipient_offer: Some(Offer::money(120.0, "USD")),
        }
    }

    #[test]
    fn test_authorize_allowed_fields() {
        let u = update(json!({ "hours": 4, "method": "in person" }));
        assert!(authorize_terms_update(BusinessRole::SkillProvider, &u).is_ok());
    }

    #[test]
    fn test_authorize_reports_all_denied_fields() {
        let u = update(json!({ "currency": "EUR", "amount": 10, "description": "ok" }));
        let err = authorize_terms_update(BusinessRole::SkillProvider, &u).unwrap_err();
        assert_eq!(
            err,
            TermsError::FieldsNotEditable {
                role: BusinessRole::SkillProvider,
                fields: vec!["amount".into(), "currency".into()],
            }
        );
    }

    #[test]
    fn test_authorize_empty_update() {
        assert_eq!(
            authorize_terms_update(BusinessRole::MoneyProvider, &TermsUpdate::new()),
            Err(TermsError::Empty)
        );
    }

    #[test]
    fn test_apply_merges_and_clears() {
        let current = Terms {
            description: Some("Build a shelf".into()),
            hours: Some(3.0),
            ..Terms::default()
        };

        let next = apply_terms_update(&current, &update(json!({ "hours": 5, "description": null })))
            .unwrap();
        assert_eq!(next.hours, Some(5.0));
        assert_eq!(next.description, None);
    }

    #[test]
    fn test_apply_rejects_wrong_type() {
        let err = apply_terms_update(&Terms::default(), &update(json!({ "hours": "lots" })))
            .unwrap_err();
        assert!(matches!(err, TermsError::InvalidValue(_)));
    }

    #[test]
    fn test_negotiate_money_provider() {
        let ex = paid_exchange();
        let (resolution, terms) = negotiate_terms(
            &ex,
            ExchangeStatus::Negotiating,
            &Terms::default(),
            "u2",
            &update(json!({ "amount": 150, "currency": "USD" })),
        )
        .unwrap();

        assert_eq!(resolution.business_role, BusinessRole::MoneyProvider);
        assert_eq!(terms.amount, Some(150.0));
    }

    #[test]
    fn test_negotiate_skill_provider_cannot_set_amount() {
        let ex = paid_exchange();
        let result = negotiate_terms(
            &ex,
            ExchangeStatus::Proposed,
            &Terms::default(),
            "u1",
            &update(json!({ "amount": 1 })),
        );
        assert!(matches!(result, Err(TermsError::FieldsNotEditable { .. })));
    }

    #[test]
    fn test_negotiate_locked_after_acceptance() {
        let ex = paid_exchange();
        let result = negotiate_terms(
            &ex,
            ExchangeStatus::Accepted,
            &Terms::default(),
            "u1",
            &update(json!({ "hours": 2 })),
        );
        assert_eq!(result, Err(TermsError::Locked(ExchangeStatus::Accepted)));
    }
}
