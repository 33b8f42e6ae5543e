//! Editable-term permissions per business role
//!
//! The table is fixed at compile time. Unknown roles and unknown fields are
//! denied.

use crate::exchange::roles::BusinessRole;

const SKILL_PROVIDER_FIELDS: &[&str] = &[
    "description",
    "deliverables",
    "hours",
    "deadline",
    "method",
    "skill_id",
];

const MONEY_PROVIDER_FIELDS: &[&str] = &[
    "description",
    "amount",
    "currency",
    "payment_timeline",
    "deliverables",
];

/// Term fields a business role may edit, in table order
pub fn editable_fields(role: BusinessRole) -> &'static [&'static str] {
    match role {
        BusinessRole::SkillProvider => SKILL_PROVIDER_FIELDS,
        BusinessRole::MoneyProvider => MONEY_PROVIDER_FIELDS,
    }
}

/// Check if `field` is editable by `role`
pub fn can_edit_field(role: BusinessRole, field: &str) -> bool {
    editable_fields(role).contains(&field)
}

/// Same as [`can_edit_field`] for a role given by name.
/// Returns false for names that are not business roles.
pub fn can_edit_field_named(role: &str, field: &str) -> bool {
    role.parse::<BusinessRole>()
        .map(|r| can_edit_field(r, field))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_provider_fields() {
        assert!(can_edit_field(BusinessRole::SkillProvider, "hours"));
        assert!(can_edit_field(BusinessRole::SkillProvider, "skill_id"));
        assert!(!can_edit_field(BusinessRole::SkillProvider, "amount"));
        assert!(!can_edit_field(BusinessRole::SkillProvider, "currency"));
    }

    #[test]
    fn test_money_provider_fields() {
        assert!(can_edit_field(BusinessRole::MoneyProvider, "amount"));
        assert!(can_edit_field(BusinessRole::MoneyProvider, "payment_timeline"));
        assert!(!can_edit_field(BusinessRole::MoneyProvider, "skill_id"));
        assert!(!can_edit_field(BusinessRole::MoneyProvider, "hours"));
    }

    #[test]
    fn test_shared_fields() {
        for role in [BusinessRole::SkillProvider, BusinessRole::MoneyProvider] {
            assert!(can_edit_field(role, "description"));
            assert!(can_edit_field(role, "deliverables"));
        }
    }

    #[test]
    fn test_unknown_role_denied() {
        assert!(!can_edit_field_named("nonexistent_role", "description"));
        assert!(!can_edit_field_named("", "description"));
        assert!(can_edit_field_named("skill_provider", "description"));
    }

    #[test]
    fn test_unknown_field_denied() {
        assert!(!can_edit_field(BusinessRole::SkillProvider, "status"));
        assert!(!can_edit_field(BusinessRole::MoneyProvider, "Amount"));
    }

    #[test]
    fn test_table_order() {
        assert_eq!(
            editable_fields(BusinessRole::MoneyProvider),
            &["description", "amount", "currency", "payment_timeline", "deliverables"]
        );
    }
}
