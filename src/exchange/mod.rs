//! Exchange roles and negotiated-terms permissions
//!
//! Provides:
//! - Role resolution (initiator/recipient, skill/money provider)
//! - Static editable-field table per business role
//! - Gated terms updates
//! - Status lifecycle rules

pub mod lifecycle;
pub mod model;
pub mod permissions;
pub mod roles;
pub mod terms;

pub use lifecycle::{check_offers, check_status_change, StatusChangeError};
pub use model::{
    Exchange, ExchangeStatus, ExchangeType, ExchangeView, Offer, OfferType, Participant,
};
pub use permissions::{can_edit_field, can_edit_field_named, editable_fields};
pub use roles::{is_participant, resolve, BusinessRole, ExchangeRole, RoleResolution, UnknownRole};
pub use terms::{
    apply_terms_update, authorize_terms_update, negotiate_terms, Terms, TermsError, TermsUpdate,
};
