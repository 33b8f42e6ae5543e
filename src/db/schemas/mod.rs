//! Database schemas for Skillswap
//!
//! MongoDB document structures for exchanges, users, and disputes.

mod dispute;
mod exchange;
mod metadata;
mod user;

pub use dispute::{DisputeDoc, DisputeStatus, DISPUTE_COLLECTION};
pub use exchange::{ExchangeDoc, EXCHANGE_COLLECTION};
pub use metadata::Metadata;
pub use user::{AccountRole, UserDoc, USER_COLLECTION};
