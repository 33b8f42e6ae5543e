//! Shared types

mod error;

pub use error::{MarketError, Result};
