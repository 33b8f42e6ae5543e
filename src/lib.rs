//! Skillswap - skill-bartering marketplace service
//!
//! Members list skills and negotiate exchanges with each other, either
//! skill-for-skill or skill-for-money. Either side may raise a dispute once an
//! exchange is under way, and administrators moderate accounts.
//!
//! ## Components
//!
//! - **Exchange**: role resolution and the editable-terms permission table
//! - **Auth**: session token verification (tokens come from the identity provider)
//! - **Services**: exchange and user stores (MongoDB or in-memory)
//! - **Routes**: HTTP handlers for exchanges, disputes, and admin moderation

pub mod auth;
pub mod config;
pub mod db;
pub mod exchange;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{MarketError, Result};
