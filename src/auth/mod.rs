//! Authentication for Skillswap
//!
//! Provides:
//! - Session token verification (tokens are issued by the identity provider)
//! - Token extraction from the session cookie or Authorization header

pub mod session;

pub use session::{
    extract_token_from_cookie, extract_token_from_header, SessionClaims, SessionValidationResult,
    SessionVerifier,
};
