//! Configuration for Skillswap
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// Skillswap - skill-bartering marketplace service
#[derive(Parser, Debug, Clone)]
#[command(name = "skillswap")]
#[command(about = "Skill-bartering marketplace: exchanges, disputes, and account moderation")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory stores, dev session secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "skillswap")]
    pub mongodb_db: String,

    /// Shared secret used by the identity provider to sign session tokens
    /// (required in production)
    #[arg(long, env = "SESSION_SECRET")]
    pub session_secret: Option<String>,

    /// Name of the cookie carrying the session token
    #[arg(long, env = "SESSION_COOKIE", default_value = "__session")]
    pub session_cookie: String,

    /// Allowed CORS origin for the web client
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

/// Session secret used when DEV_MODE is set and none is configured
pub const DEV_SESSION_SECRET: &str = "dev-only-insecure-session-secret-0123456789";

impl Args {
    /// Get effective session secret (uses default in dev mode)
    pub fn session_secret(&self) -> Option<String> {
        match &self.session_secret {
            Some(secret) => Some(secret.clone()),
            None if self.dev_mode => Some(DEV_SESSION_SECRET.to_string()),
            None => None,
        }
    }

    /// Whether JSON log output was requested
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.session_secret.is_none() {
            return Err("SESSION_SECRET is required in production mode".to_string());
        }

        if self.session_cookie.trim().is_empty() {
            return Err("SESSION_COOKIE must not be empty".to_string());
        }

        match self.log_format.to_ascii_lowercase().as_str() {
            "text" | "json" => Ok(()),
            other => Err(format!("Unknown LOG_FORMAT '{}' (expected text or json)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["skillswap"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&[]);
        assert!(args.validate().is_err());
        assert_eq!(args.session_secret(), None);
    }

    #[test]
    fn test_dev_mode_secret_fallback() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.session_secret().as_deref(), Some(DEV_SESSION_SECRET));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let args = parse(&["--dev-mode", "--log-format", "xml"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--session-secret", "s"]);
        assert_eq!(args.session_cookie, "__session");
        assert_eq!(args.mongodb_db, "skillswap");
        assert!(!args.json_logs());
    }
}
