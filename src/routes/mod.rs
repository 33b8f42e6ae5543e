//! HTTP route handlers

pub mod admin_users;
pub mod exchanges;
pub mod health;
pub mod responses;

pub use admin_users::handle_admin_request;
pub use exchanges::handle_exchanges_request;
pub use health::{health_check, version_info};
pub use responses::{error_response, json_response, not_found_response, FullBody};
