//! Admin API endpoints for account moderation
//!
//! ## Endpoints
//!
//! - `GET /admin/check` - Whether the caller is an admin (any session)
//! - `GET /admin/users` - List users with pagination and `isActive` filter
//! - `PUT /admin/users/{userId}/status` - Suspend or reactivate a user
//!
//! ## Authentication
//!
//! Listing and status changes require an active admin account.

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{AccountRole, UserDoc};
use crate::routes::responses::{
    error_response, json_response, market_error_response, parse_json, require_admin,
    require_session, FullBody, SuccessResponse,
};
use crate::server::AppState;
use crate::services::UserListQuery;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheckResponse {
    pub is_admin: bool,
}

/// User summary for list view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub display_name: String,
    pub role: AccountRole,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Paginated users response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_active: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /admin/* routes
pub async fn handle_admin_request(
    req: Request<Bytes>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    match (method, path) {
        (Method::GET, "/admin/check") => handle_admin_check(req, state).await,
        (Method::GET, "/admin/users") => handle_list_users(req, state).await,
        (Method::PUT, p) if p.starts_with("/admin/users/") && p.ends_with("/status") => {
            let user_id = p
                .strip_prefix("/admin/users/")
                .and_then(|s| s.strip_suffix("/status"))
                .unwrap_or("");
            if user_id.is_empty() || user_id.contains('/') {
                return error_response(StatusCode::NOT_FOUND, "Not found", None);
            }
            let user_id = urlencoding::decode(user_id)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| user_id.to_string());
            handle_update_status(req, state, &user_id).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /admin/check
async fn handle_admin_check(req: Request<Bytes>, state: Arc<AppState>) -> Response<FullBody> {
    match require_session(req.headers(), &state).await {
        Ok(caller) => json_response(
            StatusCode::OK,
            &AdminCheckResponse {
                is_admin: caller.is_admin(),
            },
        ),
        Err(resp) => resp,
    }
}

/// GET /admin/users
async fn handle_list_users(req: Request<Bytes>, state: Arc<AppState>) -> Response<FullBody> {
    if let Err(resp) = require_admin(req.headers(), &state).await {
        return resp;
    }

    let params = UserListQuery::from_query_string(req.uri().query());

    let (users, total) = match state.users.list_users(&params).await {
        Ok(result) => result,
        Err(e) => return market_error_response(e),
    };

    let total_pages = total.div_ceil(u64::from(params.limit)) as u32;

    json_response(
        StatusCode::OK,
        &UsersResponse {
            users: users.iter().map(user_to_summary).collect(),
            total,
            page: params.page,
            limit: params.limit,
            total_pages,
        },
    )
}

/// PUT /admin/users/{userId}/status
async fn handle_update_status(
    req: Request<Bytes>,
    state: Arc<AppState>,
    user_id: &str,
) -> Response<FullBody> {
    let admin = match require_admin(req.headers(), &state).await {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };

    let body: UpdateStatusRequest = match parse_json(req.body()) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    if !body.is_active && admin.user_id == user_id {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Admins cannot suspend themselves",
            Some("CANNOT_SUSPEND_SELF"),
        );
    }

    let reason = body
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    match state
        .users
        .set_active(user_id, body.is_active, reason.clone())
        .await
    {
        Ok(true) => {
            info!(
                admin_id = %admin.user_id,
                target_user = %user_id,
                is_active = body.is_active,
                reason = ?reason,
                "User status changed"
            );
            let action = if body.is_active { "reactivated" } else { "suspended" };
            json_response(
                StatusCode::OK,
                &SuccessResponse {
                    success: true,
                    message: format!("User {}", action),
                },
            )
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "User not found", Some("NOT_FOUND")),
        Err(e) => market_error_response(e),
    }
}

fn user_to_summary(user: &UserDoc) -> UserSummary {
    UserSummary {
        user_id: user.user_id.clone(),
        display_name: user.display_name.clone(),
        role: user.role,
        is_active: user.is_active,
        suspended_reason: user.suspended_reason.clone(),
        created_at: user
            .metadata
            .created_at
            .and_then(|d| d.try_to_rfc3339_string().ok()),
    }
}
