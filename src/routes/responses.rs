//! JSON response helpers and session guards shared by route handlers

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use hyper::{HeaderMap, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::{extract_token_from_cookie, extract_token_from_header};
use crate::db::schemas::UserDoc;
use crate::server::AppState;
use crate::types::MarketError;

pub type FullBody = Full<Bytes>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Success response body
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn error_response(status: StatusCode, error: &str, code: Option<&str>) -> Response<FullBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(|c| c.to_string()),
        },
    )
}

pub fn market_error_response(err: MarketError) -> Response<FullBody> {
    if matches!(err, MarketError::Database(_) | MarketError::Internal(_)) {
        warn!("Request failed: {}", err);
    }
    let code = err.code();
    let (status, body) = err.into_status_code_and_body();
    error_response(status, &body, Some(code))
}

pub fn not_found_response(path: &str) -> Response<FullBody> {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No route for {}", path),
        Some("NOT_FOUND"),
    )
}

pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response<FullBody>> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected request body: {}", e);
        error_response(StatusCode::BAD_REQUEST, "Invalid JSON", Some("INVALID_JSON"))
    })
}

// =============================================================================
// Session Guards
// =============================================================================

/// Authenticated caller of a request
#[derive(Debug, Clone)]
pub struct Caller {
    /// Identity-provider subject from the session
    pub user_id: String,
    /// Local account record, if one exists
    pub account: Option<UserDoc>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.account.as_ref().is_some_and(UserDoc::is_admin)
    }
}

/// Verify the session cookie or bearer token and load the caller's account.
/// The bearer token is tried when the cookie does not verify.
/// Suspended accounts are refused.
pub async fn require_session(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Caller, Response<FullBody>> {
    let cookie_header = headers.get(COOKIE).and_then(|v| v.to_str().ok());
    let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let candidates: Vec<&str> = [
        extract_token_from_cookie(cookie_header, &state.args.session_cookie),
        extract_token_from_header(auth_header),
    ]
    .into_iter()
    .flatten()
    .collect();

    if candidates.is_empty() {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "No session",
            Some("NO_SESSION"),
        ));
    }

    // A stale cookie must not shadow a valid bearer token
    let mut last_error = None;
    let mut verified = None;
    for token in candidates {
        let result = state.sessions.verify(token);
        match result.claims {
            Some(c) if result.valid => {
                verified = Some(c);
                break;
            }
            _ => last_error = result.error,
        }
    }

    let claims = match verified {
        Some(c) => c,
        None => {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                last_error.as_deref().unwrap_or("Invalid session"),
                Some("INVALID_SESSION"),
            ))
        }
    };

    let account = state
        .users
        .get_user(&claims.sub)
        .await
        .map_err(market_error_response)?;

    if let Some(ref user) = account {
        if !user.is_active {
            return Err(error_response(
                StatusCode::FORBIDDEN,
                "Account suspended",
                Some("ACCOUNT_SUSPENDED"),
            ));
        }
    }

    Ok(Caller {
        user_id: claims.sub,
        account,
    })
}

/// Same as [`require_session`], additionally requiring an admin account
pub async fn require_admin(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Caller, Response<FullBody>> {
    let caller = require_session(headers, state).await?;

    if !caller.is_admin() {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "Admin permission required",
            Some("FORBIDDEN"),
        ));
    }

    Ok(caller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_market_error_response_body() {
        let resp = market_error_response(MarketError::Conflict("busy".into()));
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "CONFLICT");
        assert_eq!(json["error"], "Conflict: busy");
    }

    #[test]
    fn test_json_response_content_type() {
        let resp = json_response(StatusCode::OK, &SuccessResponse {
            success: true,
            message: "ok".into(),
        });
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
    }
}
