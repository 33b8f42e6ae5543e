//! Exchange negotiation endpoints
//!
//! ## Endpoints
//!
//! - `POST /exchanges` - Propose an exchange (caller becomes the initiator)
//! - `GET /exchanges/{id}` - Exchange details
//! - `GET /exchanges/{id}/role` - Caller's roles and editable term fields
//! - `PUT /exchanges/{id}/status` - Accept, complete, or cancel
//! - `PATCH /exchanges/{id}/terms` - Edit negotiated terms
//! - `POST /exchanges/{id}/disputes` - Raise a dispute
//! - `GET /exchanges/{id}/disputes` - List disputes on the exchange
//!
//! ## Authorization
//!
//! Every endpoint requires a session. Apart from proposing, the caller must
//! be one of the two participants. Role resolution would otherwise map an outsider onto the
//! recipient side.

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{DisputeDoc, DisputeStatus, ExchangeDoc};
use crate::exchange::{
    check_offers, check_status_change, editable_fields, is_participant, negotiate_terms, resolve,
    BusinessRole, ExchangeStatus, ExchangeType, Offer, Participant, RoleResolution,
    StatusChangeError, Terms, TermsError, TermsUpdate,
};
use crate::routes::responses::{
    error_response, json_response, market_error_response, parse_json, require_session, Caller,
    FullBody,
};
use crate::server::AppState;
use crate::services::parse_id;
use crate::types::MarketError;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExchangeRequest {
    pub exchange_type: ExchangeType,
    pub recipient: Participant,
    #[serde(default)]
    pub initiator_offer: Option<Offer>,
    #[serde(default)]
    pub recipient_offer: Option<Offer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub exchange_id: String,
    pub exchange_type: ExchangeType,
    pub status: ExchangeStatus,
    pub initiator: Participant,
    pub recipient: Participant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiator_offer: Option<Offer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_offer: Option<Offer>,
    pub terms: Terms,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ExchangeStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub exchange_id: String,
    pub previous_status: ExchangeStatus,
    pub status: ExchangeStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub exchange_id: String,
    pub exchange_type: ExchangeType,
    pub status: ExchangeStatus,
    #[serde(flatten)]
    pub resolution: RoleResolution,
    pub editable_fields: &'static [&'static str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermsResponse {
    pub exchange_id: String,
    pub status: ExchangeStatus,
    pub business_role: BusinessRole,
    pub terms: Terms,
}

/// 403 body when an update touches fields outside the caller's role
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldsDeniedResponse {
    pub error: String,
    pub code: &'static str,
    pub business_role: BusinessRole,
    pub denied_fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RaiseDisputeRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeResponse {
    pub dispute_id: String,
    pub exchange_id: String,
    pub raised_by: String,
    pub reason: String,
    pub status: DisputeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /exchanges/* routes
pub async fn handle_exchanges_request(
    req: Request<Bytes>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    if path == "/exchanges" || path == "/exchanges/" {
        return match method {
            Method::POST => handle_create_exchange(req, state).await,
            _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
        };
    }

    let subpath = path.strip_prefix("/exchanges/").unwrap_or("");
    let (id, action) = match subpath.split_once('/') {
        Some((id, action)) => (id, action),
        None => (subpath, ""),
    };
    if id.is_empty() {
        return error_response(StatusCode::NOT_FOUND, "Not found", None);
    }

    match (method, action) {
        (Method::GET, "") => handle_get_exchange(req, state, id).await,
        (Method::GET, "role") => handle_get_role(req, state, id).await,
        (Method::PUT, "status") => handle_update_status(req, state, id).await,
        (Method::PATCH, "terms") => handle_update_terms(req, state, id).await,
        (Method::POST, "disputes") => handle_raise_dispute(req, state, id).await,
        (Method::GET, "disputes") => handle_list_disputes(req, state, id).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

/// Session, exchange lookup, and participancy check shared by every endpoint
async fn load_for_participant(
    req: &Request<Bytes>,
    state: &AppState,
    exchange_id: &str,
) -> Result<(Caller, ExchangeDoc), Response<FullBody>> {
    let caller = require_session(req.headers(), state).await?;

    let oid = parse_id(exchange_id).map_err(market_error_response)?;
    let exchange = match state.exchanges.get_exchange(&oid).await {
        Ok(Some(e)) => e,
        Ok(None) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                "Exchange not found",
                Some("NOT_FOUND"),
            ))
        }
        Err(e) => return Err(market_error_response(e)),
    };

    if !is_participant(&exchange, &caller.user_id) {
        warn!(
            user_id = %caller.user_id,
            exchange_id = %exchange_id,
            "Non-participant tried to access exchange"
        );
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "Not a participant in this exchange",
            Some("NOT_PARTICIPANT"),
        ));
    }

    Ok((caller, exchange))
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// POST /exchanges
async fn handle_create_exchange(req: Request<Bytes>, state: Arc<AppState>) -> Response<FullBody> {
    let caller = match require_session(req.headers(), &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let request: CreateExchangeRequest = match parse_json(req.body()) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let recipient_id = request.recipient.user_id.trim();
    if recipient_id.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "A recipient is required",
            Some("RECIPIENT_REQUIRED"),
        );
    }
    if recipient_id == caller.user_id {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Cannot propose an exchange to yourself",
            Some("SELF_EXCHANGE"),
        );
    }

    if let Err(msg) = check_offers(
        request.exchange_type,
        request.initiator_offer.as_ref(),
        request.recipient_offer.as_ref(),
    ) {
        return error_response(StatusCode::BAD_REQUEST, &msg, Some("INVALID_OFFERS"));
    }

    let initiator = Participant {
        user_id: caller.user_id.clone(),
        display_name: caller
            .account
            .as_ref()
            .map(|a| a.display_name.clone())
            .filter(|n| !n.is_empty()),
    };
    let recipient = Participant {
        user_id: recipient_id.to_string(),
        display_name: request.recipient.display_name,
    };

    let mut exchange = ExchangeDoc::new(
        request.exchange_type,
        initiator,
        recipient,
        request.initiator_offer,
        request.recipient_offer,
    );

    match state.exchanges.insert_exchange(exchange.clone()).await {
        Ok(id) => {
            exchange._id = Some(id);
            info!(
                user_id = %caller.user_id,
                exchange_id = %id,
                exchange_type = %exchange.exchange_type,
                recipient = %exchange.recipient.user_id,
                "Exchange proposed"
            );
            json_response(StatusCode::CREATED, &exchange_to_response(exchange))
        }
        Err(e) => market_error_response(e),
    }
}

/// GET /exchanges/{id}
async fn handle_get_exchange(
    req: Request<Bytes>,
    state: Arc<AppState>,
    exchange_id: &str,
) -> Response<FullBody> {
    match load_for_participant(&req, &state, exchange_id).await {
        Ok((_, exchange)) => json_response(StatusCode::OK, &exchange_to_response(exchange)),
        Err(resp) => resp,
    }
}

/// PUT /exchanges/{id}/status
async fn handle_update_status(
    req: Request<Bytes>,
    state: Arc<AppState>,
    exchange_id: &str,
) -> Response<FullBody> {
    let (caller, exchange) = match load_for_participant(&req, &state, exchange_id).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };

    let request: UpdateStatusRequest = match parse_json(req.body()) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let role = resolve(&exchange, &caller.user_id).exchange_role;
    let from = exchange.status;
    let to = request.status;

    match check_status_change(from, to, role) {
        Ok(()) => {}
        Err(e @ StatusChangeError::WrongParty { .. }) => {
            return error_response(StatusCode::FORBIDDEN, &e.to_string(), Some("WRONG_PARTY"))
        }
        Err(e @ StatusChangeError::NotAllowed { .. }) => {
            return error_response(
                StatusCode::CONFLICT,
                &e.to_string(),
                Some("INVALID_TRANSITION"),
            )
        }
    }

    let oid = match exchange._id {
        Some(id) => id,
        None => return market_error_response(MarketError::Internal("Exchange has no id".into())),
    };

    match state.exchanges.transition(&oid, from, to).await {
        Ok(true) => {
            info!(
                user_id = %caller.user_id,
                exchange_id = %exchange_id,
                from = %from,
                to = %to,
                "Exchange status changed"
            );
            json_response(
                StatusCode::OK,
                &StatusResponse {
                    exchange_id: oid.to_hex(),
                    previous_status: from,
                    status: to,
                },
            )
        }
        Ok(false) => error_response(
            StatusCode::CONFLICT,
            "Exchange changed, reload and retry",
            Some("STALE_EXCHANGE"),
        ),
        Err(e) => market_error_response(e),
    }
}

/// GET /exchanges/{id}/role
async fn handle_get_role(
    req: Request<Bytes>,
    state: Arc<AppState>,
    exchange_id: &str,
) -> Response<FullBody> {
    let (caller, exchange) = match load_for_participant(&req, &state, exchange_id).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };

    let resolution = resolve(&exchange, &caller.user_id);

    json_response(
        StatusCode::OK,
        &RoleResponse {
            exchange_id: exchange.id_hex(),
            exchange_type: exchange.exchange_type,
            status: exchange.status,
            resolution,
            editable_fields: editable_fields(resolution.business_role),
        },
    )
}

/// PATCH /exchanges/{id}/terms
async fn handle_update_terms(
    req: Request<Bytes>,
    state: Arc<AppState>,
    exchange_id: &str,
) -> Response<FullBody> {
    let (caller, exchange) = match load_for_participant(&req, &state, exchange_id).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };

    let update: TermsUpdate = match parse_json(req.body()) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let (resolution, terms) = match negotiate_terms(
        &exchange,
        exchange.status,
        &exchange.terms,
        &caller.user_id,
        &update,
    ) {
        Ok(result) => result,
        Err(TermsError::FieldsNotEditable { role, fields }) => {
            info!(
                user_id = %caller.user_id,
                exchange_id = %exchange_id,
                business_role = %role,
                denied = ?fields,
                "Terms edit refused"
            );
            return json_response(
                StatusCode::FORBIDDEN,
                &FieldsDeniedResponse {
                    error: format!("{} may not edit: {}", role, fields.join(", ")),
                    code: "FIELDS_NOT_EDITABLE",
                    business_role: role,
                    denied_fields: fields,
                },
            );
        }
        Err(e) => return market_error_response(e.into()),
    };

    let oid = match exchange._id {
        Some(id) => id,
        None => return market_error_response(MarketError::Internal("Exchange has no id".into())),
    };

    match state
        .exchanges
        .update_terms(&oid, exchange.status, &terms)
        .await
    {
        Ok(true) => {
            info!(
                user_id = %caller.user_id,
                exchange_id = %exchange_id,
                business_role = %resolution.business_role,
                fields = ?update.keys().collect::<Vec<_>>(),
                "Terms updated"
            );
            json_response(
                StatusCode::OK,
                &TermsResponse {
                    exchange_id: oid.to_hex(),
                    status: ExchangeStatus::Negotiating,
                    business_role: resolution.business_role,
                    terms,
                },
            )
        }
        Ok(false) => error_response(
            StatusCode::CONFLICT,
            "Exchange changed while editing, reload and retry",
            Some("STALE_EXCHANGE"),
        ),
        Err(e) => market_error_response(e),
    }
}

/// POST /exchanges/{id}/disputes
async fn handle_raise_dispute(
    req: Request<Bytes>,
    state: Arc<AppState>,
    exchange_id: &str,
) -> Response<FullBody> {
    let (caller, exchange) = match load_for_participant(&req, &state, exchange_id).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };

    let request: RaiseDisputeRequest = match parse_json(req.body()) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let reason = request.reason.trim();
    if reason.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "A reason is required",
            Some("REASON_REQUIRED"),
        );
    }

    if !exchange.status.allows_dispute() {
        return error_response(
            StatusCode::CONFLICT,
            &format!("Cannot dispute an exchange that is {}", exchange.status),
            Some("DISPUTE_NOT_ALLOWED"),
        );
    }

    let oid = match exchange._id {
        Some(id) => id,
        None => return market_error_response(MarketError::Internal("Exchange has no id".into())),
    };

    // Record the dispute before flipping the status so a failed insert
    // leaves the exchange disputable
    let dispute = DisputeDoc::new(oid, caller.user_id.clone(), reason);
    let created_at = dispute.metadata.created_at.and_then(|d| d.try_to_rfc3339_string().ok());
    let dispute_id = match state.exchanges.insert_dispute(dispute).await {
        Ok(id) => id,
        Err(e) => return market_error_response(e),
    };

    let transitioned = state
        .exchanges
        .transition(&oid, exchange.status, ExchangeStatus::Disputed)
        .await;

    if !matches!(transitioned, Ok(true)) {
        if let Err(e) = state.exchanges.discard_dispute(&dispute_id).await {
            warn!(dispute_id = %dispute_id, "Failed to discard orphaned dispute: {}", e);
        }
        return match transitioned {
            Err(e) => market_error_response(e),
            _ => error_response(
                StatusCode::CONFLICT,
                "Exchange changed, reload and retry",
                Some("STALE_EXCHANGE"),
            ),
        };
    }

    info!(
        user_id = %caller.user_id,
        exchange_id = %exchange_id,
        dispute_id = %dispute_id,
        "Dispute raised"
    );

    json_response(
        StatusCode::CREATED,
        &DisputeResponse {
            dispute_id: dispute_id.to_hex(),
            exchange_id: oid.to_hex(),
            raised_by: caller.user_id,
            reason: reason.to_string(),
            status: DisputeStatus::Open,
            created_at,
        },
    )
}

/// GET /exchanges/{id}/disputes
async fn handle_list_disputes(
    req: Request<Bytes>,
    state: Arc<AppState>,
    exchange_id: &str,
) -> Response<FullBody> {
    let (_caller, exchange) = match load_for_participant(&req, &state, exchange_id).await {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };

    let oid = match exchange._id {
        Some(id) => id,
        None => return market_error_response(MarketError::Internal("Exchange has no id".into())),
    };

    match state.exchanges.disputes_for(&oid).await {
        Ok(disputes) => {
            let body: Vec<DisputeResponse> = disputes.iter().map(dispute_to_response).collect();
            json_response(StatusCode::OK, &body)
        }
        Err(e) => market_error_response(e),
    }
}

fn dispute_to_response(dispute: &DisputeDoc) -> DisputeResponse {
    DisputeResponse {
        dispute_id: dispute._id.map(|id| id.to_hex()).unwrap_or_default(),
        exchange_id: dispute.exchange_id.to_hex(),
        raised_by: dispute.raised_by.clone(),
        reason: dispute.reason.clone(),
        status: dispute.status,
        created_at: dispute
            .metadata
            .created_at
            .and_then(|d| d.try_to_rfc3339_string().ok()),
    }
}

fn exchange_to_response(exchange: ExchangeDoc) -> ExchangeResponse {
    ExchangeResponse {
        exchange_id: exchange.id_hex(),
        exchange_type: exchange.exchange_type,
        status: exchange.status,
        initiator: exchange.initiator,
        recipient: exchange.recipient,
        initiator_offer: exchange.initiator_offer,
        recipient_offer: exchange.recipient_offer,
        terms: exchange.terms,
    }
}
