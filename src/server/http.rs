//! HTTP server implementation
//!
//! hyper http1 with TokioIo. Request bodies are collected up front so route
//! handlers work on `Request<Bytes>` and can be driven directly in tests.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::SessionVerifier;
use crate::config::Args;
use crate::db::MongoClient;
use crate::routes::{self, FullBody};
use crate::services::{
    ExchangeStore, MemoryExchangeStore, MemoryUserStore, MongoExchangeStore, MongoUserStore,
    UserStore,
};
use crate::types::{MarketError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Verifies session tokens from the identity provider
    pub sessions: SessionVerifier,
    pub exchanges: Arc<dyn ExchangeStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(
        args: Args,
        exchanges: Arc<dyn ExchangeStore>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self> {
        let secret = args
            .session_secret()
            .ok_or_else(|| MarketError::Config("SESSION_SECRET is not set".into()))?;

        Ok(Self {
            sessions: SessionVerifier::new(secret)?,
            args,
            exchanges,
            users,
        })
    }

    /// State backed by in-memory stores (dev mode and tests)
    pub fn in_memory(args: Args) -> Result<Self> {
        Self::new(
            args,
            Arc::new(MemoryExchangeStore::new()),
            Arc::new(MemoryUserStore::new()),
        )
    }

    /// State backed by MongoDB collections
    pub async fn with_mongo(args: Args, mongo: &MongoClient) -> Result<Self> {
        let exchanges = MongoExchangeStore::new(mongo).await?;
        let users = MongoUserStore::new(mongo).await?;
        Self::new(args, Arc::new(exchanges), Arc::new(users))
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Skillswap listening on {} ({} store)",
        state.args.listen,
        state.exchanges.backend()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - do not expose this instance");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Collect the body, route, and attach CORS headers
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<FullBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());

    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    let req = Request::from_parts(parts, body);

    let origin = state.args.cors_origin.clone();
    let mut response = route(state, req).await;
    with_cors(&mut response, &origin);

    Ok(response)
}

/// Dispatch a request with a fully read body
pub async fn route(state: Arc<AppState>, req: Request<Bytes>) -> Response<FullBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::OPTIONS, _) => preflight_response(),

        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(state),

        (Method::GET, "/version") => routes::version_info(),

        (_, p) if p == "/exchanges" || p.starts_with("/exchanges/") => {
            routes::handle_exchanges_request(req, state, p).await
        }

        (_, p) if p.starts_with("/admin/") => routes::handle_admin_request(req, state, p).await,

        (_, p) => {
            debug!("No route for {}", p);
            routes::not_found_response(p)
        }
    }
}

fn with_cors(response: &mut Response<FullBody>, origin: &str) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    // Cookies are only sent cross-origin to a named origin
    if origin != "*" {
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

/// CORS preflight response
fn preflight_response() -> Response<FullBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, PATCH, OPTIONS"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn state() -> Arc<AppState> {
        let args = Args::try_parse_from(["skillswap", "--dev-mode"]).unwrap();
        Arc::new(AppState::in_memory(args).unwrap())
    }

    fn request(method: Method, path: &str) -> Request<Bytes> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_memory_store() {
        let resp = route(state(), request(Method::GET, "/healthz")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["healthy"], true);
        assert_eq!(json["store"], "memory");
        assert_eq!(json["mode"], "development");
    }

    #[tokio::test]
    async fn test_preflight_and_unknown_route() {
        let resp = route(state(), request(Method::OPTIONS, "/exchanges/x/terms")).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.headers().contains_key(ACCESS_CONTROL_ALLOW_METHODS));

        let resp = route(state(), request(Method::GET, "/nope")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cors_credentials_only_for_named_origin() {
        let mut resp = preflight_response();
        with_cors(&mut resp, "*");
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(!resp.headers().contains_key(ACCESS_CONTROL_ALLOW_CREDENTIALS));

        let mut resp = preflight_response();
        with_cors(&mut resp, "https://app.example");
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[test]
    fn test_production_state_requires_secret() {
        let args = Args::try_parse_from(["skillswap"]).unwrap();
        assert!(AppState::in_memory(args).is_err());
    }
}
