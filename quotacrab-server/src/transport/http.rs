//! HTTP/JSON transport
//!
//! # API Endpoints
//!
//! ## GET /look
//!
//! Consume one unit of the caller's quota and return lookup data for an
//! address.
//!
//! - Header `api-key`: the credential key (required)
//! - Query `ip`: address to look up (optional, defaults to the client origin)
//!
//! ### Responses
//!
//! | Status | When |
//! |--------|------|
//! | 200 | Admitted, lookup JSON in the body |
//! | 400 | `ip` is not an address; no quota consumed |
//! | 401 | Key missing or unknown |
//! | 404 | Admitted, but the lookup had no data |
//! | 429 | Quota exhausted; body carries `resetTime` |
//! | 500 | Store, actor or lookup failure |
//!
//! Every admitted response carries `X-RateLimit-Limit`,
//! `X-RateLimit-Remaining` and `X-RateLimit-Reset` (ms since epoch). A quota
//! consumed by an admitted request is not given back when the lookup fails.
//!
//! ## GET /health
//!
//! Health check endpoint. Returns "OK" with 200 status.
//!
//! ## GET /metrics
//!
//! Prometheus text exposition of [`Metrics`].

use super::Transport;
use super::origin::{client_origin, parse_target};
use crate::actor::AdmissionHandle;
use crate::lookup::Lookup;
use crate::metrics::{Metrics, Outcome};
use crate::types::{
    API_KEY_HEADER, AdmitRequest, HttpErrorResponse, LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Router,
    extract::{ConnectInfo, Query, State, rejection::QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use quotacrab::{Decision, RejectReason, clock};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

/// Query string of `GET /look`
#[derive(Debug, Default, Deserialize)]
pub struct LookQuery {
    /// Address to look up
    pub ip: Option<String>,
}

/// HTTP transport implementation
pub struct HttpTransport {
    addr: SocketAddr,
    lookup: Arc<dyn Lookup>,
    metrics: Arc<Metrics>,
    trust_forwarded_for: bool,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Fails when `host` is not an IP address.
    pub fn new(host: &str, port: u16, lookup: Arc<dyn Lookup>, metrics: Arc<Metrics>) -> Result<Self> {
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("Invalid HTTP host {host}"))?;
        let addr = SocketAddr::new(ip, port);
        Ok(Self {
            addr,
            lookup,
            metrics,
            trust_forwarded_for: false,
        })
    }

    /// Take the client origin from `X-Forwarded-For`
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, limiter: AdmissionHandle) -> Result<()> {
        let state = Arc::new(AppState {
            limiter,
            lookup: self.lookup,
            metrics: self.metrics,
            trust_forwarded_for: self.trust_forwarded_for,
        });

        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        tracing::info!("HTTP server listening on {}", self.addr);

        serve(listener, router(state)).await
    }
}

/// Shared state of the HTTP handlers
pub struct AppState {
    pub limiter: AdmissionHandle,
    pub lookup: Arc<dyn Lookup>,
    pub metrics: Arc<Metrics>,
    pub trust_forwarded_for: bool,
}

/// Build the router
///
/// Handlers need [`ConnectInfo<SocketAddr>`]; serve it with [`serve`] or add a
/// `MockConnectInfo` layer.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/look", get(handle_look))
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

/// Serve `app` on an already bound listener
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.export_prometheus()
}

async fn handle_look(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    query: Result<Query<LookQuery>, QueryRejection>,
) -> Response {
    let started = Instant::now();
    let (outcome, response) = look(&state, peer, &headers, query).await;
    state.metrics.record_request(outcome, started.elapsed());
    response
}

async fn look(
    state: &AppState,
    peer: SocketAddr,
    headers: &HeaderMap,
    query: Result<Query<LookQuery>, QueryRejection>,
) -> (Outcome, Response) {
    let Some(key) = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty())
    else {
        return rejection(RejectReason::Unauthenticated, None);
    };

    // Resolve the target first so a bad parameter costs no quota
    let query = match query {
        Ok(Query(query)) => query,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting malformed query string");
            return malformed();
        }
    };
    let target = match query.ip.as_deref().filter(|ip| !ip.trim().is_empty()) {
        Some(raw) => match parse_target(raw) {
            Ok(ip) => ip,
            Err(_) => {
                tracing::debug!(ip = raw, "rejecting malformed target");
                return malformed();
            }
        },
        None => client_origin(headers, peer, state.trust_forwarded_for),
    };

    let request = AdmitRequest {
        key: Some(key.to_string()),
        now: clock::now_millis(),
    };
    let decision = match state.limiter.admit(request).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(error = %e, "admission unavailable");
            return (Outcome::Error, internal_error());
        }
    };

    let quota_headers = match decision {
        Decision::Admitted {
            limit,
            remaining,
            reset_at,
        } => quota_headers(limit, remaining, reset_at),
        Decision::Rejected { reason, reset_at } => return rejection(reason, reset_at),
        Decision::Error(_) => return (Outcome::Error, internal_error()),
    };

    match state.lookup.lookup(target).await {
        Ok(Some(data)) => {
            tracing::debug!(ip = %target, "lookup served");
            (
                Outcome::Served,
                (StatusCode::OK, quota_headers, Json(data)).into_response(),
            )
        }
        Ok(None) => (
            Outcome::NotFound,
            error_response(
                StatusCode::NOT_FOUND,
                quota_headers,
                "No data found for IP address",
            ),
        ),
        Err(e) => {
            tracing::error!(ip = %target, error = %e, "lookup failed");
            (
                Outcome::LookupFailed,
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    quota_headers,
                    "Error processing lookup",
                ),
            )
        }
    }
}

fn rejection(reason: RejectReason, reset_at: Option<i64>) -> (Outcome, Response) {
    tracing::debug!(%reason, "request rejected");
    let mut headers = HeaderMap::new();
    let status = match reason {
        RejectReason::Unauthenticated | RejectReason::InvalidKey => StatusCode::UNAUTHORIZED,
        RejectReason::QuotaExceeded => {
            if let Some(reset_at) = reset_at {
                headers.insert(RESET_HEADER, HeaderValue::from(reset_at));
            }
            StatusCode::TOO_MANY_REQUESTS
        }
    };
    (
        Outcome::Rejected(reason),
        (
            status,
            headers,
            Json(HttpErrorResponse::rejected(reason, reset_at)),
        )
            .into_response(),
    )
}

fn quota_headers(limit: i64, remaining: i64, reset_at: i64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(reset_at));
    headers
}

fn error_response(status: StatusCode, headers: HeaderMap, message: &str) -> Response {
    (status, headers, Json(HttpErrorResponse::new(message))).into_response()
}

fn malformed() -> (Outcome, Response) {
    (
        Outcome::Malformed,
        error_response(StatusCode::BAD_REQUEST, HeaderMap::new(), "Invalid IP address"),
    )
}

fn internal_error() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        HeaderMap::new(),
        "Internal server error",
    )
}
