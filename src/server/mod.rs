//! Edge-node probe dispatcher.
//!
//! Exposes the TCP probe over `/api/check` and `/api/batch-check` with a
//! fixed permissive CORS policy. In production one of these runs per
//! vantage point behind its own subdomain; locally a single instance
//! stands in for all of them.

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::probe;
use crate::run::client::CheckResponse;

/// Largest accepted batch
const MAX_BATCH: usize = 10;
/// Probe timeout applied when the request does not carry one
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Identity this node stamps onto results
#[derive(Debug, Clone, Default)]
pub struct NodeIdentity {
    /// Colo code reported in results (None = anonymous local node)
    pub colo: Option<String>,
    /// Placement hint this node executes under; sets the cf-placement header
    pub placement: Option<String>,
}

/// Wire body for a single check. Port is widened so out-of-range values
/// reach validation instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckBody {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub timeout: Option<u64>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
    pub checks: Option<Vec<CheckBody>>,
}

pub fn router(identity: NodeIdentity) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/check", post(handle_check))
        .route("/api/batch-check", post(handle_batch))
        .fallback(unknown_endpoint)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(identity)
}

/// Bind and serve until the process exits
pub async fn serve(bind: &str, identity: NodeIdentity) -> Result<()> {
    let app = router(identity.clone());
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(
        bind,
        colo = identity.colo.as_deref().unwrap_or("-"),
        "edge node listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_check(
    State(identity): State<NodeIdentity>,
    Json(body): Json<CheckBody>,
) -> Response {
    let (host, port) = match validate(&body) {
        Ok(pair) => pair,
        Err(msg) => return bad_request(msg),
    };

    let result = run_check(&identity, &host, port, body.timeout, body.region).await;
    with_placement_header(&identity, Json(result).into_response())
}

async fn handle_batch(
    State(identity): State<NodeIdentity>,
    Json(body): Json<BatchBody>,
) -> Response {
    let checks = match body.checks {
        Some(checks) if !checks.is_empty() => checks,
        _ => return bad_request("checks must be a non-empty array".to_string()),
    };
    if checks.len() > MAX_BATCH {
        return bad_request(format!("Batch size exceeds maximum of {}", MAX_BATCH));
    }

    // Validate everything up front so one malformed entry fails the request,
    // not the batch semantics
    let mut validated = Vec::with_capacity(checks.len());
    for check in &checks {
        match validate(check) {
            Ok(pair) => validated.push(pair),
            Err(msg) => return bad_request(msg),
        }
    }

    // All probes run concurrently; output stays index-aligned with input
    let futures: Vec<_> = validated
        .into_iter()
        .zip(checks)
        .map(|((host, port), check)| {
            let identity = identity.clone();
            async move { run_check(&identity, &host, port, check.timeout, check.region).await }
        })
        .collect();
    let results = futures::future::join_all(futures).await;

    with_placement_header(&identity, Json(json!({ "results": results })).into_response())
}

async fn unknown_endpoint() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Unknown API endpoint" })),
    )
        .into_response()
}

fn validate(body: &CheckBody) -> std::result::Result<(String, u16), String> {
    let host = match &body.host {
        Some(host) if !host.is_empty() => host.clone(),
        _ => return Err("Missing required field: host".to_string()),
    };
    let port = match body.port {
        None => return Err("Missing required field: port".to_string()),
        Some(port) if !(1..=65535).contains(&port) => {
            return Err(format!("Port out of range [1,65535]: {}", port))
        }
        Some(port) => port as u16,
    };
    Ok((host, port))
}

/// Execute one probe and wrap it in the wire response shape.
/// Probe failures are data; only input validation produces an error status.
async fn run_check(
    identity: &NodeIdentity,
    host: &str,
    port: u16,
    timeout_ms: Option<u64>,
    region: Option<String>,
) -> CheckResponse {
    let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
    let outcome = probe::probe(host, port, timeout).await;

    CheckResponse {
        success: outcome.succeeded,
        host: host.to_string(),
        port,
        region,
        latency_ms: outcome.latency_ms,
        error: outcome.error,
        timestamp: Utc::now().timestamp_millis(),
        cf_ray: Some(trace_id(identity)),
        colo: identity.colo.clone(),
    }
}

/// Per-request trace id, suffixed with the accepting colo when known
fn trace_id(identity: &NodeIdentity) -> String {
    let ray = Uuid::new_v4().simple().to_string();
    match &identity.colo {
        Some(colo) => format!("{}-{}", &ray[..16], colo.to_uppercase()),
        None => ray[..16].to_string(),
    }
}

fn bad_request(msg: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
}

/// Placement-hinted nodes advertise their actual execution location
fn with_placement_header(identity: &NodeIdentity, mut response: Response) -> Response {
    if identity.placement.is_some() {
        if let Some(colo) = &identity.colo {
            if let Ok(value) = format!("remote-{}", colo.to_uppercase()).parse() {
                response.headers_mut().insert("cf-placement", value);
            }
        }
    }
    response
}
