//! Axum router and all HTTP handlers for mr-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.
//!
//! Every date is resolved server-side from [`AppState::target_date`]; no
//! endpoint accepts a delivery date from the client.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use mr_runtime::{preview_customer_day, procurement_list, GenerationRun, RunError};
use mr_store::StoreError;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        ErrorResponse, GenerateOrdersResponse, HealthResponse, PreviewResponse,
        ProcurementResponse,
    },
    state::{uptime_secs, AppState, BusMsg, StatusSnapshot},
};

/// Header carrying the authenticated customer id, set by the upstream
/// auth layer.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/admin/generate-orders", post(generate_orders))
        .route("/admin/procurement", get(procurement))
        .route("/orders/tomorrow/preview", get(preview_tomorrow))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error helpers
// ---------------------------------------------------------------------------

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: msg.into() })).into_response()
}

fn store_unavailable(e: StoreError) -> Response {
    error!(error = %e, "store unavailable");
    error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

fn customer_id(headers: &HeaderMap) -> Result<Uuid, Response> {
    let raw = headers
        .get(CUSTOMER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            error_response(
                StatusCode::UNAUTHORIZED,
                format!("missing {CUSTOMER_ID_HEADER} header"),
            )
        })?;
    Uuid::parse_str(raw.trim()).map_err(|_| {
        error_response(
            StatusCode::UNAUTHORIZED,
            format!("invalid {CUSTOMER_ID_HEADER} header"),
        )
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = StatusSnapshot {
        daemon_uptime_secs: uptime_secs(),
        store: st.store.name().to_string(),
        timezone: st.settings.calendar.timezone().name().to_string(),
        next_delivery_date: st.target_date().ok(),
        last_run: st.last_run.read().await.clone(),
    };
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /admin/generate-orders
// ---------------------------------------------------------------------------

/// Run generation for tomorrow. Safe to repeat: a second request for the
/// same date reports `orders_created: 0`.
pub(crate) async fn generate_orders(State(st): State<Arc<AppState>>) -> Response {
    let _serialized = st.generation_lock.lock().await;

    let date = match st.target_date() {
        Ok(d) => d,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut run = GenerationRun::new(date, st.run_config());
    info!(run_id = %run.run_id(), %date, "admin/generate-orders");

    let report = match run.execute(st.store.as_ref()).await {
        Ok(r) => r,
        Err(RunError::Load(e)) => return store_unavailable(e),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let record = report.to_record();
    *st.last_run.write().await = Some(record.clone());
    if record.failed > 0 {
        let _ = st.bus.send(BusMsg::LogLine {
            level: "ERROR".to_string(),
            msg: format!(
                "generation for {date}: {} customer(s) failed to materialize",
                record.failed
            ),
        });
    }
    let _ = st.bus.send(BusMsg::Run(record));

    (
        StatusCode::OK,
        Json(GenerateOrdersResponse {
            orders_created: report.orders_created,
            orders_skipped: report.orders_skipped,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /orders/tomorrow/preview
// ---------------------------------------------------------------------------

pub(crate) async fn preview_tomorrow(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let customer_id = match customer_id(&headers) {
        Ok(id) => id,
        Err(resp) => {
            warn!("preview refused: no customer identity");
            return resp;
        }
    };
    let date = match st.target_date() {
        Ok(d) => d,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match preview_customer_day(st.store.as_ref(), &st.gate(), customer_id, date).await {
        Ok(preview) => (StatusCode::OK, Json(PreviewResponse::from(preview))).into_response(),
        Err(e) => store_unavailable(e),
    }
}

// ---------------------------------------------------------------------------
// GET /admin/procurement
// ---------------------------------------------------------------------------

pub(crate) async fn procurement(State(st): State<Arc<AppState>>) -> Response {
    let date = match st.target_date() {
        Ok(d) => d,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match procurement_list(st.store.as_ref(), date).await {
        Ok(list) => (StatusCode::OK, Json(ProcurementResponse::from(list))).into_response(),
        Err(e) => store_unavailable(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Run(_) => "run",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
