//! Shared runtime state for mr-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The store is shared
//! behind an `Arc<dyn DeliveryStore>` so the same router serves Postgres in
//! production and the in-memory store in tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use mr_calendar::CalendarError;
use mr_config::Settings;
use mr_engine::BalanceGate;
use mr_runtime::RunConfig;
use mr_schemas::GenerationRunRecord;
use mr_store::DeliveryStore;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    /// A generation run completed.
    Run(GenerationRunRecord),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Returned by GET /v1/status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// Backend name (`"postgres"` / `"memory"`).
    pub store: String,
    pub timezone: String,
    /// Delivery date a generation request would target right now.
    pub next_delivery_date: Option<NaiveDate>,
    pub last_run: Option<GenerationRunRecord>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Source of "now". Tests pin it; production uses `Utc::now`.
pub type Clock = fn() -> DateTime<Utc>;

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub store: Arc<dyn DeliveryStore>,
    pub settings: Settings,
    pub clock: Clock,
    /// Most recent completed generation run.
    pub last_run: Arc<RwLock<Option<GenerationRunRecord>>>,
    /// Serializes generation requests within this process.
    pub generation_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DeliveryStore>, settings: Settings) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "mr-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            store,
            settings,
            clock: Utc::now,
            last_run: Arc::new(RwLock::new(None)),
            generation_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Tomorrow in the delivery timezone, from the server's clock.
    pub fn target_date(&self) -> Result<NaiveDate, CalendarError> {
        self.settings.calendar.target_date((self.clock)())
    }

    pub fn gate(&self) -> BalanceGate {
        BalanceGate::new(self.settings.negative_balance_tolerance)
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig::from(&self.settings)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
