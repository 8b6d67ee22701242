//! The generation run: materialize every active customer's order for one
//! delivery date.
//!
//! # Lifecycle
//!
//! `NotStarted -> Running -> Completed`. There is no failure state: a
//! customer whose order cannot be written is recorded as `failed` and the run
//! carries on with everyone else. Only a failure to load the run's inputs
//! aborts, and then nothing has been written and the run returns to
//! `NotStarted`.
//!
//! # Idempotency
//!
//! A customer who already has a live order for the date is reported as
//! `already_materialized` before anything is resolved or charged. Running the
//! same date twice therefore creates nothing the second time, and a run that
//! was dropped half-way is completed by the next one.
//!
//! # Tallies
//!
//! `orders_created` counts created orders. `orders_skipped` counts customers
//! whose wallet could not cover the order, either at the gate or under the
//! wallet lock. `no_items`, `already_materialized` and `failed` are kept
//! separately and never folded into the skipped count.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::{stream, StreamExt};
use mr_calendar::{CalendarError, DeliveryCalendar};
use mr_config::Settings;
use mr_engine::{group_by_customer, resolve_customer_day, BalanceGate};
use mr_schemas::{GenerationRunRecord, Money, NewOrder, SubscriptionRecord};
use mr_store::{DeliveryStore, Materialized, StoreError};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::loader::{load_day_inputs, log_issues, DayInputs};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Customers processed concurrently. Clamped to at least 1.
    pub max_parallel_customers: usize,
    pub negative_balance_tolerance: Money,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig::from(&Settings::default())
    }
}

impl From<&Settings> for RunConfig {
    fn from(s: &Settings) -> Self {
        RunConfig {
            max_parallel_customers: s.max_parallel_customers,
            negative_balance_tolerance: s.negative_balance_tolerance,
        }
    }
}

// ---------------------------------------------------------------------------
// State / outcomes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
}

/// What happened to one customer during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CustomerOutcome {
    Created {
        order_id: Uuid,
        total: Money,
    },
    AlreadyMaterialized {
        order_id: Uuid,
    },
    /// Nothing scheduled, everything skipped, or on vacation.
    NoItems {
        on_vacation: bool,
    },
    SkippedInsufficientBalance {
        balance: Money,
        total: Money,
    },
    /// Passed the gate, failed the re-check under the wallet lock.
    SkippedBalanceRace {
        available: Money,
        required: Money,
    },
    Failed {
        error: String,
    },
}

impl CustomerOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            CustomerOutcome::Created { .. } => "created",
            CustomerOutcome::AlreadyMaterialized { .. } => "already_materialized",
            CustomerOutcome::NoItems { .. } => "no_items",
            CustomerOutcome::SkippedInsufficientBalance { .. } => "skipped_insufficient_balance",
            CustomerOutcome::SkippedBalanceRace { .. } => "skipped_balance_race",
            CustomerOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunTally {
    pub created: u64,
    pub already_materialized: u64,
    pub no_items: u64,
    pub skipped_insufficient_balance: u64,
    pub skipped_balance_race: u64,
    pub failed: u64,
}

impl RunTally {
    pub fn record(&mut self, outcome: &CustomerOutcome) {
        match outcome {
            CustomerOutcome::Created { .. } => self.created += 1,
            CustomerOutcome::AlreadyMaterialized { .. } => self.already_materialized += 1,
            CustomerOutcome::NoItems { .. } => self.no_items += 1,
            CustomerOutcome::SkippedInsufficientBalance { .. } => {
                self.skipped_insufficient_balance += 1
            }
            CustomerOutcome::SkippedBalanceRace { .. } => self.skipped_balance_race += 1,
            CustomerOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn orders_skipped(&self) -> u64 {
        self.skipped_insufficient_balance + self.skipped_balance_race
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub target_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub orders_created: u64,
    pub orders_skipped: u64,
    pub tally: RunTally,
    #[serde(skip)]
    pub outcomes: BTreeMap<Uuid, CustomerOutcome>,
}

impl RunReport {
    pub fn to_record(&self) -> GenerationRunRecord {
        GenerationRunRecord {
            run_id: self.run_id,
            target_date: self.target_date,
            started_at: self.started_at,
            completed_at: self.completed_at,
            orders_created: self.orders_created,
            orders_skipped: self.orders_skipped,
            no_items: self.tally.no_items,
            already_materialized: self.tally.already_materialized,
            failed: self.tally.failed,
        }
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// `execute` was called on a run that is not `NotStarted`.
    AlreadyStarted(RunState),
    /// Loading the run's inputs failed; nothing was written.
    Load(StoreError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::AlreadyStarted(st) => write!(f, "generation run already {st:?}"),
            RunError::Load(e) => write!(f, "failed to load run inputs: {e}"),
        }
    }
}

impl std::error::Error for RunError {}

// ---------------------------------------------------------------------------
// GenerationRun
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct GenerationRun {
    run_id: Uuid,
    target_date: NaiveDate,
    config: RunConfig,
    state: RunState,
}

impl GenerationRun {
    pub fn new(target_date: NaiveDate, config: RunConfig) -> Self {
        GenerationRun {
            run_id: Uuid::new_v4(),
            target_date,
            config,
            state: RunState::NotStarted,
        }
    }

    /// A run for "tomorrow" as the delivery calendar sees `now`.
    pub fn for_tomorrow(
        calendar: &DeliveryCalendar,
        now: DateTime<Utc>,
        config: RunConfig,
    ) -> Result<Self, CalendarError> {
        Ok(Self::new(calendar.target_date(now)?, config))
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn target_date(&self) -> NaiveDate {
        self.target_date
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn execute(&mut self, store: &dyn DeliveryStore) -> Result<RunReport, RunError> {
        if self.state != RunState::NotStarted {
            return Err(RunError::AlreadyStarted(self.state));
        }
        self.state = RunState::Running;
        let started_at = Utc::now();
        let date = self.target_date;

        let (groups, inputs) = match load_run(store, date).await {
            Ok(v) => v,
            Err(e) => {
                self.state = RunState::NotStarted;
                error!(run_id = %self.run_id, %date, error = %e, "generation run could not load inputs");
                return Err(RunError::Load(e));
            }
        };

        info!(
            run_id = %self.run_id,
            %date,
            store = store.name(),
            customers = groups.len(),
            parallel = self.config.max_parallel_customers,
            "generation run started"
        );

        let gate = BalanceGate::new(self.config.negative_balance_tolerance);
        let inputs = &inputs;
        let results: Vec<(Uuid, CustomerOutcome)> = stream::iter(groups)
            .map(move |(customer_id, subs)| async move {
                let outcome = process_customer(store, inputs, gate, customer_id, &subs).await;
                (customer_id, outcome)
            })
            .buffer_unordered(self.config.max_parallel_customers.max(1))
            .collect()
            .await;

        let mut tally = RunTally::default();
        let mut outcomes = BTreeMap::new();
        for (customer_id, outcome) in results {
            tally.record(&outcome);
            outcomes.insert(customer_id, outcome);
        }

        self.state = RunState::Completed;
        let report = RunReport {
            run_id: self.run_id,
            target_date: date,
            started_at,
            completed_at: Utc::now(),
            orders_created: tally.created,
            orders_skipped: tally.orders_skipped(),
            tally,
            outcomes,
        };

        info!(
            run_id = %report.run_id,
            %date,
            created = tally.created,
            skipped = report.orders_skipped,
            no_items = tally.no_items,
            already_materialized = tally.already_materialized,
            failed = tally.failed,
            "generation run completed"
        );

        if let Err(e) = store.record_run(&report.to_record()).await {
            warn!(run_id = %report.run_id, error = %e, "failed to record generation run");
        }

        Ok(report)
    }
}

async fn load_run(
    store: &dyn DeliveryStore,
    date: NaiveDate,
) -> Result<(BTreeMap<Uuid, Vec<SubscriptionRecord>>, DayInputs), StoreError> {
    let subs = store.active_subscriptions().await?;
    let inputs = load_day_inputs(store, &subs, date).await?;
    Ok((group_by_customer(subs), inputs))
}

async fn process_customer(
    store: &dyn DeliveryStore,
    inputs: &DayInputs,
    gate: BalanceGate,
    customer_id: Uuid,
    subs: &[SubscriptionRecord],
) -> CustomerOutcome {
    let date = inputs.date;

    match store.existing_order(customer_id, date).await {
        Ok(Some(order)) => {
            debug!(%customer_id, %date, order_id = %order.id, "order already materialized");
            return CustomerOutcome::AlreadyMaterialized { order_id: order.id };
        }
        Ok(None) => {}
        Err(e) => return failed(customer_id, date, e),
    }

    let res = resolve_customer_day(&inputs.customer_day(customer_id, subs));
    log_issues(&res);
    if res.is_empty() {
        debug!(%customer_id, %date, on_vacation = res.on_vacation, "no items");
        return CustomerOutcome::NoItems {
            on_vacation: res.on_vacation,
        };
    }

    let balance = match store.wallet_balance(customer_id).await {
        Ok(b) => b,
        Err(e) => return failed(customer_id, date, e),
    };
    let check = gate.check(balance, &res.lines);
    if !check.sufficient {
        info!(
            %customer_id,
            %date,
            balance = %check.balance,
            total = %check.total,
            "skipped: insufficient balance"
        );
        return CustomerOutcome::SkippedInsufficientBalance {
            balance: check.balance,
            total: check.total,
        };
    }

    let new_order = NewOrder {
        customer_id,
        delivery_date: date,
        items: res.lines,
        total_amount: check.total,
        tolerance: gate.tolerance(),
    };

    match store.materialize(&new_order).await {
        Ok(Materialized::Created(order)) => {
            debug!(%customer_id, %date, order_id = %order.id, total = %order.total_amount, "order created");
            CustomerOutcome::Created {
                order_id: order.id,
                total: order.total_amount,
            }
        }
        Ok(Materialized::AlreadyExists(order)) => {
            CustomerOutcome::AlreadyMaterialized { order_id: order.id }
        }
        Err(StoreError::BalanceRace {
            available,
            required,
        }) => {
            info!(%customer_id, %date, %available, %required, "skipped: balance changed before debit");
            CustomerOutcome::SkippedBalanceRace {
                available,
                required,
            }
        }
        Err(e) => failed(customer_id, date, e),
    }
}

fn failed(customer_id: Uuid, date: NaiveDate, e: StoreError) -> CustomerOutcome {
    error!(%customer_id, %date, error = %e, "customer failed; continuing run");
    CustomerOutcome::Failed {
        error: e.to_string(),
    }
}
