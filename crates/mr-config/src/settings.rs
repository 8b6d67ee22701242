//! Typed settings read out of the merged configuration, with defaults for
//! every key that is absent.

use anyhow::{bail, Context, Result};
use mr_calendar::DeliveryCalendar;
use mr_schemas::Money;
use serde_json::Value;

use crate::{default_calendar, parse_tolerance, DEFAULT_BIND_ADDR, DEFAULT_MAX_PARALLEL_CUSTOMERS};

/// Typed view of the merged configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Delivery timezone policy (`/calendar/timezone`).
    pub calendar: DeliveryCalendar,
    /// Worker pool size for one generation run (`/generation/max_parallel_customers`).
    pub max_parallel_customers: usize,
    /// How far below zero a wallet may go (`/wallet/negative_balance_tolerance`).
    pub negative_balance_tolerance: Money,
    /// Daemon listen address (`/daemon/bind_addr`).
    pub bind_addr: String,
}

impl Settings {
    pub fn from_config_json(v: &Value) -> Result<Settings> {
        let calendar = match str_at(v, "/calendar/timezone")? {
            Some(name) => DeliveryCalendar::from_name(name)
                .with_context(|| "/calendar/timezone".to_string())?,
            None => default_calendar()?,
        };

        let max_parallel_customers = match v.pointer("/generation/max_parallel_customers") {
            None | Some(Value::Null) => DEFAULT_MAX_PARALLEL_CUSTOMERS,
            Some(n) => {
                let n = n
                    .as_u64()
                    .context("/generation/max_parallel_customers must be a positive integer")?;
                if n == 0 {
                    bail!("/generation/max_parallel_customers must be >= 1");
                }
                usize::try_from(n).context("/generation/max_parallel_customers too large")?
            }
        };

        // Accept both `"2.50"` and a bare YAML number such as `50`.
        let negative_balance_tolerance = match v.pointer("/wallet/negative_balance_tolerance") {
            None | Some(Value::Null) => Money::ZERO,
            Some(Value::String(s)) => parse_tolerance(s)?,
            Some(Value::Number(n)) => parse_tolerance(&n.to_string())?,
            Some(other) => bail!(
                "/wallet/negative_balance_tolerance must be a decimal amount, got {other}"
            ),
        };

        let bind_addr = str_at(v, "/daemon/bind_addr")?
            .unwrap_or(DEFAULT_BIND_ADDR)
            .to_string();

        Ok(Settings {
            calendar,
            max_parallel_customers,
            negative_balance_tolerance,
            bind_addr,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            calendar: DeliveryCalendar::default(),
            max_parallel_customers: DEFAULT_MAX_PARALLEL_CUSTOMERS,
            negative_balance_tolerance: Money::ZERO,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

fn str_at<'a>(v: &'a Value, ptr: &str) -> Result<Option<&'a str>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => bail!("{ptr} must be a string, got {other}"),
    }
}
