//! Command handler modules for mr-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod deliveries;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use mr_config::{report_unused_keys, ConfigConsumer, LoadedConfig, Settings, UnusedKeyPolicy};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config (or defaults when no paths are given), warn about
/// keys the CLI never reads, and extract typed settings.
pub fn load_settings(config_paths: &[String]) -> Result<(LoadedConfig, Settings)> {
    let loaded = if config_paths.is_empty() {
        mr_config::defaults()?
    } else {
        let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
        mr_config::load_layered_yaml(&path_refs)?
    };

    let report = report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS consumer={} unused_leaf_keys={}",
            report.consumer,
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
        let extra = report.unused_leaf_pointers.len().saturating_sub(50);
        if extra > 0 {
            eprintln!("  ... and {} more", extra);
        }
    }

    let settings = loaded.settings()?;
    Ok((loaded, settings))
}

/// Explicit `--date`, or tomorrow in the configured delivery timezone.
pub fn resolve_date(date: Option<&str>, settings: &Settings) -> Result<NaiveDate> {
    match date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid --date {raw:?}; expected YYYY-MM-DD")),
        None => Ok(settings.calendar.target_date(Utc::now())?),
    }
}

pub fn parse_customer(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("invalid --customer uuid {raw:?}"))
}
