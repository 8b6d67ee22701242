//! Delivery command handlers: `generate`, `preview`, `procurement`.
//!
//! Every argument is validated before the database is touched.

use anyhow::{Context, Result};
use mr_db::PgStore;
use mr_engine::BalanceGate;
use mr_runtime::{preview_customer_day, procurement_list, GenerationRun, RunConfig};

use super::{load_settings, parse_customer, resolve_date};

async fn connect_store() -> Result<PgStore> {
    let pool = mr_db::connect_from_env().await?;
    Ok(PgStore::new(pool))
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

pub async fn generate(date: Option<&str>, config_paths: &[String]) -> Result<()> {
    let (loaded, settings) = load_settings(config_paths)?;
    let date = resolve_date(date, &settings)?;

    let store = connect_store().await?;
    let mut run = GenerationRun::new(date, RunConfig::from(&settings));
    tracing::info!(run_id = %run.run_id(), %date, config_hash = %loaded.config_hash, "generate");
    let report = run
        .execute(&store)
        .await
        .with_context(|| format!("generation for {date} failed"))?;

    println!("run_id={}", report.run_id);
    println!("config_hash={}", loaded.config_hash);
    println!("target_date={}", report.target_date);
    println!("orders_created={}", report.orders_created);
    println!("orders_skipped={}", report.orders_skipped);
    println!("no_items={}", report.tally.no_items);
    println!("already_materialized={}", report.tally.already_materialized);
    println!("failed={}", report.tally.failed);

    for (customer_id, outcome) in &report.outcomes {
        if let mr_runtime::CustomerOutcome::Failed { error } = outcome {
            eprintln!("  failed customer={} error={}", customer_id, error);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// preview
// ---------------------------------------------------------------------------

pub async fn preview(customer: &str, date: Option<&str>, config_paths: &[String]) -> Result<()> {
    let customer_id = parse_customer(customer)?;
    let (_, settings) = load_settings(config_paths)?;
    let date = resolve_date(date, &settings)?;

    let store = connect_store().await?;
    let gate = BalanceGate::new(settings.negative_balance_tolerance);
    let preview = preview_customer_day(&store, &gate, customer_id, date)
        .await
        .context("preview failed")?;

    println!("customer_id={}", customer_id);
    println!("date={}", preview.date);
    for item in &preview.items {
        println!(
            "item product_id={} product={:?} quantity={} unit_price={} total={}",
            item.product_id, item.product_name, item.quantity, item.unit_price, item.line_total
        );
    }
    println!("total={}", preview.total);
    println!("wallet_balance={}", preview.wallet_balance);
    println!("sufficient_balance={}", preview.sufficient_balance);
    if let Some(msg) = &preview.message {
        println!("message={:?}", msg);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// procurement
// ---------------------------------------------------------------------------

pub async fn procurement(date: Option<&str>, config_paths: &[String]) -> Result<()> {
    let (_, settings) = load_settings(config_paths)?;
    let date = resolve_date(date, &settings)?;

    let store = connect_store().await?;
    let list = procurement_list(&store, date)
        .await
        .context("procurement list failed")?;

    println!("date={}", list.date);
    for line in &list.items {
        println!(
            "product_id={} product={:?} total_quantity={}",
            line.product_id, line.product_name, line.total_quantity
        );
    }
    Ok(())
}
