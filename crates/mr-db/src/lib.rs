//! Postgres persistence for milkrun.
//!
//! Connection and migration helpers, the seeding writes used by operators and
//! tests, and [`PgStore`], the Postgres [`mr_store::DeliveryStore`].

use anyhow::{Context, Result};
use mr_schemas::{Modification, Money, Product, SubscriptionRecord, Vacation};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

mod store;

pub use store::PgStore;

pub const ENV_DB_URL: &str = "MR_DATABASE_URL";

/// Connect to Postgres using MR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_orders_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Seeding writes
// ---------------------------------------------------------------------------

pub async fn insert_product(pool: &PgPool, p: &Product) -> Result<()> {
    sqlx::query(
        r#"
        insert into products (id, name, unit_price_minor, is_available)
        values ($1, $2, $3, $4)
        on conflict (id) do update
          set name = excluded.name,
              unit_price_minor = excluded.unit_price_minor,
              is_available = excluded.is_available
        "#,
    )
    .bind(p.id)
    .bind(&p.name)
    .bind(p.unit_price.raw())
    .bind(p.is_available)
    .execute(pool)
    .await
    .context("insert_product failed")?;
    Ok(())
}

pub async fn insert_subscription(pool: &PgPool, s: &SubscriptionRecord) -> Result<()> {
    sqlx::query(
        r#"
        insert into subscriptions (
          id, customer_id, product_id, quantity, pattern, custom_days,
          start_date, end_date, status
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9
        )
        "#,
    )
    .bind(s.id)
    .bind(s.customer_id)
    .bind(s.product_id)
    .bind(s.quantity)
    .bind(&s.pattern)
    .bind(&s.custom_days)
    .bind(s.start_date)
    .bind(s.end_date)
    .bind(&s.status)
    .execute(pool)
    .await
    .context("insert_subscription failed")?;
    Ok(())
}

/// Last write wins per (subscription, date).
pub async fn upsert_modification(pool: &PgPool, m: &Modification) -> Result<()> {
    let qty = i32::try_from(m.quantity).context("modification quantity out of range")?;
    sqlx::query(
        r#"
        insert into subscription_modifications (subscription_id, date, quantity)
        values ($1, $2, $3)
        on conflict (subscription_id, date) do update
          set quantity = excluded.quantity,
              updated_at = now()
        "#,
    )
    .bind(m.subscription_id)
    .bind(m.date)
    .bind(qty)
    .execute(pool)
    .await
    .context("upsert_modification failed")?;
    Ok(())
}

pub async fn insert_vacation(pool: &PgPool, v: &Vacation) -> Result<()> {
    sqlx::query(
        r#"
        insert into vacations (id, customer_id, start_date, end_date)
        values ($1, $2, $3, $4)
        "#,
    )
    .bind(v.id)
    .bind(v.customer_id)
    .bind(v.start_date)
    .bind(v.end_date)
    .execute(pool)
    .await
    .context("insert_vacation failed")?;
    Ok(())
}

/// Credit a wallet (creating it if needed) and return the new balance.
pub async fn credit_wallet(
    pool: &PgPool,
    customer_id: Uuid,
    amount: Money,
    description: &str,
) -> Result<Money> {
    let mut tx = pool.begin().await.context("credit_wallet begin failed")?;

    let (balance,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        insert into wallets (customer_id, balance_minor, version)
        values ($1, $2, 1)
        on conflict (customer_id) do update
          set balance_minor = wallets.balance_minor + excluded.balance_minor,
              version = wallets.version + 1,
              updated_at = now()
        returning balance_minor
        "#,
    )
    .bind(customer_id)
    .bind(amount.raw())
    .fetch_one(&mut *tx)
    .await
    .context("credit_wallet update failed")?;

    sqlx::query(
        r#"
        insert into wallet_transactions (
          id, customer_id, amount_minor, kind, description, balance_after_minor
        ) values (
          $1, $2, $3, 'credit', $4, $5
        )
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(customer_id)
    .bind(amount.raw())
    .bind(description)
    .bind(balance)
    .execute(&mut *tx)
    .await
    .context("credit_wallet transaction insert failed")?;

    tx.commit().await.context("credit_wallet commit failed")?;
    Ok(Money::new(balance))
}
