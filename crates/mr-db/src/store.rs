//! [`DeliveryStore`] over Postgres.
//!
//! `materialize` runs in one transaction:
//! 1. ensure the wallet row exists, then `select ... for update` it;
//! 2. with the lock held, look for a live order in the slot;
//! 3. re-check the balance;
//! 4. insert order + items (guarded by `uq_orders_live_customer_date`),
//!    debit the wallet with a version bump, append the wallet transaction;
//! 5. commit.
//!
//! Any early exit rolls back, so a failure leaves no partial order or debit.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mr_schemas::{
    GenerationRunRecord, Modification, Money, NewOrder, Order, OrderItem, OrderStatus, Product,
    SubscriptionRecord, Vacation,
};
use mr_store::{DeliveryStore, Materialized, StoreError};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn backend(e: anyhow::Error) -> StoreError {
    StoreError::Backend(format!("{e:#}"))
}

fn count(n: u64) -> Result<i64> {
    i64::try_from(n).context("run counter out of range")
}

fn uncount(n: i64) -> Result<u64> {
    u64::try_from(n).context("negative run counter")
}

// ---------------------------------------------------------------------------
// Row loaders
// ---------------------------------------------------------------------------

const SUBSCRIPTION_COLUMNS: &str = "id, customer_id, product_id, quantity, pattern, custom_days, \
     start_date, end_date, status";

fn subscription_from_row(row: &sqlx::postgres::PgRow) -> Result<SubscriptionRecord> {
    Ok(SubscriptionRecord {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        product_id: row.try_get("product_id")?,
        quantity: row.try_get("quantity")?,
        pattern: row.try_get("pattern")?,
        custom_days: row.try_get("custom_days")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status: row.try_get("status")?,
    })
}

async fn load_live_order(
    conn: &mut PgConnection,
    customer_id: Uuid,
    date: NaiveDate,
) -> Result<Option<Order>> {
    let row = sqlx::query(
        r#"
        select id, total_amount_minor, status, created_at
        from orders
        where customer_id = $1
          and delivery_date = $2
          and status <> 'cancelled'
        "#,
    )
    .bind(customer_id)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await
    .context("load_live_order failed")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let order_id: Uuid = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let total: i64 = row.try_get("total_amount_minor")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    let item_rows = sqlx::query(
        r#"
        select subscription_id, product_id, product_name, quantity,
               unit_price_minor, line_total_minor
        from order_items
        where order_id = $1
        order by line_no asc
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .context("load order items failed")?;

    let mut items = Vec::with_capacity(item_rows.len());
    for r in &item_rows {
        let qty: i32 = r.try_get("quantity")?;
        items.push(OrderItem {
            subscription_id: r.try_get("subscription_id")?,
            product_id: r.try_get("product_id")?,
            product_name: r.try_get("product_name")?,
            quantity: u32::try_from(qty).context("negative order item quantity")?,
            unit_price: Money::new(r.try_get("unit_price_minor")?),
            line_total: Money::new(r.try_get("line_total_minor")?),
        });
    }

    Ok(Some(Order {
        id: order_id,
        customer_id,
        delivery_date: date,
        items,
        total_amount: Money::new(total),
        status: OrderStatus::parse(&status)?,
        created_at,
    }))
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

enum Locked {
    Created(Order),
    Existing(Order),
    Race { available: Money, required: Money },
}

impl PgStore {
    async fn materialize_tx(&self, new: &NewOrder) -> Result<Locked> {
        let mut tx = self.pool.begin().await.context("materialize begin failed")?;

        sqlx::query("insert into wallets (customer_id) values ($1) on conflict do nothing")
            .bind(new.customer_id)
            .execute(&mut *tx)
            .await
            .context("ensure wallet row failed")?;

        let (balance, version): (i64, i64) = sqlx::query_as::<_, (i64, i64)>(
            "select balance_minor, version from wallets where customer_id = $1 for update",
        )
        .bind(new.customer_id)
        .fetch_one(&mut *tx)
        .await
        .context("lock wallet failed")?;
        let available = Money::new(balance);

        if let Some(existing) = load_live_order(&mut tx, new.customer_id, new.delivery_date).await? {
            tx.rollback().await.context("rollback failed")?;
            return Ok(Locked::Existing(existing));
        }

        if available.saturating_add(new.tolerance) < new.total_amount {
            tx.rollback().await.context("rollback failed")?;
            return Ok(Locked::Race {
                available,
                required: new.total_amount,
            });
        }

        let order_id = Uuid::new_v4();
        let inserted = sqlx::query(
            r#"
            insert into orders (id, customer_id, delivery_date, total_amount_minor, status)
            values ($1, $2, $3, $4, 'pending')
            on conflict (customer_id, delivery_date) where status <> 'cancelled' do nothing
            returning created_at
            "#,
        )
        .bind(order_id)
        .bind(new.customer_id)
        .bind(new.delivery_date)
        .bind(new.total_amount.raw())
        .fetch_optional(&mut *tx)
        .await
        .context("insert order failed")?;

        let Some(inserted) = inserted else {
            // Lost the slot to a writer that did not take the wallet lock.
            tx.rollback().await.context("rollback failed")?;
            let mut conn = self.pool.acquire().await.context("acquire failed")?;
            let existing = load_live_order(&mut conn, new.customer_id, new.delivery_date)
                .await?
                .ok_or_else(|| anyhow!("order slot conflict but no live order found"))?;
            return Ok(Locked::Existing(existing));
        };
        let created_at: DateTime<Utc> = inserted.try_get("created_at")?;

        for (line_no, item) in new.items.iter().enumerate() {
            let line_no = i32::try_from(line_no).context("too many order lines")?;
            let qty = i32::try_from(item.quantity).context("order item quantity out of range")?;
            sqlx::query(
                r#"
                insert into order_items (
                  order_id, line_no, subscription_id, product_id, product_name,
                  quantity, unit_price_minor, line_total_minor
                ) values (
                  $1, $2, $3, $4, $5, $6, $7, $8
                )
                "#,
            )
            .bind(order_id)
            .bind(line_no)
            .bind(item.subscription_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(qty)
            .bind(item.unit_price.raw())
            .bind(item.line_total.raw())
            .execute(&mut *tx)
            .await
            .context("insert order item failed")?;
        }

        let after = available
            .checked_sub(new.total_amount)
            .ok_or_else(|| anyhow!("wallet balance overflow"))?;

        let updated = sqlx::query(
            r#"
            update wallets
            set balance_minor = $2,
                version = version + 1,
                updated_at = now()
            where customer_id = $1 and version = $3
            "#,
        )
        .bind(new.customer_id)
        .bind(after.raw())
        .bind(version)
        .execute(&mut *tx)
        .await
        .context("debit wallet failed")?;
        if updated.rows_affected() != 1 {
            return Err(anyhow!("wallet version moved while locked"));
        }

        sqlx::query(
            r#"
            insert into wallet_transactions (
              id, customer_id, amount_minor, kind, description, balance_after_minor
            ) values (
              $1, $2, $3, 'debit', $4, $5
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.customer_id)
        .bind(new.total_amount.raw())
        .bind(new.debit_description())
        .bind(after.raw())
        .execute(&mut *tx)
        .await
        .context("insert wallet transaction failed")?;

        tx.commit().await.context("materialize commit failed")?;

        Ok(Locked::Created(Order {
            id: order_id,
            customer_id: new.customer_id,
            delivery_date: new.delivery_date,
            items: new.items.clone(),
            total_amount: new.total_amount,
            status: OrderStatus::Pending,
            created_at,
        }))
    }
}

// ---------------------------------------------------------------------------
// DeliveryStore
// ---------------------------------------------------------------------------

#[async_trait]
impl DeliveryStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn active_subscriptions(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let sql = format!(
            "select {SUBSCRIPTION_COLUMNS} from subscriptions where status = 'active' \
             order by customer_id, start_date, id"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("active_subscriptions failed")
            .map_err(backend)?;
        rows.iter()
            .map(subscription_from_row)
            .collect::<Result<Vec<_>>>()
            .map_err(backend)
    }

    async fn customer_subscriptions(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let sql = format!(
            "select {SUBSCRIPTION_COLUMNS} from subscriptions \
             where customer_id = $1 and status = 'active' order by start_date, id"
        );
        let rows = sqlx::query(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .context("customer_subscriptions failed")
            .map_err(backend)?;
        rows.iter()
            .map(subscription_from_row)
            .collect::<Result<Vec<_>>>()
            .map_err(backend)
    }

    async fn modifications_on(
        &self,
        subscription_ids: &[Uuid],
        date: NaiveDate,
    ) -> Result<Vec<Modification>, StoreError> {
        let rows: Vec<(Uuid, NaiveDate, i32)> = sqlx::query_as(
            r#"
            select subscription_id, date, quantity
            from subscription_modifications
            where subscription_id = any($1) and date = $2
            "#,
        )
        .bind(subscription_ids)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("modifications_on failed")
        .map_err(backend)?;

        rows.into_iter()
            .map(|(subscription_id, date, qty)| {
                Ok(Modification {
                    subscription_id,
                    date,
                    quantity: u32::try_from(qty).context("negative modification quantity")?,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map_err(backend)
    }

    async fn vacations_covering(
        &self,
        customer_ids: &[Uuid],
        date: NaiveDate,
    ) -> Result<Vec<Vacation>, StoreError> {
        let rows: Vec<(Uuid, Uuid, NaiveDate, NaiveDate)> = sqlx::query_as(
            r#"
            select id, customer_id, start_date, end_date
            from vacations
            where customer_id = any($1)
              and start_date <= $2
              and end_date >= $2
            "#,
        )
        .bind(customer_ids)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("vacations_covering failed")
        .map_err(backend)?;

        rows.into_iter()
            .map(|(id, customer_id, start, end)| {
                Vacation::new(id, customer_id, start, end).map_err(anyhow::Error::new)
            })
            .collect::<Result<Vec<_>>>()
            .map_err(backend)
    }

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<(Uuid, String, i64, bool)> = sqlx::query_as(
            r#"
            select id, name, unit_price_minor, is_available
            from products
            where id = any($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("products failed")
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, price, is_available)| Product {
                id,
                name,
                unit_price: Money::new(price),
                is_available,
            })
            .collect())
    }

    async fn wallet_balance(&self, customer_id: Uuid) -> Result<Money, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("select balance_minor from wallets where customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await
                .context("wallet_balance failed")
                .map_err(backend)?;
        Ok(row.map_or(Money::ZERO, |(b,)| Money::new(b)))
    }

    async fn existing_order(
        &self,
        customer_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("acquire failed")
            .map_err(backend)?;
        load_live_order(&mut conn, customer_id, date)
            .await
            .map_err(backend)
    }

    async fn materialize(&self, order: &NewOrder) -> Result<Materialized, StoreError> {
        match self.materialize_tx(order).await.map_err(backend)? {
            Locked::Created(o) => Ok(Materialized::Created(o)),
            Locked::Existing(o) => Ok(Materialized::AlreadyExists(o)),
            Locked::Race {
                available,
                required,
            } => {
                tracing::warn!(
                    customer_id = %order.customer_id,
                    %available,
                    %required,
                    "balance re-check failed under wallet lock"
                );
                Err(StoreError::BalanceRace {
                    available,
                    required,
                })
            }
        }
    }

    async fn record_run(&self, run: &GenerationRunRecord) -> Result<(), StoreError> {
        let res: Result<()> = async {
            sqlx::query(
                r#"
                insert into generation_runs (
                  run_id, target_date, started_at, completed_at, orders_created,
                  orders_skipped, no_items, already_materialized, failed
                ) values (
                  $1, $2, $3, $4, $5, $6, $7, $8, $9
                )
                "#,
            )
            .bind(run.run_id)
            .bind(run.target_date)
            .bind(run.started_at)
            .bind(run.completed_at)
            .bind(count(run.orders_created)?)
            .bind(count(run.orders_skipped)?)
            .bind(count(run.no_items)?)
            .bind(count(run.already_materialized)?)
            .bind(count(run.failed)?)
            .execute(&self.pool)
            .await
            .context("record_run failed")?;
            Ok(())
        }
        .await;
        res.map_err(backend)
    }

    async fn latest_run(&self) -> Result<Option<GenerationRunRecord>, StoreError> {
        let res: Result<Option<GenerationRunRecord>> = async {
            let row = sqlx::query(
                r#"
                select run_id, target_date, started_at, completed_at, orders_created,
                       orders_skipped, no_items, already_materialized, failed
                from generation_runs
                order by completed_at desc
                limit 1
                "#,
            )
            .fetch_optional(&self.pool)
            .await
            .context("latest_run failed")?;

            let Some(r) = row else {
                return Ok(None);
            };
            Ok(Some(GenerationRunRecord {
                run_id: r.try_get("run_id")?,
                target_date: r.try_get("target_date")?,
                started_at: r.try_get("started_at")?,
                completed_at: r.try_get("completed_at")?,
                orders_created: uncount(r.try_get("orders_created")?)?,
                orders_skipped: uncount(r.try_get("orders_skipped")?)?,
                no_items: uncount(r.try_get("no_items")?)?,
                already_materialized: uncount(r.try_get("already_materialized")?)?,
                failed: uncount(r.try_get("failed")?)?,
            }))
        }
        .await;
        res.map_err(backend)
    }
}
