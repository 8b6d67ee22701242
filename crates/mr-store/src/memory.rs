//! In-memory [`DeliveryStore`].
//!
//! One mutex guards all state, so every `materialize` is a single critical
//! section: the slot check, the wallet re-check, the debit and the order
//! insert cannot interleave with another call. Per-customer faults can be
//! injected to exercise the failure paths of a generation run.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mr_schemas::{
    GenerationRunRecord, Modification, Money, NewOrder, Order, OrderStatus, Product,
    SubscriptionRecord, TransactionKind, Vacation, WalletTransaction,
};
use uuid::Uuid;

use crate::{DeliveryStore, Materialized, StoreError};

/// Injected misbehaviour for one customer's `materialize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every materialize for the customer fails with a backend error.
    Unavailable,
    /// Once, just before the wallet re-check, another debit of this amount
    /// lands on the wallet.
    ConcurrentSpend(Money),
}

#[derive(Debug, Default, Clone, Copy)]
struct Wallet {
    balance: Money,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    offline: bool,
    subscriptions: BTreeMap<Uuid, SubscriptionRecord>,
    modifications: HashMap<(Uuid, NaiveDate), u32>,
    vacations: Vec<Vacation>,
    products: HashMap<Uuid, Product>,
    wallets: HashMap<Uuid, Wallet>,
    transactions: Vec<WalletTransaction>,
    orders: Vec<Order>,
    runs: Vec<GenerationRunRecord>,
    faults: HashMap<Uuid, Fault>,
}

impl Inner {
    fn live_order(&self, customer_id: Uuid, date: NaiveDate) -> Option<&Order> {
        self.orders.iter().find(|o| {
            o.customer_id == customer_id
                && o.delivery_date == date
                && o.status.occupies_delivery_slot()
        })
    }

    fn post(
        &mut self,
        customer_id: Uuid,
        kind: TransactionKind,
        amount: Money,
        description: String,
    ) -> Result<Money, StoreError> {
        let wallet = self.wallets.entry(customer_id).or_default();
        let after = match kind {
            TransactionKind::Credit => wallet.balance.checked_add(amount),
            TransactionKind::Debit => wallet.balance.checked_sub(amount),
        }
        .ok_or_else(|| StoreError::backend("wallet balance overflow"))?;
        wallet.balance = after;
        wallet.version += 1;
        self.transactions.push(WalletTransaction {
            id: Uuid::new_v4(),
            customer_id,
            amount,
            kind,
            description,
            balance_after: after,
            created_at: Utc::now(),
        });
        Ok(after)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::backend("memory store lock poisoned"))?;
        if guard.offline {
            return Err(StoreError::backend("memory store offline"));
        }
        Ok(guard)
    }

    // Seeding and inspection helpers bypass the offline switch.
    fn raw(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Insert or replace a subscription by id.
    pub fn insert_subscription(&self, rec: SubscriptionRecord) {
        self.raw().subscriptions.insert(rec.id, rec);
    }

    /// Last write wins per (subscription, date).
    pub fn upsert_modification(&self, m: Modification) {
        self.raw()
            .modifications
            .insert((m.subscription_id, m.date), m.quantity);
    }

    pub fn add_vacation(&self, v: Vacation) {
        self.raw().vacations.push(v);
    }

    pub fn put_product(&self, p: Product) {
        self.raw().products.insert(p.id, p);
    }

    /// Credit the wallet and return the new balance.
    pub fn credit_wallet(&self, customer_id: Uuid, amount: Money) -> Result<Money, StoreError> {
        self.raw().post(
            customer_id,
            TransactionKind::Credit,
            amount,
            "Wallet recharge".to_string(),
        )
    }

    /// Insert an order as-is (e.g. one created by an earlier system).
    pub fn insert_order(&self, order: Order) {
        self.raw().orders.push(order);
    }

    pub fn set_order_status(&self, order_id: Uuid, status: OrderStatus) {
        if let Some(o) = self.raw().orders.iter_mut().find(|o| o.id == order_id) {
            o.status = status;
        }
    }

    pub fn inject_fault(&self, customer_id: Uuid, fault: Fault) {
        self.raw().faults.insert(customer_id, fault);
    }

    /// While offline every trait call fails with a backend error.
    pub fn set_offline(&self, offline: bool) {
        self.raw().offline = offline;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn orders(&self) -> Vec<Order> {
        self.raw().orders.clone()
    }

    pub fn orders_for(&self, customer_id: Uuid) -> Vec<Order> {
        self.raw()
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect()
    }

    pub fn transactions_for(&self, customer_id: Uuid) -> Vec<WalletTransaction> {
        self.raw()
            .transactions
            .iter()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect()
    }

    pub fn balance(&self, customer_id: Uuid) -> Money {
        self.raw()
            .wallets
            .get(&customer_id)
            .map_or(Money::ZERO, |w| w.balance)
    }

    pub fn wallet_version(&self, customer_id: Uuid) -> u64 {
        self.raw()
            .wallets
            .get(&customer_id)
            .map_or(0, |w| w.version)
    }

    pub fn runs(&self) -> Vec<GenerationRunRecord> {
        self.raw().runs.clone()
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn active_subscriptions(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let g = self.lock()?;
        Ok(g.subscriptions
            .values()
            .filter(|s| s.status == "active")
            .cloned()
            .collect())
    }

    async fn customer_subscriptions(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let g = self.lock()?;
        Ok(g.subscriptions
            .values()
            .filter(|s| s.customer_id == customer_id && s.status == "active")
            .cloned()
            .collect())
    }

    async fn modifications_on(
        &self,
        subscription_ids: &[Uuid],
        date: NaiveDate,
    ) -> Result<Vec<Modification>, StoreError> {
        let g = self.lock()?;
        Ok(subscription_ids
            .iter()
            .filter_map(|id| {
                g.modifications.get(&(*id, date)).map(|qty| Modification {
                    subscription_id: *id,
                    date,
                    quantity: *qty,
                })
            })
            .collect())
    }

    async fn vacations_covering(
        &self,
        customer_ids: &[Uuid],
        date: NaiveDate,
    ) -> Result<Vec<Vacation>, StoreError> {
        let g = self.lock()?;
        Ok(g.vacations
            .iter()
            .filter(|v| customer_ids.contains(&v.customer_id) && v.contains(date))
            .cloned()
            .collect())
    }

    async fn products(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        let g = self.lock()?;
        Ok(ids.iter().filter_map(|id| g.products.get(id).cloned()).collect())
    }

    async fn wallet_balance(&self, customer_id: Uuid) -> Result<Money, StoreError> {
        let g = self.lock()?;
        Ok(g.wallets
            .get(&customer_id)
            .map_or(Money::ZERO, |w| w.balance))
    }

    async fn existing_order(
        &self,
        customer_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Order>, StoreError> {
        let g = self.lock()?;
        Ok(g.live_order(customer_id, date).cloned())
    }

    async fn materialize(&self, new: &NewOrder) -> Result<Materialized, StoreError> {
        let mut g = self.lock()?;

        if let Some(Fault::Unavailable) = g.faults.get(&new.customer_id) {
            return Err(StoreError::backend(format!(
                "injected failure for customer {}",
                new.customer_id
            )));
        }

        if let Some(existing) = g.live_order(new.customer_id, new.delivery_date) {
            return Ok(Materialized::AlreadyExists(existing.clone()));
        }

        let spend = match g.faults.get(&new.customer_id) {
            Some(Fault::ConcurrentSpend(amount)) => Some(*amount),
            _ => None,
        };
        if let Some(amount) = spend {
            g.faults.remove(&new.customer_id);
            g.post(
                new.customer_id,
                TransactionKind::Debit,
                amount,
                "Concurrent spend".to_string(),
            )?;
        }

        let available = g
            .wallets
            .get(&new.customer_id)
            .map_or(Money::ZERO, |w| w.balance);
        if available.saturating_add(new.tolerance) < new.total_amount {
            tracing::warn!(
                customer_id = %new.customer_id,
                %available,
                required = %new.total_amount,
                "balance re-check failed under lock"
            );
            return Err(StoreError::BalanceRace {
                available,
                required: new.total_amount,
            });
        }

        g.post(
            new.customer_id,
            TransactionKind::Debit,
            new.total_amount,
            new.debit_description(),
        )?;

        let order = Order {
            id: Uuid::new_v4(),
            customer_id: new.customer_id,
            delivery_date: new.delivery_date,
            items: new.items.clone(),
            total_amount: new.total_amount,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        g.orders.push(order.clone());
        Ok(Materialized::Created(order))
    }

    async fn record_run(&self, run: &GenerationRunRecord) -> Result<(), StoreError> {
        self.lock()?.runs.push(run.clone());
        Ok(())
    }

    async fn latest_run(&self) -> Result<Option<GenerationRunRecord>, StoreError> {
        let g = self.lock()?;
        Ok(g.runs.iter().max_by_key(|r| r.completed_at).cloned())
    }
}
