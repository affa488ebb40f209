//! In-memory [`OrderGateway`] used by the workflow and calendar tests.
//!
//! Several gateways can share one store with different owners, which is how
//! the owner scoping is exercised. `fail_order_writes` makes the next order
//! create/update/delete fail after any stock reconciliation already ran.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::gateway::OrderGateway;
use crate::models::{Decoration, NewOrder, Order, StockItem};
use crate::stock;

#[derive(Default)]
struct Tables {
    orders: Vec<(Uuid, Order)>,
    stock: Vec<(Uuid, StockItem)>,
}

#[derive(Clone)]
pub struct MemoryGateway {
    owner: Uuid,
    tables: Arc<Mutex<Tables>>,
    fail_order_writes: Arc<AtomicBool>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            owner: Uuid::new_v4(),
            tables: Arc::new(Mutex::new(Tables::default())),
            fail_order_writes: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same store, different owner
    pub fn for_owner(&self, owner: Uuid) -> Self {
        Self {
            owner,
            tables: Arc::clone(&self.tables),
            fail_order_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_order_writes(&self, fail: bool) {
        self.fail_order_writes.store(fail, Ordering::SeqCst);
    }

    fn check_order_write(&self) -> AppResult<()> {
        if self.fail_order_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected order write failure".into()));
        }
        Ok(())
    }

    /// Current quantity of `character` for this owner, if it exists
    pub async fn quantity_of(&self, character: &str) -> Option<i32> {
        let tables = self.tables.lock().await;
        tables
            .stock
            .iter()
            .find(|(owner, item)| *owner == self.owner && item.character == character)
            .map(|(_, item)| item.quantity)
    }
}

fn materialize(id: Uuid, new: NewOrder, created_at: chrono::DateTime<Utc>) -> Order {
    Order {
        id,
        shipping_date: new.shipping_date,
        customer_name: new.customer_name,
        platform: new.platform,
        flower_count: new.flower_count,
        flower_color: new.flower_color,
        price: new.price,
        shipping_cost: new.shipping_cost,
        deposit_amount: new.deposit_amount,
        remaining_balance: new.remaining_balance,
        use_date: new.use_date,
        is_asap: new.is_asap,
        status: new.status,
        shipping_address: new.shipping_address,
        notes: new.notes,
        alphabet_decorations: new.alphabet_decorations,
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl OrderGateway for MemoryGateway {
    async fn create_order(&self, order: NewOrder) -> AppResult<Order> {
        self.check_order_write()?;
        let order = materialize(Uuid::new_v4(), order, Utc::now());
        self.tables
            .lock()
            .await
            .orders
            .push((self.owner, order.clone()));
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .find(|(owner, order)| *owner == self.owner && order.id == id)
            .map(|(_, order)| order.clone()))
    }

    async fn list_orders_by_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|(owner, order)| {
                *owner == self.owner && start <= order.shipping_date && order.shipping_date <= end
            })
            .map(|(_, order)| order.clone())
            .collect();
        orders.sort_by(|a, b| {
            a.shipping_date
                .cmp(&b.shipping_date)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(orders)
    }

    async fn update_order(&self, id: Uuid, order: NewOrder) -> AppResult<Order> {
        self.check_order_write()?;
        let mut tables = self.tables.lock().await;
        let slot = tables
            .orders
            .iter_mut()
            .find(|(owner, existing)| *owner == self.owner && existing.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))?;

        let updated = materialize(id, order, slot.1.created_at);
        slot.1 = updated.clone();
        Ok(updated)
    }

    async fn delete_order(&self, id: Uuid) -> AppResult<bool> {
        self.check_order_write()?;
        let mut tables = self.tables.lock().await;
        let before = tables.orders.len();
        tables
            .orders
            .retain(|(owner, order)| !(*owner == self.owner && order.id == id));
        Ok(tables.orders.len() < before)
    }

    async fn list_stock_items(&self) -> AppResult<Vec<StockItem>> {
        let tables = self.tables.lock().await;
        let mut items: Vec<StockItem> = tables
            .stock
            .iter()
            .filter(|(owner, _)| *owner == self.owner)
            .map(|(_, item)| item.clone())
            .collect();
        items.sort_by(|a, b| a.character.cmp(&b.character));
        Ok(items)
    }

    async fn create_stock_item(&self, character: &str, quantity: i32) -> AppResult<StockItem> {
        let mut tables = self.tables.lock().await;
        if tables
            .stock
            .iter()
            .any(|(owner, item)| *owner == self.owner && item.character == character)
        {
            return Err(AppError::Conflict(format!(
                "\"{}\" already exists in your stock",
                character
            )));
        }

        let now = Utc::now();
        let item = StockItem {
            id: Uuid::new_v4(),
            character: character.to_string(),
            quantity,
            created_at: now,
            updated_at: now,
        };
        tables.stock.push((self.owner, item.clone()));
        Ok(item)
    }

    async fn update_stock_item_quantity(&self, id: Uuid, quantity: i32) -> AppResult<StockItem> {
        let mut tables = self.tables.lock().await;
        let (_, item) = tables
            .stock
            .iter_mut()
            .find(|(owner, item)| *owner == self.owner && item.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Stock item {} not found", id)))?;

        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_stock_item(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.stock.len();
        tables
            .stock
            .retain(|(owner, item)| !(*owner == self.owner && item.id == id));
        Ok(tables.stock.len() < before)
    }

    async fn reconcile_stock(&self, old: &[Decoration], new: &[Decoration]) -> AppResult<()> {
        // One lock for both steps: nothing observes the restored-only state
        let mut tables = self.tables.lock().await;
        let mut items: Vec<StockItem> = tables
            .stock
            .iter()
            .filter(|(owner, _)| *owner == self.owner)
            .map(|(_, item)| item.clone())
            .collect();

        stock::reconcile(&mut items, old, new);

        for (owner, item) in tables.stock.iter_mut() {
            if *owner != self.owner {
                continue;
            }
            if let Some(updated) = items.iter().find(|candidate| candidate.id == item.id) {
                if updated.quantity != item.quantity {
                    item.quantity = updated.quantity;
                    item.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }
}
