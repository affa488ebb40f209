// =============================================================================
// GATEWAY MODULE
// =============================================================================
// The persistence contract the core depends on. Every gateway instance is
// bound to one owner: it never returns or touches another owner's rows.
//
// Implementations:
// - db::OwnerStore     PostgreSQL, used by the HTTP handlers
// - memory::MemoryGateway  in-memory fake for tests
// =============================================================================

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Decoration, NewOrder, Order, StockItem};

#[async_trait]
pub trait OrderGateway: Send + Sync {
    // -------------------------------------------------------------------------
    // ORDERS
    // -------------------------------------------------------------------------

    /// Assigns id and timestamps
    async fn create_order(&self, order: NewOrder) -> AppResult<Order>;

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// Inclusive on both ends, sorted by shipping date ascending
    async fn list_orders_by_range(&self, start: NaiveDate, end: NaiveDate)
        -> AppResult<Vec<Order>>;

    /// Fails with `AppError::NotFound` if the order is gone
    async fn update_order(&self, id: Uuid, order: NewOrder) -> AppResult<Order>;

    /// Returns false when nothing was deleted
    async fn delete_order(&self, id: Uuid) -> AppResult<bool>;

    // -------------------------------------------------------------------------
    // STOCK
    // -------------------------------------------------------------------------

    /// Sorted by character
    async fn list_stock_items(&self) -> AppResult<Vec<StockItem>>;

    /// Fails with `AppError::Conflict` if the character already exists
    async fn create_stock_item(&self, character: &str, quantity: i32) -> AppResult<StockItem>;

    async fn update_stock_item_quantity(&self, id: Uuid, quantity: i32) -> AppResult<StockItem>;

    async fn delete_stock_item(&self, id: Uuid) -> AppResult<bool>;

    /// Restores `old` then deducts `new` as one atomic write
    /// (see `stock::reconcile`).
    async fn reconcile_stock(&self, old: &[Decoration], new: &[Decoration]) -> AppResult<()>;
}
