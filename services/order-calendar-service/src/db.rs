// =============================================================================
// DATABASE MODULE
// =============================================================================
// PostgreSQL implementation of the order gateway.
//
// NOTES:
// - `Database` owns the pool; `Database::scoped(owner)` hands out an
//   `OwnerStore` whose every query filters on owner_id
// - Rows are read into OrderRow / StockRow (snake_case columns) and mapped
//   to the API models here, nowhere else
// - Stock reconciliation locks the owner's stock rows and runs in one
//   transaction
// =============================================================================

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    postgres::{PgArguments, PgPoolOptions},
    query::QueryAs,
    types::Json,
    FromRow, PgPool, Postgres,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::gateway::OrderGateway;
use crate::metrics;
use crate::models::{Decoration, NewOrder, Order, OrderStatus, StockItem};
use crate::stock;

// -----------------------------------------------------------------------------
// DATABASE WRAPPER
// -----------------------------------------------------------------------------
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    // -------------------------------------------------------------------------
    // CONNECTION
    // -------------------------------------------------------------------------
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    /// * `max_connections` - Upper bound for the pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(300))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    // -------------------------------------------------------------------------
    // MIGRATIONS
    // -------------------------------------------------------------------------
    /// Creates the orders and stock_items tables if they don't exist.
    /// Safe to run on every start.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),

                -- Every row belongs to one signed-in owner
                owner_id UUID NOT NULL,

                -- Calendar placement and range queries
                shipping_date DATE NOT NULL,

                customer_name TEXT NOT NULL,
                platform TEXT,
                flower_count INTEGER NOT NULL DEFAULT 0,
                flower_color TEXT NOT NULL DEFAULT '',

                -- Money in the shop's currency
                price DOUBLE PRECISION NOT NULL DEFAULT 0,
                shipping_cost DOUBLE PRECISION NOT NULL DEFAULT 0,
                deposit_amount DOUBLE PRECISION NOT NULL DEFAULT 0,
                remaining_balance DOUBLE PRECISION NOT NULL DEFAULT 0,

                use_date DATE,
                is_asap BOOLEAN NOT NULL DEFAULT FALSE,
                status TEXT NOT NULL DEFAULT 'deposit',
                shipping_address TEXT,
                notes TEXT,

                -- [{"character": "A", "quantity": 2, "stock_item_id": "..."}]
                alphabet_decorations JSONB NOT NULL DEFAULT '[]'::jsonb,

                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT valid_status
                    CHECK (status IN ('deposit', 'ready_to_ship', 'shipped')),
                CONSTRAINT non_negative_amounts
                    CHECK (price >= 0 AND shipping_cost >= 0
                           AND deposit_amount >= 0 AND flower_count >= 0)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create orders table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_orders_owner_shipping_date
                ON orders(owner_id, shipping_date)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create shipping date index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_items (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                owner_id UUID NOT NULL,

                -- The decoration glyph ("A", "7", "♥")
                symbol TEXT NOT NULL,

                quantity INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT non_negative_quantity CHECK (quantity >= 0),
                CONSTRAINT unique_owner_symbol UNIQUE (owner_id, symbol)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create stock_items table")?;

        Ok(())
    }

    /// Gateway restricted to one owner's rows
    pub fn scoped(&self, owner: Uuid) -> OwnerStore {
        OwnerStore {
            pool: self.pool.clone(),
            owner,
        }
    }

    // -------------------------------------------------------------------------
    // HEALTH CHECK
    // -------------------------------------------------------------------------
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

// =============================================================================
// ROW MAPPING (storage names <-> model names)
// =============================================================================

/// Columns read back for an order, in OrderRow field order
const ORDER_COLUMNS: &str = "id, shipping_date, customer_name, platform, flower_count, \
     flower_color, price, shipping_cost, deposit_amount, remaining_balance, use_date, \
     is_asap, status, shipping_address, notes, alphabet_decorations, created_at, updated_at";

/// Columns written for an order, bound in this order by `bind_order`
const ORDER_WRITE_COLUMNS: [&str; 15] = [
    "shipping_date",
    "customer_name",
    "platform",
    "flower_count",
    "flower_color",
    "price",
    "shipping_cost",
    "deposit_amount",
    "remaining_balance",
    "use_date",
    "is_asap",
    "status",
    "shipping_address",
    "notes",
    "alphabet_decorations",
];

const STOCK_COLUMNS: &str = "id, symbol, quantity, created_at, updated_at";

/// A decoration as stored in the alphabet_decorations JSONB column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredDecoration {
    character: String,
    quantity: i32,
    #[serde(default)]
    stock_item_id: Option<Uuid>,
}

impl From<&Decoration> for StoredDecoration {
    fn from(decoration: &Decoration) -> Self {
        Self {
            character: decoration.character.clone(),
            quantity: decoration.quantity,
            stock_item_id: decoration.stock_item_id,
        }
    }
}

impl From<StoredDecoration> for Decoration {
    fn from(stored: StoredDecoration) -> Self {
        Decoration {
            character: stored.character,
            quantity: stored.quantity,
            stock_item_id: stored.stock_item_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    shipping_date: NaiveDate,
    customer_name: String,
    platform: Option<String>,
    flower_count: i32,
    flower_color: String,
    price: f64,
    shipping_cost: f64,
    deposit_amount: f64,
    remaining_balance: f64,
    use_date: Option<NaiveDate>,
    is_asap: bool,
    status: String,
    shipping_address: Option<String>,
    notes: Option<String>,
    alphabet_decorations: Json<Vec<StoredDecoration>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> AppResult<Self> {
        let status = OrderStatus::parse(&row.status).ok_or_else(|| {
            AppError::Internal(format!("Order {} has unknown status {:?}", row.id, row.status))
        })?;

        Ok(Order {
            id: row.id,
            shipping_date: row.shipping_date,
            customer_name: row.customer_name,
            platform: row.platform,
            flower_count: row.flower_count,
            flower_color: row.flower_color,
            price: row.price,
            shipping_cost: row.shipping_cost,
            deposit_amount: row.deposit_amount,
            remaining_balance: row.remaining_balance,
            use_date: row.use_date,
            is_asap: row.is_asap,
            status,
            shipping_address: row.shipping_address,
            notes: row.notes,
            alphabet_decorations: row
                .alphabet_decorations
                .0
                .into_iter()
                .map(Decoration::from)
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct StockRow {
    id: Uuid,
    symbol: String,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for StockItem {
    fn from(row: StockRow) -> Self {
        StockItem {
            id: row.id,
            character: row.symbol,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Binds the 15 writable order fields in `ORDER_WRITE_COLUMNS` order
fn bind_order<'q>(
    query: QueryAs<'q, Postgres, OrderRow, PgArguments>,
    order: &'q NewOrder,
) -> QueryAs<'q, Postgres, OrderRow, PgArguments> {
    query
        .bind(order.shipping_date)
        .bind(&order.customer_name)
        .bind(&order.platform)
        .bind(order.flower_count)
        .bind(&order.flower_color)
        .bind(order.price)
        .bind(order.shipping_cost)
        .bind(order.deposit_amount)
        .bind(order.remaining_balance)
        .bind(order.use_date)
        .bind(order.is_asap)
        .bind(order.status.as_str())
        .bind(&order.shipping_address)
        .bind(&order.notes)
        .bind(Json(
            order
                .alphabet_decorations
                .iter()
                .map(StoredDecoration::from)
                .collect::<Vec<_>>(),
        ))
}

fn insert_order_sql() -> String {
    let placeholders: Vec<String> = (2..=ORDER_WRITE_COLUMNS.len() + 1)
        .map(|n| format!("${}", n))
        .collect();
    format!(
        "INSERT INTO orders (owner_id, {}) VALUES ($1, {}) RETURNING {}",
        ORDER_WRITE_COLUMNS.join(", "),
        placeholders.join(", "),
        ORDER_COLUMNS
    )
}

fn update_order_sql() -> String {
    let assignments: Vec<String> = ORDER_WRITE_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ${}", column, i + 3))
        .collect();
    format!(
        "UPDATE orders SET {}, updated_at = NOW() WHERE id = $1 AND owner_id = $2 RETURNING {}",
        assignments.join(", "),
        ORDER_COLUMNS
    )
}

// =============================================================================
// OWNER-SCOPED GATEWAY
// =============================================================================
#[derive(Clone)]
pub struct OwnerStore {
    pool: PgPool,
    owner: Uuid,
}

#[async_trait]
impl OrderGateway for OwnerStore {
    // -------------------------------------------------------------------------
    // ORDERS
    // -------------------------------------------------------------------------

    async fn create_order(&self, order: NewOrder) -> AppResult<Order> {
        let start = Instant::now();
        let sql = insert_order_sql();

        let row = bind_order(sqlx::query_as::<_, OrderRow>(&sql).bind(self.owner), &order)
            .fetch_one(&self.pool)
            .await?;

        metrics::record_db_query("insert", start.elapsed().as_secs_f64());
        row.try_into()
    }

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let start = Instant::now();
        let sql = format!(
            "SELECT {} FROM orders WHERE id = $1 AND owner_id = $2",
            ORDER_COLUMNS
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(self.owner)
            .fetch_optional(&self.pool)
            .await?;

        metrics::record_db_query("select", start.elapsed().as_secs_f64());
        row.map(Order::try_from).transpose()
    }

    async fn list_orders_by_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> AppResult<Vec<Order>> {
        let start = Instant::now();
        let sql = format!(
            "SELECT {} FROM orders \
             WHERE owner_id = $1 AND shipping_date BETWEEN $2 AND $3 \
             ORDER BY shipping_date ASC, created_at ASC",
            ORDER_COLUMNS
        );

        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(self.owner)
            .bind(start_date)
            .bind(end_date)
            .fetch_all(&self.pool)
            .await?;

        metrics::record_db_query("select", start.elapsed().as_secs_f64());
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn update_order(&self, id: Uuid, order: NewOrder) -> AppResult<Order> {
        let start = Instant::now();
        let sql = update_order_sql();

        let row = bind_order(
            sqlx::query_as::<_, OrderRow>(&sql).bind(id).bind(self.owner),
            &order,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

        metrics::record_db_query("update", start.elapsed().as_secs_f64());
        row.try_into()
    }

    async fn delete_order(&self, id: Uuid) -> AppResult<bool> {
        let start = Instant::now();

        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(self.owner)
            .execute(&self.pool)
            .await?;

        metrics::record_db_query("delete", start.elapsed().as_secs_f64());
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // STOCK
    // -------------------------------------------------------------------------

    async fn list_stock_items(&self) -> AppResult<Vec<StockItem>> {
        let start = Instant::now();
        let sql = format!(
            "SELECT {} FROM stock_items WHERE owner_id = $1 ORDER BY symbol ASC",
            STOCK_COLUMNS
        );

        let rows = sqlx::query_as::<_, StockRow>(&sql)
            .bind(self.owner)
            .fetch_all(&self.pool)
            .await?;

        metrics::record_db_query("select", start.elapsed().as_secs_f64());
        Ok(rows.into_iter().map(StockItem::from).collect())
    }

    async fn create_stock_item(&self, character: &str, quantity: i32) -> AppResult<StockItem> {
        let start = Instant::now();
        let sql = format!(
            "INSERT INTO stock_items (owner_id, symbol, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (owner_id, symbol) DO NOTHING \
             RETURNING {}",
            STOCK_COLUMNS
        );

        let row = sqlx::query_as::<_, StockRow>(&sql)
            .bind(self.owner)
            .bind(character)
            .bind(quantity)
            .fetch_optional(&self.pool)
            .await?;

        metrics::record_db_query("insert", start.elapsed().as_secs_f64());
        row.map(StockItem::from).ok_or_else(|| {
            AppError::Conflict(format!(
                "\"{}\" already exists in your stock. Use the +/- buttons to adjust quantity.",
                character
            ))
        })
    }

    async fn update_stock_item_quantity(&self, id: Uuid, quantity: i32) -> AppResult<StockItem> {
        let start = Instant::now();
        let sql = format!(
            "UPDATE stock_items SET quantity = $3, updated_at = NOW() \
             WHERE id = $1 AND owner_id = $2 RETURNING {}",
            STOCK_COLUMNS
        );

        let row = sqlx::query_as::<_, StockRow>(&sql)
            .bind(id)
            .bind(self.owner)
            .bind(quantity)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock item not found".into()))?;

        metrics::record_db_query("update", start.elapsed().as_secs_f64());
        Ok(row.into())
    }

    async fn delete_stock_item(&self, id: Uuid) -> AppResult<bool> {
        let start = Instant::now();

        let result = sqlx::query("DELETE FROM stock_items WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(self.owner)
            .execute(&self.pool)
            .await?;

        metrics::record_db_query("delete", start.elapsed().as_secs_f64());
        Ok(result.rows_affected() > 0)
    }

    async fn reconcile_stock(&self, old: &[Decoration], new: &[Decoration]) -> AppResult<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        // Lock the owner's stock so concurrent reconciliations serialize
        let sql = format!(
            "SELECT {} FROM stock_items WHERE owner_id = $1 FOR UPDATE",
            STOCK_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockRow>(&sql)
            .bind(self.owner)
            .fetch_all(&mut *tx)
            .await?;

        let before: Vec<StockItem> = rows.into_iter().map(StockItem::from).collect();
        let mut after = before.clone();
        stock::reconcile(&mut after, old, new);

        let mut changed = 0;
        for (was, now) in before.iter().zip(after.iter()) {
            if was.quantity == now.quantity {
                continue;
            }
            changed += 1;
            sqlx::query("UPDATE stock_items SET quantity = $1, updated_at = NOW() WHERE id = $2")
                .bind(now.quantity)
                .bind(now.id)
                .execute(&mut *tx)
                .await?;

            tracing::debug!(
                character = %now.character,
                from = was.quantity,
                to = now.quantity,
                "Stock quantity reconciled"
            );
        }

        tx.commit().await?;

        metrics::record_stock_change("reconcile", changed);
        metrics::record_db_query("reconcile", start.elapsed().as_secs_f64());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> OrderRow {
        OrderRow {
            id: Uuid::new_v4(),
            shipping_date: NaiveDate::from_ymd_opt(2024, 1, 28).unwrap(),
            customer_name: "Nok".into(),
            platform: Some("LINE".into()),
            flower_count: 9,
            flower_color: "pink".into(),
            price: 1200.0,
            shipping_cost: 80.0,
            deposit_amount: 200.0,
            remaining_balance: 1000.0,
            use_date: None,
            is_asap: true,
            status: status.into(),
            shipping_address: None,
            notes: Some("wrap in kraft paper".into()),
            alphabet_decorations: Json(vec![StoredDecoration::from(&Decoration::new("N", 1))]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn order_row_maps_to_model() {
        let order = Order::try_from(row("ready_to_ship")).unwrap();
        assert_eq!(order.status, OrderStatus::ReadyToShip);
        assert_eq!(order.alphabet_decorations, vec![Decoration::new("N", 1)]);
        assert_eq!(order.platform.as_deref(), Some("LINE"));
    }

    #[test]
    fn unknown_status_is_an_internal_error() {
        let err = Order::try_from(row("cancelled")).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn stock_row_symbol_becomes_character() {
        let item = StockItem::from(StockRow {
            id: Uuid::new_v4(),
            symbol: "♥".into(),
            quantity: 4,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        assert_eq!(item.character, "♥");
        assert_eq!(item.quantity, 4);
    }

    #[test]
    fn write_statements_bind_every_column() {
        let insert = insert_order_sql();
        assert!(insert.starts_with("INSERT INTO orders (owner_id, shipping_date,"));
        assert!(insert.contains("$16)"));
        assert!(!insert.contains("$17"));

        let update = update_order_sql();
        assert!(update.contains("shipping_date = $3"));
        assert!(update.contains("alphabet_decorations = $17"));
        assert!(update.contains("WHERE id = $1 AND owner_id = $2"));
    }

    #[test]
    fn stored_decorations_use_snake_case_keys() {
        let id = Uuid::new_v4();
        let decoration = Decoration {
            character: "A".into(),
            quantity: 2,
            stock_item_id: Some(id),
        };

        let json = serde_json::to_value(StoredDecoration::from(&decoration)).unwrap();
        assert_eq!(json["stock_item_id"], serde_json::json!(id));
        assert!(json.get("stockItemId").is_none());

        let stored: StoredDecoration =
            serde_json::from_value(serde_json::json!({"character": "A", "quantity": 2})).unwrap();
        assert_eq!(Decoration::from(stored), Decoration::new("A", 2));
    }
}
