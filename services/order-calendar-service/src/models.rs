// =============================================================================
// MODELS MODULE
// =============================================================================
// Data structures shared by the core (period, stock, summary, calendar) and
// the HTTP layer.
//
// NOTES:
// - JSON uses camelCase field names (what the browser calendar sends)
// - Table columns use snake_case; db.rs maps between the two
// - Money is carried as f64 in the shop's currency, no conversion
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ORDER STATUS
// =============================================================================
/// Lifecycle of an order. Also drives the badge colour in the calendar and
/// whether the shipping cost counts as an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Deposit,
    ReadyToShip,
    Shipped,
}

impl OrderStatus {
    /// Storage representation (the `status` column)
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Deposit => "deposit",
            OrderStatus::ReadyToShip => "ready_to_ship",
            OrderStatus::Shipped => "shipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(OrderStatus::Deposit),
            "ready_to_ship" => Some(OrderStatus::ReadyToShip),
            "shipped" => Some(OrderStatus::Shipped),
            _ => None,
        }
    }

    /// CSS class for the calendar badge
    pub fn badge_class(&self) -> &'static str {
        match self {
            OrderStatus::Deposit => "status-deposit",
            OrderStatus::ReadyToShip => "status-ready",
            OrderStatus::Shipped => "status-shipped",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Deposit => "Deposit",
            OrderStatus::ReadyToShip => "Ready to Ship",
            OrderStatus::Shipped => "Shipped",
        }
    }

    /// Shipping cost is only realized as an expense once the item ships
    pub fn counts_shipping(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }
}

// =============================================================================
// DECORATION
// =============================================================================
/// One decorative character consumed by an order.
///
/// `stock_item_id` is captured when the character is picked through the
/// availability check. Decorations saved without it are resolved by
/// character instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoration {
    pub character: String,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_item_id: Option<Uuid>,
}

impl Decoration {
    pub fn new(character: impl Into<String>, quantity: i32) -> Self {
        Self {
            character: character.into(),
            quantity,
            stock_item_id: None,
        }
    }
}

// =============================================================================
// ORDER
// =============================================================================
/// A customer order as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Assigned by the store at creation
    pub id: Uuid,

    /// Date-only key for range queries and calendar placement
    pub shipping_date: NaiveDate,

    pub customer_name: String,

    /// Sales channel the order came in through (LINE, Facebook, walk-in...)
    pub platform: Option<String>,

    pub flower_count: i32,
    pub flower_color: String,

    /// Customer-facing total
    pub price: f64,

    /// Only counted as an expense when status = shipped
    pub shipping_cost: f64,

    pub deposit_amount: f64,

    /// Always price - deposit_amount, recomputed on every save
    pub remaining_balance: f64,

    /// Date the flowers are used for; None when `is_asap`
    pub use_date: Option<NaiveDate>,
    pub is_asap: bool,

    pub status: OrderStatus,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,

    /// Inventory consumed by this order
    pub alphabet_decorations: Vec<Decoration>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Expense realized for this order (zero unless shipped)
    pub fn counted_shipping(&self) -> f64 {
        if self.status.counts_shipping() {
            self.shipping_cost
        } else {
            0.0
        }
    }

    /// Revenue this order contributes after realized shipping cost
    pub fn net_revenue(&self) -> f64 {
        self.price - self.counted_shipping()
    }
}

// -----------------------------------------------------------------------------
// ORDER FORM (API REQUEST)
// -----------------------------------------------------------------------------
/// Fields submitted from the order form, before validation.
///
/// # Example JSON
/// ```json
/// {
///   "shippingDate": "2024-02-14",
///   "customerName": "Somchai",
///   "flowerCount": 12,
///   "flowerColor": "red",
///   "price": 1500,
///   "shippingCost": 150,
///   "depositAmount": 500,
///   "isAsap": true,
///   "status": "shipped",
///   "alphabetDecorations": [{ "character": "A", "quantity": 2 }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderForm {
    pub shipping_date: Option<NaiveDate>,
    #[serde(default)]
    pub customer_name: String,
    pub platform: Option<String>,
    #[serde(default)]
    pub flower_count: i32,
    #[serde(default)]
    pub flower_color: String,
    #[serde(default)]
    pub price: f64,
    /// Required (zero allowed) when status is shipped
    pub shipping_cost: Option<f64>,
    pub deposit_amount: Option<f64>,
    pub use_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_asap: bool,
    pub status: Option<OrderStatus>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub alphabet_decorations: Vec<Decoration>,
}

/// Validated order fields ready to be written by a gateway.
/// Produced by `orders::validate`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub shipping_date: NaiveDate,
    pub customer_name: String,
    pub platform: Option<String>,
    pub flower_count: i32,
    pub flower_color: String,
    pub price: f64,
    pub shipping_cost: f64,
    pub deposit_amount: f64,
    pub remaining_balance: f64,
    pub use_date: Option<NaiveDate>,
    pub is_asap: bool,
    pub status: OrderStatus,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub alphabet_decorations: Vec<Decoration>,
}

// =============================================================================
// STOCK ITEM
// =============================================================================
/// Tracked count for one decorative character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: Uuid,

    /// Single glyph or short symbol, unique per owner
    pub character: String,

    /// Currently available, never negative
    pub quantity: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for adding a character to the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStockRequest {
    pub character: String,
    #[serde(default)]
    pub quantity: i32,
}

/// Request body for the +/- buttons on the stock page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    /// Amount to adjust (positive to add, negative to remove)
    pub delta: i32,
}

/// Request body for adding a decoration to an order being edited.
/// `selected` is the draft's current selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationSelectRequest {
    #[serde(default)]
    pub selected: Vec<Decoration>,
    pub character: String,
    #[serde(default = "default_decoration_quantity")]
    pub quantity: i32,
}

fn default_decoration_quantity() -> i32 {
    1
}

/// One choice in the decoration dropdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationChoice {
    pub stock_item_id: Uuid,
    pub character: String,
    pub available: i32,
}

/// Response for a decoration selection: the updated draft and what is left
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationSelectResponse {
    pub selected: Vec<Decoration>,
    pub choices: Vec<DecorationChoice>,
}

// =============================================================================
// HEALTH CHECK RESPONSES
// =============================================================================

/// Simple health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Detailed readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

/// Individual dependency health checks
#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
    pub redis: bool,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }
}
