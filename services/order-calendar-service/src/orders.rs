// =============================================================================
// ORDERS MODULE
// =============================================================================
// What happens when the operator submits or deletes an order:
//
//   form -> validate -> reconcile decoration stock -> write the order row
//
// Validation runs before the gateway is touched, so a rejected form never
// changes stock or orders.
//
// KNOWN GAP:
// Stock reconciliation and the order write are two gateway calls. If the
// order write fails after reconciliation committed, the stock stays adjusted.
// There is no compensating write; the operator sees a failure and retries.
// =============================================================================

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::gateway::OrderGateway;
use crate::models::{
    Decoration, DecorationSelectRequest, DecorationSelectResponse, NewOrder, Order, OrderForm,
    OrderStatus,
};
use crate::stock::DecorationDraft;
use crate::summary::PaymentState;

// =============================================================================
// VALIDATION
// =============================================================================

fn non_negative(value: f64, field: &str) -> AppResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AppError::validation(format!("{} must be zero or more", field)))
    }
}

/// Blank free text is stored as missing
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Turns submitted form fields into a writable order.
///
/// - customer name and shipping date are required
/// - shipping cost is required when the status is shipped (0 is allowed)
/// - ASAP orders never keep a use date
/// - remaining balance is always price - deposit; a deposit above the price
///   is accepted and shows as overpaid
pub fn validate(form: OrderForm) -> AppResult<NewOrder> {
    let shipping_date = form
        .shipping_date
        .ok_or_else(|| AppError::validation("Shipping date is required"))?;

    let customer_name = form.customer_name.trim().to_string();
    if customer_name.is_empty() {
        return Err(AppError::validation("Customer name is required"));
    }

    if form.flower_count < 0 {
        return Err(AppError::validation("Flower count must be zero or more"));
    }

    let status = form.status.unwrap_or(OrderStatus::Deposit);
    let price = non_negative(form.price, "Price")?;
    let deposit_amount = non_negative(form.deposit_amount.unwrap_or(0.0), "Deposit")?;

    let shipping_cost = match (status, form.shipping_cost) {
        (OrderStatus::Shipped, None) => {
            return Err(AppError::validation(
                "Shipping cost is required when status is \"Shipped\" (0 is allowed for free shipping)",
            ))
        }
        (_, cost) => non_negative(cost.unwrap_or(0.0), "Shipping cost")?,
    };

    let mut alphabet_decorations = Vec::with_capacity(form.alphabet_decorations.len());
    for decoration in form.alphabet_decorations {
        let character = decoration.character.trim().to_string();
        if character.is_empty() {
            return Err(AppError::validation("Decoration character is required"));
        }
        if decoration.quantity < 1 {
            return Err(AppError::validation(format!(
                "Quantity for \"{}\" must be at least 1",
                character
            )));
        }
        alphabet_decorations.push(Decoration {
            character,
            ..decoration
        });
    }

    let use_date = if form.is_asap { None } else { form.use_date };

    Ok(NewOrder {
        shipping_date,
        customer_name,
        platform: optional_text(form.platform),
        flower_count: form.flower_count,
        flower_color: form.flower_color.trim().to_string(),
        price,
        shipping_cost,
        deposit_amount,
        remaining_balance: price - deposit_amount,
        use_date,
        is_asap: form.is_asap,
        status,
        shipping_address: optional_text(form.shipping_address),
        notes: optional_text(form.notes),
        alphabet_decorations,
    })
}

// =============================================================================
// WORKFLOW
// =============================================================================

async fn reconcile<G: OrderGateway + ?Sized>(
    gateway: &G,
    old: &[Decoration],
    new: &[Decoration],
) -> AppResult<()> {
    if old.is_empty() && new.is_empty() {
        return Ok(());
    }
    gateway.reconcile_stock(old, new).await
}

/// New order: deduct its decorations, then insert it.
pub async fn create_order<G: OrderGateway + ?Sized>(gateway: &G, form: OrderForm) -> AppResult<Order> {
    let new = validate(form)?;

    reconcile(gateway, &[], &new.alphabet_decorations).await?;
    let order = gateway.create_order(new).await?;

    tracing::info!(
        order_id = %order.id,
        shipping_date = %order.shipping_date,
        decorations = order.alphabet_decorations.len(),
        "Order created"
    );
    Ok(order)
}

/// Edited order: the stored decorations are the usage to give back, the
/// submitted ones the usage to take.
pub async fn update_order<G: OrderGateway + ?Sized>(
    gateway: &G,
    id: Uuid,
    form: OrderForm,
) -> AppResult<Order> {
    let new = validate(form)?;

    let existing = gateway
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    reconcile(gateway, &existing.alphabet_decorations, &new.alphabet_decorations).await?;
    let order = gateway.update_order(id, new).await?;

    tracing::info!(order_id = %order.id, status = order.status.as_str(), "Order updated");
    Ok(order)
}

/// Gives the order's decorations back to stock, then removes the row.
pub async fn delete_order<G: OrderGateway + ?Sized>(gateway: &G, id: Uuid) -> AppResult<()> {
    let existing = gateway
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    reconcile(gateway, &existing.alphabet_decorations, &[]).await?;

    if !gateway.delete_order(id).await? {
        return Err(AppError::NotFound("Order not found".into()));
    }

    tracing::info!(order_id = %id, "Order deleted");
    Ok(())
}

/// Blank form for a day clicked on the calendar
pub fn draft_for_date(date: NaiveDate) -> OrderForm {
    OrderForm {
        shipping_date: Some(date),
        status: Some(OrderStatus::Deposit),
        ..OrderForm::default()
    }
}

/// Adds a decoration to a draft selection if the stock allows it.
pub async fn select_decoration<G: OrderGateway + ?Sized>(
    gateway: &G,
    request: DecorationSelectRequest,
) -> AppResult<DecorationSelectResponse> {
    let stock = gateway.list_stock_items().await?;

    let mut draft = DecorationDraft::new(request.selected);
    draft.add(&stock, request.character.trim(), request.quantity)?;

    let choices = draft.choices(&stock);
    Ok(DecorationSelectResponse {
        selected: draft.into_selected(),
        choices,
    })
}

// =============================================================================
// RESPONSE SHAPE
// =============================================================================
/// An order as returned to the browser, with its payment state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub payment: PaymentState,
    pub payment_label: String,
}

impl From<Order> for OrderDetails {
    fn from(order: Order) -> Self {
        let payment = PaymentState::for_order(&order);
        Self {
            payment_label: payment.label(),
            payment,
            order,
        }
    }
}
