// =============================================================================
// SUMMARY MODULE
// =============================================================================
// Revenue figures for the summary panel, computed over orders that were
// already filtered to the visible month or week.
//
// SHIPPING RULE:
// A shipping cost is only an expense once the order has actually shipped.
// Orders in `deposit` or `ready_to_ship` contribute zero shipping even when a
// cost is already filled in.
// =============================================================================

use serde::Serialize;

use crate::models::{Order, OrderStatus};

// -----------------------------------------------------------------------------
// STATUS BREAKDOWN
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusTotals {
    pub count: usize,
    /// Sum of price minus realized shipping
    pub revenue: f64,
}

/// Keys match the status wire names (`ready_to_ship`, not camelCase)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusBreakdown {
    pub deposit: StatusTotals,
    pub ready_to_ship: StatusTotals,
    pub shipped: StatusTotals,
}

impl StatusBreakdown {
    fn get_mut(&mut self, status: OrderStatus) -> &mut StatusTotals {
        match status {
            OrderStatus::Deposit => &mut self.deposit,
            OrderStatus::ReadyToShip => &mut self.ready_to_ship,
            OrderStatus::Shipped => &mut self.shipped,
        }
    }
}

// =============================================================================
// ORDER STATS
// =============================================================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: usize,
    /// Sum of prices charged to customers
    pub total_revenue: f64,
    /// Shipping cost of shipped orders only
    pub total_shipping: f64,
    /// total_revenue - total_shipping
    pub net_revenue: f64,
    pub by_status: StatusBreakdown,
}

impl OrderStats {
    pub fn from_orders(orders: &[Order]) -> Self {
        orders.iter().fold(Self::default(), |mut stats, order| {
            let shipping = order.counted_shipping();
            let net = order.net_revenue();

            stats.total_orders += 1;
            stats.total_revenue += order.price;
            stats.total_shipping += shipping;
            stats.net_revenue += net;

            let bucket = stats.by_status.get_mut(order.status);
            bucket.count += 1;
            bucket.revenue += net;

            stats
        })
    }
}

// =============================================================================
// PAYMENT STATE
// =============================================================================
/// What the remaining balance means for the operator. A deposit larger than
/// the price is allowed and shows as overpaid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "amount", rename_all = "snake_case")]
pub enum PaymentState {
    Outstanding(f64),
    Paid,
    Overpaid(f64),
}

impl PaymentState {
    pub fn of(price: f64, remaining_balance: f64) -> Self {
        if remaining_balance < 0.0 {
            PaymentState::Overpaid(-remaining_balance)
        } else if remaining_balance == 0.0 && price > 0.0 {
            PaymentState::Paid
        } else {
            PaymentState::Outstanding(remaining_balance)
        }
    }

    pub fn for_order(order: &Order) -> Self {
        Self::of(order.price, order.remaining_balance)
    }

    pub fn label(&self) -> String {
        match self {
            PaymentState::Outstanding(amount) => format_baht(*amount),
            PaymentState::Paid => "✓ Paid".to_string(),
            PaymentState::Overpaid(amount) => format!("{} (Overpaid)", format_baht(*amount)),
        }
    }
}

/// Whole baht with thousands separators: 4350.0 -> "฿4,350"
pub fn format_baht(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0 {
        format!("-฿{}", grouped)
    } else {
        format!("฿{}", grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Order;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn order(status: OrderStatus, price: f64, shipping_cost: f64) -> Order {
        Order {
            id: Uuid::new_v4(),
            shipping_date: NaiveDate::from_ymd_opt(2024, 2, 14).unwrap(),
            customer_name: "Customer".into(),
            platform: None,
            flower_count: 10,
            flower_color: "red".into(),
            price,
            shipping_cost,
            deposit_amount: 0.0,
            remaining_balance: price,
            use_date: None,
            is_asap: false,
            status,
            shipping_address: None,
            notes: None,
            alphabet_decorations: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn shipping_counts_only_for_shipped_orders() {
        let orders = vec![
            order(OrderStatus::Deposit, 1000.0, 100.0),
            order(OrderStatus::ReadyToShip, 2000.0, 200.0),
            order(OrderStatus::Shipped, 1500.0, 150.0),
        ];

        let stats = OrderStats::from_orders(&orders);

        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_revenue, 4500.0);
        assert_eq!(stats.total_shipping, 150.0);
        assert_eq!(stats.net_revenue, 4350.0);
        assert_eq!(stats.by_status.deposit, StatusTotals { count: 1, revenue: 1000.0 });
        assert_eq!(stats.by_status.ready_to_ship.revenue, 2000.0);
        assert_eq!(stats.by_status.shipped.revenue, 1350.0);
    }

    #[test]
    fn empty_range_is_all_zero() {
        assert_eq!(OrderStats::from_orders(&[]), OrderStats::default());
    }

    #[test]
    fn breakdown_serializes_with_status_keys() {
        let stats = OrderStats::from_orders(&[order(OrderStatus::ReadyToShip, 800.0, 50.0)]);
        let json = serde_json::to_value(stats).unwrap();

        assert_eq!(json["totalOrders"], 1);
        assert_eq!(json["byStatus"]["ready_to_ship"]["count"], 1);
        assert_eq!(json["byStatus"]["ready_to_ship"]["revenue"], 800.0);
    }

    #[test]
    fn payment_state_from_remaining_balance() {
        assert_eq!(PaymentState::of(1500.0, 1000.0), PaymentState::Outstanding(1000.0));
        assert_eq!(PaymentState::of(1500.0, 0.0), PaymentState::Paid);
        assert_eq!(PaymentState::of(0.0, 0.0), PaymentState::Outstanding(0.0));
        assert_eq!(PaymentState::of(1500.0, -200.0), PaymentState::Overpaid(200.0));

        assert_eq!(PaymentState::Paid.label(), "✓ Paid");
        assert_eq!(PaymentState::Overpaid(200.0).label(), "฿200 (Overpaid)");
    }

    #[test]
    fn baht_formatting_groups_thousands() {
        assert_eq!(format_baht(0.0), "฿0");
        assert_eq!(format_baht(999.0), "฿999");
        assert_eq!(format_baht(4350.0), "฿4,350");
        assert_eq!(format_baht(1234567.4), "฿1,234,567");
        assert_eq!(format_baht(-1500.0), "-฿1,500");
    }
}
