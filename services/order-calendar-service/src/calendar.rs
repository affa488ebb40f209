// =============================================================================
// CALENDAR MODULE
// =============================================================================
// Builds what the browser renders: the calendar grid for the current month or
// week, the header labels and the revenue summary for the same window.
//
// FLOW (one request = one pass):
//   period changes -> range -> fetch orders -> bucket by day -> aggregate
//
// The view owns only the period (anchor + mode), the badge limits and the
// last fetched orders. The browser sends the period back on every request.
// =============================================================================

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::gateway::OrderGateway;
use crate::models::{Order, OrderStatus};
use crate::period::{first_weekday_of_month, DateRange, Direction, Period, ViewMode};
use crate::summary::OrderStats;

/// Customer names longer than this are cut on the badge
const BADGE_NAME_CHARS: usize = 12;

// -----------------------------------------------------------------------------
// BADGE LIMITS
// -----------------------------------------------------------------------------
/// How many order badges a day cell shows before "+N more"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeLimits {
    pub month: usize,
    pub week: usize,
}

impl Default for BadgeLimits {
    fn default() -> Self {
        Self { month: 3, week: 10 }
    }
}

impl BadgeLimits {
    pub fn for_mode(&self, mode: ViewMode) -> usize {
        match mode {
            ViewMode::Month => self.month,
            ViewMode::Week => self.week,
        }
    }
}

// =============================================================================
// DISPLAY MODEL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBadge {
    pub id: Uuid,
    pub customer_name: String,
    pub status: OrderStatus,
    pub badge_class: &'static str,
    pub status_label: &'static str,
}

impl OrderBadge {
    fn from_order(order: &Order) -> Self {
        Self {
            id: order.id,
            customer_name: truncate(&order.customer_name, BADGE_NAME_CHARS),
            status: order.status,
            badge_class: order.status.badge_class(),
            status_label: order.status.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCell {
    pub date: NaiveDate,
    pub day: u32,
    pub is_today: bool,
    pub badges: Vec<OrderBadge>,
    pub total_orders: usize,
    /// Orders not shown as badges; clicking the affordance expands the day
    pub overflow: usize,
}

/// Month grids start with blank cells up to the weekday of the 1st
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CalendarCell {
    Blank,
    Day(DayCell),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayModel {
    pub period_label: String,
    pub summary_label: String,
    pub view_mode: ViewMode,
    pub anchor: NaiveDate,
    pub date_range: DateRange,
    pub calendar_cells: Vec<CalendarCell>,
    pub aggregates: OrderStats,
}

// =============================================================================
// CALENDAR VIEW
// =============================================================================
#[derive(Debug, Clone)]
pub struct CalendarView {
    period: Period,
    limits: BadgeLimits,
    orders: Vec<Order>,
}

impl CalendarView {
    pub fn new(period: Period, limits: BadgeLimits) -> Self {
        Self {
            period,
            limits,
            orders: Vec::new(),
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// Fetches the period's orders; the view only moves once the fetch succeeded
    async fn load<G: OrderGateway + ?Sized>(&mut self, period: Period, gateway: &G) -> AppResult<()> {
        let range = period.range();
        let orders = gateway.list_orders_by_range(range.start, range.end).await?;

        tracing::debug!(
            start = %range.start_iso(),
            end = %range.end_iso(),
            orders = orders.len(),
            "Calendar range loaded"
        );

        self.period = period;
        self.orders = orders;
        Ok(())
    }

    pub async fn refresh<G: OrderGateway + ?Sized>(&mut self, gateway: &G) -> AppResult<()> {
        self.load(self.period, gateway).await
    }

    pub async fn navigate<G: OrderGateway + ?Sized>(
        &mut self,
        direction: Direction,
        gateway: &G,
    ) -> AppResult<()> {
        self.load(self.period.step(direction), gateway).await
    }

    pub async fn set_view_mode<G: OrderGateway + ?Sized>(
        &mut self,
        mode: ViewMode,
        today: NaiveDate,
        gateway: &G,
    ) -> AppResult<()> {
        self.load(self.period.with_mode(mode, today), gateway).await
    }

    /// "+N more" on a day: show that day's week
    pub async fn expand_day<G: OrderGateway + ?Sized>(
        &mut self,
        date: NaiveDate,
        gateway: &G,
    ) -> AppResult<()> {
        self.load(Period::new(date, ViewMode::Week), gateway).await
    }

    pub fn display_model(&self, today: NaiveDate) -> DisplayModel {
        let range = self.period.range();
        let limit = self.limits.for_mode(self.period.mode);

        let mut by_day: HashMap<NaiveDate, Vec<&Order>> = HashMap::new();
        for order in self.orders.iter().filter(|o| range.contains(o.shipping_date)) {
            by_day.entry(order.shipping_date).or_default().push(order);
        }

        let leading_blanks = match self.period.mode {
            ViewMode::Month => {
                first_weekday_of_month(range.start.year(), range.start.month()).unwrap_or(0) as usize
            }
            ViewMode::Week => 0,
        };

        let mut cells: Vec<CalendarCell> = Vec::with_capacity(leading_blanks + 31);
        cells.extend(std::iter::repeat(CalendarCell::Blank).take(leading_blanks));
        cells.extend(range.days().map(|date| {
            let orders = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            CalendarCell::Day(DayCell {
                date,
                day: date.day(),
                is_today: date == today,
                badges: orders
                    .iter()
                    .take(limit)
                    .map(|order| OrderBadge::from_order(order))
                    .collect(),
                total_orders: orders.len(),
                overflow: orders.len().saturating_sub(limit),
            })
        }));

        DisplayModel {
            period_label: self.period.label(),
            summary_label: self.period.summary_label(),
            view_mode: self.period.mode,
            anchor: self.period.anchor,
            date_range: range,
            calendar_cells: cells,
            aggregates: OrderStats::from_orders(&self.orders),
        }
    }
}

/// Cuts to `max` characters, the last one being an ellipsis
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
