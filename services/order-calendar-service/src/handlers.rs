// =============================================================================
// HANDLERS MODULE
// =============================================================================
// HTTP request handlers (controller layer).
//
// Every /api/v1 handler takes an `Owner` extractor first, so requests without
// a live session are rejected before any query runs. The owner id then scopes
// the gateway: `state.db.scoped(owner.id)`.
//
// The calendar is stateless on the server. The browser sends back the period
// (mode + anchor) it is showing and gets the next display model in return.
// =============================================================================

use axum::{
    extract::{MatchedPath, Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::auth::{self, Owner};
use crate::calendar::{CalendarView, DisplayModel};
use crate::error::{AppError, AppResult};
use crate::gateway::OrderGateway;
use crate::metrics;
use crate::models::*;
use crate::orders::{self, OrderDetails};
use crate::period::{self, DateRange, Direction, Period, ViewMode};
use crate::stock;
use crate::summary::OrderStats;
use crate::AppState;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// =============================================================================
// REQUEST METRICS
// =============================================================================
/// Records every routed request under its route pattern, errors included.
/// Installed with `route_layer` so `MatchedPath` is available.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    metrics::record_http_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// Liveness probe
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "order-calendar-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe - database and session store reachable?
///
/// GET /ready
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let db_healthy = state.db.health_check().await;

    let redis_healthy = redis::cmd("PING")
        .query_async::<_, String>(&mut state.redis.clone())
        .await
        .is_ok();

    let all_healthy = db_healthy && redis_healthy;
    let status = if all_healthy { "ready" } else { "not_ready" };

    let response = ReadinessResponse {
        status: status.to_string(),
        checks: ReadinessChecks {
            database: db_healthy,
            redis: redis_healthy,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        tracing::warn!(database = db_healthy, redis = redis_healthy, "Not ready");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Prometheus metrics in text exposition format
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

// =============================================================================
// CALENDAR ENDPOINTS
// =============================================================================

/// The period the browser is currently showing.
/// Missing fields fall back to month mode anchored on today.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodParams {
    #[serde(default)]
    pub mode: ViewMode,
    pub anchor: Option<NaiveDate>,
}

impl PeriodParams {
    fn period(&self, today: NaiveDate) -> AppResult<Period> {
        let anchor = supported(self.anchor.unwrap_or(today), "anchor")?;
        Ok(Period::new(anchor, self.mode))
    }
}

/// Rejects dates whose year falls outside `period::SUPPORTED_YEARS`
fn supported(date: NaiveDate, field: &str) -> AppResult<NaiveDate> {
    if period::is_supported(date) {
        Ok(date)
    } else {
        Err(AppError::validation(format!(
            "{} must be between the years {} and {}",
            field,
            period::SUPPORTED_YEARS.start(),
            period::SUPPORTED_YEARS.end()
        )))
    }
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    #[serde(flatten)]
    pub current: PeriodParams,
    pub direction: Direction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModeRequest {
    #[serde(flatten)]
    pub current: PeriodParams,
    pub view_mode: ViewMode,
}

#[derive(Debug, Deserialize)]
pub struct ExpandDayRequest {
    pub date: NaiveDate,
}

async fn render<G: OrderGateway + ?Sized>(
    view: &mut CalendarView,
    gateway: &G,
    today: NaiveDate,
) -> AppResult<Json<DisplayModel>> {
    view.refresh(gateway).await?;
    Ok(Json(view.display_model(today)))
}

/// Calendar grid, labels and aggregates for one period
///
/// GET /api/v1/calendar?mode=week&anchor=2024-01-31
pub async fn get_calendar(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PeriodParams>,
) -> AppResult<Json<DisplayModel>> {
    let today = today();
    let store = state.db.scoped(owner.id);
    let mut view = CalendarView::new(params.period(today)?, state.config.badge_limits);
    render(&mut view, &store, today).await
}

/// Previous / next arrow
///
/// POST /api/v1/calendar/navigate
/// `{"mode": "month", "anchor": "2024-12-01", "direction": "next"}`
pub async fn navigate_calendar(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Json(request): Json<NavigateRequest>,
) -> AppResult<Json<DisplayModel>> {
    let today = today();
    let store = state.db.scoped(owner.id);
    let mut view = CalendarView::new(request.current.period(today)?, state.config.badge_limits);

    view.navigate(request.direction, &store).await?;

    tracing::debug!(anchor = %view.period().anchor, "Calendar navigated");
    Ok(Json(view.display_model(today)))
}

/// Month/week toggle
///
/// POST /api/v1/calendar/mode
/// `{"mode": "month", "anchor": "2024-01-01", "viewMode": "week"}`
pub async fn set_view_mode(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ViewModeRequest>,
) -> AppResult<Json<DisplayModel>> {
    let today = today();
    let store = state.db.scoped(owner.id);
    let mut view = CalendarView::new(request.current.period(today)?, state.config.badge_limits);

    view.set_view_mode(request.view_mode, today, &store).await?;
    Ok(Json(view.display_model(today)))
}

/// "+N more" on a month cell opens that day's week
///
/// POST /api/v1/calendar/expand
pub async fn expand_day(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExpandDayRequest>,
) -> AppResult<Json<DisplayModel>> {
    let today = today();
    let date = supported(request.date, "date")?;
    let store = state.db.scoped(owner.id);
    let mut view = CalendarView::new(Period::new(date, ViewMode::Week), state.config.badge_limits);

    view.expand_day(date, &store).await?;
    Ok(Json(view.display_model(today)))
}

// -----------------------------------------------------------------------------
// SUMMARY PANEL
// -----------------------------------------------------------------------------
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub summary_label: String,
    pub date_range: DateRange,
    pub stats: OrderStats,
}

/// GET /api/v1/summary?mode=month&anchor=2024-01-01
pub async fn get_summary(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PeriodParams>,
) -> AppResult<Json<SummaryResponse>> {
    let period = params.period(today())?;
    let range = period.range();

    let orders = state
        .db
        .scoped(owner.id)
        .list_orders_by_range(range.start, range.end)
        .await?;

    Ok(Json(SummaryResponse {
        summary_label: period.summary_label(),
        stats: OrderStats::from_orders(&orders),
        date_range: range,
    }))
}

// =============================================================================
// ORDER ENDPOINTS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DraftParams {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Empty form prefilled with the clicked day
///
/// GET /api/v1/orders/draft?date=2024-02-14
pub async fn order_draft(_owner: Owner, Query(params): Query<DraftParams>) -> Json<OrderForm> {
    Json(orders::draft_for_date(params.date))
}

/// Orders shipping between two dates, inclusive
///
/// GET /api/v1/orders?start=2024-01-28&end=2024-02-03
pub async fn list_orders(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> AppResult<Json<Vec<OrderDetails>>> {
    supported(params.start, "start")?;
    supported(params.end, "end")?;
    if params.start > params.end {
        return Err(AppError::validation("start must not be after end"));
    }

    let orders = state
        .db
        .scoped(owner.id)
        .list_orders_by_range(params.start, params.end)
        .await?;

    Ok(Json(orders.into_iter().map(OrderDetails::from).collect()))
}

/// GET /api/v1/orders/:id
pub async fn get_order(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderDetails>> {
    let order = state
        .db
        .scoped(owner.id)
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    Ok(Json(order.into()))
}

/// Save a new order and deduct its decorations
///
/// POST /api/v1/orders
///
/// # Response
/// - 201 Created: the saved order with its payment state
/// - 400 Bad Request: form rejected, nothing written
pub async fn create_order(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Json(form): Json<OrderForm>,
) -> AppResult<(StatusCode, Json<OrderDetails>)> {
    let store = state.db.scoped(owner.id);

    let result = orders::create_order(&store, form).await;
    metrics::record_order_write("create", result.is_ok());

    Ok((StatusCode::CREATED, Json(result?.into())))
}

/// Save an edited order; its decorations are reconciled against the stored ones
///
/// PUT /api/v1/orders/:id
pub async fn update_order(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(form): Json<OrderForm>,
) -> AppResult<Json<OrderDetails>> {
    let store = state.db.scoped(owner.id);

    let result = orders::update_order(&store, id, form).await;
    metrics::record_order_write("update", result.is_ok());

    Ok(Json(result?.into()))
}

/// Delete an order and give its decorations back
///
/// DELETE /api/v1/orders/:id
pub async fn delete_order(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let store = state.db.scoped(owner.id);

    let result = orders::delete_order(&store, id).await;
    metrics::record_order_write("delete", result.is_ok());

    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// Availability check while picking decorations on the order form
///
/// POST /api/v1/orders/decorations
///
/// # Request Body
/// ```json
/// {
///   "selected": [{ "character": "A", "quantity": 1, "stockItemId": "..." }],
///   "character": "A",
///   "quantity": 2
/// }
/// ```
///
/// # Response
/// - 200 OK: merged selection and the remaining dropdown choices
/// - 409 Conflict: not enough of that character left
pub async fn select_decoration(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Json(request): Json<DecorationSelectRequest>,
) -> AppResult<Json<DecorationSelectResponse>> {
    let store = state.db.scoped(owner.id);
    Ok(Json(orders::select_decoration(&store, request).await?))
}

// =============================================================================
// STOCK ENDPOINTS
// =============================================================================

/// GET /api/v1/stock
pub async fn list_stock(
    owner: Owner,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<StockItem>>> {
    let items = state.db.scoped(owner.id).list_stock_items().await?;
    Ok(Json(items))
}

/// Add a new character to the inventory
///
/// POST /api/v1/stock
///
/// # Response
/// - 201 Created
/// - 409 Conflict: the character already exists
pub async fn add_stock(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddStockRequest>,
) -> AppResult<(StatusCode, Json<StockItem>)> {
    let (character, quantity) = stock::new_item_fields(&request.character, request.quantity)?;

    let item = state
        .db
        .scoped(owner.id)
        .create_stock_item(&character, quantity)
        .await?;

    tracing::info!(character = %item.character, quantity = item.quantity, "Stock character added");
    metrics::record_stock_change("add", 1);

    Ok((StatusCode::CREATED, Json(item)))
}

/// +/- buttons; the result never goes below zero
///
/// POST /api/v1/stock/:id/adjust
/// `{"delta": -1}`
pub async fn adjust_stock(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AdjustStockRequest>,
) -> AppResult<Json<StockItem>> {
    let store = state.db.scoped(owner.id);

    let current = store
        .list_stock_items()
        .await?
        .into_iter()
        .find(|item| item.id == id)
        .ok_or_else(|| AppError::NotFound("Stock item not found".into()))?;

    let quantity = stock::adjusted_quantity(current.quantity, request.delta);
    let item = store.update_stock_item_quantity(id, quantity).await?;

    tracing::info!(
        character = %item.character,
        delta = request.delta,
        quantity = item.quantity,
        "Stock adjusted"
    );
    metrics::record_stock_change("adjust", 1);

    Ok(Json(item))
}

/// Orders that used the character keep their decorations; later edits skip it
///
/// DELETE /api/v1/stock/:id
pub async fn delete_stock(
    owner: Owner,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.db.scoped(owner.id).delete_stock_item(id).await? {
        return Err(AppError::NotFound("Stock item not found".into()));
    }

    tracing::info!(stock_item_id = %id, "Stock character deleted");
    metrics::record_stock_change("delete", 1);
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// SESSION
// =============================================================================

/// Logout
///
/// DELETE /api/v1/session
pub async fn logout(owner: Owner, State(state): State<Arc<AppState>>) -> AppResult<StatusCode> {
    auth::end_session(&state.redis, &owner.token).await?;

    tracing::info!(owner_id = %owner.id, "Session ended");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_params_default_to_month_of_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let params: PeriodParams = serde_json::from_str("{}").unwrap();

        assert_eq!(params.period(today).unwrap(), Period::new(today, ViewMode::Month));
    }

    #[test]
    fn anchors_outside_supported_years_are_rejected() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let params = PeriodParams {
            mode: ViewMode::Week,
            anchor: Some(NaiveDate::MAX),
        };
        assert!(matches!(params.period(today), Err(AppError::Validation(_))));

        let params: PeriodParams =
            serde_json::from_str(r#"{"mode": "week", "anchor": "9999-12-31"}"#).unwrap();
        let period = params.period(today).unwrap();
        assert_eq!(period.range().start, NaiveDate::from_ymd_opt(9999, 12, 26).unwrap());

        assert!(supported(NaiveDate::MIN, "start").is_err());
    }

    #[test]
    fn navigate_request_reads_flat_body() {
        let request: NavigateRequest = serde_json::from_str(
            r#"{"mode": "week", "anchor": "2024-01-28", "direction": "prev"}"#,
        )
        .unwrap();

        assert_eq!(request.direction, Direction::Previous);
        assert_eq!(request.current.mode, ViewMode::Week);
        assert_eq!(
            request.current.anchor,
            NaiveDate::from_ymd_opt(2024, 1, 28)
        );
    }

    #[test]
    fn view_mode_request_keeps_current_and_target_apart() {
        let request: ViewModeRequest =
            serde_json::from_str(r#"{"mode": "month", "anchor": "2024-01-01", "viewMode": "week"}"#)
                .unwrap();

        assert_eq!(request.current.mode, ViewMode::Month);
        assert_eq!(request.view_mode, ViewMode::Week);
    }
}
