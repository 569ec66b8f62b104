//! Order routes: checkout, payment confirmation, customer self-service and
//! admin fulfilment.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use drape_core::{OrderId, OrderStatus, PaymentStatus};

use super::{DEFAULT_PAGE_SIZE, page_and_limit};
use crate::db::orders::OrderFilter;
use crate::db::{OrderRepository, SettingsRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{Order, User};
use crate::services::invoice::render_invoice;
use crate::services::orders::{
    self as lifecycle, CheckoutRequest, OrderError, PlacedOrder, ReturnDecision,
};
use crate::state::AppState;

/// Customers see their own orders; admins see every order.
fn ensure_visible(order: &Order, user: &User) -> Result<()> {
    if order.user_id != user.id && !user.is_admin {
        return Err(AppError::Forbidden(
            "You do not have access to this order".to_string(),
        ));
    }
    Ok(())
}

/// Payment and self-service actions belong to the customer alone, admins included.
fn ensure_owner(order: &Order, user: &User) -> Result<()> {
    ensure_visible(order, user)?;
    if order.user_id != user.id {
        return Err(AppError::Forbidden(
            "Only the customer who placed this order can do that".to_string(),
        ));
    }
    Ok(())
}

async fn load_order(state: &AppState, id: OrderId) -> Result<Order> {
    Ok(OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or(OrderError::NotFound)?)
}

/// Load an order the caller may see: their own, or any order for admins.
async fn load_visible(state: &AppState, id: OrderId, user: &User) -> Result<Order> {
    let order = load_order(state, id).await?;
    ensure_visible(&order, user)?;
    Ok(order)
}

/// Load an order owned by the caller.
async fn load_owned(state: &AppState, id: OrderId, user: &User) -> Result<Order> {
    let order = load_order(state, id).await?;
    ensure_owner(&order, user)?;
    Ok(order)
}

// =============================================================================
// Customer
// =============================================================================

/// Place an order from the caller's cart.
///
/// POST /api/orders
///
/// # Errors
///
/// Returns 400 for an empty cart, invalid address, disabled payment method,
/// rejected coupon or insufficient stock; 502 if Razorpay is unreachable.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>)> {
    let placed = lifecycle::place_order(state.pool(), state.razorpay(), user.id, &req).await?;
    add_breadcrumb(
        "checkout",
        "Order placed",
        &[
            ("order_number", placed.order.order_number.as_str()),
            ("payment_method", placed.order.payment_method.as_str()),
        ],
    );

    if let Some(email) = user.email.clone() {
        let state = state.clone();
        let order = placed.order.clone();
        tokio::spawn(async move {
            let Some(mailer) = state.email() else {
                return;
            };
            if let Err(e) = mailer
                .send_order_confirmation(email.as_str(), &user.name, &order)
                .await
            {
                tracing::warn!(error = %e, order_id = %order.id, "Order confirmation email failed");
            }
        });
    }

    Ok((StatusCode::CREATED, Json(placed)))
}

/// The caller's orders, newest first.
///
/// GET /api/orders/mine
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .list_for_user(user.id)
            .await?,
    ))
}

/// GET /api/orders/{id}
///
/// # Errors
///
/// Returns 404 for unknown orders and 403 for someone else's order.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(load_visible(&state, id, &user).await?))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Confirm a Razorpay checkout by its signature.
///
/// POST /api/orders/{id}/verify-payment
///
/// # Errors
///
/// Returns 400 when the signature does not match (the payment is marked failed)
/// and 503 when Razorpay is not configured.
#[instrument(skip_all, fields(order_id = %id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<Order>> {
    let order = load_owned(&state, id, &user).await?;
    let client = state.razorpay().ok_or_else(|| {
        AppError::ServiceUnavailable("Online payments are not configured".to_string())
    })?;

    let order = lifecycle::verify_razorpay_payment(
        state.pool(),
        client,
        &order,
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    )
    .await?;
    add_breadcrumb(
        "payment",
        "Razorpay payment verified",
        &[("order_number", order.order_number.as_str())],
    );
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct UpiReferenceRequest {
    pub reference: String,
}

/// Record the customer's UPI transaction reference for admin confirmation.
///
/// POST /api/orders/{id}/upi-reference
///
/// # Errors
///
/// Returns 400 for non-UPI or already settled orders.
pub async fn upi_reference(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Json(req): Json<UpiReferenceRequest>,
) -> Result<Json<Order>> {
    let order = load_owned(&state, id, &user).await?;
    Ok(Json(
        lifecycle::submit_upi_reference(state.pool(), &order, &req.reference).await?,
    ))
}

/// POST /api/orders/{id}/cancel
///
/// # Errors
///
/// Returns 400 once the order has shipped.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = load_owned(&state, id, &user).await?;
    Ok(Json(lifecycle::cancel_by_customer(state.pool(), &order).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub reason: String,
}

/// POST /api/orders/{id}/return
///
/// # Errors
///
/// Returns 400 unless the order is delivered, inside the return window and
/// has no return yet.
pub async fn request_return(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Json(req): Json<ReturnRequest>,
) -> Result<Json<Order>> {
    let order = load_owned(&state, id, &user).await?;
    Ok(Json(
        lifecycle::request_return(state.pool(), &order, &req.reason).await?,
    ))
}

/// Download the order's PDF invoice.
///
/// GET /api/orders/{id}/invoice
///
/// # Errors
///
/// Returns 404 for unknown orders and 403 for someone else's order.
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = load_visible(&state, id, &user).await?;
    let settings = SettingsRepository::new(state.pool()).get().await?;
    let pdf = render_invoice(&order, &settings);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"invoice-{}.pdf\"", order.order_number),
            ),
        ],
        pdf,
    ))
}

// =============================================================================
// Admin
// =============================================================================

/// Admin listing query.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// GET /api/orders
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<OrderQuery>,
) -> Result<Json<OrderPage>> {
    let (page, limit) = page_and_limit(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let filter = OrderFilter {
        order_status: query.status,
        payment_status: query.payment_status,
        page,
        limit,
    };
    let (orders, total) = OrderRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(OrderPage {
        orders,
        page,
        limit,
        total,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// PUT /api/orders/{id}/status
///
/// # Errors
///
/// Returns 400 for transitions the order lifecycle does not allow.
pub async fn admin_update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Order>> {
    let order = load_visible(&state, id, &admin).await?;
    let updated = lifecycle::admin_update_status(
        state.pool(),
        &order,
        req.order_status,
        req.payment_status,
    )
    .await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct ReturnDecisionRequest {
    pub decision: ReturnDecision,
}

/// PUT /api/orders/{id}/return
///
/// # Errors
///
/// Returns 400 for decisions the return workflow does not allow.
pub async fn admin_decide_return(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(req): Json<ReturnDecisionRequest>,
) -> Result<Json<Order>> {
    let order = load_visible(&state, id, &admin).await?;
    tracing::info!(
        order_id = %id,
        admin_id = %admin.id,
        decision = ?req.decision,
        "Return decision"
    );
    Ok(Json(
        lifecycle::admin_decide_return(state.pool(), &order, req.decision).await?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use drape_core::{PaymentMethod, UserId};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ApiConfig;

    fn user(id: i32, is_admin: bool) -> User {
        User {
            id: UserId::new(id),
            name: "Anjali".to_string(),
            email: None,
            mobile: None,
            has_password: true,
            google_linked: false,
            is_admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order_of(owner: i32) -> Order {
        Order::for_tests(
            UserId::new(owner),
            PaymentMethod::Razorpay,
            OrderStatus::Placed,
            PaymentStatus::Pending,
        )
    }

    fn status_of(result: Result<()>) -> Option<StatusCode> {
        result.err().map(|e| e.into_response().status())
    }

    #[test]
    fn test_owner_and_admin_can_view() {
        let order = order_of(7);
        assert!(ensure_visible(&order, &user(7, false)).is_ok());
        assert!(ensure_visible(&order, &user(1, true)).is_ok());
    }

    #[test]
    fn test_other_customer_cannot_view() {
        let order = order_of(7);
        assert_eq!(
            status_of(ensure_visible(&order, &user(8, false))),
            Some(StatusCode::FORBIDDEN)
        );
    }

    #[test]
    fn test_admin_cannot_act_as_customer() {
        let order = order_of(7);
        assert!(ensure_owner(&order, &user(7, false)).is_ok());
        assert_eq!(
            status_of(ensure_owner(&order, &user(1, true))),
            Some(StatusCode::FORBIDDEN)
        );
        assert_eq!(
            status_of(ensure_owner(&order, &user(8, false))),
            Some(StatusCode::FORBIDDEN)
        );
    }

    #[test]
    fn test_order_state_rejections_are_bad_requests() {
        let err: AppError =
            OrderError::Rejected("This order has been cancelled".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        let err: AppError = OrderError::SignatureMismatch.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    async fn call(method: &str, uri: &str, body: &str) -> StatusCode {
        let config = ApiConfig::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/drape_test")
            .unwrap();
        let state = AppState::new(config, pool).unwrap();
        let app = crate::routes::order_routes().with_state(state);
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_order_actions_require_token() {
        let body = serde_json::json!({
            "razorpay_order_id": "order_ABC",
            "razorpay_payment_id": "pay_1",
            "razorpay_signature": "00",
        })
        .to_string();
        assert_eq!(call("POST", "/1/verify-payment", &body).await, StatusCode::UNAUTHORIZED);
        assert_eq!(call("POST", "/1/cancel", "{}").await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            call("POST", "/1/return", r#"{"reason":"Too long"}"#).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(call("GET", "/1/invoice", "").await, StatusCode::UNAUTHORIZED);
        assert_eq!(call("GET", "/", "").await, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_order_query_parses_statuses() {
        let query: OrderQuery = serde_json::from_value(serde_json::json!({
            "status": "shipped",
            "payment_status": "awaiting_confirmation"
        }))
        .unwrap();
        assert_eq!(query.status, Some(OrderStatus::Shipped));
        assert_eq!(query.payment_status, Some(PaymentStatus::AwaitingConfirmation));
    }

    #[test]
    fn test_return_decision_parses() {
        let req: ReturnDecisionRequest =
            serde_json::from_value(serde_json::json!({ "decision": "complete" })).unwrap();
        assert_eq!(req.decision, ReturnDecision::Complete);
        assert!(
            serde_json::from_value::<ReturnDecisionRequest>(
                serde_json::json!({ "decision": "refund" })
            )
            .is_err()
        );
    }
}
