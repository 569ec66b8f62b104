//! Checkout and the order lifecycle.
//!
//! Handlers call these functions after authorization; ownership checks stay
//! in the route layer.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use drape_core::{
    CURRENCY_CODE, OrderStatus, PaymentMethod, PaymentStatus, ReturnStatus, UserId,
};

use crate::db::orders::NewOrder;
use crate::db::{CartRepository, OrderRepository, RepositoryError, SettingsRepository};
use crate::models::{Cart, Order, OrderItem, ShippingAddress, StoreSettings};
use crate::services::pricing::{self, PricingError, Totals};
use crate::services::razorpay::{RazorpayClient, RazorpayError};
use crate::services::upi;

const ORDER_NUMBER_PREFIX: &str = "DRP";
const ORDER_SUFFIX_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Errors from checkout and order state changes.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("{0}")]
    InvalidAddress(String),

    #[error("{0} payments are not available")]
    PaymentMethodUnavailable(&'static str),

    /// Stock, product availability or a concurrent change rejected the request.
    #[error("{0}")]
    Rejected(String),

    #[error("Payment verification failed")]
    SignatureMismatch,

    #[error("Order not found")]
    NotFound,

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Razorpay(#[from] RazorpayError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for OrderError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Rejected(message),
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// What the client needs to collect payment for a new order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentInstructions {
    Razorpay {
        key_id: String,
        razorpay_order_id: String,
        /// Paise.
        amount: i64,
        currency: &'static str,
    },
    Upi {
        upi_link: String,
    },
}

/// A newly placed order.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInstructions>,
}

/// `DRP-YYYYMMDD-XXXXXX` with an unambiguous upper-case suffix.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.random_range(0..ORDER_SUFFIX_CHARS.len());
            char::from(ORDER_SUFFIX_CHARS.get(idx).copied().unwrap_or(b'X'))
        })
        .collect();
    format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", now.format("%Y%m%d"))
}

/// Starting order and payment status for a payment method.
#[must_use]
pub const fn initial_statuses(method: PaymentMethod) -> (OrderStatus, PaymentStatus) {
    match method {
        PaymentMethod::Cod => (OrderStatus::Confirmed, PaymentStatus::Pending),
        PaymentMethod::Razorpay | PaymentMethod::Upi => {
            (OrderStatus::Placed, PaymentStatus::Pending)
        }
    }
}

/// Whether a return may still be requested at `now`.
#[must_use]
pub fn within_return_window(
    delivered_at: Option<DateTime<Utc>>,
    window_days: i32,
    now: DateTime<Utc>,
) -> bool {
    delivered_at.is_some_and(|at| now <= at + Duration::days(i64::from(window_days)))
}

fn ensure_method_enabled(
    method: PaymentMethod,
    settings: &StoreSettings,
    razorpay: Option<&RazorpayClient>,
) -> Result<(), OrderError> {
    let enabled = match method {
        PaymentMethod::Cod => settings.cod_enabled,
        PaymentMethod::Upi => settings.upi_enabled && settings.upi_vpa.is_some(),
        PaymentMethod::Razorpay => settings.razorpay_enabled && razorpay.is_some(),
    };
    if enabled {
        Ok(())
    } else {
        Err(OrderError::PaymentMethodUnavailable(match method {
            PaymentMethod::Cod => "Cash on delivery",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Razorpay => "Online",
        }))
    }
}

/// Snapshot cart lines at their current effective price, checking stock.
fn snapshot_items(cart: &Cart) -> Result<Vec<OrderItem>, OrderError> {
    if cart.is_empty() {
        return Err(OrderError::EmptyCart);
    }
    cart.items
        .iter()
        .map(|line| {
            if line.quantity > line.stock {
                return Err(OrderError::Rejected(format!(
                    "Only {} left in stock for {}",
                    line.stock.max(0),
                    line.name
                )));
            }
            Ok(OrderItem {
                product_id: line.product_id,
                name: line.name.clone(),
                image: line.image.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                color: line.color.clone(),
            })
        })
        .collect()
}

/// Turn the user's cart into an order.
///
/// # Errors
///
/// Returns `OrderError` for an empty cart, invalid address, unavailable
/// payment method, coupon rejection, stock shortage or gateway failure.
#[instrument(
    skip(pool, razorpay, request),
    fields(user_id = %user_id, method = %request.payment_method)
)]
pub async fn place_order(
    pool: &PgPool,
    razorpay: Option<&RazorpayClient>,
    user_id: UserId,
    request: &CheckoutRequest,
) -> Result<PlacedOrder, OrderError> {
    let cart = Cart::from_lines(CartRepository::new(pool).list_lines(user_id).await?);
    if cart.is_empty() {
        return Err(OrderError::EmptyCart);
    }
    request
        .shipping_address
        .validate()
        .map_err(OrderError::InvalidAddress)?;

    let settings = SettingsRepository::new(pool).get().await?;
    ensure_method_enabled(request.payment_method, &settings, razorpay)?;

    let items = snapshot_items(&cart)?;

    let coupon = match request.coupon_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            Some(pricing::apply_coupon(pool, code, user_id, cart.subtotal).await?)
        }
        _ => None,
    };
    let coupon_discount = coupon.as_ref().map_or(Decimal::ZERO, |c| c.discount);
    let totals: Totals =
        pricing::checkout_totals(cart.subtotal, coupon_discount, request.payment_method, &settings);

    let order_number = generate_order_number(Utc::now());
    let (order_status, payment_status) = initial_statuses(request.payment_method);

    let gateway_order = match (request.payment_method, razorpay) {
        (PaymentMethod::Razorpay, Some(client)) => {
            Some(client.create_order(totals.total, &order_number).await?)
        }
        _ => None,
    };

    let new = NewOrder {
        order_number,
        user_id,
        items,
        subtotal: totals.subtotal,
        coupon_discount: totals.coupon_discount,
        upi_discount: totals.upi_discount,
        shipping_fee: totals.shipping_fee,
        cod_fee: totals.cod_fee,
        total: totals.total,
        coupon: coupon.map(|c| (c.coupon.id, c.code)),
        payment_method: request.payment_method,
        payment_status,
        order_status,
        shipping_address: request.shipping_address.clone(),
        razorpay_order_id: gateway_order.as_ref().map(|o| o.id.clone()),
    };
    let order = OrderRepository::new(pool).place(&new).await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.total,
        "Order placed"
    );

    let payment = match (gateway_order, razorpay) {
        (Some(gateway), Some(client)) => Some(PaymentInstructions::Razorpay {
            key_id: client.key_id().to_string(),
            razorpay_order_id: gateway.id,
            amount: gateway.amount,
            currency: CURRENCY_CODE,
        }),
        _ => upi_instructions(&order, &settings),
    };

    Ok(PlacedOrder { order, payment })
}

fn upi_instructions(order: &Order, settings: &StoreSettings) -> Option<PaymentInstructions> {
    if order.payment_method != PaymentMethod::Upi {
        return None;
    }
    let vpa = settings.upi_vpa.as_deref()?;
    let payee = settings
        .upi_payee_name
        .as_deref()
        .unwrap_or(&settings.store_name);
    Some(PaymentInstructions::Upi {
        upi_link: upi::payment_link(
            vpa,
            payee,
            order.total,
            &format!("Order {}", order.order_number),
        ),
    })
}

/// An order can take a Razorpay payment only while it is an uncancelled
/// Razorpay order whose payment is pending or failed.
fn ensure_awaiting_razorpay(order: &Order) -> Result<(), OrderError> {
    if order.payment_method != PaymentMethod::Razorpay {
        return Err(OrderError::Rejected("This order is not paid online".to_string()));
    }
    if order.order_status == OrderStatus::Cancelled {
        return Err(OrderError::Rejected("This order has been cancelled".to_string()));
    }
    if !matches!(order.payment_status, PaymentStatus::Pending | PaymentStatus::Failed) {
        return Err(OrderError::Rejected("Payment is already settled".to_string()));
    }
    Ok(())
}

/// Whether the callback names this order's gateway order and carries a valid signature.
fn callback_matches(
    client: &RazorpayClient,
    order: &Order,
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    signature: &str,
) -> bool {
    order.razorpay_order_id.as_deref() == Some(razorpay_order_id)
        && client.verify_signature(razorpay_order_id, razorpay_payment_id, signature)
}

/// Check a Razorpay checkout callback and record the outcome.
///
/// # Errors
///
/// Returns `Rejected` for orders that cannot take a payment, and
/// `SignatureMismatch` (after marking the payment failed) when the signature
/// or order id does not match.
pub async fn verify_razorpay_payment(
    pool: &PgPool,
    client: &RazorpayClient,
    order: &Order,
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    signature: &str,
) -> Result<Order, OrderError> {
    ensure_awaiting_razorpay(order)?;
    let repo = OrderRepository::new(pool);

    if !callback_matches(client, order, razorpay_order_id, razorpay_payment_id, signature) {
        tracing::warn!(order_id = %order.id, "Razorpay signature mismatch");
        repo.mark_payment_failed(order.id).await?;
        return Err(OrderError::SignatureMismatch);
    }

    Ok(repo
        .record_razorpay_payment(order.id, razorpay_payment_id)
        .await?)
}

/// Record a customer-submitted UPI transaction reference.
///
/// # Errors
///
/// Returns `Rejected` for non-UPI or already settled orders.
pub async fn submit_upi_reference(
    pool: &PgPool,
    order: &Order,
    reference: &str,
) -> Result<Order, OrderError> {
    let reference = reference.trim();
    if order.payment_method != PaymentMethod::Upi {
        return Err(OrderError::Rejected("This order is not a UPI order".to_string()));
    }
    if reference.is_empty() || reference.len() > 64 {
        return Err(OrderError::Rejected("A valid UPI reference is required".to_string()));
    }
    if !matches!(
        order.payment_status,
        PaymentStatus::Pending | PaymentStatus::Failed | PaymentStatus::AwaitingConfirmation
    ) || order.order_status == OrderStatus::Cancelled
    {
        return Err(OrderError::Rejected("Payment is already settled".to_string()));
    }

    Ok(OrderRepository::new(pool)
        .set_upi_reference(order.id, reference)
        .await?)
}

/// Customer cancellation.
///
/// # Errors
///
/// Returns `Rejected` once the order has shipped.
pub async fn cancel_by_customer(pool: &PgPool, order: &Order) -> Result<Order, OrderError> {
    ensure_customer_cancellable(order)?;
    let cancelled = OrderRepository::new(pool).cancel(order).await?;
    tracing::info!(order_id = %order.id, "Order cancelled by customer");
    Ok(cancelled)
}

fn ensure_customer_cancellable(order: &Order) -> Result<(), OrderError> {
    if order.order_status.is_customer_cancellable() {
        Ok(())
    } else {
        Err(OrderError::Rejected(
            "This order can no longer be cancelled".to_string(),
        ))
    }
}

/// Checks a return request against the order state and the return window.
fn ensure_returnable(
    order: &Order,
    reason: &str,
    window_days: i32,
    now: DateTime<Utc>,
) -> Result<(), OrderError> {
    if reason.is_empty() {
        return Err(OrderError::Rejected(
            "Please tell us why you are returning this order".to_string(),
        ));
    }
    if order.order_status != OrderStatus::Delivered {
        return Err(OrderError::Rejected(
            "Only delivered orders can be returned".to_string(),
        ));
    }
    if order.return_status != ReturnStatus::NotRequested {
        return Err(OrderError::Rejected(
            "A return already exists for this order".to_string(),
        ));
    }
    if !within_return_window(order.delivered_at, window_days, now) {
        return Err(OrderError::Rejected(format!(
            "Returns are accepted within {window_days} days of delivery"
        )));
    }
    Ok(())
}

/// Customer return request.
///
/// # Errors
///
/// Returns `Rejected` unless the order is delivered, has no return yet and is
/// inside the return window.
pub async fn request_return(
    pool: &PgPool,
    order: &Order,
    reason: &str,
) -> Result<Order, OrderError> {
    let reason = reason.trim();
    let settings = SettingsRepository::new(pool).get().await?;
    ensure_returnable(order, reason, settings.return_window_days, Utc::now())?;

    Ok(OrderRepository::new(pool).request_return(order.id, reason).await?)
}

/// Admin status change. Cancellation goes through the stock-restoring path.
///
/// # Errors
///
/// Returns `Rejected` for transitions the order lifecycle does not allow.
pub async fn admin_update_status(
    pool: &PgPool,
    order: &Order,
    order_status: Option<OrderStatus>,
    payment_status: Option<PaymentStatus>,
) -> Result<Order, OrderError> {
    if order_status.is_none() && payment_status.is_none() {
        return Err(OrderError::Rejected("Nothing to update".to_string()));
    }
    let repo = OrderRepository::new(pool);

    match order_status {
        Some(next) if next == order.order_status => {}
        Some(next) if !order.order_status.can_transition_to(next) => {
            return Err(OrderError::Rejected(format!(
                "Cannot move order from {} to {next}",
                order.order_status
            )));
        }
        Some(OrderStatus::Cancelled) => {
            let cancelled = repo.cancel(order).await?;
            return match payment_status {
                Some(ps) => Ok(repo
                    .update_status(order.id, OrderStatus::Cancelled, None, Some(ps))
                    .await?),
                None => Ok(cancelled),
            };
        }
        Some(_) | None => {}
    }

    let next = order_status.filter(|s| *s != order.order_status);
    let updated = repo
        .update_status(order.id, order.order_status, next, payment_status)
        .await?;
    tracing::info!(
        order_id = %order.id,
        order_status = %updated.order_status,
        payment_status = %updated.payment_status,
        "Order status updated"
    );
    Ok(updated)
}

/// Admin decision on a return request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnDecision {
    Approve,
    Reject,
    Complete,
}

impl ReturnDecision {
    #[must_use]
    pub const fn target(self) -> ReturnStatus {
        match self {
            Self::Approve => ReturnStatus::Approved,
            Self::Reject => ReturnStatus::Rejected,
            Self::Complete => ReturnStatus::Completed,
        }
    }
}

/// Apply a return decision. Completing a return of a paid order marks it refunded.
///
/// # Errors
///
/// Returns `Rejected` for decisions the return workflow does not allow.
pub async fn admin_decide_return(
    pool: &PgPool,
    order: &Order,
    decision: ReturnDecision,
) -> Result<Order, OrderError> {
    let next = decision.target();
    if !order.return_status.can_transition_to(next) {
        return Err(OrderError::Rejected(format!(
            "Cannot move return from {} to {next}",
            order.return_status
        )));
    }

    let refund = (next == ReturnStatus::Completed
        && matches!(
            order.payment_status,
            PaymentStatus::Paid | PaymentStatus::RefundPending
        ))
    .then_some(PaymentStatus::Refunded);

    Ok(OrderRepository::new(pool)
        .update_return(order.id, order.return_status, next, refund)
        .await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use drape_core::{CartItemId, ProductId};
    use hmac::{Hmac, Mac};
    use secrecy::SecretString;
    use sha2::Sha256;

    use super::*;
    use crate::config::RazorpayConfig;
    use crate::models::CartLine;

    fn line(qty: i32, stock: i32) -> CartLine {
        let unit_price = Decimal::new(1499, 0);
        CartLine {
            id: CartItemId::new(1),
            product_id: ProductId::new(9),
            name: "Chanderi Cotton".to_string(),
            slug: "chanderi-cotton".to_string(),
            image: None,
            color: None,
            quantity: qty,
            unit_price,
            line_total: unit_price * Decimal::from(qty),
            stock,
        }
    }

    fn order(
        method: PaymentMethod,
        order_status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Order {
        Order::for_tests(UserId::new(4), method, order_status, payment_status)
    }

    fn razorpay_client(secret: &str) -> RazorpayClient {
        RazorpayClient::new(
            &RazorpayConfig {
                key_id: "rzp_test_key".to_string(),
                key_secret: SecretString::from(secret.to_string()),
            },
            reqwest::Client::new(),
        )
    }

    fn sign(secret: &str, message: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_razorpay_payment_needs_online_order() {
        for method in [PaymentMethod::Cod, PaymentMethod::Upi] {
            let cod = order(method, OrderStatus::Confirmed, PaymentStatus::Pending);
            let err = ensure_awaiting_razorpay(&cod).unwrap_err();
            assert_eq!(err.to_string(), "This order is not paid online");
        }
    }

    #[test]
    fn test_razorpay_payment_rejected_after_cancel() {
        let cancelled =
            order(PaymentMethod::Razorpay, OrderStatus::Cancelled, PaymentStatus::Pending);
        let err = ensure_awaiting_razorpay(&cancelled).unwrap_err();
        assert_eq!(err.to_string(), "This order has been cancelled");
    }

    #[test]
    fn test_razorpay_payment_not_recorded_twice() {
        let paid = order(PaymentMethod::Razorpay, OrderStatus::Confirmed, PaymentStatus::Paid);
        let err = ensure_awaiting_razorpay(&paid).unwrap_err();
        assert_eq!(err.to_string(), "Payment is already settled");

        let refunding =
            order(PaymentMethod::Razorpay, OrderStatus::Cancelled, PaymentStatus::RefundPending);
        assert!(ensure_awaiting_razorpay(&refunding).is_err());
    }

    #[test]
    fn test_razorpay_payment_allowed_while_pending_or_failed() {
        let pending = order(PaymentMethod::Razorpay, OrderStatus::Placed, PaymentStatus::Pending);
        assert!(ensure_awaiting_razorpay(&pending).is_ok());
        let retry = order(PaymentMethod::Razorpay, OrderStatus::Placed, PaymentStatus::Failed);
        assert!(ensure_awaiting_razorpay(&retry).is_ok());
    }

    #[test]
    fn test_callback_signature_checks() {
        let client = razorpay_client("rzp-secret");
        let pending = order(PaymentMethod::Razorpay, OrderStatus::Placed, PaymentStatus::Pending);
        let good = sign("rzp-secret", "order_ABC|pay_123");

        assert!(callback_matches(&client, &pending, "order_ABC", "pay_123", &good));
        // Valid signature for a different gateway order.
        let other = sign("rzp-secret", "order_XYZ|pay_123");
        assert!(!callback_matches(&client, &pending, "order_XYZ", "pay_123", &other));
        // Tampered payment id.
        assert!(!callback_matches(&client, &pending, "order_ABC", "pay_999", &good));
        // Signed with the wrong secret.
        let forged = sign("not-the-secret", "order_ABC|pay_123");
        assert!(!callback_matches(&client, &pending, "order_ABC", "pay_123", &forged));
    }

    #[test]
    fn test_cancel_only_before_shipping() {
        let placed = order(PaymentMethod::Upi, OrderStatus::Placed, PaymentStatus::Pending);
        assert!(ensure_customer_cancellable(&placed).is_ok());
        let confirmed = order(PaymentMethod::Cod, OrderStatus::Confirmed, PaymentStatus::Pending);
        assert!(ensure_customer_cancellable(&confirmed).is_ok());

        for status in [OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Cancelled] {
            let late = order(PaymentMethod::Cod, status, PaymentStatus::Pending);
            let err = ensure_customer_cancellable(&late).unwrap_err();
            assert_eq!(err.to_string(), "This order can no longer be cancelled");
        }
    }

    #[test]
    fn test_return_outside_window_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 4, 20, 9, 0, 0).unwrap();
        let mut delivered = order(PaymentMethod::Cod, OrderStatus::Delivered, PaymentStatus::Paid);
        delivered.delivered_at = Some(now - Duration::days(8));

        let err = ensure_returnable(&delivered, "Colour differs", 7, now).unwrap_err();
        assert_eq!(err.to_string(), "Returns are accepted within 7 days of delivery");

        delivered.delivered_at = Some(now - Duration::days(6));
        assert!(ensure_returnable(&delivered, "Colour differs", 7, now).is_ok());
    }

    #[test]
    fn test_return_state_checks() {
        let now = Utc::now();
        let shipped = order(PaymentMethod::Cod, OrderStatus::Shipped, PaymentStatus::Pending);
        assert_eq!(
            ensure_returnable(&shipped, "Too long", 7, now).unwrap_err().to_string(),
            "Only delivered orders can be returned"
        );

        let mut delivered = order(PaymentMethod::Cod, OrderStatus::Delivered, PaymentStatus::Paid);
        delivered.delivered_at = Some(now);
        assert!(ensure_returnable(&delivered, "", 7, now).is_err());

        delivered.return_status = ReturnStatus::Requested;
        assert_eq!(
            ensure_returnable(&delivered, "Too long", 7, now).unwrap_err().to_string(),
            "A return already exists for this order"
        );
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        let number = generate_order_number(now);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "DRP");
        assert_eq!(parts[1], "20260309");
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].bytes().all(|b| ORDER_SUFFIX_CHARS.contains(&b)));
    }

    #[test]
    fn test_initial_statuses() {
        assert_eq!(
            initial_statuses(PaymentMethod::Cod),
            (OrderStatus::Confirmed, PaymentStatus::Pending)
        );
        assert_eq!(
            initial_statuses(PaymentMethod::Razorpay),
            (OrderStatus::Placed, PaymentStatus::Pending)
        );
        assert_eq!(
            initial_statuses(PaymentMethod::Upi),
            (OrderStatus::Placed, PaymentStatus::Pending)
        );
    }

    #[test]
    fn test_return_window() {
        let delivered = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        assert!(within_return_window(Some(delivered), 7, delivered + Duration::days(7)));
        assert!(!within_return_window(
            Some(delivered),
            7,
            delivered + Duration::days(7) + Duration::seconds(1)
        ));
        assert!(!within_return_window(None, 7, delivered));
        assert!(!within_return_window(Some(delivered), 0, delivered + Duration::seconds(1)));
    }

    #[test]
    fn test_snapshot_rejects_empty_cart() {
        let cart = Cart::from_lines(Vec::new());
        assert!(matches!(snapshot_items(&cart), Err(OrderError::EmptyCart)));
    }

    #[test]
    fn test_snapshot_checks_stock() {
        let cart = Cart::from_lines(vec![line(3, 2)]);
        let err = snapshot_items(&cart).unwrap_err();
        assert_eq!(err.to_string(), "Only 2 left in stock for Chanderi Cotton");

        let cart = Cart::from_lines(vec![line(2, 2)]);
        let items = snapshot_items(&cart).unwrap();
        assert_eq!(items[0].unit_price, Decimal::new(1499, 0));
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn test_conflict_maps_to_rejected() {
        let err =
            OrderError::from(RepositoryError::Conflict("Insufficient stock for X".to_string()));
        assert!(matches!(err, OrderError::Rejected(ref m) if m == "Insufficient stock for X"));
    }

    #[test]
    fn test_return_decision_targets() {
        assert_eq!(ReturnDecision::Approve.target(), ReturnStatus::Approved);
        assert_eq!(ReturnDecision::Complete.target(), ReturnStatus::Completed);
    }
}
