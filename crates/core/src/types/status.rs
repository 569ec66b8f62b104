//! Status enums for orders, payments, returns, coupons and homepage content.
//!
//! Every enum is stored as `TEXT` using the same snake_case spelling it has
//! in JSON, via `as_str()` / `FromStr`.

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted status string is unknown.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stored / serialized spelling.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseStatusError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    /// Fulfilment state of an order.
    OrderStatus, "order status" {
        /// Created, waiting for payment or confirmation.
        Placed => "placed",
        /// Accepted by the store (paid, or cash on delivery).
        Confirmed => "confirmed",
        /// Handed to the courier.
        Shipped => "shipped",
        /// Received by the customer; starts the return window.
        Delivered => "delivered",
        /// Cancelled by the customer or the store.
        Cancelled => "cancelled",
    }
}

impl OrderStatus {
    /// Whether an admin may move an order from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Placed, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether the customer may still cancel the order themselves.
    #[must_use]
    pub const fn is_customer_cancellable(self) -> bool {
        matches!(self, Self::Placed | Self::Confirmed)
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

text_enum! {
    /// Payment state of an order.
    PaymentStatus, "payment status" {
        Pending => "pending",
        /// Customer submitted a UPI reference; an admin has to confirm it.
        AwaitingConfirmation => "awaiting_confirmation",
        Paid => "paid",
        Failed => "failed",
        /// A paid order was cancelled or returned; money still has to go back.
        RefundPending => "refund_pending",
        Refunded => "refunded",
    }
}

text_enum! {
    /// How the customer pays.
    PaymentMethod, "payment method" {
        Razorpay => "razorpay",
        Upi => "upi",
        Cod => "cod",
    }
}

impl PaymentMethod {
    /// Whether money is collected before shipping.
    #[must_use]
    pub const fn is_prepaid(self) -> bool {
        !matches!(self, Self::Cod)
    }
}

text_enum! {
    /// Return workflow state of an order.
    ReturnStatus, "return status" {
        NotRequested => "none",
        Requested => "requested",
        Approved => "approved",
        Rejected => "rejected",
        Completed => "completed",
    }
}

impl ReturnStatus {
    /// Whether an admin may move a return from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Completed)
        )
    }
}

text_enum! {
    /// How a coupon's `value` is applied.
    DiscountType, "discount type" {
        /// `value` rupees off.
        Flat => "flat",
        /// `value` percent off, optionally capped.
        Percent => "percent",
    }
}

text_enum! {
    /// Kind of homepage content block.
    SectionType, "section type" {
        Hero => "hero",
        MoodCard => "mood_card",
        Banner => "banner",
        FeaturedProducts => "featured_products",
        CollectionShowcase => "collection_showcase",
        CategoryGrid => "category_grid",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Placed.can_transition_to(OrderStatus::Placed));
    }

    #[test]
    fn test_customer_cancellable() {
        assert!(OrderStatus::Placed.is_customer_cancellable());
        assert!(OrderStatus::Confirmed.is_customer_cancellable());
        assert!(!OrderStatus::Shipped.is_customer_cancellable());
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        for from in OrderStatus::ALL.iter().filter(|s| s.is_terminal()) {
            assert!(OrderStatus::ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn test_return_transitions() {
        assert!(ReturnStatus::Requested.can_transition_to(ReturnStatus::Approved));
        assert!(ReturnStatus::Requested.can_transition_to(ReturnStatus::Rejected));
        assert!(ReturnStatus::Approved.can_transition_to(ReturnStatus::Completed));
        assert!(!ReturnStatus::NotRequested.can_transition_to(ReturnStatus::Approved));
        assert!(!ReturnStatus::Rejected.can_transition_to(ReturnStatus::Completed));
    }

    #[test]
    fn test_text_spelling_matches_serde() {
        for status in PaymentStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), *status);
        }
        assert_eq!(ReturnStatus::NotRequested.as_str(), "none");
        assert_eq!(SectionType::MoodCard.to_string(), "mood_card");
    }

    #[test]
    fn test_parse_unknown_status() {
        let err = "teleported".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.kind, "order status");
        assert_eq!(err.to_string(), "invalid order status: teleported");
    }

    #[test]
    fn test_prepaid_methods() {
        assert!(PaymentMethod::Razorpay.is_prepaid());
        assert!(PaymentMethod::Upi.is_prepaid());
        assert!(!PaymentMethod::Cod.is_prepaid());
    }
}
