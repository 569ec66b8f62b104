//! UPI payment deep links.

use rust_decimal::Decimal;

use drape_core::{CURRENCY_CODE, round_money};

/// Build a `upi://pay` link that UPI apps open with the payment prefilled.
#[must_use]
pub fn payment_link(vpa: &str, payee_name: &str, amount: Decimal, note: &str) -> String {
    format!(
        "upi://pay?pa={}&pn={}&am={:.2}&cu={CURRENCY_CODE}&tn={}",
        urlencoding::encode(vpa),
        urlencoding::encode(payee_name),
        round_money(amount),
        urlencoding::encode(note),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_link() {
        let link = payment_link(
            "drape@okicici",
            "Drape Sarees",
            "2499.5".parse().unwrap(),
            "Order DRP-20260101-ABC123",
        );
        assert_eq!(
            link,
            "upi://pay?pa=drape%40okicici&pn=Drape%20Sarees&am=2499.50&cu=INR&tn=Order%20DRP-20260101-ABC123"
        );
    }
}
