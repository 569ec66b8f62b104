//! Money helpers using decimal arithmetic.
//!
//! All amounts are rupees held in [`Decimal`] with two fractional digits.
//! Rounding is half-up (`MidpointAwayFromZero`), the way invoices are printed.

use rust_decimal::{Decimal, RoundingStrategy};

/// ISO 4217 code of the store currency.
pub const CURRENCY_CODE: &str = "INR";

/// Round an amount to paise precision.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `percent`% of `amount`, rounded to paise.
#[must_use]
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}

/// Convert rupees to integer paise, the unit payment gateways expect.
///
/// Returns `None` for negative amounts or values that do not fit in `i64`.
#[must_use]
pub fn to_paise(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }
    let paise = round_money(amount) * Decimal::ONE_HUNDRED;
    i64::try_from(paise.trunc()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap_or_default()
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec("10.005")), dec("10.01"));
        assert_eq!(round_money(dec("10.004")), dec("10.00"));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(dec("2499"), dec("5")), dec("124.95"));
        assert_eq!(percent_of(dec("999.99"), dec("12.5")), dec("125.00"));
        assert_eq!(percent_of(dec("100"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_to_paise() {
        assert_eq!(to_paise(dec("1499.50")), Some(149_950));
        assert_eq!(to_paise(Decimal::ZERO), Some(0));
        assert_eq!(to_paise(dec("-1")), None);
    }
}
