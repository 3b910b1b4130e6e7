//! Monetary helpers.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds an amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount * percent / 100`, rounded to cents.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}

/// Parses a decimal amount as written in configuration or callbacks.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    raw.trim().parse::<Decimal>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2));
        assert_eq!(round_money(Decimal::new(1004, 3)), Decimal::new(100, 2));
    }

    #[test]
    fn test_percent_of() {
        // 2% of 30.00
        assert_eq!(percent_of(Decimal::new(3000, 2), Decimal::from(2)), Decimal::new(60, 2));
        // 8% of 99.99 = 7.9992
        assert_eq!(percent_of(Decimal::new(9999, 2), Decimal::from(8)), Decimal::new(800, 2));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 29.40 "), Some(Decimal::new(2940, 2)));
        assert_eq!(parse_amount("abc"), None);
    }
}
