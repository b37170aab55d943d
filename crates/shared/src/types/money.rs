//! Monetary quantization helpers.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! All monetary values are `rust_decimal::Decimal`; intermediates carry full
//! precision and are quantized to cents only at published outputs.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits for monetary amounts.
pub const CENT_PLACES: u32 = 2;

/// Quantizes a monetary amount to cents.
///
/// Uses round-half-up (midpoint away from zero), the rounding policy for all
/// published installment and total figures.
#[must_use]
pub fn quantize_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CENT_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quantize_no_change_at_two_places() {
        assert_eq!(quantize_cents(dec!(100.25)), dec!(100.25));
    }

    #[test]
    fn test_quantize_rounds_half_up() {
        // Half-up, not banker's: 0.125 -> 0.13, 0.135 -> 0.14.
        assert_eq!(quantize_cents(dec!(0.125)), dec!(0.13));
        assert_eq!(quantize_cents(dec!(0.135)), dec!(0.14));
    }

    #[test]
    fn test_quantize_truncates_below_midpoint() {
        assert_eq!(quantize_cents(dec!(15783.768711)), dec!(15783.77));
        assert_eq!(quantize_cents(dec!(13888.888888)), dec!(13888.89));
        assert_eq!(quantize_cents(dec!(99.994)), dec!(99.99));
    }

    #[test]
    fn test_quantize_negative_rounds_away_from_zero() {
        assert_eq!(quantize_cents(dec!(-0.125)), dec!(-0.13));
    }
}
