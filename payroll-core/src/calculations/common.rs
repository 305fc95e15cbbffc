//! Common utility functions for deduction calculations.
//!
//! This module provides the rounding helpers used by everything that formats
//! monetary output.

use rust_decimal::Decimal;

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// This follows standard financial rounding conventions where values at exactly
/// 0.005 are rounded up to 0.01 (away from zero).
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Formats an amount for output: rounded half-up, always two decimals.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::format_amount;
///
/// assert_eq!(format_amount(dec!(0)), "0.00");
/// assert_eq!(format_amount(dec!(1050.000)), "1050.00");
/// assert_eq!(format_amount(dec!(2.345)), "2.35");
/// ```
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", round_half_up(value))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // =========================================================================
    // round_half_up tests
    // =========================================================================

    #[test]
    fn round_half_up_rounds_down_below_midpoint() {
        let result = round_half_up(dec!(123.454));

        assert_eq!(result, dec!(123.45));
    }

    #[test]
    fn round_half_up_rounds_up_at_midpoint() {
        let result = round_half_up(dec!(123.455));

        assert_eq!(result, dec!(123.46));
    }

    #[test]
    fn round_half_up_handles_negative_values() {
        let result = round_half_up(dec!(-123.455));

        assert_eq!(result, dec!(-123.46));
    }

    #[test]
    fn round_half_up_handles_large_values() {
        let result = round_half_up(dec!(999999.999));

        assert_eq!(result, dec!(1000000.00));
    }

    // =========================================================================
    // format_amount tests
    // =========================================================================

    #[test]
    fn format_amount_pads_integers() {
        assert_eq!(format_amount(dec!(535)), "535.00");
    }

    #[test]
    fn format_amount_trims_extra_scale() {
        assert_eq!(format_amount(dec!(1050.000)), "1050.00");
    }

    #[test]
    fn format_amount_rounds_midpoint_away_from_zero() {
        assert_eq!(format_amount(dec!(0.125)), "0.13");
        assert_eq!(format_amount(dec!(-0.125)), "-0.13");
    }

    #[test]
    fn format_amount_keeps_negative_sign() {
        assert_eq!(format_amount(dec!(-315)), "-315.00");
    }
}
