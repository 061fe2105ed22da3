//! NR3 number formatting for numeric command parameters.
//!
//! The instrument accepts numeric parameters in scientific notation. We always send one mantissa
//! digit, one decimal digit, and the exponent, e.g., `1.5E3` or `2.2E-3`.

use crate::TimeUnit;

/// Number of horizontal divisions on the instrument display.
pub const HORIZONTAL_DIVISIONS: f64 = 10.0;

/// Format a value as NR3 with one digit before and one digit after the decimal point.
///
/// The exponent only carries a sign when it is negative. Rounding is done on the exact binary
/// value and the output does not depend on the locale.
pub fn float_to_nr3(value: f64) -> String {
    format!("{value:.1E}")
}

/// Convert a time range to a time per division and format it as NR3.
///
/// # Arguments
/// * `value` - The full horizontal range in the given unit.
/// * `unit` - The time unit of `value`.
pub fn time_to_nr3(value: f64, unit: TimeUnit) -> String {
    float_to_nr3(value * unit.multiplier() / HORIZONTAL_DIVISIONS)
}
