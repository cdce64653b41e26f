use chrono::TimeDelta;
use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Mass of a commodity. Fixed-point so that missing-mass tests are exact.
///
/// The range is about +-2.147e9 with a resolution of 2^-32. Sums over a
/// whole plan can leave that range and must use checked arithmetic.
pub type Mass = Fixed64;

/// Transfer rate in mass per hour.
pub type Rate = Fixed64;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Convert an f64 to Fixed64. Use only for initialization and data loading.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert an f64 from untrusted input. None for NaN, infinities and values
/// outside the Fixed64 range.
#[inline]
pub fn checked_f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and reporting.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Checked multiplication for Fixed64 that returns None on overflow.
#[inline]
pub fn checked_mul_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_mul(b)
}

/// Checked addition for Fixed64 that returns None on overflow.
#[inline]
pub fn checked_add_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_add(b)
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// Length of a duration in hours.
pub fn hours(duration: TimeDelta) -> Fixed64 {
    Fixed64::from_num(duration.num_milliseconds() as f64 / MILLIS_PER_HOUR)
}

/// Time needed to move `mass` at `rate`, rounded up to the next millisecond.
/// Returns None for a non-positive rate.
pub fn duration_for_mass(mass: Mass, rate: Rate) -> Option<TimeDelta> {
    if rate <= Fixed64::ZERO {
        return None;
    }
    let hours = checked_div_64(mass, rate)?;
    let millis = (fixed64_to_f64(hours) * MILLIS_PER_HOUR).ceil() as i64;
    Some(TimeDelta::milliseconds(millis))
}

/// Rate that moves `mass` in exactly `duration`. Returns None for an empty window.
pub fn rate_for_window(mass: Mass, duration: TimeDelta) -> Option<Rate> {
    let h = hours(duration);
    if h <= Fixed64::ZERO {
        return None;
    }
    checked_div_64(mass, h)
}
