//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Integer percentage of `part / whole`, floored and clamped to `0..=100`.
/// A zero `whole` reads as complete.
#[must_use]
pub fn ratio_percent(part: u32, whole: u32) -> u8 {
    if whole == 0 {
        return 100;
    }
    let pct = u64::from(part.min(whole)) * 100 / u64::from(whole);
    cast::<u64, u8>(pct).unwrap_or(100)
}

/// Clamp a probability to `0.0..=1.0`, returning 0.0 for non-finite values.
#[must_use]
pub fn clamp_probability(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_floors_and_clamps() {
        assert_eq!(ratio_percent(1, 3), 33);
        assert_eq!(ratio_percent(5, 4), 100);
        assert_eq!(ratio_percent(0, 0), 100);
        assert_eq!(ratio_percent(0, 500), 0);
    }

    #[test]
    fn probability_handles_non_finite() {
        assert!((clamp_probability(f64::NAN) - 0.0).abs() < f64::EPSILON);
        assert!((clamp_probability(1.5) - 1.0).abs() < f64::EPSILON);
        assert!((clamp_probability(-0.2) - 0.0).abs() < f64::EPSILON);
    }
}
