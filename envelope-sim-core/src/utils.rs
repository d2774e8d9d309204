//! Module containing miscellaneous utility functions.

/// Two positions closer than this are the same position, m
pub const POSITION_EPSILON: f64 = 1e-6;
/// Two speeds closer than this are the same speed, m/s
pub const SPEED_EPSILON: f64 = 1e-5;

/// Returns true if every element of `data` is strictly greater than the previous one
pub fn is_strictly_increasing(data: &[f64]) -> bool {
    data.windows(2).all(|w| w[0] < w[1])
}

/// Returns true if `val1` and `val2` are within a relative/absolute `epsilon` of each other,
/// depending on magnitude.
pub fn almost_eq(val1: f64, val2: f64, epsilon: Option<f64>) -> bool {
    let epsilon = epsilon.unwrap_or(1e-8);
    ((val2 - val1) / (val1 + val2)).abs() < epsilon || (val2 - val1).abs() < epsilon
}

/// Returns true if `val1` is less than or equal to `val2` with some error margin, `epsilon`
pub fn almost_le(val1: f64, val2: f64, epsilon: Option<f64>) -> bool {
    let epsilon = epsilon.unwrap_or(1e-8);
    val1 < val2 * (1.0 + epsilon) || val1 < val2 + epsilon
}

/// Absolute comparison of two positions
pub fn are_positions_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= POSITION_EPSILON
}

/// Absolute comparison of two speeds
pub fn are_speeds_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= SPEED_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_almost_cmp() {
        assert!(almost_eq(1.0, 1.0 + 1e-10, None));
        assert!(!almost_eq(1.0, 1.1, None));
        assert!(almost_eq(1.0, 1.05, Some(0.1)));
        assert!(almost_eq(0.0, 0.0, None));
        assert!(almost_le(1.0 + 1e-10, 1.0, None));
        assert!(almost_le(0.0, 0.0, None));
        assert!(!almost_le(1.1, 1.0, None));
    }

    #[test]
    fn test_epsilon_cmp() {
        assert!(are_positions_equal(10.0, 10.0 + 5e-7));
        assert!(!are_positions_equal(10.0, 10.0 + 5e-6));
        assert!(are_speeds_equal(3.0, 3.0 - 5e-6));
        assert!(!are_speeds_equal(3.0, 3.0 - 5e-5));
    }

    #[test]
    fn test_strictly_increasing() {
        assert!(is_strictly_increasing(&[0.0, 1.0, 2.0]));
        assert!(!is_strictly_increasing(&[0.0, 1.0, 1.0]));
        assert!(is_strictly_increasing(&[]));
    }
}
