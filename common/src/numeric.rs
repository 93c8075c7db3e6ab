//! Rate arithmetic helpers.

/// Decimal places every stored rate is rounded to.
pub const RATE_DECIMALS: u32 = 4;

/// Smallest representable positive rate at [`RATE_DECIMALS`] precision.
pub const MIN_RATE: f64 = 0.0001;

/// Round a rate to [`RATE_DECIMALS`] decimal places.
pub fn round_rate(value: f64) -> f64 {
    let scale = 10f64.powi(RATE_DECIMALS as i32);
    (value * scale).round() / scale
}

/// Check two rates for equality within cumulative 4-decimal rounding.
pub fn rates_close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_rate() {
        assert_eq!(round_rate(3.14159), 3.1416);
        assert_eq!(round_rate(0.28571), 0.2857);
        assert_eq!(round_rate(2.0), 2.0);
    }

    #[test]
    fn test_round_rate_negative_half() {
        // f64::round rounds half away from zero
        assert_eq!(round_rate(0.00005), 0.0001);
    }

    #[test]
    fn test_rates_close() {
        assert!(rates_close(0.2857, 1.0 / 3.5, 0.0001));
        assert!(!rates_close(0.28, 0.29, 0.0001));
    }
}
