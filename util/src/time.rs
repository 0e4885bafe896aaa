//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a frequency in hertz into a period in seconds, or `None` if the frequency is not
/// strictly positive.
pub fn period_from_hz(frequency_hz: f64) -> Option<std::time::Duration> {
    if frequency_hz > 0.0 && frequency_hz.is_finite() {
        Some(std::time::Duration::from_secs_f64(1.0 / frequency_hz))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
        assert_eq!(
            period_from_hz(100.0),
            Some(std::time::Duration::from_millis(10))
        );
        assert_eq!(period_from_hz(0.0), None);
    }
}
