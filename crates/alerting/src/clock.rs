//! Monotonic millisecond time helpers shared by the alarm and the DMS detectors

/// Milliseconds from `since` to `now`, clamped at zero for clocks that step backwards
pub fn elapsed_ms(since_ms: i64, now_ms: i64) -> i64 {
    now_ms.saturating_sub(since_ms).max(0)
}

/// `now + offset`, saturating at the ends of the clock range
pub fn deadline_ms(now_ms: i64, offset_ms: i64) -> i64 {
    now_ms.saturating_add(offset_ms)
}

pub fn secs_to_ms(secs: f32) -> i64 {
    (secs * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_clamps_backwards_time() {
        assert_eq!(elapsed_ms(1_000, 500), 0);
        assert_eq!(elapsed_ms(500, 1_000), 500);
        assert_eq!(elapsed_ms(i64::MIN, i64::MAX), i64::MAX);
    }

    #[test]
    fn test_deadline_saturates() {
        assert_eq!(deadline_ms(1_000, 500), 1_500);
        assert_eq!(deadline_ms(i64::MAX - 10, 3_000), i64::MAX);
    }

    #[test]
    fn test_secs_to_ms_rounds() {
        assert_eq!(secs_to_ms(0.6), 600);
        assert_eq!(secs_to_ms(1.5), 1_500);
    }
}
