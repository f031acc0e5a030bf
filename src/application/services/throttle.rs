use std::time::Duration;

const MILLIS_PER_HOUR: u64 = 3_600_000;

/// Fixed-cadence pacing: the gap the worker keeps between sequential sends
/// within one job. Not a token bucket; no bursts. A rate of 1 means one send
/// per hour. Zero is treated as one; bound enforcement beyond positivity is
/// the submission boundary's concern.
pub fn inter_send_delay(throttle_per_hour: u32) -> Duration {
    Duration::from_millis(MILLIS_PER_HOUR / u64::from(throttle_per_hour.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_per_hour_is_an_hour_apart() {
        assert_eq!(inter_send_delay(1), Duration::from_millis(3_600_000));
    }

    #[test]
    fn hourly_rate_divides_down_to_millis() {
        assert_eq!(inter_send_delay(3_600), Duration::from_secs(1));
        assert_eq!(inter_send_delay(60), Duration::from_secs(60));
        assert_eq!(inter_send_delay(7_200), Duration::from_millis(500));
    }

    #[test]
    fn zero_rate_does_not_divide_by_zero() {
        assert_eq!(inter_send_delay(0), Duration::from_millis(3_600_000));
    }
}
