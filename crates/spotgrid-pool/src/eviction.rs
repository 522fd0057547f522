//! Per-interval eviction probability.

/// Probability that one preemptible node is evicted within `elapsed_secs`,
/// given a mean rate of `rate_per_minute` evictions per node per minute.
///
/// The per-second hazard `λ/60` is compounded over the interval, so the
/// result stays below 1 for long gaps instead of growing linearly.
pub fn eviction_probability(rate_per_minute: f64, elapsed_secs: f64) -> f64 {
    if elapsed_secs.is_nan() || rate_per_minute.is_nan() {
        return 0.0;
    }
    if elapsed_secs <= 0.0 || rate_per_minute <= 0.0 {
        return 0.0;
    }
    let per_second = (rate_per_minute / 60.0).min(1.0);
    1.0 - (1.0 - per_second).powf(elapsed_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_or_zero_interval_never_evicts() {
        assert_eq!(eviction_probability(0.0, 30.0), 0.0);
        assert_eq!(eviction_probability(1.0, 0.0), 0.0);
        assert_eq!(eviction_probability(1.0, -5.0), 0.0);
    }

    #[test]
    fn compounds_per_second_hazard() {
        // λ = 6/min → 0.1 per second; five seconds → 1 - 0.9^5.
        let p = eviction_probability(6.0, 5.0);
        assert!((p - (1.0 - 0.9f64.powi(5))).abs() < 1e-12);
    }

    #[test]
    fn does_not_overshoot_for_long_intervals() {
        // The linear form λ·Δt/60 would give 10.0 here.
        let p = eviction_probability(6.0, 100.0);
        assert!(p < 1.0);
        assert!(p > 0.99);
    }

    #[test]
    fn saturating_rate_evicts_with_certainty() {
        assert_eq!(eviction_probability(120.0, 1.0), 1.0);
    }

    #[test]
    fn one_second_matches_per_second_hazard() {
        let p = eviction_probability(0.6, 1.0);
        assert!((p - 0.01).abs() < 1e-12);
    }
}
