#[cfg(test)]
mod tests {
    use crate::scheduler::RetryScheduler;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    #[test]
    fn test_yields_at_most_count_delays() {
        let scheduler = RetryScheduler::new(200, 3);
        assert_eq!(scheduler.count(), 3);

        let mut empty = RetryScheduler::new(200, 0);
        assert!(empty.next().is_none());
    }

    #[test]
    fn test_delays_stay_within_jitter_window() {
        let scheduler = RetryScheduler::with_rng(200, 500, StdRng::seed_from_u64(7));
        for delay in scheduler {
            assert!(delay >= Duration::from_millis(100), "{:?} below window", delay);
            assert!(delay <= Duration::from_millis(200), "{:?} above window", delay);
        }
    }

    #[test]
    fn test_delays_are_jittered() {
        let delays: Vec<Duration> =
            RetryScheduler::with_rng(1000, 50, StdRng::seed_from_u64(42)).collect();
        let first = delays[0];
        assert!(delays.iter().any(|d| *d != first));
    }

    #[test]
    fn test_odd_delay_rounds_lower_bound_down() {
        let scheduler = RetryScheduler::new(201, 1);
        assert_eq!(scheduler.bounds(), (100, 201));
    }

    #[test]
    fn test_zero_delay_never_sleeps() {
        let delays: Vec<Duration> = RetryScheduler::new(0, 4).collect();
        assert_eq!(delays, vec![Duration::ZERO; 4]);
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut scheduler = RetryScheduler::new(10, 2);
        assert_eq!(scheduler.remaining(), 2);
        scheduler.next();
        assert_eq!(scheduler.remaining(), 1);
        scheduler.next();
        assert_eq!(scheduler.remaining(), 0);
        assert!(scheduler.next().is_none());
    }
}
