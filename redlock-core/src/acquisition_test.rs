#[cfg(test)]
mod tests {
    use crate::acquisition::{
        AcquisitionAlgorithm, AttemptOutcome, FanOut, Verdict, drift_ms, quorum, validity_ms,
    };
    use crate::infrastructure::{StoreClient, StoreSlot};
    use crate::infrastructure_in_memory::InMemoryStore;
    use std::time::Duration;

    fn nodes(n: usize) -> Vec<InMemoryStore> {
        (0..n).map(|_| InMemoryStore::new()).collect()
    }

    fn slots(nodes: &[InMemoryStore]) -> Vec<StoreSlot> {
        nodes
            .iter()
            .map(|n| StoreSlot::from_client(Box::new(n.clone())))
            .collect()
    }

    // =========================================================================
    // Quorum, drift and validity math
    // =========================================================================

    #[test]
    fn test_quorum_is_strict_majority() {
        for n in 1..=100usize {
            let q = quorum(n);
            assert_eq!(q, n / 2 + 1);
            assert!(q >= 1 && q <= n, "quorum {} out of range for {} servers", q, n);
            // Two disjoint sets of size q cannot fit in n nodes
            assert!(2 * q > n);
        }
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(2), 2);
        assert_eq!(quorum(3), 2);
        assert_eq!(quorum(5), 3);
    }

    #[test]
    fn test_drift_has_two_millisecond_floor() {
        assert_eq!(drift_ms(0), 2.0);
        assert_eq!(drift_ms(100), 3.0);
        assert_eq!(drift_ms(20_000), 202.0);
    }

    #[test]
    fn test_validity_deducts_elapsed_and_drift() {
        assert_eq!(validity_ms(20_000, Duration::ZERO), 19_798.0);
        assert!((validity_ms(20_000, Duration::from_millis(98)) - 19_700.0).abs() < 1e-6);
        assert!(validity_ms(10, Duration::from_millis(8)) <= 0.0);
    }

    #[test]
    fn test_decide_grants_with_quorum_and_positive_validity() {
        let verdict = AcquisitionAlgorithm::decide(2, 2, 20_000, Duration::from_millis(5));
        match verdict {
            Verdict::Granted { validity_ms } => {
                assert!(validity_ms > 0.0 && validity_ms < 20_000.0)
            }
            other => panic!("Expected Granted, got {:?}", other),
        }
    }

    #[test]
    fn test_decide_rejects_missing_quorum() {
        assert_eq!(
            AcquisitionAlgorithm::decide(1, 2, 20_000, Duration::ZERO),
            Verdict::QuorumNotReached
        );
    }

    #[test]
    fn test_decide_rejects_expired_validity_even_with_quorum() {
        let verdict = AcquisitionAlgorithm::decide(3, 2, 1000, Duration::from_millis(990));
        assert!(matches!(verdict, Verdict::ValidityExpired { validity_ms } if validity_ms <= 0.0));

        let verdict = AcquisitionAlgorithm::decide(3, 2, 100, Duration::from_millis(98));
        assert!(matches!(verdict, Verdict::ValidityExpired { .. }));
    }

    // =========================================================================
    // Attempts against nodes
    // =========================================================================

    #[test]
    fn test_attempt_acquires_on_every_healthy_node() {
        let nodes = nodes(3);
        let mut slots = slots(&nodes);
        let algorithm = AcquisitionAlgorithm::new(slots.len(), FanOut::Sequential);

        let outcome = algorithm.attempt(&mut slots, "res", "token_a", 10_000);
        let lease = match outcome {
            AttemptOutcome::Acquired(lease) => lease,
            other => panic!("Expected Acquired, got {:?}", other),
        };

        assert_eq!(lease.resource, "res");
        assert_eq!(lease.token, "token_a");
        for node in &nodes {
            assert_eq!(node.get("res").as_deref(), Some("token_a"));
        }
    }

    #[test]
    fn test_failed_attempt_releases_partial_acquisitions() {
        let nodes = nodes(5);
        // Another owner already holds three of the five nodes
        for node in &nodes[..3] {
            node.clone().set_if_absent("res", "other", 10_000).unwrap();
        }
        let mut slots = slots(&nodes);
        let algorithm = AcquisitionAlgorithm::new(slots.len(), FanOut::Sequential);

        let outcome = algorithm.attempt(&mut slots, "res", "token_a", 10_000);
        assert_eq!(
            outcome,
            AttemptOutcome::QuorumNotReached {
                acquired: 2,
                quorum: 3
            }
        );

        // Our two partial entries are gone, the other owner's are untouched
        for node in &nodes[..3] {
            assert_eq!(node.get("res").as_deref(), Some("other"));
        }
        for node in &nodes[3..] {
            assert!(node.get("res").is_none());
        }
    }

    #[test]
    fn test_unreachable_minority_still_reaches_quorum() {
        let nodes = nodes(5);
        nodes[0].set_reachable(false);
        nodes[4].set_reachable(false);
        let mut slots = slots(&nodes);
        let algorithm = AcquisitionAlgorithm::new(slots.len(), FanOut::Sequential);

        assert!(algorithm.attempt(&mut slots, "res", "t", 10_000).is_acquired());
    }

    #[test]
    fn test_slow_nodes_expire_validity() {
        let nodes = nodes(3);
        for node in &nodes {
            node.set_latency(Duration::from_millis(25));
        }
        let mut slots = slots(&nodes);
        let algorithm = AcquisitionAlgorithm::new(slots.len(), FanOut::Sequential);

        // 3 x 25ms of latency is more than the 50ms TTL
        let outcome = algorithm.attempt(&mut slots, "res", "t", 50);
        match outcome {
            AttemptOutcome::ValidityExpired { acquired, validity_ms } => {
                assert_eq!(acquired, 3);
                assert!(validity_ms <= 0.0);
            }
            other => panic!("Expected ValidityExpired, got {:?}", other),
        }
        for node in &nodes {
            assert!(node.is_empty());
        }
    }

    #[test]
    fn test_parallel_fan_out_measures_whole_attempt() {
        let nodes = nodes(3);
        for node in &nodes {
            node.set_latency(Duration::from_millis(20));
        }
        let mut slots = slots(&nodes);
        let algorithm = AcquisitionAlgorithm::new(slots.len(), FanOut::Parallel);

        let lease = match algorithm.attempt(&mut slots, "res", "t", 10_000) {
            AttemptOutcome::Acquired(lease) => lease,
            other => panic!("Expected Acquired, got {:?}", other),
        };

        // At least one node round trip is deducted on top of the drift
        assert!(lease.validity <= Duration::from_millis(10_000 - 102 - 20));
        assert!(lease.validity > Duration::from_millis(9_000));
        for node in &nodes {
            assert_eq!(node.get("res").as_deref(), Some("t"));
        }
    }

    #[test]
    fn test_parallel_fan_out_releases_everywhere() {
        let nodes = nodes(4);
        let mut slots = slots(&nodes);
        let algorithm = AcquisitionAlgorithm::new(slots.len(), FanOut::Parallel);

        assert!(algorithm.attempt(&mut slots, "res", "t", 10_000).is_acquired());
        assert_eq!(algorithm.release(&mut slots, "res", "t"), 4);
        assert_eq!(algorithm.release(&mut slots, "res", "t"), 0);
    }
}
