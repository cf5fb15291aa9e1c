//! Tests for round scheduling and the inference driver

#[cfg(test)]
mod tests {
    use lbpfill::algorithm::belief::DecodePolicy;
    use lbpfill::algorithm::scheduler::{
        BeliefPropagation, InferenceConfig, IterationReport, Schedule, run, sequential_round,
        synchronous_round,
    };
    use lbpfill::math::compatibility::CompatibilityMatrix;
    use lbpfill::spatial::{Direction, FactorGraph, ObservedMask};
    use lbpfill::{CompletionError, complete_image};
    use ndarray::{Array1, Array2, array};

    fn boundary_row() -> FactorGraph {
        FactorGraph::build_grid(1, 3, &array![[10u8, 0, 200]], |_, col| col != 1).unwrap()
    }

    // 2x3 grid with only (0, 1) hidden; its neighbours read 100, 110 and 130
    fn median_grid() -> FactorGraph {
        let intensities = array![[100u8, 0, 110], [100, 130, 130]];
        FactorGraph::build_grid(2, 3, &intensities, |row, col| (row, col) != (0, 1)).unwrap()
    }

    fn corners_grid() -> FactorGraph {
        let intensities = array![[20u8, 0, 60], [0, 0, 0], [90, 0, 40]];
        FactorGraph::build_grid(3, 3, &intensities, |row, col| row != 1 && col != 1).unwrap()
    }

    fn config(schedule: Schedule, iterations: usize) -> InferenceConfig {
        InferenceConfig {
            iterations,
            schedule,
            ..InferenceConfig::default()
        }
    }

    // Tests configuration validation
    // Verified by accepting a zero-sized state space
    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(InferenceConfig::default().validate().is_ok());

        let bad = [
            InferenceConfig {
                states: 0,
                ..InferenceConfig::default()
            },
            InferenceConfig {
                states: 257,
                ..InferenceConfig::default()
            },
            InferenceConfig {
                vmax: f64::NAN,
                ..InferenceConfig::default()
            },
            InferenceConfig {
                vmax: -1.0,
                ..InferenceConfig::default()
            },
            InferenceConfig {
                tolerance: Some(0.0),
                ..InferenceConfig::default()
            },
            InferenceConfig {
                tolerance: Some(f64::INFINITY),
                ..InferenceConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(CompletionError::InvalidParameter { .. })
            ));
        }

        let zero_rounds = config(Schedule::Sequential, 0);
        assert!(zero_rounds.validate().is_ok());
    }

    // Tests schedule names parse case-insensitively and print back
    // Verified by matching names exactly
    #[test]
    fn test_schedule_names() {
        assert_eq!("Sequential".parse::<Schedule>(), Ok(Schedule::Sequential));
        assert_eq!("SYNCHRONOUS".parse::<Schedule>(), Ok(Schedule::Synchronous));
        assert!("parallel".parse::<Schedule>().is_err());
        assert_eq!(Schedule::Synchronous.to_string(), "synchronous");
        assert_eq!(Schedule::default(), Schedule::Sequential);
    }

    // Tests tolerance stops once a round changes nothing
    // Verified by comparing against the previous round's maximum instead
    #[test]
    fn test_early_stop_on_tolerance() {
        for schedule in [Schedule::Sequential, Schedule::Synchronous] {
            let config = InferenceConfig {
                tolerance: Some(1e-12),
                ..config(schedule, 50)
            };
            let mut bp = BeliefPropagation::new(boundary_row(), config).unwrap();

            assert_eq!(bp.run().unwrap(), 3, "{schedule}");
            assert!(bp.converged());
            assert!(!bp.should_continue());
        }
    }

    // Tests the full budget is spent without a tolerance
    // Verified by stopping at the first zero-delta round
    #[test]
    fn test_runs_full_budget() {
        let mut bp = BeliefPropagation::new(boundary_row(), config(Schedule::Sequential, 7)).unwrap();
        let mut seen = Vec::new();

        let rounds = bp.run_with(|_, report| seen.push(report.iteration)).unwrap();

        assert_eq!(rounds, 7);
        assert_eq!(seen, (1..=7).collect::<Vec<_>>());
        assert!(!bp.converged());
        assert_eq!(bp.iteration(), 7);
    }

    // Tests zero rounds leave every unobserved pixel at the uniform decode
    // Verified by running one round regardless of the budget
    #[test]
    fn test_zero_iterations() {
        let mut bp = BeliefPropagation::new(boundary_row(), config(Schedule::Sequential, 0)).unwrap();

        assert_eq!(bp.run().unwrap(), 0);
        assert_eq!(bp.decode().unwrap(), array![[10u8, 0, 200]]);
    }

    // Tests the first round reports unfilled slots as an infinite change
    // Verified by counting sent messages per node instead of per edge
    #[test]
    fn test_round_statistics() {
        let phi = CompatibilityMatrix::build(256, 50.0).unwrap();
        let mut sequential = boundary_row();
        let mut synchronous = boundary_row();

        let first = sequential_round(&mut sequential, &phi).unwrap();
        assert_eq!(first.messages, 4);
        assert!(first.max_delta.is_infinite());

        let first = synchronous_round(&mut synchronous, &phi).unwrap();
        assert_eq!(first.messages, 4);
        assert!(first.max_delta.is_infinite());

        let report = IterationReport {
            iteration: 1,
            max_delta: 1e-4,
            messages: 4,
        };
        assert!(report.converged(1e-3));
        assert!(!report.converged(1e-5));
    }

    // Tests both schedules settle on the median of the neighbours
    // Verified by summing incoming messages instead of multiplying them
    #[test]
    fn test_median_of_neighbours() {
        for schedule in [Schedule::Sequential, Schedule::Synchronous] {
            let mut bp = BeliefPropagation::new(median_grid(), config(schedule, 5)).unwrap();
            bp.run().unwrap();

            assert_eq!(bp.decode().unwrap().get([0, 1]).copied(), Some(110), "{schedule}");
        }
    }

    // Tests sequential and synchronous schedules agree once a chain converges
    // Verified by reading messages of the current round in synchronous mode
    #[test]
    fn test_schedules_agree() {
        let chain = || {
            FactorGraph::build_grid(1, 5, &array![[30u8, 0, 0, 0, 50]], |_, col| {
                col == 0 || col == 4
            })
            .unwrap()
        };
        let mut a = BeliefPropagation::new(chain(), config(Schedule::Sequential, 10)).unwrap();
        let mut b = BeliefPropagation::new(chain(), config(Schedule::Synchronous, 10)).unwrap();
        a.run().unwrap();
        b.run().unwrap();

        assert_eq!(a.decode().unwrap(), b.decode().unwrap());
        assert_eq!(a.graph().nodes(), b.graph().nodes());
    }

    // Tests every message from an unobserved sender is normalized
    // Verified by storing the unnormalized product
    #[test]
    fn test_messages_normalized() {
        let phi = CompatibilityMatrix::build(256, 50.0).unwrap();
        let mut g = corners_grid();
        run(&mut g, &phi, 2).unwrap();

        for receiver in 0..g.len() {
            for (direction, sender) in g.neighbors(receiver) {
                let sender_node = g.node(sender).unwrap();
                let message = g.node(receiver).unwrap().message_from(direction).unwrap();
                if sender_node.observed() {
                    let row = phi.row(usize::from(sender_node.evidence.unwrap())).unwrap();
                    assert_eq!(message, &row.to_owned());
                } else {
                    assert!((message.sum() - 1.0).abs() < 1e-9);
                }
            }
        }
    }

    // Tests observed pixels are returned unchanged by default
    // Verified by decoding observed pixels from their beliefs
    #[test]
    fn test_observed_pixels_fixed() {
        let mut bp = BeliefPropagation::new(corners_grid(), config(Schedule::Sequential, 10)).unwrap();
        bp.run().unwrap();
        let decoded = bp.decode().unwrap();

        for (row, col, value) in [(0, 0, 20u8), (0, 2, 60), (2, 0, 90), (2, 2, 40)] {
            assert_eq!(decoded.get([row, col]).copied(), Some(value));
        }

        let from_beliefs = InferenceConfig {
            decode_policy: DecodePolicy::FromBeliefs,
            ..config(Schedule::Sequential, 10)
        };
        let bp = BeliefPropagation::new(boundary_row(), from_beliefs).unwrap();
        assert_eq!(bp.config().decode_policy, DecodePolicy::FromBeliefs);
    }

    // Tests normalization failures carry the failing round and edge
    // Verified by dividing by a zero sum
    #[test]
    fn test_numeric_instability_reported() {
        for schedule in [Schedule::Sequential, Schedule::Synchronous] {
            let mut g =
                FactorGraph::build_grid(1, 3, &Array2::zeros((1, 3)), |_, _| false).unwrap();
            if let Some(node) = g.node_mut(1) {
                node.incoming[Direction::Right.slot()] = Some(Array1::zeros(256));
            }
            let mut bp = BeliefPropagation::new(g, config(schedule, 3)).unwrap();

            match bp.execute_iteration() {
                Err(CompletionError::NumericInstability {
                    iteration,
                    sender,
                    receiver,
                    total,
                }) => {
                    assert_eq!((iteration, sender, receiver), (Some(1), 1, 0));
                    assert!(total.abs() < f64::EPSILON);
                }
                other => panic!("expected NumericInstability, got {other:?}"),
            }
            assert_eq!(bp.iteration(), 0);
        }
    }

    // Tests a failing synchronous round commits nothing
    // Verified by committing inboxes as they are computed
    #[test]
    fn test_synchronous_failure_is_atomic() {
        let phi = CompatibilityMatrix::build(256, 50.0).unwrap();
        let mut g = FactorGraph::build_grid(1, 3, &Array2::zeros((1, 3)), |_, _| false).unwrap();
        if let Some(node) = g.node_mut(1) {
            node.incoming[Direction::Right.slot()] = Some(Array1::zeros(256));
        }

        assert!(synchronous_round(&mut g, &phi).is_err());
        assert!(!g.node(0).unwrap().has_incoming());
        assert!(!g.node(2).unwrap().has_incoming());
    }

    // Tests evidence outside the state space is refused up front
    // Verified by clamping the evidence into range
    #[test]
    fn test_evidence_out_of_range() {
        let config = InferenceConfig {
            states: 16,
            ..InferenceConfig::default()
        };

        assert!(matches!(
            BeliefPropagation::new(boundary_row(), config),
            Err(CompletionError::EvidenceOutOfRange {
                row: 0,
                col: 2,
                value: 200,
                states: 16
            })
        ));
    }

    // Tests messages left over from a larger state space are refused
    // Verified by multiplying the stored messages with a smaller matrix
    #[test]
    fn test_stale_messages_from_other_state_space() {
        let full = CompatibilityMatrix::build(256, 50.0).unwrap();
        let small = CompatibilityMatrix::build(16, 50.0).unwrap();
        let mut g = FactorGraph::build_grid(1, 3, &array![[4u8, 0, 9]], |_, col| col != 1).unwrap();
        run(&mut g, &full, 3).unwrap();

        assert!(matches!(
            run(&mut g, &small, 1),
            Err(CompletionError::InvalidParameter {
                parameter: "states",
                ..
            })
        ));
        assert!(matches!(
            BeliefPropagation::with_matrix(g.clone(), small, InferenceConfig::default()),
            Err(CompletionError::InvalidParameter {
                parameter: "states",
                ..
            })
        ));

        g.clear_messages();
        let mut bp = BeliefPropagation::new(
            g,
            InferenceConfig {
                states: 16,
                ..config(Schedule::Sequential, 2)
            },
        )
        .unwrap();
        bp.run().unwrap();
        assert_eq!(bp.decode().unwrap().dim(), (1, 3));
    }

    // Tests a prebuilt matrix overrides the configured state space
    // Verified by keeping the configuration's values
    #[test]
    fn test_with_matrix() {
        let phi = CompatibilityMatrix::build(256, 3.0).unwrap();
        let bp = BeliefPropagation::with_matrix(
            boundary_row(),
            phi,
            InferenceConfig {
                states: 1,
                ..InferenceConfig::default()
            },
        )
        .unwrap();

        assert_eq!(bp.config().states, 256);
        assert!((bp.config().vmax - 3.0).abs() < f64::EPSILON);
        assert_eq!(bp.matrix().states(), 256);
        assert_eq!(bp.graph().len(), 3);
    }

    // Tests the one-call helper fills the hidden region
    // Verified by returning the input unchanged
    #[test]
    fn test_complete_image() {
        let intensities = array![[100u8, 0, 110], [100, 130, 130]];
        let mask = ObservedMask::from_fn(2, 3, |row, col| (row, col) != (0, 1));

        let completed = complete_image(&intensities, &mask, &config(Schedule::Sequential, 5)).unwrap();
        assert_eq!(completed, array![[100u8, 110, 110], [100, 130, 130]]);

        let invalid = InferenceConfig {
            vmax: -2.0,
            ..InferenceConfig::default()
        };
        assert!(complete_image(&intensities, &mask, &invalid).is_err());
    }
}
