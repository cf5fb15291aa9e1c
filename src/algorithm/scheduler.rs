//! Round-based loopy belief propagation over the whole grid
//!
//! Every round asks each neighbour `u` of every node `v` to (re)send its
//! message `u -> v`. The sequential schedule writes each message as soon as
//! it is computed; the synchronous schedule computes a full round from the
//! previous round's state and commits it at once, which allows the work to
//! be spread over threads.

use log::{debug, info};
use ndarray::Array2;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::algorithm::belief::{DecodePolicy, decode_all};
use crate::algorithm::message::{compute_message, message_delta, send_message};
use crate::io::configuration::{DEFAULT_ITERATIONS, DEFAULT_STATES, DEFAULT_VMAX, MAX_STATES};
use crate::io::error::{Result, WithContext, invalid_parameter};
use crate::math::compatibility::CompatibilityMatrix;
use crate::spatial::grid::{FactorGraph, Inbox, Node};
use crate::spatial::mask::ObservedMask;

/// Order in which messages of a round become visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Each message is written immediately and may be read later in the
    /// same round
    #[default]
    Sequential,
    /// Double buffered: a round only reads messages of the previous round
    Synchronous,
}

impl FromStr for Schedule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "synchronous" => Ok(Self::Synchronous),
            _ => Err(format!(
                "unknown schedule '{s}' (expected 'sequential' or 'synchronous')"
            )),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Synchronous => write!(f, "synchronous"),
        }
    }
}

/// Inference parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceConfig {
    /// Size of the intensity state space K
    pub states: usize,
    /// Truncation threshold of the smoothness penalty
    pub vmax: f64,
    /// Maximum number of rounds
    pub iterations: usize,
    /// Message visibility discipline
    pub schedule: Schedule,
    /// Stop early once no message changes by this much in a round
    pub tolerance: Option<f64>,
    /// Treatment of observed pixels when decoding
    pub decode_policy: DecodePolicy,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            states: DEFAULT_STATES,
            vmax: DEFAULT_VMAX,
            iterations: DEFAULT_ITERATIONS,
            schedule: Schedule::default(),
            tolerance: None,
            decode_policy: DecodePolicy::default(),
        }
    }
}

impl InferenceConfig {
    /// Check every parameter before any work starts
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `states` is outside `1..=256`, `vmax`
    /// is negative or not finite, or `tolerance` is not a positive finite
    /// number
    pub fn validate(&self) -> Result<()> {
        if self.states == 0 || self.states > MAX_STATES {
            return Err(invalid_parameter(
                "states",
                &self.states,
                &format!("must be between 1 and {MAX_STATES}"),
            ));
        }
        if !self.vmax.is_finite() || self.vmax < 0.0 {
            return Err(invalid_parameter(
                "vmax",
                &self.vmax,
                &"must be a finite, non-negative number",
            ));
        }
        if let Some(tolerance) = self.tolerance {
            if !tolerance.is_finite() || tolerance <= 0.0 {
                return Err(invalid_parameter(
                    "tolerance",
                    &tolerance,
                    &"must be a finite, positive number",
                ));
            }
        }
        Ok(())
    }
}

/// Summary of one completed round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// 1-based round number
    pub iteration: usize,
    /// Largest absolute change of any message entry; infinite while some
    /// message slot is still being filled for the first time
    pub max_delta: f64,
    /// Number of directed messages sent
    pub messages: usize,
}

impl IterationReport {
    /// Whether this round changed no message by `tolerance` or more
    pub fn converged(&self, tolerance: f64) -> bool {
        self.max_delta < tolerance
    }
}

/// Statistics of one round before it is numbered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundStats {
    /// Largest absolute change of any message entry
    pub max_delta: f64,
    /// Number of directed messages sent
    pub messages: usize,
}

/// One sequential round: every message is stored as soon as it is computed
///
/// # Errors
///
/// Propagates message computation failures
pub fn sequential_round(graph: &mut FactorGraph, phi: &CompatibilityMatrix) -> Result<RoundStats> {
    let mut stats = RoundStats {
        max_delta: 0.0,
        messages: 0,
    };

    for receiver in 0..graph.len() {
        let senders: Vec<usize> = graph.neighbors(receiver).map(|(_, sender)| sender).collect();
        for sender in senders {
            let delta = send_message(graph, sender, receiver, phi)?;
            stats.max_delta = stats.max_delta.max(delta);
            stats.messages += 1;
        }
    }

    Ok(stats)
}

/// One synchronous round: all messages are computed from the state entering
/// the round, then committed together
///
/// # Errors
///
/// Propagates message computation failures; the graph is left untouched
/// when any message of the round fails
pub fn synchronous_round(
    graph: &mut FactorGraph,
    phi: &CompatibilityMatrix,
) -> Result<RoundStats> {
    let snapshot: &FactorGraph = graph;

    #[cfg(feature = "rayon")]
    let computed = snapshot
        .nodes()
        .par_iter()
        .enumerate()
        .map(|(receiver, node)| collect_inbox(snapshot, receiver, node, phi))
        .collect::<Result<Vec<_>>>()?;

    #[cfg(not(feature = "rayon"))]
    let computed = snapshot
        .nodes()
        .iter()
        .enumerate()
        .map(|(receiver, node)| collect_inbox(snapshot, receiver, node, phi))
        .collect::<Result<Vec<_>>>()?;

    let mut stats = RoundStats {
        max_delta: 0.0,
        messages: 0,
    };
    let mut inboxes = Vec::with_capacity(computed.len());
    for (inbox, delta) in computed {
        stats.max_delta = stats.max_delta.max(delta);
        stats.messages += inbox.iter().flatten().count();
        inboxes.push(inbox);
    }

    graph.commit_inboxes(inboxes);
    Ok(stats)
}

// Fresh messages from every neighbour of `receiver`, read from the snapshot
fn collect_inbox(
    graph: &FactorGraph,
    receiver: usize,
    node: &Node,
    phi: &CompatibilityMatrix,
) -> Result<(Inbox, f64)> {
    let mut inbox = Inbox::default();
    let mut max_delta: f64 = 0.0;
    for (direction, sender) in graph.neighbors(receiver) {
        let message = compute_message(graph, sender, receiver, phi)?;
        max_delta = max_delta.max(message_delta(node.message_from(direction), &message));
        if let Some(slot) = inbox.get_mut(direction.slot()) {
            *slot = Some(message);
        }
    }

    Ok((inbox, max_delta))
}

/// Run a fixed number of sequential rounds
///
/// # Errors
///
/// Returns `InvalidParameter` if the graph holds messages sized for another
/// state space, and otherwise propagates message computation failures,
/// tagged with the failing round
pub fn run(graph: &mut FactorGraph, phi: &CompatibilityMatrix, iterations: usize) -> Result<()> {
    graph.check_message_states(phi.states())?;
    for iteration in 1..=iterations {
        sequential_round(graph, phi).with_iteration(iteration)?;
    }
    Ok(())
}

/// Loopy belief propagation driver owning the graph and the potential
pub struct BeliefPropagation {
    graph: FactorGraph,
    phi: CompatibilityMatrix,
    config: InferenceConfig,
    iteration: usize,
    converged: bool,
}

impl BeliefPropagation {
    /// Validate the configuration and prepare inference over `graph`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a bad configuration and
    /// `EvidenceOutOfRange` if an observed intensity does not fit the state
    /// space
    pub fn new(graph: FactorGraph, config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        let phi = CompatibilityMatrix::build(config.states, config.vmax)?;
        Self::with_matrix(graph, phi, config)
    }

    /// Prepare inference with a prebuilt compatibility matrix
    ///
    /// The configuration's `states` and `vmax` are taken from the matrix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a bad configuration or for stored
    /// messages sized for another state space, and `EvidenceOutOfRange` if
    /// an observed intensity does not fit the state space
    pub fn with_matrix(
        graph: FactorGraph,
        phi: CompatibilityMatrix,
        config: InferenceConfig,
    ) -> Result<Self> {
        let config = InferenceConfig {
            states: phi.states(),
            vmax: phi.vmax(),
            ..config
        };
        config.validate()?;
        graph.check_evidence(config.states)?;
        graph.check_message_states(config.states)?;

        info!(
            "Prepared {}x{} grid ({} edges, {} states, vmax {}, {} schedule)",
            graph.rows(),
            graph.cols(),
            graph.edge_count(),
            config.states,
            config.vmax,
            config.schedule
        );

        Ok(Self {
            graph,
            phi,
            config,
            iteration: 0,
            converged: false,
        })
    }

    /// Execute a single round
    ///
    /// # Errors
    ///
    /// Returns `NumericInstability`, tagged with the round, if a message
    /// cannot be normalized
    pub fn execute_iteration(&mut self) -> Result<IterationReport> {
        let iteration = self.iteration + 1;
        let stats = match self.config.schedule {
            Schedule::Sequential => sequential_round(&mut self.graph, &self.phi),
            Schedule::Synchronous => synchronous_round(&mut self.graph, &self.phi),
        }
        .with_iteration(iteration)?;

        self.iteration = iteration;
        let report = IterationReport {
            iteration,
            max_delta: stats.max_delta,
            messages: stats.messages,
        };

        if let Some(tolerance) = self.config.tolerance {
            self.converged = report.converged(tolerance);
        }

        debug!(
            "Iteration {iteration}: {} messages, max delta {:.3e}",
            report.messages, report.max_delta
        );

        Ok(report)
    }

    /// Whether another round should be executed
    ///
    /// False once the round budget is spent or, with a tolerance set, once
    /// a round has converged.
    pub const fn should_continue(&self) -> bool {
        self.iteration < self.config.iterations && !self.converged
    }

    /// Execute rounds until the budget is spent or the messages converge,
    /// calling `observer` after every round
    ///
    /// # Errors
    ///
    /// Propagates the first failing round
    pub fn run_with<F>(&mut self, mut observer: F) -> Result<usize>
    where
        F: FnMut(&Self, &IterationReport),
    {
        while self.should_continue() {
            let report = self.execute_iteration()?;
            observer(self, &report);
        }

        if self.converged {
            info!("Converged after {} iterations", self.iteration);
        }
        Ok(self.iteration)
    }

    /// Execute every remaining round
    ///
    /// # Errors
    ///
    /// Propagates the first failing round
    pub fn run(&mut self) -> Result<usize> {
        self.run_with(|_, _| {})
    }

    /// MAP image under the configured decode policy
    ///
    /// # Errors
    ///
    /// Propagates decoding failures of [`decode_all`]
    pub fn decode(&self) -> Result<Array2<u8>> {
        decode_all(&self.graph, self.config.states, self.config.decode_policy)
    }

    /// Borrow the graph and its current messages
    pub const fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    /// Borrow the compatibility matrix
    pub const fn matrix(&self) -> &CompatibilityMatrix {
        &self.phi
    }

    /// Effective configuration
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Number of completed rounds
    pub const fn iteration(&self) -> usize {
        self.iteration
    }

    /// Whether the last round fell below the tolerance
    pub const fn converged(&self) -> bool {
        self.converged
    }
}

/// Complete an image in one call: build the graph, run inference, decode
///
/// # Errors
///
/// Returns construction, configuration and numeric errors as described on
/// [`FactorGraph::from_mask`] and [`BeliefPropagation`]
pub fn complete_image(
    intensities: &Array2<u8>,
    mask: &ObservedMask,
    config: &InferenceConfig,
) -> Result<Array2<u8>> {
    config.validate()?;
    let graph = FactorGraph::from_mask(intensities, mask)?;
    let mut inference = BeliefPropagation::new(graph, *config)?;
    inference.run()?;
    inference.decode()
}
