//! Sum-product message computation between adjacent pixels

use ndarray::Array1;

use crate::io::error::{CompletionError, Result, state_mismatch};
use crate::math::compatibility::CompatibilityMatrix;
use crate::math::distribution::{max_abs_difference, normalize, product};
use crate::spatial::grid::{Direction, FactorGraph};

/// Compute the message `sender` would send to `receiver` right now
///
/// - An observed sender emits row `evidence` of φ, unchanged every round.
/// - A sender that has not heard from anyone yet emits all ones.
/// - Otherwise the sender multiplies every incoming message except the one
///   from `receiver`, applies φ, and normalizes the result to sum to one.
///
/// Only reads the graph, so it is safe to call from several threads on a
/// shared snapshot.
///
/// # Errors
///
/// Returns `NotAdjacent` if the two nodes share no edge,
/// `InvalidParameter` if a stored message was sized for another state
/// space, and `NumericInstability` if the normalization denominator is zero
/// or not finite
pub fn compute_message(
    graph: &FactorGraph,
    sender: usize,
    receiver: usize,
    phi: &CompatibilityMatrix,
) -> Result<Array1<f64>> {
    let not_adjacent = || CompletionError::NotAdjacent { sender, receiver };
    let towards_receiver = graph.direction_to(sender, receiver).ok_or_else(not_adjacent)?;
    let node = graph.node(sender).ok_or_else(not_adjacent)?;

    if let Some(evidence) = node.evidence {
        return phi
            .row(usize::from(evidence))
            .map(|row| row.to_owned())
            .ok_or(CompletionError::EvidenceOutOfRange {
                row: node.row,
                col: node.col,
                value: evidence,
                states: phi.states(),
            });
    }

    if !node.has_incoming() {
        return Ok(Array1::ones(phi.states()));
    }

    // Never feed the receiver's own message back to it
    let others = Direction::ALL
        .into_iter()
        .filter(|&direction| direction != towards_receiver)
        .filter_map(|direction| node.message_from(direction));
    let combined =
        product(phi.states(), others).map_err(|found| state_mismatch(phi.states(), found))?;

    normalize(phi.propagate(&combined)).map_err(|total| CompletionError::NumericInstability {
        iteration: None,
        sender,
        receiver,
        total,
    })
}

/// Compute a message and store it in the receiver's inbox
///
/// Returns the largest absolute change against the message previously
/// stored in that slot, or infinity when the slot was empty.
///
/// # Errors
///
/// Propagates the errors of [`compute_message`]
pub fn send_message(
    graph: &mut FactorGraph,
    sender: usize,
    receiver: usize,
    phi: &CompatibilityMatrix,
) -> Result<f64> {
    let message = compute_message(graph, sender, receiver, phi)?;
    let from_sender = graph
        .direction_to(receiver, sender)
        .ok_or(CompletionError::NotAdjacent { sender, receiver })?;

    let slot = graph
        .node_mut(receiver)
        .and_then(|node| node.incoming.get_mut(from_sender.slot()))
        .ok_or(CompletionError::NotAdjacent { sender, receiver })?;

    let delta = message_delta(slot.as_ref(), &message);
    *slot = Some(message);
    Ok(delta)
}

/// Largest absolute change between a stored message and its replacement
pub fn message_delta(previous: Option<&Array1<f64>>, next: &Array1<f64>) -> f64 {
    match (previous.and_then(Array1::as_slice), next.as_slice()) {
        (Some(previous), Some(next)) => max_abs_difference(previous, next),
        _ => f64::INFINITY,
    }
}
