//! Belief combination and MAP decoding

use ndarray::{Array1, Array2};

use crate::io::error::{CompletionError, Result, invalid_parameter, state_mismatch};
use crate::math::distribution::{argmax_first, product};
use crate::spatial::grid::FactorGraph;

/// How observed pixels are turned back into intensities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Observed pixels keep their evidence
    #[default]
    ClampObserved,
    /// Observed pixels are decoded from their neighbours' messages like any
    /// other pixel; pixels without neighbours keep their evidence
    FromBeliefs,
}

/// Unnormalized belief of a node: the product of every message it holds
///
/// A node that has received nothing has a uniform (all ones) belief.
///
/// # Errors
///
/// Returns `InvalidParameter` if `index` is outside the graph or a stored
/// message does not have `states` entries
pub fn belief(graph: &FactorGraph, index: usize, states: usize) -> Result<Array1<f64>> {
    let node = graph
        .node(index)
        .ok_or_else(|| node_out_of_range(graph, index))?;
    product(states, node.incoming.iter().flatten()).map_err(|found| state_mismatch(states, found))
}

/// MAP intensity of a single node
///
/// Unobserved nodes return the first index of their maximum belief, so a
/// uniform belief decodes to 0.
///
/// # Errors
///
/// Propagates the errors of [`belief`], and returns `InvalidParameter` if
/// the decoded state does not fit an 8-bit intensity
pub fn decode(
    graph: &FactorGraph,
    index: usize,
    states: usize,
    policy: DecodePolicy,
) -> Result<u8> {
    let node = graph
        .node(index)
        .ok_or_else(|| node_out_of_range(graph, index))?;

    if let Some(evidence) = node.evidence {
        if policy == DecodePolicy::ClampObserved || node.degree() == 0 {
            return Ok(evidence);
        }
    }

    let belief = belief(graph, index, states)?;
    let state = argmax_first(belief.iter().copied()).unwrap_or(0);
    u8::try_from(state).map_err(|e| invalid_parameter("states", &states, &e))
}

/// Decode every node into an image of the grid's shape
///
/// # Errors
///
/// Returns the first failure of [`decode`]
pub fn decode_all(graph: &FactorGraph, states: usize, policy: DecodePolicy) -> Result<Array2<u8>> {
    let values = (0..graph.len())
        .map(|index| decode(graph, index, states, policy))
        .collect::<Result<Vec<_>>>()?;

    let (rows, cols) = (graph.rows(), graph.cols());
    Array2::from_shape_vec((rows, cols), values).map_err(|e| CompletionError::InvalidDimensions {
        rows,
        cols,
        reason: e.to_string(),
    })
}

fn node_out_of_range(graph: &FactorGraph, index: usize) -> CompletionError {
    invalid_parameter(
        "index",
        &index,
        &format!("grid has {} nodes", graph.len()),
    )
}
