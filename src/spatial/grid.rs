//! Grid-structured factor graph over the pixels of an image
//!
//! Nodes live in a flat row-major arena and address each other by index.
//! Each node keeps one neighbour slot and one incoming-message slot per
//! [`Direction`], so message storage needs no hashing and is sized once.

use ndarray::{Array1, Array2};

use crate::io::error::{CompletionError, Result, state_mismatch};
use crate::spatial::mask::ObservedMask;

/// Position of a neighbour relative to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Previous row
    Up,
    /// Next row
    Down,
    /// Previous column
    Left,
    /// Next column
    Right,
}

impl Direction {
    /// All directions in slot order
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Storage slot of this direction
    pub const fn slot(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }

    /// Direction pointing back from the neighbour
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Incoming messages of one node, one optional slot per direction
pub type Inbox = [Option<Array1<f64>>; 4];

/// One pixel of the grid
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Grid row
    pub row: usize,
    /// Grid column
    pub col: usize,
    /// Fixed intensity, present only for observed pixels
    pub evidence: Option<u8>,
    /// Neighbour indices by direction slot
    pub neighbors: [Option<usize>; 4],
    /// Most recent message from each neighbour, by direction slot
    pub incoming: Inbox,
}

impl Node {
    /// Whether this pixel carries fixed evidence
    pub const fn observed(&self) -> bool {
        self.evidence.is_some()
    }

    /// Number of existing grid neighbours
    pub fn degree(&self) -> usize {
        self.neighbors.iter().flatten().count()
    }

    /// Whether any neighbour has delivered a message yet
    pub fn has_incoming(&self) -> bool {
        self.incoming.iter().any(Option::is_some)
    }

    /// Message received from the neighbour in `direction`, if any
    pub fn message_from(&self, direction: Direction) -> Option<&Array1<f64>> {
        self.incoming
            .get(direction.slot())
            .and_then(Option::as_ref)
    }
}

/// 4-connected grid graph owning every node
#[derive(Debug, Clone, PartialEq)]
pub struct FactorGraph {
    nodes: Vec<Node>,
    rows: usize,
    cols: usize,
}

impl FactorGraph {
    /// Build the grid graph for an image
    ///
    /// Node `i` sits at `(i / cols, i % cols)`. Each node is linked to its
    /// left neighbour when `col != 0` and to its upper neighbour when
    /// `i >= cols`, updating both endpoints so adjacency stays symmetric.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimensions` if either dimension is zero or the
    /// intensity array does not have shape `(rows, cols)`
    pub fn build_grid<F>(
        rows: usize,
        cols: usize,
        intensities: &Array2<u8>,
        is_observed: F,
    ) -> Result<Self>
    where
        F: Fn(usize, usize) -> bool,
    {
        if rows == 0 || cols == 0 {
            return Err(CompletionError::InvalidDimensions {
                rows,
                cols,
                reason: "grid must have at least one row and one column".to_string(),
            });
        }
        if intensities.dim() != (rows, cols) {
            let (actual_rows, actual_cols) = intensities.dim();
            return Err(CompletionError::InvalidDimensions {
                rows,
                cols,
                reason: format!("intensity array has shape {actual_rows}x{actual_cols}"),
            });
        }

        let mut nodes: Vec<Node> = Vec::with_capacity(rows * cols);
        for i in 0..rows * cols {
            let (row, col) = (i / cols, i % cols);
            let evidence = if is_observed(row, col) {
                intensities.get([row, col]).copied()
            } else {
                None
            };
            nodes.push(Node {
                row,
                col,
                evidence,
                neighbors: [None; 4],
                incoming: Default::default(),
            });

            if col != 0 {
                link(&mut nodes, i, i - 1, Direction::Left);
            }
            if i >= cols {
                link(&mut nodes, i, i - cols, Direction::Up);
            }
        }

        Ok(Self { nodes, rows, cols })
    }

    /// Build the grid graph using a precomputed observed mask
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimensions` if the mask and intensity shapes differ
    /// or either is empty
    pub fn from_mask(intensities: &Array2<u8>, mask: &ObservedMask) -> Result<Self> {
        let (rows, cols) = intensities.dim();
        if mask.dimensions() != (rows, cols) {
            let (mask_rows, mask_cols) = mask.dimensions();
            return Err(CompletionError::InvalidDimensions {
                rows,
                cols,
                reason: format!("observed mask has shape {mask_rows}x{mask_cols}"),
            });
        }
        Self::build_grid(rows, cols, intensities, |row, col| {
            mask.is_observed(row, col)
        })
    }

    /// Verify that every observed intensity fits the state space
    ///
    /// # Errors
    ///
    /// Returns `EvidenceOutOfRange` for the first observed pixel whose
    /// intensity is not below `states`
    pub fn check_evidence(&self, states: usize) -> Result<()> {
        for node in &self.nodes {
            if let Some(value) = node.evidence {
                if usize::from(value) >= states {
                    return Err(CompletionError::EvidenceOutOfRange {
                        row: node.row,
                        col: node.col,
                        value,
                        states,
                    });
                }
            }
        }
        Ok(())
    }

    /// Get the number of rows in the grid
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns in the grid
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of nodes
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flat index of (row, col), if inside the grid
    pub const fn index(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.rows && col < self.cols {
            Some(row * self.cols + col)
        } else {
            None
        }
    }

    /// Grid coordinates of a flat index
    pub const fn coordinates(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }

    /// Borrow a node
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Borrow a node mutably
    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    /// All nodes in row-major order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Existing neighbours of a node with the direction leading to each
    pub fn neighbors(&self, index: usize) -> impl Iterator<Item = (Direction, usize)> + '_ {
        let slots = self.nodes.get(index).map_or([None; 4], |node| node.neighbors);
        Direction::ALL
            .into_iter()
            .zip(slots)
            .filter_map(|(direction, neighbor)| neighbor.map(|n| (direction, n)))
    }

    /// Direction leading from `from` to `to`, if they are adjacent
    pub fn direction_to(&self, from: usize, to: usize) -> Option<Direction> {
        self.neighbors(from)
            .find(|&(_, neighbor)| neighbor == to)
            .map(|(direction, _)| direction)
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(Node::degree).sum::<usize>() / 2
    }

    /// Check that every stored message has `states` entries
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first stored length that differs
    pub fn check_message_states(&self, states: usize) -> Result<()> {
        let stored = self.nodes.iter().flat_map(|node| node.incoming.iter().flatten());
        for message in stored {
            if message.len() != states {
                return Err(state_mismatch(states, message.len()));
            }
        }
        Ok(())
    }

    /// Drop every stored message, returning the graph to its initial state
    pub fn clear_messages(&mut self) {
        for node in &mut self.nodes {
            node.incoming = Default::default();
        }
    }

    /// Replace every inbox at once
    ///
    /// Used by the synchronous schedule to commit a whole round. Extra
    /// inboxes are ignored; missing ones leave their nodes untouched.
    pub fn commit_inboxes(&mut self, inboxes: Vec<Inbox>) {
        for (node, inbox) in self.nodes.iter_mut().zip(inboxes) {
            node.incoming = inbox;
        }
    }
}

// Records `neighbor` as lying in `direction` from `index`, and the reverse
fn link(nodes: &mut [Node], index: usize, neighbor: usize, direction: Direction) {
    if let Some(node) = nodes.get_mut(index) {
        if let Some(slot) = node.neighbors.get_mut(direction.slot()) {
            *slot = Some(neighbor);
        }
    }
    if let Some(node) = nodes.get_mut(neighbor) {
        if let Some(slot) = node.neighbors.get_mut(direction.opposite().slot()) {
            *slot = Some(index);
        }
    }
}
