// Graph nodes and their handles.
// Nodes live in the engine's arena and reference each other through NodeId
// indices, never through pointers, so a node can outlive the stack frame of
// the call that produced it.

use crate::graph::op::Op;

/// Stable handle into the engine's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of this node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// A single scalar in the computation graph: the forward value, the gradient
/// accumulator, and the tagged backward rule that produced it.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    /// Forward value, fixed once the node is created.
    pub value: f64,
    /// Accumulated gradient. Starts at 0 and only ever receives `+=`
    /// contributions during `backward()`; a node feeding several consumers
    /// sums their contributions here.
    pub grad: f64,
    /// Backward rule tag, including parent handles and saved constants.
    pub op: Op,
}

impl Node {
    pub(crate) fn new(value: f64, op: Op) -> Self {
        Self {
            value,
            grad: 0.0,
            op,
        }
    }

    /// Leaf nodes (parameters, inputs, constants) have no parents and a
    /// no-op backward rule.
    pub fn is_leaf(&self) -> bool {
        matches!(self.op, Op::Leaf)
    }

    /// Invalid nodes mark a severed gradient path: NaN-valued arithmetic
    /// domain errors or the zero-valued loss error marker.
    pub fn is_invalid(&self) -> bool {
        matches!(self.op, Op::Invalid)
    }
}
