// Tagged backward rules.
// Each variant records the operator kind together with the operand handles
// and constants its local partial derivative needs. A single evaluator in the
// engine dispatches on the tag during the backward pass, which keeps the
// rules inspectable and testable independently of graph traversal.

use crate::graph::node::NodeId;

/// The operation that produced a node, doubling as its backward rule.
///
/// `Leaf` and `Invalid` are the two parentless tags: leaves are parameters,
/// inputs and constants; invalid nodes are the poisoned results of arithmetic
/// domain errors (NaN value) or the loss error marker (zero value). Both have
/// a no-op backward rule, so gradient flow stops at them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Leaf,
    Invalid,
    Add(NodeId, NodeId),
    Sub(NodeId, NodeId),
    Mul(NodeId, NodeId),
    Div(NodeId, NodeId),
    /// input + constant
    AddScalar(NodeId, f64),
    /// input * constant
    MulScalar(NodeId, f64),
    /// input ^ constant
    Pow(NodeId, f64),
    Exp(NodeId),
    Log(NodeId),
    Tanh(NodeId),
    Relu(NodeId),
}

impl Op {
    /// Parent edges of the node carrying this rule, in operand order.
    pub fn parents(&self) -> [Option<NodeId>; 2] {
        match *self {
            Op::Leaf | Op::Invalid => [None, None],
            Op::Add(a, b) | Op::Sub(a, b) | Op::Mul(a, b) | Op::Div(a, b) => [Some(a), Some(b)],
            Op::AddScalar(a, _)
            | Op::MulScalar(a, _)
            | Op::Pow(a, _)
            | Op::Exp(a)
            | Op::Log(a)
            | Op::Tanh(a)
            | Op::Relu(a) => [Some(a), None],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Leaf => "leaf",
            Op::Invalid => "invalid",
            Op::Add(..) => "add",
            Op::Sub(..) => "sub",
            Op::Mul(..) => "mul",
            Op::Div(..) => "div",
            Op::AddScalar(..) => "add_scalar",
            Op::MulScalar(..) => "mul_scalar",
            Op::Pow(..) => "pow",
            Op::Exp(..) => "exp",
            Op::Log(..) => "log",
            Op::Tanh(..) => "tanh",
            Op::Relu(..) => "relu",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
