// The computational graph engine.
// Nodes live in a single Vec arena owned by the engine; every edge is a
// NodeId index into that arena. Operator constructors evaluate eagerly:
// the forward value is computed on the spot and the new node carries the
// tagged backward rule for the later backward pass.

use crate::graph::node::{Node, NodeId};
use crate::graph::op::Op;

/// Watermark into the node arena, taken after the long-lived parameter
/// leaves are registered. `Engine::reset_to` truncates everything created
/// after the mark, discarding one forward+backward cycle's graph while
/// keeping parameter handles valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphMark(usize);

/// Scalar autodiff engine: node arena, operator constructors and the
/// topological backward scheduler.
#[derive(Debug, Default)]
pub struct Engine {
    nodes: Vec<Node>,
}

impl Engine {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Creates a leaf node (parameter, input or constant). Leaves have no
    /// parents and a no-op backward rule.
    pub fn create_variable(&mut self, value: f64) -> NodeId {
        self.push(Node::new(value, Op::Leaf))
    }

    /// Creates a zero-valued error marker. Used by losses to report an
    /// invalid sample as "no gradient signal" instead of failing.
    pub fn error_marker(&mut self) -> NodeId {
        self.push(Node::new(0.0, Op::Invalid))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn value(&self, id: NodeId) -> Option<f64> {
        self.get(id).map(|node| node.value)
    }

    pub fn grad(&self, id: NodeId) -> Option<f64> {
        self.get(id).map(|node| node.grad)
    }

    /// Overwrites a node's value. The optimizer uses this on parameter
    /// leaves between cycles; calling it on a node of a live graph would
    /// desynchronize saved operand values from their backward rules.
    pub fn set_value(&mut self, id: NodeId, value: f64) -> Result<(), String> {
        match self.nodes.get_mut(id.0) {
            Some(node) => {
                node.value = value;
                Ok(())
            }
            None => Err(format!("Node {} not found", id.0)),
        }
    }

    /// Resets a node's gradient accumulator to zero. Unknown handles are
    /// ignored so module `zero_grad` stays infallible.
    pub fn clear_grad(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.grad = 0.0;
        }
    }

    /// True if the node's value is the poisoned result of an arithmetic
    /// domain error somewhere upstream.
    pub fn is_poisoned(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|node| node.value.is_nan())
    }

    /// True if the node itself is an invalid (gradient-severing) node.
    pub fn is_invalid(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|node| node.is_invalid())
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Watermark for the current end of the arena.
    pub fn mark(&self) -> GraphMark {
        GraphMark(self.nodes.len())
    }

    /// Discards every node created after `mark`. The whole graph of one
    /// forward+backward cycle is dropped this way before the next forward
    /// pass; handles taken before the mark (the parameter prefix) survive.
    pub fn reset_to(&mut self, mark: GraphMark) {
        self.nodes.truncate(mark.0);
    }

    // ===== Operator constructors =====
    //
    // Each computes the forward value from the operand values as they are
    // right now, then records the rule; backward later re-reads those same
    // values from the arena, which cannot have changed because only `grad`
    // fields mutate during a cycle.

    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, String> {
        let (av, bv) = (self.operand(a)?, self.operand(b)?);
        Ok(self.push_checked(av + bv, Op::Add(a, b)))
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, String> {
        let (av, bv) = (self.operand(a)?, self.operand(b)?);
        Ok(self.push_checked(av - bv, Op::Sub(a, b)))
    }

    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, String> {
        let (av, bv) = (self.operand(a)?, self.operand(b)?);
        Ok(self.push_checked(av * bv, Op::Mul(a, b)))
    }

    /// Division. A zero divisor poisons the result: the node's value is NaN
    /// and gradient flow through it is severed rather than propagating a NaN
    /// gradient or panicking.
    pub fn div(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, String> {
        let (av, bv) = (self.operand(a)?, self.operand(b)?);
        if bv == 0.0 {
            return Ok(self.poisoned());
        }
        Ok(self.push_checked(av / bv, Op::Div(a, b)))
    }

    pub fn add_scalar(&mut self, a: NodeId, scalar: f64) -> Result<NodeId, String> {
        let av = self.operand(a)?;
        Ok(self.push_checked(av + scalar, Op::AddScalar(a, scalar)))
    }

    pub fn mul_scalar(&mut self, a: NodeId, scalar: f64) -> Result<NodeId, String> {
        let av = self.operand(a)?;
        Ok(self.push_checked(av * scalar, Op::MulScalar(a, scalar)))
    }

    /// Raise to a constant exponent.
    pub fn pow(&mut self, a: NodeId, exponent: f64) -> Result<NodeId, String> {
        let av = self.operand(a)?;
        Ok(self.push_checked(av.powf(exponent), Op::Pow(a, exponent)))
    }

    pub fn exp(&mut self, a: NodeId) -> Result<NodeId, String> {
        let av = self.operand(a)?;
        Ok(self.push_checked(av.exp(), Op::Exp(a)))
    }

    /// Natural logarithm. A non-positive argument poisons the result, same
    /// policy as `div` by zero.
    pub fn log(&mut self, a: NodeId) -> Result<NodeId, String> {
        let av = self.operand(a)?;
        if av <= 0.0 {
            return Ok(self.poisoned());
        }
        Ok(self.push_checked(av.ln(), Op::Log(a)))
    }

    pub fn tanh(&mut self, a: NodeId) -> Result<NodeId, String> {
        let av = self.operand(a)?;
        Ok(self.push_checked(av.tanh(), Op::Tanh(a)))
    }

    pub fn relu(&mut self, a: NodeId) -> Result<NodeId, String> {
        let av = self.operand(a)?;
        // f64::max(NaN, 0.0) is 0.0, which would quietly un-poison the value.
        if av.is_nan() {
            return Ok(self.poisoned());
        }
        Ok(self.push_checked(av.max(0.0), Op::Relu(a)))
    }

    // ===== Backward pass =====

    /// Runs the reverse-mode sweep from `loss`: seeds its gradient with 1,
    /// orders every reachable node so that each one is processed only after
    /// all of its consumers, and fires each backward rule exactly once.
    pub fn backward(&mut self, loss: NodeId) -> Result<(), String> {
        let order = self.topological_order(loss)?;
        self.nodes[loss.0].grad = 1.0;
        for &id in order.iter().rev() {
            self.backward_node(id);
        }
        Ok(())
    }

    /// Dependency-respecting order of all nodes reachable from `root`
    /// through parent edges: every node appears after all of its parents.
    /// Reversed, this is the schedule `backward` replays.
    ///
    /// The traversal is a post-order DFS with an explicit stack; scalar
    /// graphs routinely run hundreds of thousands of nodes deep, far past
    /// what recursion could handle.
    pub fn topological_order(&self, root: NodeId) -> Result<Vec<NodeId>, String> {
        if root.0 >= self.nodes.len() {
            return Err(format!("Node {} not found", root.0));
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        // (node, parents already expanded)
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if visited[id.0] {
                continue;
            }
            visited[id.0] = true;
            stack.push((id, true));
            for parent in self.nodes[id.0].op.parents().into_iter().flatten() {
                if !visited[parent.0] {
                    stack.push((parent, false));
                }
            }
        }

        Ok(order)
    }

    /// The single backward evaluator: dispatches one node's tagged rule,
    /// accumulating `out.grad * (local partial)` into each parent's grad.
    /// Local partials are evaluated at the original operand values.
    fn backward_node(&mut self, id: NodeId) {
        let Node { value, grad, op } = self.nodes[id.0];
        match op {
            // Leaves and invalid nodes: the gradient stops here.
            Op::Leaf | Op::Invalid => {}
            Op::Add(a, b) => {
                self.nodes[a.0].grad += grad;
                self.nodes[b.0].grad += grad;
            }
            Op::Sub(a, b) => {
                self.nodes[a.0].grad += grad;
                self.nodes[b.0].grad -= grad;
            }
            Op::Mul(a, b) => {
                let (av, bv) = (self.nodes[a.0].value, self.nodes[b.0].value);
                self.nodes[a.0].grad += grad * bv;
                self.nodes[b.0].grad += grad * av;
            }
            Op::Div(a, b) => {
                // b cannot be zero here: a zero divisor never produces a
                // Div node in the first place.
                let (av, bv) = (self.nodes[a.0].value, self.nodes[b.0].value);
                self.nodes[a.0].grad += grad / bv;
                self.nodes[b.0].grad += grad * (-av / (bv * bv));
            }
            Op::AddScalar(a, _) => {
                self.nodes[a.0].grad += grad;
            }
            Op::MulScalar(a, scalar) => {
                self.nodes[a.0].grad += grad * scalar;
            }
            Op::Pow(a, exponent) => {
                let av = self.nodes[a.0].value;
                self.nodes[a.0].grad += grad * exponent * av.powf(exponent - 1.0);
            }
            Op::Exp(a) => {
                self.nodes[a.0].grad += grad * value;
            }
            Op::Log(a) => {
                let av = self.nodes[a.0].value;
                self.nodes[a.0].grad += grad / av;
            }
            Op::Tanh(a) => {
                self.nodes[a.0].grad += grad * (1.0 - value * value);
            }
            Op::Relu(a) => {
                if self.nodes[a.0].value > 0.0 {
                    self.nodes[a.0].grad += grad;
                }
            }
        }
    }

    // ===== Internals =====

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// NaN-valued node whose backward rule is a no-op. Arithmetic domain
    /// errors sever the gradient path here instead of raising.
    fn poisoned(&mut self) -> NodeId {
        self.push(Node::new(f64::NAN, Op::Invalid))
    }

    /// A NaN forward value always becomes an invalid node, whatever produced
    /// it (poisoned operand, inf - inf, 0/0 guarded above, ...). This keeps
    /// the poison propagating through forward arithmetic while guaranteeing
    /// no backward rule ever multiplies a healthy branch's gradient by NaN.
    fn push_checked(&mut self, value: f64, op: Op) -> NodeId {
        if value.is_nan() {
            return self.poisoned();
        }
        self.push(Node::new(value, op))
    }

    fn operand(&self, id: NodeId) -> Result<f64, String> {
        self.value(id).ok_or_else(|| format!("Node {} not found", id.0))
    }
}
