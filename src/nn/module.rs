use crate::graph::{Engine, NodeId};

/// The base trait for all neural network modules.
///
/// A module owns long-lived parameter leaves inside the engine's arena and
/// knows how to build its forward computation as fresh graph nodes. The
/// capability set is deliberately small: build a forward pass, expose the
/// parameter handles, reset their gradients.
pub trait Module {
    /// Builds this module's forward computation in `graph`.
    ///
    /// Inputs and outputs are handles to scalar nodes, one per unit. The
    /// call is pure given the input and current parameter values; every
    /// invocation creates new graph nodes.
    fn forward(&self, graph: &mut Engine, inputs: &[NodeId]) -> Result<Vec<NodeId>, String>;

    /// Handles of every learnable leaf of this module, in a stable order.
    fn parameters(&self) -> Vec<NodeId>;

    /// Resets every parameter's gradient accumulator to zero. Must run
    /// before each `backward()` whose gradients should not include
    /// contributions from a previous cycle.
    fn zero_grad(&self, graph: &mut Engine) {
        for param in self.parameters() {
            graph.clear_grad(param);
        }
    }

    /// Number of learnable scalars in this module.
    fn num_parameters(&self) -> usize {
        self.parameters().len()
    }
}
