// Neural network module for scalargrad.
// High-level building blocks composed on top of the scalar autodiff engine:
// modules build graph nodes during forward passes, the engine differentiates
// them, and the optimizer consumes the leaf gradients.

pub mod initializers;
pub mod layers;
pub mod losses;
pub mod module;
pub mod optim;

// Re-export the main types and traits for convenience
pub use layers::{Layer, Mlp, Neuron};
pub use losses::{cross_entropy, mse, softmax};
pub use module::Module;
pub use optim::SGD;
