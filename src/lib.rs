//! # scalargrad
//!
//! scalargrad is a small reverse-mode automatic differentiation engine over
//! dynamically built scalar computation graphs, with a neuron/layer/MLP
//! module system composed on top of it.
//!
//! ## Features
//!
//! - Reverse-mode automatic differentiation (backpropagation)
//! - Dynamic computation graph construction, one node per scalar
//! - Tagged backward rules dispatched by a single evaluator
//! - Gradient accumulation with correct fan-out handling
//! - Value-poisoning for arithmetic domain errors instead of panics
//! - High-level neural network modules, losses and SGD
//! - MNIST IDX dataset parsing for the bundled trainer
//! - Written 100% in safe Rust
//!
//! ## Example
//!
//! ```
//! use scalargrad::graph::Engine;
//!
//! let mut graph = Engine::new();
//! let a = graph.create_variable(2.0);
//! let b = graph.create_variable(3.0);
//! let y = graph.mul(a, b).unwrap();
//!
//! graph.backward(y).unwrap();
//! assert_eq!(graph.value(y), Some(6.0));
//! assert_eq!(graph.grad(a), Some(3.0));
//! assert_eq!(graph.grad(b), Some(2.0));
//! ```

pub mod data;
pub mod graph;
pub mod nn;

// Re-export commonly used types for convenience
pub use graph::{Engine, GraphMark, Node, NodeId, Op};
pub use nn::{Layer, Mlp, Module, Neuron, SGD};
