pub mod engine;
pub mod node;
pub mod op;
mod tests;

pub use engine::{Engine, GraphMark};
pub use node::{Node, NodeId};
pub use op::Op;
