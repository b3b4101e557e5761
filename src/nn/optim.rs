// Stochastic gradient descent over parameter leaves.
// The optimizer is a graph consumer: it reads each parameter's accumulated
// gradient after backward() and mutates its value before the next forward
// pass, the only cross-cycle mutation the engine permits.

use crate::graph::{Engine, NodeId};
use std::collections::HashMap;

/// Stochastic Gradient Descent with optional classical momentum.
#[derive(Debug)]
pub struct SGD {
    lr: f64,
    momentum: f64,
    velocities: HashMap<NodeId, f64>,
}

impl SGD {
    pub fn new(lr: f64, momentum: f64) -> Self {
        Self {
            lr,
            momentum,
            velocities: HashMap::new(),
        }
    }

    pub fn with_defaults(lr: f64) -> Self {
        Self::new(lr, 0.0)
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Replaces the learning rate; used by training loops for decay
    /// schedules.
    pub fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }

    /// Applies `value -= lr * update` to every parameter, where `update` is
    /// the raw gradient or the momentum-smoothed velocity.
    pub fn step(&mut self, graph: &mut Engine, params: &[NodeId]) -> Result<(), String> {
        for &param in params {
            let grad = graph
                .grad(param)
                .ok_or_else(|| format!("Parameter {} not found", param.index()))?;
            let value = graph
                .value(param)
                .ok_or_else(|| format!("Parameter {} not found", param.index()))?;

            let update = if self.momentum != 0.0 {
                let velocity = self.velocities.entry(param).or_insert(0.0);
                *velocity = self.momentum * *velocity + grad;
                *velocity
            } else {
                grad
            };

            graph.set_value(param, value - self.lr * update)?;
        }
        Ok(())
    }
}
