// Neuron, Layer and Mlp.
// Every forward pass is built out of primitive graph operations, so the
// whole dot product of a neuron exists as nodes and the backward pass
// differentiates it with no layer-specific gradient code.

use crate::graph::{Engine, NodeId};
use crate::nn::initializers::xavier_uniform;
use crate::nn::module::Module;
use rand::Rng;
use rand_distr::Distribution;

/// A single unit: `relu(sum(w_i * x_i) + b)`, or the raw affine value when
/// built without the nonlinearity.
#[derive(Debug, Clone)]
pub struct Neuron {
    weights: Vec<NodeId>,
    bias: NodeId,
    nonlin: bool,
}

impl Neuron {
    /// Creates a neuron with `in_features` weights initialized from the
    /// Xavier/Glorot uniform distribution bounded by sqrt(6 / (fan_in + 1))
    /// (the 1 is this neuron's single output), and a zero bias. The weights
    /// are deterministic given `rng`.
    pub fn new<R: Rng + ?Sized>(
        graph: &mut Engine,
        in_features: usize,
        nonlin: bool,
        rng: &mut R,
    ) -> Result<Self, String> {
        let dist = xavier_uniform(in_features, 1)?;
        let weights = (0..in_features)
            .map(|_| graph.create_variable(dist.sample(rng)))
            .collect();
        let bias = graph.create_variable(0.0);
        Ok(Self {
            weights,
            bias,
            nonlin,
        })
    }

    /// Creates a neuron from explicit weight and bias values.
    pub fn from_weights(graph: &mut Engine, weights: &[f64], bias: f64, nonlin: bool) -> Self {
        let weights = weights.iter().map(|&w| graph.create_variable(w)).collect();
        let bias = graph.create_variable(bias);
        Self {
            weights,
            bias,
            nonlin,
        }
    }

    pub fn in_features(&self) -> usize {
        self.weights.len()
    }

    /// Forward pass producing this neuron's single output node.
    pub fn forward_one(&self, graph: &mut Engine, inputs: &[NodeId]) -> Result<NodeId, String> {
        if inputs.len() != self.weights.len() {
            return Err(format!(
                "Neuron expects {} inputs, got {}",
                self.weights.len(),
                inputs.len()
            ));
        }

        let mut acc: Option<NodeId> = None;
        for (&w, &x) in self.weights.iter().zip(inputs) {
            let term = graph.mul(w, x)?;
            acc = Some(match acc {
                Some(sum) => graph.add(sum, term)?,
                None => term,
            });
        }
        let affine = match acc {
            Some(sum) => graph.add(sum, self.bias)?,
            // Zero-width neuron: the output is just the bias leaf.
            None => self.bias,
        };

        if self.nonlin {
            graph.relu(affine)
        } else {
            Ok(affine)
        }
    }
}

impl Module for Neuron {
    fn forward(&self, graph: &mut Engine, inputs: &[NodeId]) -> Result<Vec<NodeId>, String> {
        Ok(vec![self.forward_one(graph, inputs)?])
    }

    fn parameters(&self) -> Vec<NodeId> {
        let mut params = self.weights.clone();
        params.push(self.bias);
        params
    }
}

/// An ordered collection of neurons sharing the same input width; produces
/// one output node per neuron.
#[derive(Debug, Clone)]
pub struct Layer {
    neurons: Vec<Neuron>,
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        graph: &mut Engine,
        in_features: usize,
        out_features: usize,
        nonlin: bool,
        rng: &mut R,
    ) -> Result<Self, String> {
        let neurons = (0..out_features)
            .map(|_| Neuron::new(graph, in_features, nonlin, rng))
            .collect::<Result<_, _>>()?;
        Ok(Self { neurons })
    }

    pub fn out_features(&self) -> usize {
        self.neurons.len()
    }
}

impl Module for Layer {
    fn forward(&self, graph: &mut Engine, inputs: &[NodeId]) -> Result<Vec<NodeId>, String> {
        self.neurons
            .iter()
            .map(|neuron| neuron.forward_one(graph, inputs))
            .collect()
    }

    fn parameters(&self) -> Vec<NodeId> {
        self.neurons
            .iter()
            .flat_map(|neuron| neuron.parameters())
            .collect()
    }
}

/// Multi-layer perceptron built from a list of layer widths. Every layer
/// except the last applies the nonlinearity; the last stays linear so its
/// outputs can serve as raw classification logits.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Layer>,
}

impl Mlp {
    /// `sizes` is `[inputs, hidden..., outputs]` and needs at least an input
    /// and an output width.
    pub fn new<R: Rng + ?Sized>(
        graph: &mut Engine,
        sizes: &[usize],
        rng: &mut R,
    ) -> Result<Self, String> {
        if sizes.len() < 2 {
            return Err(format!(
                "MLP needs at least input and output widths, got {sizes:?}"
            ));
        }

        let mut layers = Vec::with_capacity(sizes.len() - 1);
        for i in 0..sizes.len() - 1 {
            let is_last = i == sizes.len() - 2;
            layers.push(Layer::new(graph, sizes[i], sizes[i + 1], !is_last, rng)?);
        }
        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

impl Module for Mlp {
    fn forward(&self, graph: &mut Engine, inputs: &[NodeId]) -> Result<Vec<NodeId>, String> {
        let mut outputs = inputs.to_vec();
        for layer in &self.layers {
            outputs = layer.forward(graph, &outputs)?;
        }
        Ok(outputs)
    }

    fn parameters(&self) -> Vec<NodeId> {
        self.layers
            .iter()
            .flat_map(|layer| layer.parameters())
            .collect()
    }
}
