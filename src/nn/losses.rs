// Loss functions built entirely from the primitive operator set, so their
// gradients come from the normal backward pass with no fused shortcuts.

use crate::graph::{Engine, NodeId};

/// Squared error `(target - prediction)^2`.
pub fn mse(graph: &mut Engine, prediction: NodeId, target: NodeId) -> Result<NodeId, String> {
    let diff = graph.sub(target, prediction)?;
    graph.mul(diff, diff)
}

/// Softmax over a vector of logit nodes, one probability node per logit.
///
/// The maximum logit is subtracted before exponentiation for numerical
/// stability. That shift is a plain number, not a graph node: a constant
/// offset cancels in the exp ratio, so it carries no gradient of its own and
/// the logits still receive exact softmax gradients from downstream losses.
pub fn softmax(graph: &mut Engine, logits: &[NodeId]) -> Result<Vec<NodeId>, String> {
    if logits.is_empty() {
        return Err("softmax needs at least one logit".to_string());
    }

    let mut max = f64::NEG_INFINITY;
    for &logit in logits {
        let v = graph
            .value(logit)
            .ok_or_else(|| format!("Node {} not found", logit.index()))?;
        if v > max {
            max = v;
        }
    }

    let mut exps = Vec::with_capacity(logits.len());
    for &logit in logits {
        let shifted = graph.add_scalar(logit, -max)?;
        exps.push(graph.exp(shifted)?);
    }

    let mut denom = exps[0];
    for &e in &exps[1..] {
        denom = graph.add(denom, e)?;
    }

    exps.iter().map(|&e| graph.div(e, denom)).collect()
}

/// Cross-entropy `-log(probs[target])` against an integer class index.
///
/// An out-of-range target does not fail: it logs a warning and returns a
/// zero-valued error marker, so the sample contributes zero loss and zero
/// gradient.
pub fn cross_entropy(
    graph: &mut Engine,
    probs: &[NodeId],
    target: usize,
) -> Result<NodeId, String> {
    match probs.get(target) {
        Some(&p) => {
            let log_p = graph.log(p)?;
            graph.mul_scalar(log_p, -1.0)
        }
        None => {
            log::warn!(
                "cross_entropy: target class {target} out of range for {} outputs, skipping sample",
                probs.len()
            );
            Ok(graph.error_marker())
        }
    }
}
