// MNIST trainer: per-sample SGD over a scalar-graph MLP.
// Usage: scalargrad [data_dir] [epochs] [learning_rate] [samples_per_epoch]

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use scalargrad::data::{Dataset, MnistDataset};
use scalargrad::graph::Engine;
use scalargrad::nn::{cross_entropy, softmax, Mlp, Module, SGD};
use std::path::PathBuf;
use std::process::ExitCode;

const HIDDEN_WIDTH: usize = 64;
const NUM_CLASSES: usize = 10;
const LR_DECAY: f64 = 0.95;
const EVAL_SAMPLES: usize = 1000;

struct Config {
    data_dir: PathBuf,
    epochs: usize,
    lr: f64,
    samples_per_epoch: usize,
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let parse = |idx: usize, default: &str| -> String {
        args.get(idx).cloned().unwrap_or_else(|| default.to_string())
    };

    Ok(Config {
        data_dir: PathBuf::from(parse(0, "data")),
        epochs: parse(1, "3")
            .parse()
            .map_err(|e| format!("Invalid epoch count: {e}"))?,
        lr: parse(2, "0.01")
            .parse()
            .map_err(|e| format!("Invalid learning rate: {e}"))?,
        samples_per_epoch: parse(3, "1000")
            .parse()
            .map_err(|e| format!("Invalid sample count: {e}"))?,
    })
}

fn main() -> ExitCode {
    if stderrlog::new()
        .verbosity(log::Level::Info)
        .init()
        .is_err()
    {
        eprintln!("Failed to initialize logging");
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = parse_args()?;
    let dataset = MnistDataset::load(&config.data_dir)?;

    let mut graph = Engine::new();
    let mut rng = StdRng::seed_from_u64(0);
    let sizes = [dataset.train.num_features(), HIDDEN_WIDTH, NUM_CLASSES];
    let mlp = Mlp::new(&mut graph, &sizes, &mut rng)?;
    let params = mlp.parameters();
    log::info!(
        "MLP {:?}: {} parameters, lr {}, {} epochs",
        sizes,
        params.len(),
        config.lr,
        config.epochs
    );

    // Everything after this mark is one sample's transient graph.
    let mark = graph.mark();
    let mut sgd = SGD::with_defaults(config.lr);

    let mut indices: Vec<usize> = (0..dataset.train.len()).collect();
    for epoch in 0..config.epochs {
        indices.shuffle(&mut rng);
        let budget = config.samples_per_epoch.min(indices.len());

        let mut total_loss = 0.0;
        let mut counted = 0usize;
        for &index in &indices[..budget] {
            let (features, label) = dataset.train.get_item(index)?;

            mlp.zero_grad(&mut graph);
            let inputs: Vec<_> = features
                .iter()
                .map(|&v| graph.create_variable(v))
                .collect();
            let logits = mlp.forward(&mut graph, &inputs)?;
            let probs = softmax(&mut graph, &logits)?;
            let loss = cross_entropy(&mut graph, &probs, label)?;

            // Poisoned or skipped samples carry no gradient signal.
            if graph.is_poisoned(loss) || graph.is_invalid(loss) {
                log::warn!("Skipping sample {index}: no usable loss");
                graph.reset_to(mark);
                continue;
            }

            total_loss += graph.value(loss).unwrap_or(f64::NAN);
            counted += 1;

            graph.backward(loss)?;
            sgd.step(&mut graph, &params)?;
            graph.reset_to(mark);
        }

        let accuracy = evaluate(&mut graph, mark, &mlp, &dataset.test)?;
        log::info!(
            "Epoch {}: avg loss {:.4} over {} samples, test accuracy {:.2}%, lr {:.5}",
            epoch + 1,
            total_loss / counted.max(1) as f64,
            counted,
            accuracy * 100.0,
            sgd.lr()
        );

        sgd.set_lr(sgd.lr() * LR_DECAY);
    }

    Ok(())
}

/// Argmax accuracy over raw logits; softmax is monotone so it is skipped.
fn evaluate(
    graph: &mut Engine,
    mark: scalargrad::graph::GraphMark,
    mlp: &Mlp,
    data: &scalargrad::data::MnistData,
) -> Result<f64, String> {
    let budget = EVAL_SAMPLES.min(data.len());
    if budget == 0 {
        return Ok(0.0);
    }

    let mut correct = 0usize;
    for index in 0..budget {
        let (features, label) = data.get_item(index)?;
        let inputs: Vec<_> = features
            .iter()
            .map(|&v| graph.create_variable(v))
            .collect();
        let logits = mlp.forward(graph, &inputs)?;

        let mut best = 0usize;
        let mut best_value = f64::NEG_INFINITY;
        for (class, &logit) in logits.iter().enumerate() {
            let value = graph
                .value(logit)
                .ok_or_else(|| format!("Logit node {} missing", logit.index()))?;
            if value > best_value {
                best_value = value;
                best = class;
            }
        }
        if best == label {
            correct += 1;
        }
        graph.reset_to(mark);
    }

    Ok(correct as f64 / budget as f64)
}
