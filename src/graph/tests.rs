#[cfg(test)]
mod tests {
    use crate::graph::{Engine, NodeId, Op};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Checks the analytic gradient of `build` against a centered finite
    /// difference for each input independently. `build` reconstructs the
    /// same expression on every call so perturbed inputs get a fresh graph.
    fn check_gradients<F>(build: F, inputs: &[f64])
    where
        F: Fn(&mut Engine, &[NodeId]) -> NodeId,
    {
        let mut graph = Engine::new();
        let ids: Vec<NodeId> = inputs.iter().map(|&v| graph.create_variable(v)).collect();
        let out = build(&mut graph, &ids);
        graph.backward(out).unwrap();
        let analytic: Vec<f64> = ids.iter().map(|&id| graph.grad(id).unwrap()).collect();

        let eps = 1e-4;
        for i in 0..inputs.len() {
            let eval = |delta: f64| {
                let mut graph = Engine::new();
                let mut values = inputs.to_vec();
                values[i] += delta;
                let ids: Vec<NodeId> =
                    values.iter().map(|&v| graph.create_variable(v)).collect();
                let out = build(&mut graph, &ids);
                graph.value(out).unwrap()
            };
            let numeric = (eval(eps) - eval(-eps)) / (2.0 * eps);
            assert_relative_eq!(analytic[i], numeric, max_relative = 1e-6, epsilon = 1e-7);
        }
    }

    #[test]
    fn mul_forward_and_backward() {
        // Scenario: a=2, b=3, y=a*b
        let mut graph = Engine::new();
        let a = graph.create_variable(2.0);
        let b = graph.create_variable(3.0);
        let y = graph.mul(a, b).unwrap();

        graph.backward(y).unwrap();

        assert_eq!(graph.value(y), Some(6.0));
        assert_eq!(graph.grad(a), Some(3.0));
        assert_eq!(graph.grad(b), Some(2.0));
    }

    #[test]
    fn relu_blocks_negative_input() {
        let mut graph = Engine::new();
        let x = graph.create_variable(-1.0);
        let y = graph.relu(x).unwrap();

        graph.backward(y).unwrap();

        assert_eq!(graph.value(y), Some(0.0));
        assert_eq!(graph.grad(x), Some(0.0));
    }

    #[test]
    fn fan_out_accumulates_both_contributions() {
        // y = a + a must give a.grad == 2, not 1: the multivariate chain
        // rule sums over every path from the output to the leaf.
        let mut graph = Engine::new();
        let a = graph.create_variable(3.0);
        let y = graph.add(a, a).unwrap();

        graph.backward(y).unwrap();

        assert_eq!(graph.value(y), Some(6.0));
        assert_eq!(graph.grad(a), Some(2.0));
    }

    #[test]
    fn division_by_zero_is_contained() {
        let mut graph = Engine::new();
        let a = graph.create_variable(5.0);
        let b = graph.create_variable(0.0);
        let z = graph.div(a, b).unwrap();

        assert!(graph.value(z).unwrap().is_nan());
        assert!(graph.is_invalid(z));

        graph.backward(z).unwrap();
        assert_eq!(graph.grad(a), Some(0.0));
        assert_eq!(graph.grad(b), Some(0.0));
    }

    #[test]
    fn log_of_non_positive_is_contained() {
        let mut graph = Engine::new();
        let a = graph.create_variable(-2.0);
        let z = graph.log(a).unwrap();

        assert!(graph.value(z).unwrap().is_nan());
        assert!(graph.is_poisoned(z));

        graph.backward(z).unwrap();
        assert_eq!(graph.grad(a), Some(0.0));

        let zero = graph.create_variable(0.0);
        let z0 = graph.log(zero).unwrap();
        assert!(graph.value(z0).unwrap().is_nan());
    }

    #[test]
    fn poison_propagates_forward_without_corrupting_gradients() {
        let mut graph = Engine::new();
        let a = graph.create_variable(1.0);
        let zero = graph.create_variable(0.0);
        let c = graph.create_variable(4.0);

        let poisoned = graph.div(a, zero).unwrap();
        let product = graph.mul(poisoned, c).unwrap();
        assert!(graph.value(product).unwrap().is_nan());
        assert!(graph.is_invalid(product));

        graph.backward(product).unwrap();
        // Gradient flow is severed, never NaN.
        for &id in &[a, zero, c] {
            assert_eq!(graph.grad(id), Some(0.0));
        }
    }

    #[test]
    fn relu_of_poisoned_value_stays_poisoned() {
        let mut graph = Engine::new();
        let a = graph.create_variable(1.0);
        let zero = graph.create_variable(0.0);
        let poisoned = graph.div(a, zero).unwrap();

        let y = graph.relu(poisoned).unwrap();
        assert!(graph.value(y).unwrap().is_nan());
    }

    #[test]
    fn topological_order_respects_parent_edges() {
        // Diamond: x feeds both y = x*x and z = exp(x), joined by w = y + z.
        let mut graph = Engine::new();
        let x = graph.create_variable(2.0);
        let y = graph.mul(x, x).unwrap();
        let z = graph.exp(x).unwrap();
        let w = graph.add(y, z).unwrap();

        let order = graph.topological_order(w).unwrap();

        // Every node appears exactly once, after all of its parents; the
        // reversed order therefore runs each rule only after every consumer.
        let mut seen = std::collections::HashSet::new();
        for &id in &order {
            for parent in graph.get(id).unwrap().op.parents().into_iter().flatten() {
                assert!(seen.contains(&parent), "{id} scheduled before parent {parent}");
            }
            assert!(seen.insert(id), "{id} appears twice in the order");
        }
        assert_eq!(*order.last().unwrap(), w);
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn diamond_gradient_sums_over_paths() {
        // w = x*x + exp(x) at x=2: dw/dx = 2x + e^x
        let mut graph = Engine::new();
        let x = graph.create_variable(2.0);
        let y = graph.mul(x, x).unwrap();
        let z = graph.exp(x).unwrap();
        let w = graph.add(y, z).unwrap();

        graph.backward(w).unwrap();
        assert_relative_eq!(graph.grad(x).unwrap(), 4.0 + 2.0f64.exp(), max_relative = 1e-12);
    }

    #[test]
    fn backward_rules_fire_exactly_once() {
        // If a fanned-out node's rule ran more than once the leaf would
        // receive double contributions: y = (a + a) * c at a=3, c=5 has
        // dy/da = 2c = 10 exactly.
        let mut graph = Engine::new();
        let a = graph.create_variable(3.0);
        let c = graph.create_variable(5.0);
        let s = graph.add(a, a).unwrap();
        let y = graph.mul(s, c).unwrap();

        graph.backward(y).unwrap();
        assert_eq!(graph.grad(a), Some(10.0));
        assert_eq!(graph.grad(c), Some(6.0));
    }

    #[test]
    fn reset_reproduces_identical_gradients() {
        let mut graph = Engine::new();
        let a = graph.create_variable(0.7);
        let b = graph.create_variable(-1.3);
        let mark = graph.mark();

        let run = |graph: &mut Engine| {
            let p = graph.mul(a, b).unwrap();
            let s = graph.add(p, a).unwrap();
            let out = graph.tanh(s).unwrap();
            graph.backward(out).unwrap();
            (graph.grad(a).unwrap(), graph.grad(b).unwrap())
        };

        let first = run(&mut graph);

        graph.clear_grad(a);
        graph.clear_grad(b);
        graph.reset_to(mark);
        assert_eq!(graph.num_nodes(), 2);

        let second = run(&mut graph);
        // Bit-identical, not merely close: no state may leak across cycles.
        assert_eq!(first, second);
    }

    #[test]
    fn mark_keeps_parameter_handles_valid() {
        let mut graph = Engine::new();
        let p = graph.create_variable(1.5);
        let mark = graph.mark();

        let x = graph.create_variable(2.0);
        let y = graph.mul(p, x).unwrap();
        graph.backward(y).unwrap();
        assert_eq!(graph.grad(p), Some(2.0));

        graph.reset_to(mark);
        assert_eq!(graph.value(p), Some(1.5));
        assert_eq!(graph.num_nodes(), 1);
        // The transient nodes are gone.
        assert!(graph.get(y).is_none());
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let mut graph = Engine::new();
        let a = graph.create_variable(1.0);
        let stale = NodeId(7);

        assert!(graph.add(a, stale).is_err());
        assert!(graph.backward(stale).is_err());
        assert!(graph.set_value(stale, 0.0).is_err());
    }

    #[test]
    fn seed_overwrites_loss_gradient() {
        let mut graph = Engine::new();
        let a = graph.create_variable(2.0);
        let y = graph.mul(a, a).unwrap();
        graph.backward(y).unwrap();
        assert_eq!(graph.grad(y), Some(1.0));
        assert_eq!(graph.grad(a), Some(4.0));
    }

    #[test]
    fn binary_operator_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..8 {
            let a = rng.random_range(-2.0..2.0);
            // Keep divisors away from the poisoning singularity.
            let b = rng.random_range(0.5..2.0) * if rng.random_bool(0.5) { 1.0 } else { -1.0 };

            check_gradients(|g, ids| g.add(ids[0], ids[1]).unwrap(), &[a, b]);
            check_gradients(|g, ids| g.sub(ids[0], ids[1]).unwrap(), &[a, b]);
            check_gradients(|g, ids| g.mul(ids[0], ids[1]).unwrap(), &[a, b]);
            check_gradients(|g, ids| g.div(ids[0], ids[1]).unwrap(), &[a, b]);
        }
    }

    #[test]
    fn unary_operator_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..8 {
            let x = rng.random_range(-2.0..2.0);
            let positive = rng.random_range(0.5..3.0);

            check_gradients(|g, ids| g.exp(ids[0]).unwrap(), &[x]);
            check_gradients(|g, ids| g.tanh(ids[0]).unwrap(), &[x]);
            check_gradients(|g, ids| g.log(ids[0]).unwrap(), &[positive]);
            check_gradients(|g, ids| g.add_scalar(ids[0], 1.25).unwrap(), &[x]);
            check_gradients(|g, ids| g.mul_scalar(ids[0], -0.75).unwrap(), &[x]);
            if x.abs() > 0.1 {
                // Stay away from the kink at zero where the one-sided
                // derivative and the centered estimate disagree.
                check_gradients(|g, ids| g.relu(ids[0]).unwrap(), &[x]);
            }
        }
    }

    #[test]
    fn pow_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(11);
        for &exponent in &[2.0, 3.0, -1.0, 0.5] {
            for _ in 0..4 {
                let base = rng.random_range(0.5..3.0);
                check_gradients(|g, ids| g.pow(ids[0], exponent).unwrap(), &[base]);
            }
        }
    }

    #[test]
    fn composite_expression_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..4 {
            let a = rng.random_range(0.5..2.0);
            let b = rng.random_range(-1.5..-0.5);
            let c = rng.random_range(0.5..2.0);
            // f = tanh(a*b + exp(c)) / (a + c), fan-out on both a and c
            check_gradients(
                |g, ids| {
                    let prod = g.mul(ids[0], ids[1]).unwrap();
                    let e = g.exp(ids[2]).unwrap();
                    let s = g.add(prod, e).unwrap();
                    let t = g.tanh(s).unwrap();
                    let denom = g.add(ids[0], ids[2]).unwrap();
                    g.div(t, denom).unwrap()
                },
                &[a, b, c],
            );
        }
    }

    #[test]
    fn node_metadata_accessors() {
        let mut graph = Engine::new();
        let a = graph.create_variable(1.0);
        let b = graph.create_variable(2.0);
        let y = graph.add(a, b).unwrap();

        assert!(graph.get(a).unwrap().is_leaf());
        assert!(!graph.get(y).unwrap().is_leaf());
        assert_eq!(graph.get(y).unwrap().op, Op::Add(a, b));
        assert_eq!(graph.get(y).unwrap().op.name(), "add");
        assert_eq!(format!("{a}"), "NodeId(0)");

        let marker = graph.error_marker();
        assert!(graph.is_invalid(marker));
        assert_eq!(graph.value(marker), Some(0.0));
    }
}
