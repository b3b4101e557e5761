use rand_distr::Uniform;

/// Xavier/Glorot uniform initialization.
/// Samples from U(-a, a) where a = sqrt(6 / (fan_in + fan_out)).
pub fn xavier_uniform(fan_in: usize, fan_out: usize) -> Result<Uniform<f64>, String> {
    let a = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Uniform::new(-a, a).map_err(|e| format!("xavier_uniform: {e}"))
}

/// Bound of the distribution `xavier_uniform` samples from.
pub fn xavier_bound(fan_in: usize, fan_out: usize) -> f64 {
    (6.0 / (fan_in + fan_out) as f64).sqrt()
}
