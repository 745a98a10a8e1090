use serde::{Serialize, Deserialize};

/// Log-softmax over the network's final logits, computed with the usual
/// max-shift for numerical stability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSoftmax {
    #[serde(skip)]
    cache_out: Vec<f64>,
}

impl LogSoftmax {
    pub fn new() -> LogSoftmax {
        LogSoftmax::default()
    }

    /// lp_i = z_i - max(z) - ln Σ exp(z_j - max(z))
    pub fn forward(&mut self, input: &[f64]) -> Vec<f64> {
        let max = input.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let log_sum: f64 = input.iter().map(|&z| (z - max).exp()).sum::<f64>().ln();
        let out: Vec<f64> = input.iter().map(|&z| z - max - log_sum).collect();
        self.cache_out = out.clone();
        out
    }

    /// Jacobian-vector product: ∂L/∂z_j = g_j - exp(lp_j) · Σ g_i.
    pub fn backward(&mut self, grad_out: &[f64]) -> Vec<f64> {
        let grad_sum: f64 = grad_out.iter().sum();
        grad_out
            .iter()
            .zip(self.cache_out.iter())
            .map(|(&g, &lp)| g - lp.exp() * grad_sum)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_exponentiates_to_a_distribution() {
        let mut ls = LogSoftmax::new();
        let out = ls.forward(&[1.0, 2.0, 3.0]);
        let sum: f64 = out.iter().map(|&lp| lp.exp()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(out.iter().all(|&lp| lp <= 0.0));
    }

    #[test]
    fn stable_for_large_logits() {
        let mut ls = LogSoftmax::new();
        let out = ls.forward(&[1000.0, 1001.0]);
        assert!(out.iter().all(|lp| lp.is_finite()));
        let sum: f64 = out.iter().map(|&lp| lp.exp()).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut ls = LogSoftmax::new();
        let input = vec![0.3, -1.2, 0.7, 0.1];
        let out = ls.forward(&input);
        // Objective: weighted sum of log-probs.
        let weights = [0.5, -1.0, 2.0, 0.25];
        let base: f64 = out.iter().zip(weights.iter()).map(|(o, w)| o * w).sum();
        let grad = ls.backward(&weights);

        let eps = 1e-7;
        for i in 0..input.len() {
            let mut bumped = input.clone();
            bumped[i] += eps;
            let plus: f64 = ls.forward(&bumped).iter().zip(weights.iter()).map(|(o, w)| o * w).sum();
            let numeric = (plus - base) / eps;
            assert!((grad[i] - numeric).abs() < 1e-5, "component {}", i);
        }
    }
}
