/// Softmax cross-entropy against an integer class target, in logits form.
///
/// The training pipeline applies this to the network's log-softmax output.
/// For a normalized input the log-sum-exp term is ~0, making the loss
/// equivalent to negative log-likelihood; the term is computed anyway so
/// loss values and gradients stay bit-consistent with the histories stored
/// in existing checkpoints.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// L = log Σ exp(x_i) - x_target
    pub fn loss(output: &[f64], target: usize) -> f64 {
        assert!(target < output.len(), "target class out of range");
        let max = output.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let log_sum_exp = max + output.iter().map(|&x| (x - max).exp()).sum::<f64>().ln();
        log_sum_exp - output[target]
    }

    /// ∂L/∂x_i = softmax(x)_i - 1[i == target]
    pub fn derivative(output: &[f64], target: usize) -> Vec<f64> {
        let max = output.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_sum: f64 = output.iter().map(|&x| (x - max).exp()).sum();
        output
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let softmax = (x - max).exp() / exp_sum;
                if i == target { softmax - 1.0 } else { softmax }
            })
            .collect()
    }
}
