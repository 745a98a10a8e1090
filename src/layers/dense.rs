use serde::{Serialize, Deserialize};

use crate::activation::Activation;
use crate::math::tensor::{he_init, xavier_init};
use crate::optim::Adam;

/// Fully-connected layer over flat vectors, with a fused activation.
/// Weights are stored flat in `[in_size][out_size]` order (row = input).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub in_size: usize,
    pub out_size: usize,
    pub weights: Vec<f64>,
    pub biases: Vec<f64>,
    pub activation: Activation,
    #[serde(skip)]
    grad_weights: Vec<f64>,
    #[serde(skip)]
    grad_biases: Vec<f64>,
    #[serde(skip)]
    cache_input: Vec<f64>,
    #[serde(skip)]
    cache_pre: Vec<f64>,
}

impl Dense {
    /// He initialization before ReLU, Xavier otherwise. Zero biases.
    pub fn new(in_size: usize, out_size: usize, activation: Activation) -> Dense {
        let count = in_size * out_size;
        let weights = match activation {
            Activation::ReLU => he_init(count, in_size),
            Activation::Identity => xavier_init(count, in_size),
        };

        Dense {
            in_size,
            out_size,
            weights,
            biases: vec![0.0; out_size],
            activation,
            grad_weights: vec![0.0; count],
            grad_biases: vec![0.0; out_size],
            cache_input: vec![],
            cache_pre: vec![],
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.weights.len() != self.in_size * self.out_size {
            return Err(format!(
                "dense weights: expected {} values, found {}",
                self.in_size * self.out_size,
                self.weights.len()
            ));
        }
        if self.biases.len() != self.out_size {
            return Err(format!(
                "dense biases: expected {} values, found {}",
                self.out_size,
                self.biases.len()
            ));
        }
        Ok(())
    }

    pub fn zero_grad(&mut self) {
        self.grad_weights.clear();
        self.grad_weights.resize(self.weights.len(), 0.0);
        self.grad_biases.clear();
        self.grad_biases.resize(self.biases.len(), 0.0);
    }

    pub fn forward(&mut self, input: &[f64]) -> Vec<f64> {
        assert_eq!(input.len(), self.in_size, "dense input size mismatch");

        let mut pre = self.biases.clone();
        for (i, &x) in input.iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            let row = &self.weights[i * self.out_size..(i + 1) * self.out_size];
            for (o, &w) in row.iter().enumerate() {
                pre[o] += x * w;
            }
        }

        let out: Vec<f64> = pre.iter().map(|&z| self.activation.function(z)).collect();
        self.cache_input = input.to_vec();
        self.cache_pre = pre;
        out
    }

    /// Backward pass for one sample; accumulates parameter gradients and
    /// returns ∂L/∂input.
    pub fn backward(&mut self, grad_out: &[f64]) -> Vec<f64> {
        assert_eq!(grad_out.len(), self.out_size, "dense gradient size mismatch");

        // δ = ∂L/∂a ⊙ σ'(z)
        let delta: Vec<f64> = grad_out
            .iter()
            .zip(self.cache_pre.iter())
            .map(|(&g, &z)| g * self.activation.derivative(z))
            .collect();

        for (o, &d) in delta.iter().enumerate() {
            self.grad_biases[o] += d;
        }

        let mut grad_in = vec![0.0; self.in_size];
        for (i, &x) in self.cache_input.iter().enumerate() {
            let row_start = i * self.out_size;
            let mut acc = 0.0;
            for (o, &d) in delta.iter().enumerate() {
                self.grad_weights[row_start + o] += d * x;
                acc += d * self.weights[row_start + o];
            }
            grad_in[i] = acc;
        }

        grad_in
    }

    pub fn apply_gradients(&mut self, optimizer: &mut Adam, slot: &mut usize, scale: f64) {
        let gw: Vec<f64> = self.grad_weights.iter().map(|g| g * scale).collect();
        optimizer.step(*slot, &mut self.weights, &gw);
        *slot += 1;

        let gb: Vec<f64> = self.grad_biases.iter().map(|g| g * scale).collect();
        optimizer.step(*slot, &mut self.biases, &gb);
        *slot += 1;
    }
}
