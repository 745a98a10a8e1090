use serde::{Serialize, Deserialize};

use crate::math::Tensor;

/// 2×2 max pooling with stride 2. Odd trailing rows/columns are dropped.
///
/// Holds no trainable parameters; the forward pass records the flat input
/// index of each window maximum so the backward pass can route gradients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaxPool2 {
    #[serde(skip)]
    cache_argmax: Vec<usize>,
    #[serde(skip)]
    cache_in_shape: (usize, usize, usize),
}

impl MaxPool2 {
    pub fn new() -> MaxPool2 {
        MaxPool2::default()
    }

    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        let out_h = input.height / 2;
        let out_w = input.width / 2;
        let mut out = Tensor::zeros(input.channels, out_h, out_w);
        self.cache_argmax = vec![0; out.len()];
        self.cache_in_shape = (input.channels, input.height, input.width);

        for c in 0..input.channels {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let mut best = f64::NEG_INFINITY;
                    let mut best_idx = 0;
                    for dy in 0..2 {
                        for dx in 0..2 {
                            let idx = input.idx(c, oy * 2 + dy, ox * 2 + dx);
                            if input.data[idx] > best {
                                best = input.data[idx];
                                best_idx = idx;
                            }
                        }
                    }
                    let out_idx = out.idx(c, oy, ox);
                    out.data[out_idx] = best;
                    self.cache_argmax[out_idx] = best_idx;
                }
            }
        }

        out
    }

    /// Routes each output gradient back to the input position that won the
    /// forward max; every other position receives zero.
    pub fn backward(&mut self, grad_out: &Tensor) -> Tensor {
        let (c, h, w) = self.cache_in_shape;
        let mut grad_in = Tensor::zeros(c, h, w);
        for (out_idx, &in_idx) in self.cache_argmax.iter().enumerate() {
            grad_in.data[in_idx] += grad_out.data[out_idx];
        }
        grad_in
    }
}
