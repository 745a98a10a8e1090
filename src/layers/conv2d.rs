use serde::{Serialize, Deserialize};

use crate::activation::Activation;
use crate::math::tensor::{he_init, Tensor};
use crate::optim::Adam;

/// 2D convolutional layer with a fused element-wise activation.
///
/// Filters are stored flat in `[out_channels][in_channels][kernel][kernel]`
/// order. Input spatial dimensions are fixed at construction so output
/// shapes are known up front; the whole network runs on a single fixed
/// input size anyway.
///
/// Forward caches (input and pre-activation map) and gradient accumulators
/// are skipped during serialization and rebuilt lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
    pub in_height: usize,
    pub in_width: usize,
    pub weights: Vec<f64>,
    pub biases: Vec<f64>,
    pub activation: Activation,
    #[serde(skip)]
    grad_weights: Vec<f64>,
    #[serde(skip)]
    grad_biases: Vec<f64>,
    #[serde(skip)]
    cache_input: Tensor,
    #[serde(skip)]
    cache_pre: Tensor,
}

impl Conv2d {
    /// He-initialized filters (fan_in = in_channels * kernel²), zero biases.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        in_height: usize,
        in_width: usize,
        activation: Activation,
    ) -> Conv2d {
        let weight_count = out_channels * in_channels * kernel_size * kernel_size;
        let fan_in = in_channels * kernel_size * kernel_size;

        Conv2d {
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            in_height,
            in_width,
            weights: he_init(weight_count, fan_in),
            biases: vec![0.0; out_channels],
            activation,
            grad_weights: vec![0.0; weight_count],
            grad_biases: vec![0.0; out_channels],
            cache_input: Tensor::default(),
            cache_pre: Tensor::default(),
        }
    }

    /// (in_height + 2*padding - kernel_size) / stride + 1
    pub fn out_height(&self) -> usize {
        (self.in_height + 2 * self.padding - self.kernel_size) / self.stride + 1
    }

    pub fn out_width(&self) -> usize {
        (self.in_width + 2 * self.padding - self.kernel_size) / self.stride + 1
    }

    pub fn out_shape(&self) -> (usize, usize, usize) {
        (self.out_channels, self.out_height(), self.out_width())
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Checks that the serialized weight buffers match the declared shape.
    pub fn validate(&self) -> Result<(), String> {
        let expected = self.out_channels * self.in_channels * self.kernel_size * self.kernel_size;
        if self.weights.len() != expected {
            return Err(format!(
                "conv weights: expected {} values, found {}",
                expected,
                self.weights.len()
            ));
        }
        if self.biases.len() != self.out_channels {
            return Err(format!(
                "conv biases: expected {} values, found {}",
                self.out_channels,
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

    /// Flat index of weight (oc, ic, ky, kx).
    #[inline]
    fn w_idx(&self, oc: usize, ic: usize, ky: usize, kx: usize) -> usize {
        ((oc * self.in_channels + ic) * self.kernel_size + ky) * self.kernel_size + kx
    }

    pub fn forward(&mut self, input: &Tensor) -> Tensor {
        assert_eq!(input.channels, self.in_channels, "input channel mismatch");
        assert_eq!(input.height, self.in_height, "input height mismatch");
        assert_eq!(input.width, self.in_width, "input width mismatch");

        let out_h = self.out_height();
        let out_w = self.out_width();
        let k = self.kernel_size;
        let mut pre = Tensor::zeros(self.out_channels, out_h, out_w);

        for oc in 0..self.out_channels {
            let bias = self.biases[oc];
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let mut sum = bias;
                    // Top-left corner of the receptive field in padded coordinates.
                    let base_y = oy * self.stride;
                    let base_x = ox * self.stride;
                    for ic in 0..self.in_channels {
                        for ky in 0..k {
                            let iy = (base_y + ky) as isize - self.padding as isize;
                            if iy < 0 || iy >= self.in_height as isize {
                                continue;
                            }
                            for kx in 0..k {
                                let ix = (base_x + kx) as isize - self.padding as isize;
                                if ix < 0 || ix >= self.in_width as isize {
                                    continue;
                                }
                                sum += self.weights[self.w_idx(oc, ic, ky, kx)]
                                    * input.at(ic, iy as usize, ix as usize);
                            }
                        }
                    }
                    pre.set(oc, oy, ox, sum);
                }
            }
        }

        let out = pre.map(|x| self.activation.function(x));
        self.cache_input = input.clone();
        self.cache_pre = pre;
        out
    }

    /// Backward pass for one sample. `grad_out` is ∂L/∂a for this layer's
    /// output; gradients accumulate into the layer buffers (zeroed per batch
    /// by the caller) and the returned tensor is ∂L/∂input.
    pub fn backward(&mut self, grad_out: &Tensor) -> Tensor {
        let out_h = self.out_height();
        let out_w = self.out_width();
        let k = self.kernel_size;
        let mut grad_in = Tensor::zeros(self.in_channels, self.in_height, self.in_width);

        for oc in 0..self.out_channels {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    // δ = ∂L/∂a ⊙ σ'(z)
                    let delta = grad_out.at(oc, oy, ox)
                        * self.activation.derivative(self.cache_pre.at(oc, oy, ox));
                    if delta == 0.0 {
                        continue;
                    }
                    self.grad_biases[oc] += delta;

                    let base_y = oy * self.stride;
                    let base_x = ox * self.stride;
                    for ic in 0..self.in_channels {
                        for ky in 0..k {
                            let iy = (base_y + ky) as isize - self.padding as isize;
                            if iy < 0 || iy >= self.in_height as isize {
                                continue;
                            }
                            for kx in 0..k {
                                let ix = (base_x + kx) as isize - self.padding as isize;
                                if ix < 0 || ix >= self.in_width as isize {
                                    continue;
                                }
                                let w_i = self.w_idx(oc, ic, ky, kx);
                                let in_i = self.cache_input.idx(ic, iy as usize, ix as usize);
                                self.grad_weights[w_i] += delta * self.cache_input.data[in_i];
                                grad_in.data[in_i] += delta * self.weights[w_i];
                            }
                        }
                    }
                }
            }
        }

        grad_in
    }

    /// Hands the (scaled) accumulated gradients to the optimizer.
    /// `slot` distinguishes this layer's parameter buffers in the optimizer
    /// state and is advanced past the buffers consumed here.
    pub fn apply_gradients(&mut self, optimizer: &mut Adam, slot: &mut usize, scale: f64) {
        let gw: Vec<f64> = self.grad_weights.iter().map(|g| g * scale).collect();
        optimizer.step(*slot, &mut self.weights, &gw);
        *slot += 1;

        let gb: Vec<f64> = self.grad_biases.iter().map(|g| g * scale).collect();
        optimizer.step(*slot, &mut self.biases, &gb);
        *slot += 1;
    }
}
