use serde::{Serialize, Deserialize};

use crate::activation::Activation;
use crate::layers::{Conv2d, Dense, Dropout, LogSoftmax, MaxPool2};
use crate::math::Tensor;
use crate::optim::Adam;

/// Side length every input image is resized to before entering the network.
pub const INPUT_SIDE: usize = 256;

/// Flattened feature count entering the fully-connected head: 128 × 5 × 5.
pub const FLAT_FEATURES: usize = 3200;

/// The fixed classifier topology. Only the output width varies; every other
/// dimension is a constant of the architecture, which is what makes a saved
/// checkpoint reconstructable from the output width alone.
///
/// Spatial trace for a 1×256×256 input:
/// conv1 k7 s3 → 16×84×84, conv2 k5 s1 → 32×80×80, pool → 32×40×40,
/// conv3 k3 s3 p1 → 64×14×14, pool → 64×7×7, conv4 k3 s1 → 128×5×5,
/// flatten → 3200 → 256 → 128 → N, log-softmax.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cnn {
    size_output: usize,
    conv1: Conv2d,
    conv2: Conv2d,
    pool1: MaxPool2,
    conv3: Conv2d,
    pool2: MaxPool2,
    conv4: Conv2d,
    fc1: Dense,
    dropout1: Dropout,
    fc2: Dense,
    dropout2: Dropout,
    fc3: Dense,
    log_softmax: LogSoftmax,
    #[serde(skip)]
    training: bool,
}

impl Cnn {
    pub fn new(size_output: usize) -> Cnn {
        assert!(size_output >= 1, "output width must be at least 1");

        Cnn {
            size_output,
            conv1: Conv2d::new(1, 16, 7, 3, 0, 256, 256, Activation::ReLU),
            conv2: Conv2d::new(16, 32, 5, 1, 0, 84, 84, Activation::ReLU),
            pool1: MaxPool2::new(),
            conv3: Conv2d::new(32, 64, 3, 3, 1, 40, 40, Activation::ReLU),
            pool2: MaxPool2::new(),
            conv4: Conv2d::new(64, 128, 3, 1, 0, 7, 7, Activation::ReLU),
            fc1: Dense::new(FLAT_FEATURES, 256, Activation::ReLU),
            dropout1: Dropout::new(0.5),
            fc2: Dense::new(256, 128, Activation::ReLU),
            dropout2: Dropout::new(0.25),
            fc3: Dense::new(128, size_output, Activation::Identity),
            log_softmax: LogSoftmax::new(),
            training: false,
        }
    }

    pub fn size_output(&self) -> usize {
        self.size_output
    }

    /// Training mode enables the two dropout layers; evaluation mode makes
    /// them pass-throughs.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Forward pass for one 1×256×256 sample. Returns log-probabilities over
    /// the `size_output` classes. Layer caches are populated, so a training
    /// step can call `backward` immediately afterwards.
    pub fn forward(&mut self, input: &Tensor) -> Vec<f64> {
        let x = self.conv1.forward(input);
        let x = self.conv2.forward(&x);
        let x = self.pool1.forward(&x);
        let x = self.conv3.forward(&x);
        let x = self.pool2.forward(&x);
        let x = self.conv4.forward(&x);
        // Flatten is free: the tensor's backing buffer is already C-major.
        let x = self.fc1.forward(&x.data);
        let x = self.dropout1.forward(&x, self.training);
        let x = self.fc2.forward(&x);
        let x = self.dropout2.forward(&x, self.training);
        let x = self.fc3.forward(&x);
        self.log_softmax.forward(&x)
    }

    /// Backward pass for the sample most recently run through `forward`.
    /// `grad_output` is ∂L/∂(log-probabilities); parameter gradients
    /// accumulate into the layers until `zero_grad`.
    pub fn backward(&mut self, grad_output: &[f64]) {
        let g = self.log_softmax.backward(grad_output);
        let g = self.fc3.backward(&g);
        let g = self.dropout2.backward(&g);
        let g = self.fc2.backward(&g);
        let g = self.dropout1.backward(&g);
        let g = self.fc1.backward(&g);

        let (c, h, w) = self.conv4.out_shape();
        let g = Tensor::from_data(c, h, w, g);
        let g = self.conv4.backward(&g);
        let g = self.pool2.backward(&g);
        let g = self.conv3.backward(&g);
        let g = self.pool1.backward(&g);
        let g = self.conv2.backward(&g);
        let _ = self.conv1.backward(&g);
    }

    pub fn zero_grad(&mut self) {
        self.conv1.zero_grad();
        self.conv2.zero_grad();
        self.conv3.zero_grad();
        self.conv4.zero_grad();
        self.fc1.zero_grad();
        self.fc2.zero_grad();
        self.fc3.zero_grad();
    }

    /// One optimizer update from the accumulated gradients, scaled by
    /// `scale` (1/batch_size for mean-reduction batches).
    pub fn apply_gradients(&mut self, optimizer: &mut Adam, scale: f64) {
        optimizer.begin_step();
        let mut slot = 0;
        self.conv1.apply_gradients(optimizer, &mut slot, scale);
        self.conv2.apply_gradients(optimizer, &mut slot, scale);
        self.conv3.apply_gradients(optimizer, &mut slot, scale);
        self.conv4.apply_gradients(optimizer, &mut slot, scale);
        self.fc1.apply_gradients(optimizer, &mut slot, scale);
        self.fc2.apply_gradients(optimizer, &mut slot, scale);
        self.fc3.apply_gradients(optimizer, &mut slot, scale);
    }

    pub fn parameter_count(&self) -> usize {
        self.conv1.parameter_count()
            + self.conv2.parameter_count()
            + self.conv3.parameter_count()
            + self.conv4.parameter_count()
            + self.fc1.parameter_count()
            + self.fc2.parameter_count()
            + self.fc3.parameter_count()
    }

    /// Verifies that every weight buffer matches its declared shape and that
    /// the output layer agrees with `size_output`. Used when restoring a
    /// checkpoint from disk.
    pub fn validate_shapes(&self) -> Result<(), String> {
        self.conv1.validate().map_err(|e| format!("conv1: {}", e))?;
        self.conv2.validate().map_err(|e| format!("conv2: {}", e))?;
        self.conv3.validate().map_err(|e| format!("conv3: {}", e))?;
        self.conv4.validate().map_err(|e| format!("conv4: {}", e))?;
        self.fc1.validate().map_err(|e| format!("fc1: {}", e))?;
        self.fc2.validate().map_err(|e| format!("fc2: {}", e))?;
        self.fc3.validate().map_err(|e| format!("fc3: {}", e))?;

        if self.fc1.in_size != FLAT_FEATURES {
            return Err(format!("fc1 input size {} != {}", self.fc1.in_size, FLAT_FEATURES));
        }
        if self.fc3.out_size != self.size_output {
            return Err(format!(
                "output layer width {} disagrees with declared output width {}",
                self.fc3.out_size, self.size_output
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_count_is_fixed_up_to_the_head() {
        let cnn = Cnn::new(4);
        // conv1: 16*1*49+16, conv2: 32*16*25+32, conv3: 64*32*9+64,
        // conv4: 128*64*9+128, fc1: 3200*256+256, fc2: 256*128+128,
        // fc3: 128*4+4
        let expected = (16 * 49 + 16)
            + (32 * 16 * 25 + 32)
            + (64 * 32 * 9 + 64)
            + (128 * 64 * 9 + 128)
            + (3200 * 256 + 256)
            + (256 * 128 + 128)
            + (128 * 4 + 4);
        assert_eq!(cnn.parameter_count(), expected);
        assert!(cnn.validate_shapes().is_ok());
    }

    #[test]
    fn forward_emits_normalized_log_probabilities() {
        let mut cnn = Cnn::new(3);
        let input = Tensor::zeros(1, INPUT_SIDE, INPUT_SIDE);
        let out = cnn.forward(&input);
        assert_eq!(out.len(), 3);
        let sum: f64 = out.iter().map(|&lp| lp.exp()).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn eval_mode_is_deterministic() {
        let mut cnn = Cnn::new(2);
        cnn.set_training(false);
        let input = Tensor::from_data(
            1,
            INPUT_SIDE,
            INPUT_SIDE,
            (0..INPUT_SIDE * INPUT_SIDE).map(|i| (i % 255) as f64 / 255.0).collect(),
        );
        let a = cnn.forward(&input);
        let b = cnn.forward(&input);
        assert_eq!(a, b);
    }
}
