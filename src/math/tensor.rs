use rand::prelude::*;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

/// A dense rank-3 tensor (channels × height × width) backed by one flat
/// `Vec<f64>` in channel-major order. This is the carrier type for feature
/// maps flowing through the convolutional stack; the flat layout makes the
/// flatten step before the fully-connected head a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(channels: usize, height: usize, width: usize) -> Tensor {
        Tensor {
            channels,
            height,
            width,
            data: vec![0.0; channels * height * width],
        }
    }

    pub fn from_data(channels: usize, height: usize, width: usize, data: Vec<f64>) -> Tensor {
        assert_eq!(
            data.len(),
            channels * height * width,
            "data length must match channels * height * width"
        );
        Tensor { channels, height, width, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of element (c, y, x).
    #[inline]
    pub fn idx(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    #[inline]
    pub fn at(&self, c: usize, y: usize, x: usize) -> f64 {
        self.data[self.idx(c, y, x)]
    }

    #[inline]
    pub fn set(&mut self, c: usize, y: usize, x: usize, value: f64) {
        let i = self.idx(c, y, x);
        self.data[i] = value;
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            channels: self.channels,
            height: self.height,
            width: self.width,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }
}

impl Default for Tensor {
    fn default() -> Self {
        Tensor { channels: 0, height: 0, width: 0, data: vec![] }
    }
}

/// Samples a single value from N(0, 1) using the Box-Muller transform.
/// Both u1 and u2 must be uniform on (0, 1].
pub fn sample_standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // Draw two independent uniform samples in (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// He initialization: fills a buffer with samples from N(0, sqrt(2 / fan_in)).
///
/// Recommended before ReLU layers. The variance 2/fan_in accounts for
/// the fact that ReLU zeroes half of its inputs on average.
pub fn he_init(count: usize, fan_in: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    let std_dev = (2.0 / fan_in as f64).sqrt();
    (0..count)
        .map(|_| sample_standard_normal(&mut rng) * std_dev)
        .collect()
}

/// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / fan_in)).
///
/// Used for the final linear layer, which is not followed by a ReLU.
pub fn xavier_init(count: usize, fan_in: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    let std_dev = (1.0 / fan_in as f64).sqrt();
    (0..count)
        .map(|_| sample_standard_normal(&mut rng) * std_dev)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_expected_shape_and_content() {
        let t = Tensor::zeros(2, 3, 4);
        assert_eq!(t.len(), 24);
        assert!(t.data.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn indexing_is_channel_major() {
        let mut t = Tensor::zeros(2, 2, 2);
        t.set(1, 0, 1, 7.0);
        assert_eq!(t.data[5], 7.0);
        assert_eq!(t.at(1, 0, 1), 7.0);
    }

    #[test]
    fn map_applies_elementwise() {
        let t = Tensor::from_data(1, 1, 3, vec![1.0, -2.0, 3.0]);
        let r = t.map(|x| x * 2.0);
        assert_eq!(r.data, vec![2.0, -4.0, 6.0]);
    }

    #[test]
    #[should_panic]
    fn from_data_rejects_wrong_length() {
        Tensor::from_data(1, 2, 2, vec![0.0; 3]);
    }

    #[test]
    fn he_init_produces_reasonable_spread() {
        let w = he_init(10_000, 50);
        let mean: f64 = w.iter().sum::<f64>() / w.len() as f64;
        let var: f64 = w.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / w.len() as f64;
        assert!(mean.abs() < 0.01);
        // Expected variance 2/50 = 0.04; allow generous slack.
        assert!((var - 0.04).abs() < 0.01);
    }
}
