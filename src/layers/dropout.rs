use rand::prelude::*;
use serde::{Serialize, Deserialize};

/// Inverted dropout. In training mode each unit is zeroed with probability
/// `p` and survivors are scaled by 1/(1-p), so evaluation mode is a plain
/// pass-through with no rescaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dropout {
    pub p: f64,
    #[serde(skip)]
    cache_mask: Vec<f64>,
}

impl Dropout {
    pub fn new(p: f64) -> Dropout {
        assert!((0.0..1.0).contains(&p), "dropout probability must be in [0, 1)");
        Dropout { p, cache_mask: vec![] }
    }

    pub fn forward(&mut self, input: &[f64], training: bool) -> Vec<f64> {
        if !training {
            self.cache_mask = vec![1.0; input.len()];
            return input.to_vec();
        }

        let mut rng = rand::thread_rng();
        let keep_scale = 1.0 / (1.0 - self.p);
        self.cache_mask = (0..input.len())
            .map(|_| if rng.gen::<f64>() < self.p { 0.0 } else { keep_scale })
            .collect();

        input
            .iter()
            .zip(self.cache_mask.iter())
            .map(|(&x, &m)| x * m)
            .collect()
    }

    pub fn backward(&mut self, grad_out: &[f64]) -> Vec<f64> {
        grad_out
            .iter()
            .zip(self.cache_mask.iter())
            .map(|(&g, &m)| g * m)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_mode_is_identity() {
        let mut drop = Dropout::new(0.5);
        let input = vec![1.0, 2.0, 3.0];
        assert_eq!(drop.forward(&input, false), input);
    }

    #[test]
    fn training_mode_zeroes_or_scales() {
        let mut drop = Dropout::new(0.5);
        let input = vec![1.0; 1000];
        let out = drop.forward(&input, true);
        let zeros = out.iter().filter(|&&x| x == 0.0).count();
        // Survivors are scaled by exactly 1/(1-p) = 2.
        assert!(out.iter().all(|&x| x == 0.0 || x == 2.0));
        // ~500 expected; allow a wide band.
        assert!(zeros > 350 && zeros < 650, "zeroed {} of 1000", zeros);
    }

    #[test]
    fn backward_reuses_forward_mask() {
        let mut drop = Dropout::new(0.25);
        let input = vec![1.0; 100];
        let out = drop.forward(&input, true);
        let grad = drop.backward(&vec![1.0; 100]);
        // Gradient must be blocked exactly where the forward output was.
        for (o, g) in out.iter().zip(grad.iter()) {
            assert_eq!(o, g);
        }
    }
}
