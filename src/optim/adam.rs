/// Adam optimizer (Kingma & Ba, 2014).
///
/// Maintains first/second moment estimates per parameter buffer, addressed
/// by a stable `slot` index the network assigns while walking its layers in
/// a fixed order. Bias correction uses a shared timestep advanced once per
/// optimizer step via `begin_step`.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: usize,
    slots: Vec<MomentPair>,
}

struct MomentPair {
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Adam {
    /// Standard hyperparameters from the paper, with the caller's learning rate.
    pub fn new(learning_rate: f64) -> Adam {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            slots: Vec::new(),
        }
    }

    /// Advances the shared timestep. Call once before the per-buffer `step`
    /// calls that make up one optimizer update.
    pub fn begin_step(&mut self) {
        self.t += 1;
    }

    /// Applies one Adam update to a parameter buffer.
    ///
    /// # Panics
    /// Panics if `params` and `grads` differ in length, or if `begin_step`
    /// has never been called.
    pub fn step(&mut self, slot: usize, params: &mut [f64], grads: &[f64]) {
        assert_eq!(
            params.len(),
            grads.len(),
            "parameters and gradients must have the same length"
        );
        assert!(self.t > 0, "begin_step must be called before step");

        while self.slots.len() <= slot {
            self.slots.push(MomentPair { m: vec![], v: vec![] });
        }
        let pair = &mut self.slots[slot];
        if pair.m.len() != params.len() {
            pair.m = vec![0.0; params.len()];
            pair.v = vec![0.0; params.len()];
        }

        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for i in 0..params.len() {
            pair.m[i] = self.beta1 * pair.m[i] + (1.0 - self.beta1) * grads[i];
            pair.v[i] = self.beta2 * pair.v[i] + (1.0 - self.beta2) * grads[i] * grads[i];

            let m_hat = pair.m[i] / bias_correction1;
            let v_hat = pair.v[i] / bias_correction2;

            params[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}
