use serde::{Serialize, Deserialize};

/// Element-wise activation applied after a layer's linear transform.
///
/// The network's final log-softmax is a full-vector operation and lives in
/// its own layer; it is not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    ReLU,
    Identity,
}

impl Activation {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            Activation::ReLU => if x > 0.0 { x } else { 0.0 },
            Activation::Identity => x,
        }
    }

    /// Derivative evaluated at the pre-activation value z.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            Activation::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            Activation::Identity => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_clamps_negatives() {
        assert_eq!(Activation::ReLU.function(-3.0), 0.0);
        assert_eq!(Activation::ReLU.function(2.5), 2.5);
        assert_eq!(Activation::ReLU.derivative(-3.0), 0.0);
        assert_eq!(Activation::ReLU.derivative(2.5), 1.0);
    }

    #[test]
    fn identity_passes_through() {
        assert_eq!(Activation::Identity.function(-3.0), -3.0);
        assert_eq!(Activation::Identity.derivative(123.0), 1.0);
    }
}
