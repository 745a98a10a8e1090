pub mod activation;
pub mod dataset;
pub mod device;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use math::Tensor;
pub use activation::Activation;
pub use network::{Checkpoint, Cnn};
pub use dataset::{DataSet, FolderDataset};
pub use loss::CrossEntropyLoss;
pub use optim::Adam;
pub use train::{Engine, EngineEvent, EpochStats, TrainHandle};
pub use device::Device;
pub use error::Error;
