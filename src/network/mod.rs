pub mod checkpoint;
pub mod cnn;

pub use checkpoint::{Checkpoint, CHECKPOINT_VERSION};
pub use cnn::{Cnn, FLAT_FEATURES, INPUT_SIDE};
