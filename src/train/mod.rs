pub mod engine;
pub mod events;
pub mod loop_fn;

pub use engine::{Engine, TrainHandle, LEARNING_RATE};
pub use events::{EngineEvent, EpochStats};
pub use loop_fn::{batch_count, eval_epoch_loss, train_one_epoch, BATCH_SIZE};
