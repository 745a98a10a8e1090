use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::dataset::{random_split, DataSet, FolderDataset};
use crate::dataset::transform::image_to_input;
use crate::device::Device;
use crate::error::Error;
use crate::network::{Checkpoint, Cnn, CHECKPOINT_VERSION};
use crate::optim::Adam;
use crate::train::events::{EngineEvent, EpochStats};
use crate::train::loop_fn::{batch_count, eval_epoch_loss, train_one_epoch};

/// Adam learning rate the engine trains with.
pub const LEARNING_RATE: f64 = 1e-4;

/// Everything a training run reads or mutates, behind one mutex: the
/// background worker takes it per epoch, the control thread takes it for
/// predict/save/load and the UI accessors.
struct EngineState {
    network: Cnn,
    optimizer: Adam,
    /// Append-only `[train_loss, eval_loss]` per completed epoch. Replaced
    /// wholesale by `load`, never merged.
    history: Vec<[f64; 2]>,
    /// Process-lifetime label list: deduplicated class names in first-seen
    /// order, across every dataset loaded so far.
    labels: Vec<String>,
    size_output: usize,
}

/// The training/inference engine.
///
/// Owns the model, optimizer, loss history, and merged label list. The UI
/// layer is an external collaborator: it calls the methods here and listens
/// on the channel handed out by [`Engine::subscribe`]; the engine knows
/// nothing about UI types.
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
    training_active: Arc<AtomicBool>,
    events_tx: Option<mpsc::Sender<EngineEvent>>,
    device: Device,
    split_seed: Option<u64>,
}

/// Handle to a background training run. Dropping it detaches the run;
/// `wait` blocks until the worker finishes (it always runs to completion,
/// there is no cancellation).
#[derive(Debug)]
pub struct TrainHandle {
    join: thread::JoinHandle<()>,
}

impl TrainHandle {
    pub fn wait(self) {
        // The worker catches its own panics and reports them as events,
        // so a join failure carries no further information.
        let _ = self.join.join();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Engine {
    /// Builds a fresh engine: a new model with `output_width` classes, empty
    /// history and label list. The compute device is chosen once, here.
    pub fn new(output_width: usize) -> Engine {
        Engine {
            state: Arc::new(Mutex::new(EngineState {
                network: Cnn::new(output_width),
                optimizer: Adam::new(LEARNING_RATE),
                history: Vec::new(),
                labels: Vec::new(),
                size_output: output_width,
            })),
            training_active: Arc::new(AtomicBool::new(false)),
            events_tx: None,
            device: Device::detect(),
            split_seed: None,
        }
    }

    /// Recreates the model and optimizer for a fresh session and clears the
    /// history. The label list survives: it is process-lifetime state, not
    /// model state.
    pub fn configure(&mut self, output_width: usize) -> Result<(), Error> {
        if self.training_active.load(Ordering::SeqCst) {
            return Err(Error::ConcurrentTraining);
        }
        let mut st = self.lock_state();
        st.network = Cnn::new(output_width);
        st.optimizer = Adam::new(LEARNING_RATE);
        st.history.clear();
        st.size_output = output_width;
        Ok(())
    }

    /// Hands out the event channel. Subscribing again replaces the previous
    /// receiver; events sent while nobody listens are dropped silently.
    pub fn subscribe(&mut self) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        self.events_tx = Some(tx);
        rx
    }

    /// Makes the dataset split and the epoch shuffle reproducible.
    /// The default (`None`) draws fresh entropy per run.
    pub fn set_split_seed(&mut self, seed: Option<u64>) {
        self.split_seed = seed;
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn output_width(&self) -> usize {
        self.lock_state().size_output
    }

    pub fn labels(&self) -> Vec<String> {
        self.lock_state().labels.clone()
    }

    pub fn history(&self) -> Vec<[f64; 2]> {
        self.lock_state().history.clone()
    }

    pub fn history_len(&self) -> usize {
        self.lock_state().history.len()
    }

    /// Loads a folder dataset, truncated to the engine's output width, and
    /// returns its random 80/20 train/validation split.
    ///
    /// Side effects happen only after the whole dataset has decoded
    /// successfully: the dataset's class names are merged into the engine's
    /// label list and a `DatasetLabeled` event is emitted.
    pub fn load_dataset(&mut self, path: &Path) -> Result<(DataSet, DataSet), Error> {
        let max_classes = self.lock_state().size_output;
        let dataset = FolderDataset::load(path, max_classes)?;

        let classes = dataset.classes.clone();
        {
            let mut st = self.lock_state();
            merge_labels(&mut st.labels, &classes);
        }
        self.emit(EngineEvent::DatasetLabeled { classes });

        Ok(random_split(dataset, self.split_seed))
    }

    /// Starts a background training run over `train_set` for `epochs`
    /// epochs and returns immediately with a handle.
    ///
    /// Per epoch the worker takes the state lock, runs one shuffled
    /// gradient pass, then the evaluation pass, appends the loss pair to
    /// the history, and emits `EpochComplete` with the 1-based epoch index.
    /// Worker panics are caught and reported as `TrainingFailed`.
    ///
    /// Only one run may be active: a second call while the guard is held
    /// fails with `Error::ConcurrentTraining` without touching any state.
    pub fn train(
        &mut self,
        train_set: DataSet,
        val_set: DataSet,
        epochs: usize,
    ) -> Result<TrainHandle, Error> {
        if train_set.is_empty() {
            return Err(Error::Dataset("training set is empty".into()));
        }
        if self
            .training_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::ConcurrentTraining);
        }

        let state = self.state.clone();
        let active = self.training_active.clone();
        let events = self.events_tx.clone();
        let seed = self.split_seed;

        // The evaluation pass walks the training set but its total is
        // divided by the validation batch count; existing loss histories
        // were produced with exactly this arithmetic.
        let eval_divisor = batch_count(val_set.len());

        let join = thread::spawn(move || {
            let mut rng: StdRng = match seed {
                Some(s) => StdRng::seed_from_u64(s.wrapping_add(1)),
                None => StdRng::from_entropy(),
            };

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                for epoch in 1..=epochs {
                    let t_start = Instant::now();

                    let mut guard = lock_ignoring_poison(&state);
                    let st = &mut *guard;
                    st.network.set_training(true);
                    let train_loss =
                        train_one_epoch(&mut st.network, &mut st.optimizer, &train_set, &mut rng);
                    let eval_loss = eval_epoch_loss(&mut st.network, &train_set, eval_divisor);
                    st.history.push([train_loss, eval_loss]);
                    drop(guard);

                    let stats = EpochStats {
                        epoch,
                        total_epochs: epochs,
                        train_loss,
                        eval_loss,
                        elapsed_ms: t_start.elapsed().as_millis() as u64,
                    };
                    if let Some(ref tx) = events {
                        let _ = tx.send(EngineEvent::EpochComplete { stats });
                    }
                }
            }));

            active.store(false, Ordering::SeqCst);

            let final_event = match result {
                Ok(()) => EngineEvent::TrainingFinished { epochs_run: epochs },
                Err(payload) => EngineEvent::TrainingFailed {
                    reason: panic_message(payload),
                },
            };
            if let Some(ref tx) = events {
                let _ = tx.send(final_event);
            }
        });

        Ok(TrainHandle { join })
    }

    /// Runs a single image through the model in evaluation mode and returns
    /// the class probability distribution (exponentiated log-probabilities),
    /// aligned with the current label ordering.
    pub fn predict(&self, image: &image::DynamicImage) -> Vec<f64> {
        let input = image_to_input(image);
        let mut st = self.lock_state();
        st.network.set_training(false);
        let log_probs = st.network.forward(&input);
        log_probs.iter().map(|&lp| lp.exp()).collect()
    }

    /// Serializes the full checkpoint artifact to `path`.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let st = self.lock_state();
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            size_output: st.size_output,
            labels: st.labels.clone(),
            history: st.history.clone(),
            network: st.network.clone(),
        };
        drop(st);
        checkpoint.save_json(path)
    }

    /// Restores a checkpoint, replacing the model, label list, history, and
    /// output width wholesale. Validation happens entirely before any state
    /// is touched; a failed load leaves the engine unchanged.
    pub fn load(&mut self, path: &Path) -> Result<(), Error> {
        if self.training_active.load(Ordering::SeqCst) {
            return Err(Error::ConcurrentTraining);
        }
        let checkpoint = Checkpoint::load_json(path)?;

        let mut st = self.lock_state();
        st.network = checkpoint.network;
        st.network.set_training(false);
        st.optimizer = Adam::new(LEARNING_RATE);
        st.labels = checkpoint.labels;
        st.history = checkpoint.history;
        st.size_output = checkpoint.size_output;
        Ok(())
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(ref tx) = self.events_tx {
            let _ = tx.send(event);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        lock_ignoring_poison(&self.state)
    }
}

/// A worker that died mid-epoch poisons the state mutex; the engine stays
/// usable afterwards, so poisoning is stripped here.
fn lock_ignoring_poison<'a>(state: &'a Arc<Mutex<EngineState>>) -> MutexGuard<'a, EngineState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "training worker panicked".to_string()
    }
}

/// Merges `incoming` class names into `labels`, preserving first-seen order
/// and skipping names already present. Idempotent.
pub(crate) fn merge_labels(labels: &mut Vec<String>, incoming: &[String]) {
    for name in incoming {
        if !labels.iter().any(|existing| existing == name) {
            labels.push(name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_idempotent() {
        let mut labels = vec!["circle".to_string(), "square".to_string()];
        merge_labels(&mut labels, &["circle".into(), "square".into()]);
        assert_eq!(labels, vec!["circle".to_string(), "square".to_string()]);
    }

    #[test]
    fn merge_preserves_first_seen_order() {
        let mut labels: Vec<String> = vec![];
        merge_labels(&mut labels, &["b".into(), "a".into()]);
        merge_labels(&mut labels, &["c".into(), "a".into(), "d".into()]);
        assert_eq!(labels, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn merge_never_reorders_prior_entries() {
        let mut labels: Vec<String> = vec!["x".into(), "y".into()];
        merge_labels(&mut labels, &["y".into(), "x".into(), "z".into()]);
        assert_eq!(labels, vec!["x", "y", "z"]);
    }

    #[test]
    fn panic_message_extracts_str_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bad batch"));
        assert_eq!(panic_message(payload), "bad batch");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42usize);
        assert_eq!(panic_message(payload), "training worker panicked");
    }
}
