use serde::{Serialize, Deserialize};

/// Per-epoch statistics emitted by the training worker.
///
/// One value is sent per completed epoch; receivers drive progress bars and
/// loss charts from it. The full `[train_loss, eval_loss]` pair also lands
/// in the engine's history, which is what gets checkpointed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over this epoch's mini-batches.
    pub train_loss: f64,
    /// The reported evaluation loss for this epoch.
    pub eval_loss: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// Events the engine delivers to a subscribed UI layer.
///
/// The engine never calls into UI types; anything that wants to react
/// subscribes to this channel and reads engine accessors on its own thread.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A loaded dataset contributed class names (the dataset's own ordered
    /// list, after truncation). The engine has already merged them into its
    /// internal label list.
    DatasetLabeled { classes: Vec<String> },
    /// An epoch finished and its losses were appended to the history.
    EpochComplete { stats: EpochStats },
    /// The background run completed all requested epochs.
    TrainingFinished { epochs_run: usize },
    /// The background run died; `reason` carries the captured panic message.
    TrainingFailed { reason: String },
}
