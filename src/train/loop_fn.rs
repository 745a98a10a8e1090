use rand::prelude::*;
use rand::rngs::StdRng;

use crate::dataset::DataSet;
use crate::loss::CrossEntropyLoss;
use crate::network::Cnn;
use crate::optim::Adam;

/// Mini-batch size used for both the gradient pass and the evaluation pass.
pub const BATCH_SIZE: usize = 64;

/// Number of `BATCH_SIZE` mini-batches needed to cover `n` samples.
pub fn batch_count(n: usize) -> usize {
    (n + BATCH_SIZE - 1) / BATCH_SIZE
}

/// One full gradient pass over `data` in shuffled mini-batches of
/// `BATCH_SIZE`. Per batch: accumulate per-sample gradients, then apply one
/// Adam step scaled to the batch mean. Returns the mean of the batch-mean
/// losses.
///
/// The caller is responsible for putting the network in training mode.
pub fn train_one_epoch(
    network: &mut Cnn,
    optimizer: &mut Adam,
    data: &DataSet,
    rng: &mut StdRng,
) -> f64 {
    let n = data.len();
    assert!(n > 0, "training set must not be empty");

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let mut batch_loss_sum = 0.0;
    let mut batches = 0usize;

    for chunk in indices.chunks(BATCH_SIZE) {
        let inv_batch = 1.0 / chunk.len() as f64;
        let mut batch_loss = 0.0;

        network.zero_grad();
        for &i in chunk {
            let output = network.forward(&data.images[i]);
            let target = data.targets[i];
            batch_loss += CrossEntropyLoss::loss(&output, target);

            let grad = CrossEntropyLoss::derivative(&output, target);
            network.backward(&grad);
        }
        network.apply_gradients(optimizer, inv_batch);

        batch_loss_sum += batch_loss * inv_batch;
        batches += 1;
    }

    batch_loss_sum / batches as f64
}

/// A no-gradient pass over `data` that sums the batch-mean losses and
/// divides the total by `divisor_batches`.
///
/// The divisor is a parameter, not derived from `data`: the per-epoch
/// evaluation walks the training set while dividing by the validation
/// batch count, and saved loss histories were produced with exactly that
/// arithmetic. A zero divisor yields infinity.
///
/// The network's dropout mode is left untouched; during a training run
/// dropout stays live through this pass.
pub fn eval_epoch_loss(network: &mut Cnn, data: &DataSet, divisor_batches: usize) -> f64 {
    let mut batch_loss_sum = 0.0;

    let indices: Vec<usize> = (0..data.len()).collect();
    for chunk in indices.chunks(BATCH_SIZE) {
        let mut batch_loss = 0.0;
        for &i in chunk {
            let output = network.forward(&data.images[i]);
            batch_loss += CrossEntropyLoss::loss(&output, data.targets[i]);
        }
        batch_loss_sum += batch_loss / chunk.len() as f64;
    }

    batch_loss_sum / divisor_batches as f64
}
