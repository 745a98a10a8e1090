use rand::prelude::*;
use rand::rngs::StdRng;

use crate::dataset::folder::{FolderDataset, Sample};
use crate::math::Tensor;

/// A split half: preprocessed inputs and their class indices, in matching order.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    pub images: Vec<Tensor>,
    pub targets: Vec<usize>,
}

impl DataSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Random, non-stratified 80/20 partition. Validation gets ⌊0.2·n⌋ samples,
/// training the remainder, so the two halves always sum to n.
///
/// `seed` makes the shuffle reproducible; `None` draws entropy per call,
/// which is the default behavior.
pub fn random_split(dataset: FolderDataset, seed: Option<u64>) -> (DataSet, DataSet) {
    let n = dataset.samples.len();
    let val_len = n / 5;
    let train_len = n - val_len;

    let mut rng: StdRng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let mut samples: Vec<Option<Sample>> = dataset.samples.into_iter().map(Some).collect();

    let mut take = |idx: &[usize]| {
        let mut set = DataSet {
            images: Vec::with_capacity(idx.len()),
            targets: Vec::with_capacity(idx.len()),
        };
        for &i in idx {
            let sample = samples[i].take().expect("split index used twice");
            set.images.push(sample.image);
            set.targets.push(sample.class_index);
        }
        set
    };

    let train = take(&indices[..train_len]);
    let val = take(&indices[train_len..]);
    (train, val)
}
