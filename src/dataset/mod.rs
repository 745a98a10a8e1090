pub mod folder;
pub mod split;
pub mod transform;

pub use folder::{FolderDataset, Sample};
pub use split::{random_split, DataSet};
