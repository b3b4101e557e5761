// Dataset collaborators for the engine.
// The engine itself is agnostic to file formats; these types hand it plain
// f64 feature vectors and integer class labels.

pub mod mnist;

pub use mnist::{MnistData, MnistDataset};

/// Supervised dataset of flat feature vectors with integer class labels.
pub trait Dataset {
    /// Get a single sample by index: the feature slice and its label.
    fn get_item(&self, index: usize) -> Result<(&[f64], usize), String>;

    /// Total number of samples in the dataset.
    fn len(&self) -> usize;

    /// Check if dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
