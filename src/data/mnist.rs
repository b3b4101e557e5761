// MNIST IDX file parsing.
// The IDX format is big-endian: a u32 magic number (2051 for images, 2049
// for labels), u32 counts/dimensions, then raw bytes. Pixels are
// standardized to roughly zero mean and unit range as byte / 127.5 - 1.

use crate::data::Dataset;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

/// One split of the dataset: flattened standardized images plus labels.
#[derive(Debug, Clone)]
pub struct MnistData {
    pub images: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
    pub rows: usize,
    pub cols: usize,
}

impl MnistData {
    pub fn num_features(&self) -> usize {
        self.rows * self.cols
    }
}

impl Dataset for MnistData {
    fn get_item(&self, index: usize) -> Result<(&[f64], usize), String> {
        match (self.images.get(index), self.labels.get(index)) {
            (Some(image), Some(&label)) => Ok((image, label as usize)),
            _ => Err(format!(
                "Sample index {index} out of range for {} samples",
                self.images.len()
            )),
        }
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

/// The conventional four-file train/test dataset.
#[derive(Debug, Clone)]
pub struct MnistDataset {
    pub train: MnistData,
    pub test: MnistData,
}

impl MnistDataset {
    /// Loads `train-images-idx3-ubyte`, `train-labels-idx1-ubyte`,
    /// `t10k-images-idx3-ubyte` and `t10k-labels-idx1-ubyte` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, String> {
        let train = load_split(
            &dir.join("train-images-idx3-ubyte"),
            &dir.join("train-labels-idx1-ubyte"),
        )?;
        let test = load_split(
            &dir.join("t10k-images-idx3-ubyte"),
            &dir.join("t10k-labels-idx1-ubyte"),
        )?;

        log::info!(
            "MNIST loaded: {} training samples, {} test samples, {}x{} pixels",
            train.len(),
            test.len(),
            train.rows,
            train.cols
        );
        Ok(Self { train, test })
    }
}

fn load_split(image_path: &Path, label_path: &Path) -> Result<MnistData, String> {
    let (images, rows, cols) = load_images(image_path)?;
    let labels = load_labels(label_path)?;

    if images.len() != labels.len() {
        return Err(format!(
            "Image count {} does not match label count {} ({} / {})",
            images.len(),
            labels.len(),
            image_path.display(),
            label_path.display()
        ));
    }

    Ok(MnistData {
        images,
        labels,
        rows,
        cols,
    })
}

/// Parses an IDX image file into standardized per-image feature vectors.
pub fn load_images(path: &Path) -> Result<(Vec<Vec<f64>>, usize, usize), String> {
    let mut reader = open(path)?;

    let magic = read_u32(&mut reader, path)?;
    if magic != IMAGE_MAGIC {
        return Err(format!(
            "Invalid MNIST image file {}: magic number {magic}, expected {IMAGE_MAGIC}",
            path.display()
        ));
    }

    let count = read_u32(&mut reader, path)? as usize;
    let rows = read_u32(&mut reader, path)? as usize;
    let cols = read_u32(&mut reader, path)? as usize;

    let pixels = rows * cols;
    let mut images = Vec::with_capacity(count);
    let mut buffer = vec![0u8; pixels];
    for _ in 0..count {
        reader
            .read_exact(&mut buffer)
            .map_err(|e| format!("Truncated image data in {}: {e}", path.display()))?;
        images.push(
            buffer
                .iter()
                .map(|&pixel| pixel as f64 / 127.5 - 1.0)
                .collect(),
        );
    }

    Ok((images, rows, cols))
}

/// Parses an IDX label file.
pub fn load_labels(path: &Path) -> Result<Vec<u8>, String> {
    let mut reader = open(path)?;

    let magic = read_u32(&mut reader, path)?;
    if magic != LABEL_MAGIC {
        return Err(format!(
            "Invalid MNIST label file {}: magic number {magic}, expected {LABEL_MAGIC}",
            path.display()
        ));
    }

    let count = read_u32(&mut reader, path)? as usize;
    let mut labels = vec![0u8; count];
    reader
        .read_exact(&mut labels)
        .map_err(|e| format!("Truncated label data in {}: {e}", path.display()))?;

    Ok(labels)
}

fn open(path: &Path) -> Result<BufReader<File>, String> {
    let file = File::open(path).map_err(|e| format!("Cannot open {}: {e}", path.display()))?;
    Ok(BufReader::new(file))
}

fn read_u32(reader: &mut impl Read, path: &Path) -> Result<u32, String> {
    let mut bytes = [0u8; 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| format!("Truncated header in {}: {e}", path.display()))?;
    Ok(u32::from_be_bytes(bytes))
}
