//! Native data providers
//!
//! - `synthetic`: uniform `[0, 1)` inputs with labels in `0..10`, never exhausted
//! - `cifar10`: `<root>/cifar-10-batches-bin/data_batch_{1..5}.bin`
//! - `mnist`: `<root>/mnist/train-{images-idx3,labels-idx1}-ubyte`
//!
//! File-backed sources stream records with buffered blocking reads, return a
//! short final batch, then fail with [`ExhaustedError`].

use crate::component::DataProvider;
use quark_core::{Batch, ExhaustedError, QuarkError, Result, Tensor, tags};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Classes drawn by the synthetic source
pub const SYNTHETIC_CLASSES: usize = 10;

/// CIFAR-10 sample shape
pub const CIFAR10_SHAPE: [usize; 3] = [3, 32, 32];
/// MNIST sample shape
pub const MNIST_SHAPE: [usize; 3] = [1, 28, 28];

const CIFAR10_DIR: &str = "cifar-10-batches-bin";
const CIFAR10_BATCHES: usize = 5;
const MNIST_DIR: &str = "mnist";
const MNIST_IMAGES: &str = "train-images-idx3-ubyte";
const MNIST_LABELS: &str = "train-labels-idx1-ubyte";
const IDX3_MAGIC: u32 = 0x0000_0803;
const IDX1_MAGIC: u32 = 0x0000_0801;

fn malformed(path: &Path, reason: impl Into<String>) -> QuarkError {
    QuarkError::Dataset {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Fill `buf`; `Ok(false)` on a clean end of file before the first byte
fn read_record(reader: &mut impl Read, buf: &mut [u8], path: &Path) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(malformed(
                    path,
                    format!("truncated record ({filled} of {} bytes)", buf.len()),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Records reserved up front when reading a batch
const PREALLOC_RECORDS: usize = 256;

/// Elements in a tensor of `shape`; overflow is an error
fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| QuarkError::invalid("data provider", format!("shape {shape:?} overflows")))
}

fn pixels(bytes: &[u8]) -> impl Iterator<Item = f32> + '_ {
    bytes.iter().map(|&b| f32::from(b) / 255.0)
}

// ─── Synthetic ───────────────────────────────────────────────────────────────

/// Freshly generated inputs on every call
pub struct SyntheticProvider {
    sample_shape: Vec<usize>,
    batch_size: usize,
    rng: StdRng,
}

impl SyntheticProvider {
    /// Seeded when `seed` is set, entropy-seeded otherwise
    pub fn new(sample_shape: Vec<usize>, batch_size: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            sample_shape,
            batch_size,
            rng,
        }
    }
}

impl SyntheticProvider {
    fn batch_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.batch_size];
        shape.extend_from_slice(&self.sample_shape);
        shape
    }
}

impl DataProvider for SyntheticProvider {
    fn describe(&self) -> String {
        format!("synthetic {:?} x{}", self.sample_shape, self.batch_size)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(QuarkError::invalid("data provider", "batch_size must be at least 1"));
        }
        if self.sample_shape.is_empty() || self.sample_shape.contains(&0) {
            return Err(QuarkError::invalid(
                "data provider",
                format!("degenerate sample shape {:?}", self.sample_shape),
            ));
        }
        element_count(&self.batch_shape())?;
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Batch> {
        let shape = self.batch_shape();
        let len = element_count(&shape)?;
        let data = (0..len).map(|_| self.rng.gen::<f32>()).collect();
        let labels = (0..self.batch_size)
            .map(|_| self.rng.gen_range(0..SYNTHETIC_CLASSES))
            .collect();
        Ok(Batch {
            inputs: Tensor::from_vec(shape, data)?,
            labels,
        })
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn sample_shape(&self) -> &[usize] {
        &self.sample_shape
    }
}

// ─── CIFAR-10 ────────────────────────────────────────────────────────────────

/// CIFAR-10 binary batches: 1 label byte + 3072 pixel bytes per record
pub struct Cifar10Reader {
    files: Vec<PathBuf>,
    next_file: usize,
    current: Option<(PathBuf, BufReader<File>)>,
    batch_size: usize,
    sample_shape: Vec<usize>,
}

impl Cifar10Reader {
    const RECORD: usize = 1 + 3 * 32 * 32;

    /// Open the batch files present under `<root>/cifar-10-batches-bin`
    pub fn open(root: &Path, batch_size: usize) -> Result<Self> {
        let dir = root.join(CIFAR10_DIR);
        let files: Vec<PathBuf> = (1..=CIFAR10_BATCHES)
            .map(|i| dir.join(format!("data_batch_{i}.bin")))
            .filter(|p| p.is_file())
            .collect();
        if files.is_empty() {
            return Err(malformed(&dir, "no data_batch_*.bin files found"));
        }
        tracing::debug!(dir = %dir.display(), files = files.len(), "opened CIFAR-10");
        Ok(Self {
            files,
            next_file: 0,
            current: None,
            batch_size,
            sample_shape: CIFAR10_SHAPE.to_vec(),
        })
    }

    /// Next record, moving across files; `None` once all files are read
    fn next_record(&mut self, buf: &mut [u8]) -> Result<bool> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.files.get(self.next_file).cloned() else {
                    return Ok(false);
                };
                self.next_file += 1;
                let reader = BufReader::new(File::open(&path)?);
                self.current = Some((path, reader));
            }
            if let Some((path, reader)) = self.current.as_mut() {
                if read_record(reader, buf, path)? {
                    return Ok(true);
                }
            }
            self.current = None;
        }
    }
}

impl DataProvider for Cifar10Reader {
    fn describe(&self) -> String {
        format!("cifar10 ({} files) x{}", self.files.len(), self.batch_size)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(QuarkError::invalid("data provider", "batch_size must be at least 1"));
        }
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Batch> {
        let mut record = vec![0u8; Self::RECORD];
        let reserve = self.batch_size.min(PREALLOC_RECORDS);
        let mut data = Vec::with_capacity(reserve * (Self::RECORD - 1));
        let mut labels = Vec::with_capacity(reserve);
        while labels.len() < self.batch_size && self.next_record(&mut record)? {
            labels.push(usize::from(record[0]));
            data.extend(pixels(&record[1..]));
        }
        if labels.is_empty() {
            return Err(ExhaustedError {
                dataset: tags::CIFAR10.to_string(),
            }
            .into());
        }
        let mut shape = vec![labels.len()];
        shape.extend_from_slice(&self.sample_shape);
        Ok(Batch {
            inputs: Tensor::from_vec(shape, data)?,
            labels,
        })
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn sample_shape(&self) -> &[usize] {
        &self.sample_shape
    }
}

// ─── MNIST ───────────────────────────────────────────────────────────────────

/// MNIST training set in IDX format
pub struct MnistReader {
    images_path: PathBuf,
    labels_path: PathBuf,
    images: BufReader<File>,
    labels: BufReader<File>,
    remaining: usize,
    batch_size: usize,
    sample_shape: Vec<usize>,
}

fn read_u32(reader: &mut impl Read, path: &Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    if !read_record(reader, &mut buf, path)? {
        return Err(malformed(path, "missing IDX header"));
    }
    Ok(u32::from_be_bytes(buf))
}

impl MnistReader {
    /// Open `<root>/mnist/train-*-ubyte` and check both headers
    pub fn open(root: &Path, batch_size: usize) -> Result<Self> {
        let dir = root.join(MNIST_DIR);
        let images_path = dir.join(MNIST_IMAGES);
        let labels_path = dir.join(MNIST_LABELS);
        let mut images = BufReader::new(
            File::open(&images_path).map_err(|e| malformed(&images_path, e.to_string()))?,
        );
        let mut labels = BufReader::new(
            File::open(&labels_path).map_err(|e| malformed(&labels_path, e.to_string()))?,
        );

        let magic = read_u32(&mut images, &images_path)?;
        if magic != IDX3_MAGIC {
            return Err(malformed(&images_path, format!("bad IDX3 magic {magic:#010x}")));
        }
        let count = read_u32(&mut images, &images_path)? as usize;
        let rows = read_u32(&mut images, &images_path)? as usize;
        let cols = read_u32(&mut images, &images_path)? as usize;
        if [1, rows, cols] != MNIST_SHAPE {
            return Err(malformed(
                &images_path,
                format!("expected 28x28 images, found {rows}x{cols}"),
            ));
        }

        let magic = read_u32(&mut labels, &labels_path)?;
        if magic != IDX1_MAGIC {
            return Err(malformed(&labels_path, format!("bad IDX1 magic {magic:#010x}")));
        }
        let label_count = read_u32(&mut labels, &labels_path)? as usize;
        if label_count != count {
            return Err(malformed(
                &labels_path,
                format!("{label_count} labels for {count} images"),
            ));
        }

        tracing::debug!(dir = %dir.display(), count, "opened MNIST");
        Ok(Self {
            images_path,
            labels_path,
            images,
            labels,
            remaining: count,
            batch_size,
            sample_shape: MNIST_SHAPE.to_vec(),
        })
    }
}

impl DataProvider for MnistReader {
    fn describe(&self) -> String {
        format!("mnist ({} remaining) x{}", self.remaining, self.batch_size)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(QuarkError::invalid("data provider", "batch_size must be at least 1"));
        }
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Batch> {
        let n = self.batch_size.min(self.remaining);
        if n == 0 {
            return Err(ExhaustedError {
                dataset: tags::MNIST.to_string(),
            }
            .into());
        }
        let mut shape = vec![n];
        shape.extend_from_slice(&self.sample_shape);
        let mut image_bytes = vec![0u8; element_count(&shape)?];
        let mut label_bytes = vec![0u8; n];
        if !read_record(&mut self.images, &mut image_bytes, &self.images_path)? {
            return Err(malformed(&self.images_path, "fewer images than the header declares"));
        }
        if !read_record(&mut self.labels, &mut label_bytes, &self.labels_path)? {
            return Err(malformed(&self.labels_path, "fewer labels than the header declares"));
        }
        self.remaining -= n;

        Ok(Batch {
            inputs: Tensor::from_vec(shape, pixels(&image_bytes).collect())?,
            labels: label_bytes.into_iter().map(usize::from).collect(),
        })
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn sample_shape(&self) -> &[usize] {
        &self.sample_shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_cifar(root: &Path, file: usize, records: usize) {
        let dir = root.join(CIFAR10_DIR);
        fs::create_dir_all(&dir).unwrap();
        let mut bytes = Vec::new();
        for r in 0..records {
            bytes.push((r % 10) as u8);
            bytes.extend(std::iter::repeat(255u8).take(3072));
        }
        fs::write(dir.join(format!("data_batch_{file}.bin")), bytes).unwrap();
    }

    fn write_mnist(root: &Path, count: u32, labels: u32) {
        let dir = root.join(MNIST_DIR);
        fs::create_dir_all(&dir).unwrap();
        let mut images = Vec::new();
        for v in [IDX3_MAGIC, count, 28, 28] {
            images.extend_from_slice(&v.to_be_bytes());
        }
        images.extend(std::iter::repeat(0u8).take(count as usize * 784));
        fs::write(dir.join(MNIST_IMAGES), images).unwrap();

        let mut label_file = Vec::new();
        for v in [IDX1_MAGIC, labels] {
            label_file.extend_from_slice(&v.to_be_bytes());
        }
        label_file.extend((0..labels).map(|i| (i % 10) as u8));
        fs::write(dir.join(MNIST_LABELS), label_file).unwrap();
    }

    #[test]
    fn test_synthetic_seeded_is_reproducible() {
        let mut a = SyntheticProvider::new(vec![2, 3], 4, Some(9));
        let mut b = SyntheticProvider::new(vec![2, 3], 4, Some(9));
        let (x, y) = (a.next_batch().unwrap(), b.next_batch().unwrap());
        assert_eq!(x, y);
        assert_eq!(x.inputs.shape(), &[4, 2, 3]);
        assert!(x.inputs.data().iter().all(|v| (0.0..1.0).contains(v)));
        assert!(x.labels.iter().all(|&l| l < SYNTHETIC_CLASSES));
    }

    #[test]
    fn test_overflowing_shape_is_an_error() {
        assert!(element_count(&[usize::MAX / 2, 3]).is_err());
        assert_eq!(element_count(&[4, 3, 2]).unwrap(), 24);

        let mut provider = SyntheticProvider::new(vec![usize::MAX / 2, 3], 2, Some(1));
        assert!(matches!(
            provider.validate(),
            Err(QuarkError::InvalidComponent { .. })
        ));
        assert!(provider.next_batch().is_err());
    }

    #[test]
    fn test_huge_batch_size_reads_available_records() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar(dir.path(), 1, 2);
        let mut reader = Cifar10Reader::open(dir.path(), usize::MAX / 2).unwrap();
        assert_eq!(reader.next_batch().unwrap().len(), 2);
    }

    #[test]
    fn test_synthetic_validate() {
        assert!(SyntheticProvider::new(vec![3], 0, None).validate().is_err());
        assert!(SyntheticProvider::new(vec![3, 0], 1, None).validate().is_err());
        assert!(SyntheticProvider::new(vec![3], 1, None).validate().is_ok());
    }

    #[test]
    fn test_cifar_short_final_batch_then_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar(dir.path(), 1, 3);
        write_cifar(dir.path(), 2, 2);
        let mut reader = Cifar10Reader::open(dir.path(), 2).unwrap();

        let sizes: Vec<usize> = (0..3).map(|_| reader.next_batch().unwrap().len()).collect();
        assert_eq!(sizes, [2, 2, 1]);
        assert!(matches!(
            reader.next_batch(),
            Err(QuarkError::Exhausted(ExhaustedError { ref dataset })) if dataset == "cifar10"
        ));
    }

    #[test]
    fn test_cifar_pixels_are_normalised() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar(dir.path(), 1, 1);
        let batch = Cifar10Reader::open(dir.path(), 4).unwrap().next_batch().unwrap();
        assert_eq!(batch.inputs.shape(), &[1, 3, 32, 32]);
        assert!(batch.inputs.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_cifar_truncated_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CIFAR10_DIR);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("data_batch_1.bin"), vec![0u8; 100]).unwrap();
        let mut reader = Cifar10Reader::open(dir.path(), 1).unwrap();
        assert!(matches!(reader.next_batch(), Err(QuarkError::Dataset { .. })));
    }

    #[test]
    fn test_cifar_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Cifar10Reader::open(dir.path(), 1),
            Err(QuarkError::Dataset { .. })
        ));
    }

    #[test]
    fn test_mnist_batches() {
        let dir = tempfile::tempdir().unwrap();
        write_mnist(dir.path(), 5, 5);
        let mut reader = MnistReader::open(dir.path(), 3).unwrap();
        let first = reader.next_batch().unwrap();
        assert_eq!(first.inputs.shape(), &[3, 1, 28, 28]);
        assert_eq!(first.labels, [0, 1, 2]);
        assert_eq!(reader.next_batch().unwrap().len(), 2);
        assert!(matches!(reader.next_batch(), Err(QuarkError::Exhausted(_))));
    }

    #[test]
    fn test_mnist_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_mnist(dir.path(), 5, 4);
        assert!(matches!(
            MnistReader::open(dir.path(), 1),
            Err(QuarkError::Dataset { .. })
        ));
    }
}
