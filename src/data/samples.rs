//! In-memory sample sets and device batches.

use burn::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{SampleFileError, SampleMatrix};
use crate::backend::tensor_from_rows;

/// Aligned control and (optional) reference-state matrices.
///
/// Row `i` of `controls` and row `i` of `references` describe the same sample.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSet {
    num_dofs: usize,
    controls: Vec<f32>,
    references: Option<Vec<f32>>,
}

/// One batch on a device.
#[derive(Clone, Debug)]
pub struct Batch<B: Backend> {
    /// Controls [batch, num_dofs]
    pub controls: Tensor<B, 2>,
    /// Reference states [batch, num_dofs], if known
    pub references: Option<Tensor<B, 2>>,
}

impl<B: Backend> Batch<B> {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.controls.dims()[0]
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleSet {
    /// Controls only.
    pub fn from_controls(controls: SampleMatrix) -> Self {
        Self {
            num_dofs: controls.cols,
            controls: controls.values,
            references: None,
        }
    }

    /// Controls with reference solutions.
    ///
    /// # Errors
    /// `ReferenceCount` unless both matrices have the same shape.
    pub fn with_references(controls: SampleMatrix, references: SampleMatrix) -> Result<Self, SampleFileError> {
        if controls.rows != references.rows || controls.cols != references.cols {
            return Err(SampleFileError::ReferenceCount {
                controls: (controls.rows, controls.cols),
                references: (references.rows, references.cols),
            });
        }
        Ok(Self {
            num_dofs: controls.cols,
            controls: controls.values,
            references: Some(references.values),
        })
    }

    /// Degrees of freedom per sample.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        if self.num_dofs == 0 {
            0
        } else {
            self.controls.len() / self.num_dofs
        }
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every sample has a reference state.
    pub fn has_references(&self) -> bool {
        self.references.is_some()
    }

    /// Control vector of sample `i`.
    pub fn control(&self, i: usize) -> &[f32] {
        &self.controls[i * self.num_dofs..(i + 1) * self.num_dofs]
    }

    /// Reference state of sample `i`.
    pub fn reference(&self, i: usize) -> Option<&[f32]> {
        self.references
            .as_ref()
            .map(|r| &r[i * self.num_dofs..(i + 1) * self.num_dofs])
    }

    fn subset(&self, indices: &[usize]) -> Self {
        let mut controls = Vec::with_capacity(indices.len() * self.num_dofs);
        let mut references = self
            .references
            .as_ref()
            .map(|_| Vec::with_capacity(indices.len() * self.num_dofs));
        for &i in indices {
            controls.extend_from_slice(self.control(i));
            if let (Some(out), Some(r)) = (references.as_mut(), self.reference(i)) {
                out.extend_from_slice(r);
            }
        }
        Self {
            num_dofs: self.num_dofs,
            controls,
            references,
        }
    }

    /// Shuffle with `seed` and split off the last `test_fraction` of the samples.
    ///
    /// Returns `(train, test)`. The test split gets `round(len * test_fraction)`
    /// samples.
    pub fn split(&self, test_fraction: f64, seed: u64) -> (Self, Self) {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));

        let n_test = ((self.len() as f64) * test_fraction.clamp(0.0, 1.0)).round() as usize;
        let n_train = self.len() - n_test;
        (self.subset(&indices[..n_train]), self.subset(&indices[n_train..]))
    }

    /// Number of batches of size `batch_size` (the last one may be partial).
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.len().div_ceil(batch_size.max(1))
    }

    /// Cut the set into device batches, in order or shuffled by `rng`.
    pub fn batches<B: Backend>(
        &self,
        batch_size: usize,
        rng: Option<&mut StdRng>,
        device: &B::Device,
    ) -> Vec<Batch<B>> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        if let Some(rng) = rng {
            order.shuffle(rng);
        }

        order
            .chunks(batch_size.max(1))
            .map(|chunk| {
                let part = self.subset(chunk);
                let shape = [chunk.len(), self.num_dofs];
                Batch {
                    controls: tensor_from_rows(&part.controls, shape, device),
                    references: part.references.map(|r| tensor_from_rows(&r, shape, device)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: usize, cols: usize, offset: f32) -> SampleMatrix {
        SampleMatrix {
            rows,
            cols,
            values: (0..rows * cols).map(|v| v as f32 + offset).collect(),
        }
    }

    #[test]
    fn test_accessors() {
        let set = SampleSet::with_references(matrix(3, 2, 0.0), matrix(3, 2, 100.0)).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.control(1), &[2.0, 3.0]);
        assert_eq!(set.reference(1), Some(&[102.0, 103.0][..]));
    }

    #[test]
    fn test_reference_shape_checked() {
        let err = SampleSet::with_references(matrix(3, 2, 0.0), matrix(2, 2, 0.0)).unwrap_err();
        assert!(matches!(err, SampleFileError::ReferenceCount { .. }));
    }

    #[test]
    fn test_split_keeps_pairs_aligned() {
        let set = SampleSet::with_references(matrix(10, 3, 0.0), matrix(10, 3, 1000.0)).unwrap();
        let (train, test) = set.split(0.3, 7);
        assert_eq!(train.len(), 7);
        assert_eq!(test.len(), 3);
        for part in [&train, &test] {
            for i in 0..part.len() {
                let c = part.control(i);
                let r = part.reference(i).unwrap();
                assert_eq!(r[0] - c[0], 1000.0);
            }
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let set = SampleSet::from_controls(matrix(20, 2, 0.0));
        assert_eq!(set.split(0.25, 3), set.split(0.25, 3));
    }

    #[test]
    fn test_num_batches() {
        let set = SampleSet::from_controls(matrix(10, 2, 0.0));
        assert_eq!(set.num_batches(4), 3);
        assert_eq!(set.num_batches(5), 2);
    }

    #[cfg(feature = "ndarray")]
    #[test]
    fn test_batches_cover_all_samples() {
        use crate::backend::{CpuBackend, SolverBackend};

        let set = SampleSet::from_controls(matrix(10, 2, 0.0));
        let device = CpuBackend::default_device();
        let mut rng = StdRng::seed_from_u64(1);
        let batches = set.batches::<CpuBackend>(4, Some(&mut rng), &device);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 10);
        assert!(batches.iter().all(|b| b.references.is_none()));
        assert_eq!(batches[2].controls.dims(), [2, 2]);
    }
}
