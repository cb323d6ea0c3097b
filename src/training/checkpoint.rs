//! Model persistence.
//!
//! [`RecorderCheckpointer`] stores parameters with Burn's named MessagePack
//! recorder at full precision. Files always end in `.mpk`: `out/solver` lands
//! in `out/solver.mpk` and `out/run.v2` in `out/run.v2.mpk`. A path that
//! already ends in `.mpk` is used as is.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use log::debug;

use super::TrainingError;

/// Saves and restores approximator parameters.
pub trait Checkpointer<B: Backend, M: Module<B>> {
    /// Persist `model` at `path`. Returns the file actually written.
    fn save(&self, model: &M, path: &Path) -> Result<PathBuf, TrainingError>;

    /// Load parameters from `path` into `model`.
    fn load(&self, model: M, path: &Path, device: &B::Device) -> Result<M, TrainingError>;
}

/// [`Checkpointer`] backed by a named MessagePack file recorder.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecorderCheckpointer;

impl RecorderCheckpointer {
    /// File extension added by the recorder.
    pub const EXTENSION: &'static str = "mpk";

    /// Create a checkpointer.
    pub fn new() -> Self {
        Self
    }

    /// Path of the file written for `path`.
    pub fn file_path(path: &Path) -> PathBuf {
        if path.extension().is_some_and(|ext| ext == Self::EXTENSION) {
            return path.to_path_buf();
        }
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".");
        name.push(Self::EXTENSION);
        path.with_file_name(name)
    }

    /// Path for the intermediate checkpoint of `epoch`, next to `path`.
    ///
    /// `run.v2` gives `run.v2-epoch3` and `run.mpk` gives `run-epoch3.mpk`,
    /// so epoch files never collide with each other or with the final model.
    pub fn epoch_path(path: &Path, epoch: usize) -> PathBuf {
        let file = Self::file_path(path);
        let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        file.with_file_name(format!("{}-epoch{}.{}", stem, epoch, Self::EXTENSION))
    }

    fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
    }
}

impl<B: Backend, M: Module<B>> Checkpointer<B, M> for RecorderCheckpointer {
    fn save(&self, model: &M, path: &Path) -> Result<PathBuf, TrainingError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| TrainingError::Checkpoint(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let written = Self::file_path(path);
        model
            .clone()
            .save_file(written.clone(), &Self::recorder())
            .map_err(|e| TrainingError::Checkpoint(format!("saving {}: {:?}", written.display(), e)))?;

        debug!("Checkpoint written to {}", written.display());
        Ok(written)
    }

    fn load(&self, model: M, path: &Path, device: &B::Device) -> Result<M, TrainingError> {
        let file = Self::file_path(path);
        model
            .load_file(file.clone(), &Self::recorder(), device)
            .map_err(|e| TrainingError::Checkpoint(format!("loading {}: {:?}", file.display(), e)))
    }
}

#[cfg(test)]
#[cfg(feature = "ndarray")]
mod tests {
    use super::*;
    use crate::backend::{tensor_to_vec, CpuBackend, SolverBackend};
    use crate::model::BoundaryMlpConfig;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("solver");
        let device = CpuBackend::default_device();
        let config = BoundaryMlpConfig::new(4).with_hidden(vec![6]);
        let model = config.init::<CpuBackend>(&device);

        let checkpointer = RecorderCheckpointer::new();
        let written = Checkpointer::<CpuBackend, _>::save(&checkpointer, &model, &path).unwrap();
        assert_eq!(written, RecorderCheckpointer::file_path(&path));
        assert!(written.exists());

        let fresh = config.init::<CpuBackend>(&device);
        let loaded = Checkpointer::<CpuBackend, _>::load(&checkpointer, fresh, &path, &device).unwrap();

        let input = Tensor::<CpuBackend, 2>::ones([2, 4], &device);
        let expected = tensor_to_vec(model.forward(input.clone())).unwrap();
        let actual = tensor_to_vec(loaded.forward(input)).unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_file_path_keeps_dotted_names() {
        assert_eq!(RecorderCheckpointer::file_path(Path::new("out/solver")), Path::new("out/solver.mpk"));
        assert_eq!(RecorderCheckpointer::file_path(Path::new("out/run.v2")), Path::new("out/run.v2.mpk"));
        assert_eq!(RecorderCheckpointer::file_path(Path::new("out/run.mpk")), Path::new("out/run.mpk"));
    }

    #[test]
    fn test_epoch_paths_are_distinct() {
        let final_path = Path::new("out/run.v2");
        let first = RecorderCheckpointer::epoch_path(final_path, 1);
        let second = RecorderCheckpointer::epoch_path(final_path, 2);
        assert_eq!(first, Path::new("out/run.v2-epoch1.mpk"));
        assert_ne!(first, second);
        assert_ne!(first, RecorderCheckpointer::file_path(final_path));
        assert_eq!(
            RecorderCheckpointer::epoch_path(Path::new("out/run.mpk"), 3),
            Path::new("out/run-epoch3.mpk")
        );
    }

    #[test]
    fn test_save_dotted_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.v2");
        let device = CpuBackend::default_device();
        let config = BoundaryMlpConfig::new(3).with_hidden(vec![4]);
        let model = config.init::<CpuBackend>(&device);

        let written = Checkpointer::<CpuBackend, _>::save(&RecorderCheckpointer, &model, &path).unwrap();
        assert_eq!(written, dir.path().join("run.v2.mpk"));
        assert!(written.exists());
        assert!(!dir.path().join("run.mpk").exists());

        let fresh = config.init::<CpuBackend>(&device);
        assert!(Checkpointer::<CpuBackend, _>::load(&RecorderCheckpointer, fresh, &path, &device).is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let device = CpuBackend::default_device();
        let model = BoundaryMlpConfig::new(4).init::<CpuBackend>(&device);
        let result = Checkpointer::<CpuBackend, _>::load(&RecorderCheckpointer, model, &dir.path().join("absent"), &device);
        assert!(matches!(result, Err(TrainingError::Checkpoint(_))));
    }
}
