//! Training configuration and its resolved plan.

use std::path::PathBuf;

use log::debug;

use super::TrainingError;
use crate::data::SampleSet;
use crate::energy::{EnergyConfig, LossStrategy};
use crate::operators::OperatorStore;

/// User-facing training configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingConfig {
    /// Number of passes over the training split
    pub epochs: usize,
    /// Samples per batch (the last batch may be partial)
    pub batch_size: usize,
    /// Optimizer step size
    pub learning_rate: f64,
    /// Loss used for training, fixed for the whole run
    pub strategy: LossStrategy,
    /// Energy weights and operator choices
    pub energy: EnergyConfig,
    /// Fraction of samples held out by [`TrainingConfig::split`]
    pub test_fraction: f64,
    /// Seed for the split and the per-epoch shuffles
    pub seed: u64,
    /// Dirichlet value per boundary group (default 1 on every group)
    pub boundary_values: Option<Vec<f32>>,
    /// Add self-loops before normalizing the adjacency
    pub self_loops: bool,
    /// Where to persist the model after the final epoch
    pub checkpoint_path: Option<PathBuf>,
    /// Also persist every N epochs
    pub checkpoint_every: Option<usize>,
    /// Log metrics every N epochs
    pub report_interval: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            learning_rate: 1e-4,
            strategy: LossStrategy::Amortized,
            energy: EnergyConfig::default(),
            test_fraction: 0.1,
            seed: 0,
            boundary_values: None,
            self_loops: true,
            checkpoint_path: None,
            checkpoint_every: None,
            report_interval: 1,
        }
    }
}

impl TrainingConfig {
    /// Set the number of epochs.
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the learning rate.
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the loss strategy.
    pub fn with_strategy(mut self, strategy: LossStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the energy configuration.
    pub fn with_energy(mut self, energy: EnergyConfig) -> Self {
        self.energy = energy;
        self
    }

    /// Set the held-out fraction.
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set one Dirichlet value per boundary group.
    pub fn with_boundary_values(mut self, values: Vec<f32>) -> Self {
        self.boundary_values = Some(values);
        self
    }

    /// Toggle self-loops in the adjacency normalization.
    pub fn with_self_loops(mut self, self_loops: bool) -> Self {
        self.self_loops = self_loops;
        self
    }

    /// Persist the model to `path` after the final epoch.
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    /// Also persist every `every` epochs.
    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = Some(every);
        self
    }

    /// Log metrics every `interval` epochs.
    pub fn with_report_interval(mut self, interval: usize) -> Self {
        self.report_interval = interval;
        self
    }

    /// Check the values that do not depend on data or operators.
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.epochs == 0 {
            return Err(TrainingError::InvalidConfig("epochs must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidConfig("batch_size must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainingError::InvalidConfig(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(TrainingError::InvalidConfig(format!(
                "test_fraction must lie in [0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.checkpoint_every == Some(0) {
            return Err(TrainingError::InvalidConfig("checkpoint_every must be positive".into()));
        }
        if self.checkpoint_every.is_some() && self.checkpoint_path.is_none() {
            return Err(TrainingError::InvalidConfig(
                "checkpoint_every needs a checkpoint_path".into(),
            ));
        }
        if self.report_interval == 0 {
            return Err(TrainingError::InvalidConfig("report_interval must be positive".into()));
        }
        self.energy.validate()?;
        Ok(())
    }

    /// Shuffle `samples` with `seed` and hold out `test_fraction` of them.
    pub fn split(&self, samples: &SampleSet) -> (SampleSet, SampleSet) {
        samples.split(self.test_fraction, self.seed)
    }
}

/// A validated configuration with every derived quantity resolved.
///
/// Built once, before the trainer and its components exist.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingPlan {
    config: TrainingConfig,
    num_dofs: usize,
    boundary_values: Vec<f32>,
    num_train: usize,
    num_test: usize,
    train_batches: usize,
    test_batches: usize,
    test_has_references: bool,
}

impl TrainingPlan {
    /// Validate `config` against the operators and both splits.
    ///
    /// # Errors
    /// `InvalidConfig` when
    /// - a configuration value is out of range
    /// - a split does not have `num_dofs` values per sample
    /// - the training split is empty
    /// - the boundary values do not match the boundary groups
    /// - the strategy is supervised and a split lacks references
    pub fn resolve(
        config: TrainingConfig,
        store: &OperatorStore,
        train: &SampleSet,
        test: &SampleSet,
    ) -> Result<Self, TrainingError> {
        config.validate()?;

        let num_dofs = store.num_dofs();
        for (name, set) in [("training", train), ("test", test)] {
            if !set.is_empty() && set.num_dofs() != num_dofs {
                return Err(TrainingError::InvalidConfig(format!(
                    "{} samples have {} values, operators expect {}",
                    name,
                    set.num_dofs(),
                    num_dofs
                )));
            }
        }
        if train.is_empty() {
            return Err(TrainingError::InvalidConfig("training split is empty".into()));
        }

        let num_groups = store.boundary_partition().num_groups();
        let boundary_values = match &config.boundary_values {
            Some(values) if values.len() != num_groups => {
                return Err(TrainingError::InvalidConfig(format!(
                    "{} boundary values given for {} boundary groups",
                    values.len(),
                    num_groups
                )));
            }
            Some(values) => values.clone(),
            None => vec![1.0; num_groups],
        };

        if config.strategy == LossStrategy::Supervised {
            if !train.has_references() {
                return Err(TrainingError::InvalidConfig(
                    "supervised training requires reference states".into(),
                ));
            }
            if !test.is_empty() && !test.has_references() {
                return Err(TrainingError::InvalidConfig(
                    "supervised evaluation requires reference states".into(),
                ));
            }
        }

        let plan = Self {
            num_dofs,
            boundary_values,
            num_train: train.len(),
            num_test: test.len(),
            train_batches: train.num_batches(config.batch_size),
            test_batches: test.num_batches(config.batch_size),
            test_has_references: test.has_references(),
            config,
        };
        debug!(
            "Training plan: {} dofs, {} train / {} test samples, {} + {} batches per epoch",
            plan.num_dofs, plan.num_train, plan.num_test, plan.train_batches, plan.test_batches
        );
        Ok(plan)
    }

    /// The validated configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Degrees of freedom per sample.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Dirichlet value per boundary group.
    pub fn boundary_values(&self) -> &[f32] {
        &self.boundary_values
    }

    /// Training split size.
    pub fn num_train(&self) -> usize {
        self.num_train
    }

    /// Held-out split size.
    pub fn num_test(&self) -> usize {
        self.num_test
    }

    /// Training batches per epoch.
    pub fn train_batches(&self) -> usize {
        self.train_batches
    }

    /// Evaluation batches per epoch.
    pub fn test_batches(&self) -> usize {
        self.test_batches
    }

    /// Whether the held-out split carries reference states.
    pub fn test_has_references(&self) -> bool {
        self.test_has_references
    }

    /// Whether `set` is the split this plan was resolved for.
    pub(super) fn matches(&self, train: &SampleSet, test: &SampleSet) -> bool {
        train.len() == self.num_train
            && test.len() == self.num_test
            && train.num_dofs() == self.num_dofs
            && (test.is_empty() || test.num_dofs() == self.num_dofs)
            && test.has_references() == self.test_has_references
    }
}
