//! Epoch loop: training pass, evaluation pass, reporting, persistence.

use std::sync::Arc;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{
    Checkpointer, EpochMetrics, ProgressReporter, RecorderCheckpointer, TrainingError, TrainingHistory, TrainingPlan,
};
use crate::backend::tensor_to_scalar;
use crate::data::SampleSet;
use crate::energy::EnergyFunctional;
use crate::graph::GraphInfo;
use crate::model::AmortizedSolver;
use crate::operators::{GraphNormalizer, OperatorStore};

/// Totals of one evaluation pass before averaging.
#[derive(Clone, Copy, Debug, Default)]
struct EvalTotals {
    loss: f64,
    gap: f64,
    error: f64,
    error_samples: usize,
    degenerate: usize,
    calls: usize,
}

/// Trains an [`AmortizedSolver`] against one PDE instance.
///
/// # Type Parameters
///
/// * `B` - Autodiff backend used for the training pass
/// * `M` - Approximator, evaluated on `B::InnerBackend` via `valid()`
/// * `O` - Optimizer stepping `M`
/// * `C` - Checkpointer persisting `M`
pub struct Trainer<B, M, O, C>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + AmortizedSolver<B>,
    M::InnerModule: AmortizedSolver<B::InnerBackend>,
    O: Optimizer<M, B>,
    C: Checkpointer<B, M>,
{
    plan: TrainingPlan,
    model: M,
    optimizer: O,
    checkpointer: C,
    energy: EnergyFunctional<B>,
    eval_energy: EnergyFunctional<B::InnerBackend>,
    graph: GraphInfo<B>,
    eval_graph: GraphInfo<B::InnerBackend>,
    device: B::Device,
    rng: StdRng,
}

impl<B, M, O, C> Trainer<B, M, O, C>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + AmortizedSolver<B>,
    M::InnerModule: AmortizedSolver<B::InnerBackend>,
    O: Optimizer<M, B>,
    C: Checkpointer<B, M>,
{
    /// Build the trainer for a resolved plan.
    ///
    /// Uploads the operators and the side-information bundle once for the
    /// training and the evaluation backend.
    pub fn new(
        plan: TrainingPlan,
        store: Arc<OperatorStore>,
        model: M,
        optimizer: O,
        checkpointer: C,
        device: &B::Device,
    ) -> Result<Self, TrainingError> {
        if store.num_dofs() != plan.num_dofs() {
            return Err(TrainingError::InvalidConfig(format!(
                "plan was resolved for {} dofs, operators have {}",
                plan.num_dofs(),
                store.num_dofs()
            )));
        }

        let config = plan.config();
        let normalizer = GraphNormalizer::new().with_self_loops(config.self_loops);

        let energy = EnergyFunctional::new(store.clone(), config.energy, device)?;
        let eval_energy = EnergyFunctional::new(store.clone(), config.energy, device)?;
        let graph = GraphInfo::with_boundary_values(&store, &normalizer, plan.boundary_values(), device)?;
        let eval_graph = GraphInfo::with_boundary_values(&store, &normalizer, plan.boundary_values(), device)?;

        info!(
            "Trainer for '{}': {} dofs, strategy={}, lr={:e}, batch_size={}",
            store.name(),
            plan.num_dofs(),
            config.strategy,
            config.learning_rate,
            config.batch_size
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            plan,
            model,
            optimizer,
            checkpointer,
            energy,
            eval_energy,
            graph,
            eval_graph,
            device: device.clone(),
        })
    }

    /// The resolved plan.
    pub fn plan(&self) -> &TrainingPlan {
        &self.plan
    }

    /// The current approximator.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consume the trainer and return the approximator.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Run every epoch of the plan.
    ///
    /// `train` and `test` must be the splits the plan was resolved for.
    pub fn fit(&mut self, train: &SampleSet, test: &SampleSet) -> Result<TrainingHistory, TrainingError> {
        if !self.plan.matches(train, test) {
            return Err(TrainingError::InvalidConfig(
                "sample sets differ from the ones the plan was resolved for".into(),
            ));
        }

        let config = self.plan.config().clone();
        let reporter = ProgressReporter::new(config.epochs, config.report_interval, config.strategy);
        let mut history = TrainingHistory::new();

        for epoch in 1..=config.epochs {
            let (train_loss, model_calls_train) = self.train_epoch(train)?;

            let mut metrics = EpochMetrics {
                epoch,
                train_loss,
                test_loss: None,
                amortization_gap: None,
                normalized_error: None,
                degenerate_samples: 0,
                model_calls_train,
                model_calls_eval: 0,
            };

            if !test.is_empty() {
                let totals = self.evaluate(test)?;
                let n = test.len() as f64;
                metrics.test_loss = Some(totals.loss / n);
                metrics.model_calls_eval = totals.calls;
                if self.plan.test_has_references() {
                    metrics.amortization_gap = Some(totals.gap / n);
                    metrics.normalized_error =
                        (totals.error_samples > 0).then(|| totals.error / totals.error_samples as f64);
                    metrics.degenerate_samples = totals.degenerate;
                }
            }

            reporter.maybe_report(&metrics);

            if let (Some(path), Some(every)) = (&config.checkpoint_path, config.checkpoint_every) {
                if epoch % every == 0 && epoch != config.epochs {
                    let epoch_path = RecorderCheckpointer::epoch_path(path, epoch);
                    self.checkpointer.save(&self.model, &epoch_path)?;
                }
            }

            history.push(metrics);
        }

        if let Some(path) = &config.checkpoint_path {
            let written = self.checkpointer.save(&self.model, path)?;
            info!("Saved model to {}", written.display());
        }

        reporter.finish(&history);
        Ok(history)
    }

    /// One shuffled pass over `train` with one optimizer step per batch.
    ///
    /// Returns the per-sample mean loss and the number of approximator calls.
    fn train_epoch(&mut self, train: &SampleSet) -> Result<(f64, usize), TrainingError> {
        let config = self.plan.config();
        let strategy = config.strategy;
        let lr = config.learning_rate;
        let batches = train.batches::<B>(config.batch_size, Some(&mut self.rng), &self.device);

        let mut total = 0.0;
        let mut calls = 0;
        for batch in &batches {
            let prediction = self.model.predict(batch.controls.clone(), &self.graph);
            calls += 1;

            let loss = self.energy.loss(strategy, batch, prediction)?;
            total += tensor_to_scalar(loss.clone())?;

            let grads = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = self.optimizer.step(lr, self.model.clone(), grads);
        }

        debug!("Training pass: {} batches, loss sum {:.6e}", calls, total);
        Ok((total / train.len() as f64, calls))
    }

    /// One in-order pass over `test` on the inner backend.
    fn evaluate(&self, test: &SampleSet) -> Result<EvalTotals, TrainingError> {
        let config = self.plan.config();
        let model = self.model.valid();
        let batches = test.batches::<B::InnerBackend>(config.batch_size, None, &self.device);

        let mut totals = EvalTotals::default();
        for batch in &batches {
            let prediction = model.predict(batch.controls.clone(), &self.eval_graph);
            totals.calls += 1;

            let loss = self.eval_energy.loss(config.strategy, batch, prediction.clone())?;
            totals.loss += tensor_to_scalar(loss)?;

            if let Some(references) = &batch.references {
                totals.gap +=
                    self.eval_energy
                        .amortization_gap(batch.controls.clone(), prediction.clone(), references.clone())?;
                let report = self.eval_energy.normalized_l2_error(prediction, references.clone())?;
                totals.error += report.total;
                totals.error_samples += report.valid_samples();
                totals.degenerate += report.degenerate.len();
            }
        }
        Ok(totals)
    }
}
