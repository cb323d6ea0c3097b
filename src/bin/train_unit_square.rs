//! Amortized training on the P1 unit square.
//!
//! Trains a boundary-constrained MLP to minimize the energy of
//! `-Δu + 10 u + 10 u³ = f` with `u = 1` on the boundary, for random
//! piecewise-linear sources `f`.
//!
//! Usage: `train_unit_square [controls.txt]`. Without an argument the
//! controls are drawn uniformly from [-5, 5].

use std::path::Path;
use std::sync::Arc;

use amortized_fem::{
    read_sample_matrix, BoundaryMlpConfig, CpuAutodiffBackend, OperatorStore, RecorderCheckpointer,
    SampleMatrix, SampleSet, SolverBackend, Trainer, TrainingConfig, TrainingError, TrainingPlan, UnitSquareP1,
};
use burn::optim::AdamConfig;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_controls(rows: usize, cols: usize, seed: u64) -> SampleMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    SampleMatrix {
        rows,
        cols,
        values: (0..rows * cols).map(|_| rng.gen_range(-5.0..5.0)).collect(),
    }
}

fn main() -> Result<(), TrainingError> {
    tracing_subscriber::fmt::init();

    // Parameters
    let n_cells = 8;
    let n_samples = 512;
    let config = TrainingConfig::default()
        .with_epochs(50)
        .with_batch_size(32)
        .with_learning_rate(1e-3)
        .with_test_fraction(0.125)
        .with_seed(42)
        .with_report_interval(5)
        .with_checkpoint("target/amortized/unit_square_mlp");

    let provider = UnitSquareP1::new(n_cells);
    let store = Arc::new(OperatorStore::build(&provider)?);
    let n = store.num_dofs();
    info!("Unit square P1: {} cells per side, {} dofs", n_cells, n);

    let controls = match std::env::args().nth(1) {
        Some(path) => read_sample_matrix(Path::new(&path))?,
        None => random_controls(n_samples, n, config.seed),
    };
    let samples = SampleSet::from_controls(controls);
    let (train, test) = config.split(&samples);

    let plan = TrainingPlan::resolve(config, &store, &train, &test)?;
    let device = CpuAutodiffBackend::default_device();
    let model = BoundaryMlpConfig::new(n)
        .with_hidden(vec![128, 128])
        .with_smooth_input(true)
        .init::<CpuAutodiffBackend>(&device);

    let mut trainer = Trainer::new(
        plan,
        store,
        model,
        AdamConfig::new().init(),
        RecorderCheckpointer::new(),
        &device,
    )?;
    let history = trainer.fit(&train, &test)?;

    if let Some(last) = history.last() {
        info!("Final epoch: {}", last.summary_line());
    }
    Ok(())
}
