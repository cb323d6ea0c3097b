//! Per-epoch metrics, run history and progress logging.

use std::time::Instant;

use log::info;

use crate::energy::LossStrategy;

/// Metrics of one epoch, averaged per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochMetrics {
    /// Epoch number, starting at 1
    pub epoch: usize,
    /// Mean training loss over the epoch
    pub train_loss: f64,
    /// Mean held-out loss, `None` without a held-out split
    pub test_loss: Option<f64>,
    /// Mean amortization gap on the held-out split
    pub amortization_gap: Option<f64>,
    /// Mean normalized error over non-degenerate held-out samples
    pub normalized_error: Option<f64>,
    /// Held-out samples excluded for a zero-norm reference
    pub degenerate_samples: usize,
    /// Approximator calls during the training pass
    pub model_calls_train: usize,
    /// Approximator calls during the evaluation pass
    pub model_calls_eval: usize,
}

impl EpochMetrics {
    /// One-line summary for logs.
    pub fn summary_line(&self) -> String {
        let mut line = format!("train={:.4e}", self.train_loss);
        if let Some(loss) = self.test_loss {
            line.push_str(&format!(" | test={:.4e}", loss));
        }
        if let Some(gap) = self.amortization_gap {
            line.push_str(&format!(" | gap={:.4e}", gap));
        }
        if let Some(err) = self.normalized_error {
            line.push_str(&format!(" | rel_err={:.4}", err));
        }
        if self.degenerate_samples > 0 {
            line.push_str(&format!(" | degenerate={}", self.degenerate_samples));
        }
        line
    }
}

/// Metrics of a whole run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingHistory {
    epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the metrics of a finished epoch.
    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    /// All recorded epochs in order.
    pub fn epochs(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    /// Number of recorded epochs.
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Metrics of the first epoch.
    pub fn first(&self) -> Option<&EpochMetrics> {
        self.epochs.first()
    }

    /// Metrics of the last epoch.
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Lowest training loss seen.
    pub fn best_train_loss(&self) -> Option<f64> {
        self.epochs.iter().map(|m| m.train_loss).min_by(f64::total_cmp)
    }
}

/// Logs epoch metrics with elapsed time and ETA.
pub struct ProgressReporter {
    start_instant: Instant,
    total_epochs: usize,
    report_interval: usize,
    strategy: LossStrategy,
}

impl ProgressReporter {
    /// Create a reporter for `total_epochs`, logging every `report_interval` epochs.
    pub fn new(total_epochs: usize, report_interval: usize, strategy: LossStrategy) -> Self {
        Self {
            start_instant: Instant::now(),
            total_epochs,
            report_interval: report_interval.max(1),
            strategy,
        }
    }

    /// Whether `epoch` is due for a report. The final epoch always is.
    pub fn is_due(&self, epoch: usize) -> bool {
        epoch % self.report_interval == 0 || epoch == self.total_epochs
    }

    /// Log `metrics` if its epoch is due. Returns true if something was logged.
    pub fn maybe_report(&self, metrics: &EpochMetrics) -> bool {
        if self.is_due(metrics.epoch) {
            self.report(metrics);
            true
        } else {
            false
        }
    }

    /// Log `metrics` unconditionally.
    pub fn report(&self, metrics: &EpochMetrics) {
        let elapsed = self.start_instant.elapsed().as_secs_f64();
        let eta = if metrics.epoch > 0 {
            let per_epoch = elapsed / metrics.epoch as f64;
            format_duration(per_epoch * self.total_epochs.saturating_sub(metrics.epoch) as f64)
        } else {
            "calculating...".to_string()
        };

        info!(
            "[{} {:>4}/{}] {} | elapsed={} | ETA={}",
            self.strategy,
            metrics.epoch,
            self.total_epochs,
            metrics.summary_line(),
            format_duration(elapsed),
            eta
        );
    }

    /// Log the end-of-run summary.
    pub fn finish(&self, history: &TrainingHistory) {
        let elapsed = format_duration(self.start_instant.elapsed().as_secs_f64());
        match (history.first(), history.last()) {
            (Some(first), Some(last)) => info!(
                "Training finished: {} epochs in {} | train loss {:.4e} -> {:.4e}",
                history.len(),
                elapsed,
                first.train_loss,
                last.train_loss
            ),
            _ => info!("Training finished without epochs in {}", elapsed),
        }
    }
}

/// Format seconds as `30.0s`, `1m30s` or `1h1m`.
pub(crate) fn format_duration(secs: f64) -> String {
    // Rounded before splitting into units
    let tenths = (secs * 10.0).round();
    if tenths < 600.0 {
        return format!("{:.1}s", tenths / 10.0);
    }
    let total = secs.round() as u64;
    if total < 3600 {
        format!("{}m{}s", total / 60, total % 60)
    } else {
        format!("{}h{}m", total / 3600, (total % 3600) / 60)
    }
}
