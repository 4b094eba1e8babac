//! Synthetic demo runs
//!
//! Records the four MNIST configuration variants (`default`, `hidden2`,
//! `samples100`, `blurred`) with made-up but plausible learning curves, so the
//! dashboard can be previewed without a training stack.

use std::path::Path;

use tracing::info;

use crate::artifact::{Artifact, Tensor, TensorState};
use crate::experiment::{EpochMetrics, ExperimentConfig, ExperimentRecord};
use crate::tracker::TrackingSession;
use crate::Result;

/// Evaluation datasets scored at the end of each demo run.
pub const EVALUATION_DATASETS: [&str; 2] = ["test", "test_blurred"];

/// The four configuration variants, keyed by experiment name, in recording order.
///
/// `data_root` is where the (not included) MNIST tensors and trained models would live.
#[must_use]
pub fn config_variants(data_root: &Path) -> Vec<(&'static str, ExperimentConfig)> {
    let base = ExperimentConfig::new()
        .with_batch_size(64)
        .with_hidden_size(128)
        .with_learning_rate(0.01)
        .with_data_path(data_root.join("mnist_train.pt"))
        .with_data_split_ratio(0.8)
        .with_max_epochs(10);

    let variants = [
        ("default", base.clone()),
        ("hidden2", base.clone().with_hidden_size(2)),
        ("samples100", base.clone().with_max_samples(100)),
        (
            "blurred",
            base.with_data_path(data_root.join("mnist_train_blurred.pt")),
        ),
    ];

    variants
        .into_iter()
        .map(|(name, config)| {
            let output = data_root.join(format!("model_{name}.pth"));
            (name, config.with_output_path(output))
        })
        .collect()
}

/// Curve shape per variant: (final train loss, final val accuracy, blurred accuracy).
fn curve(name: &str) -> (f64, f64, f64) {
    match name {
        "hidden2" => (1.2, 0.55, 0.41),
        "samples100" => (0.35, 0.62, 0.48),
        "blurred" => (0.3, 0.9, 0.91),
        _ => (0.15, 0.95, 0.72),
    }
}

fn epoch_metrics(name: &str, epoch: u32, epochs: u32) -> EpochMetrics {
    let (final_loss, final_acc, _) = curve(name);
    let progress = f64::from(epoch) / f64::from(epochs.max(1));
    let decay = (-3.0 * progress).exp();

    let train_loss = final_loss + 2.2 * decay;
    let train_accuracy = final_acc - (final_acc - 0.1) * decay;
    EpochMetrics::new(
        epoch,
        train_loss,
        train_accuracy.min(1.0),
        train_loss * 1.08,
        (train_accuracy * 0.98).min(1.0),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn checkpoint(epoch: u32) -> Result<TensorState> {
    let scale = (1.0 + f64::from(epoch)).recip() as f32;
    Ok(TensorState::new()
        .with(
            "fc1.weight",
            Tensor::new(vec![2, 2], vec![scale, -scale, 0.5 * scale, 0.0])?,
        )
        .with("fc2.bias", Tensor::new(vec![2], vec![0.1, -0.1])?))
}

/// Record every variant through `session` with `epochs` epochs each, a tensor
/// checkpoint per epoch and scores on both evaluation datasets.
///
/// # Errors
///
/// Returns error if any write fails.
pub fn record_demo(
    session: &mut TrackingSession,
    data_root: &Path,
    epochs: u32,
) -> Result<Vec<ExperimentRecord>> {
    let epochs = epochs.max(1);
    let mut recorded = Vec::new();

    for (name, config) in config_variants(data_root) {
        let record = session.start(name, config.with_max_epochs(epochs))?;

        for epoch in 1..=epochs {
            let state = Artifact::from(checkpoint(epoch)?);
            session.log_training_metrics(&epoch_metrics(name, epoch, epochs), Some(&state))?;
        }

        let last = epoch_metrics(name, epochs, epochs);
        let (_, _, blurred_acc) = curve(name);
        session.log_evaluation_metrics(EVALUATION_DATASETS[0], last.val_loss, last.val_accuracy)?;
        session.log_evaluation_metrics(
            EVALUATION_DATASETS[1],
            last.val_loss * (1.0 + last.val_accuracy - blurred_acc),
            blurred_acc,
        )?;

        session.end();
        info!(id = %record.id(), name, epochs, "recorded demo experiment");
        recorded.push(record);
    }

    Ok(recorded)
}
