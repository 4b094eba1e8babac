//! Text summary of a single experiment

use std::fmt;

use serde::Serialize;

use crate::experiment::{EvaluationMetricRecord, ExperimentRecord, TrainingMetricRecord};

/// An experiment with its final epoch and evaluation results.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentDetails {
    experiment: ExperimentRecord,
    latest_epoch: Option<TrainingMetricRecord>,
    evaluations: Vec<EvaluationMetricRecord>,
}

impl ExperimentDetails {
    pub(crate) const fn new(
        experiment: ExperimentRecord,
        latest_epoch: Option<TrainingMetricRecord>,
        evaluations: Vec<EvaluationMetricRecord>,
    ) -> Self {
        Self {
            experiment,
            latest_epoch,
            evaluations,
        }
    }

    /// The experiment.
    #[must_use]
    pub const fn experiment(&self) -> &ExperimentRecord {
        &self.experiment
    }

    /// Metrics of the highest logged epoch.
    #[must_use]
    pub const fn latest_epoch(&self) -> Option<&TrainingMetricRecord> {
        self.latest_epoch.as_ref()
    }

    /// Evaluation results in logging order.
    #[must_use]
    pub fn evaluations(&self) -> &[EvaluationMetricRecord] {
        &self.evaluations
    }
}

impl fmt::Display for ExperimentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exp = &self.experiment;
        writeln!(f, "Experiment {}: {}", exp.id(), exp.name())?;

        writeln!(f, "\nConfiguration:")?;
        if let Ok(serde_json::Value::Object(config)) = exp.config().to_json() {
            for (key, value) in config.iter().filter(|(_, v)| !v.is_null()) {
                writeln!(f, "  {key}: {value}")?;
            }
        }

        if let Some(last) = &self.latest_epoch {
            writeln!(f, "\nFinal epoch {}:", last.epoch())?;
            writeln!(
                f,
                "    Train Loss: {:.4}  Train Acc: {:.4}",
                last.train_loss(),
                last.train_accuracy()
            )?;
            writeln!(
                f,
                "    Val Loss:   {:.4}  Val Acc:   {:.4}",
                last.val_loss(),
                last.val_accuracy()
            )?;
        }

        if !self.evaluations.is_empty() {
            writeln!(f, "\nEvaluation Results:")?;
            for metric in &self.evaluations {
                writeln!(f, "  {}:", metric.dataset_name())?;
                writeln!(f, "    Loss: {:.4}", metric.loss())?;
                writeln!(f, "    Accuracy: {:.4}", metric.accuracy())?;
            }
        }
        Ok(())
    }
}
