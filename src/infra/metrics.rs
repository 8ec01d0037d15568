// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per training epoch:
//
//   epoch,train_loss,accuracy,best_accuracy,checkpointed
//   1,14.203100,0.000000,0.000000,true
//   2,11.870400,0.125000,0.125000,true
//   3,10.992000,0.125000,0.125000,false
//
// train_loss is the mean per-example loss of the epoch; accuracy
// the exact-match accuracy on the evaluation set.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,train_loss,accuracy,best_accuracy,checkpointed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch:         usize,
    pub train_loss:    f64,
    pub accuracy:      f64,
    pub best_accuracy: f64,
    /// Whether this epoch wrote the best checkpoint
    pub checkpointed:  bool,
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if `dir/metrics.csv` does not exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{}",
            m.epoch, m.train_loss, m.accuracy, m.best_accuracy, m.checkpointed,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, accuracy={:.4}",
            m.epoch,
            m.train_loss,
            m.accuracy,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
