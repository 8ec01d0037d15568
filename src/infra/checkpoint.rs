// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the networks of every tag as a single
// full-precision burn record.
//
// Layout of an output directory:
//
//   <dir>/
//     best_model.mpk      ← every tag network, best accuracy so far
//     checkpoint.json     ← network config, tag count, epoch, accuracy
//     train_config.json   ← the run's TrainConfig
//     metrics.csv         ← one row per epoch (see metrics.rs)
//
// There is only ever one model file: a better epoch overwrites it.
// The manifest is written after the weights, so a manifest always
// describes a complete record.
//
// Full precision keeps the f32 weights bit-for-bit, which is what
// makes decoding after a reload identical to decoding before it.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{TransducerBank, TransducerConfig};

const MODEL_FILE:    &str = "best_model";
const MANIFEST_FILE: &str = "checkpoint.json";
const CONFIG_FILE:   &str = "train_config.json";

/// What is needed to rebuild the networks before loading their weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub model:     TransducerConfig,
    pub tag_count: usize,
    pub epoch:     usize,
    pub accuracy:  f64,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates `dir` (and parents) if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Refer to an existing checkpoint directory without creating anything.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Overwrite the best checkpoint with `bank`.
    pub fn save_best<B: Backend>(
        &self,
        bank:     &TransducerBank<B>,
        manifest: &CheckpointManifest,
    ) -> Result<()> {
        let path = self.dir.join(MODEL_FILE);
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .record(bank.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let manifest_path = self.dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, serde_json::to_string_pretty(manifest)?)
            .with_context(|| format!("Cannot write '{}'", manifest_path.display()))?;

        tracing::debug!(
            "Saved checkpoint: epoch {}, accuracy {:.4}",
            manifest.epoch,
            manifest.accuracy
        );
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<CheckpointManifest> {
        let path = self.dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Has a model been trained into this directory?", path.display())
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed checkpoint manifest '{}'", path.display()))
    }

    /// Rebuild the networks from the manifest and restore their weights.
    pub fn load_bank<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(TransducerBank<B>, CheckpointManifest)> {
        let manifest = self.load_manifest()?;
        let path = self.dir.join(MODEL_FILE);

        let record = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;
        let bank = manifest
            .model
            .init_bank::<B>(manifest.tag_count, device)
            .load_record(record);

        tracing::info!(
            "Loaded checkpoint '{}' (epoch {}, accuracy {:.4}, {} tags)",
            self.dir.display(),
            manifest.epoch,
            manifest.accuracy,
            manifest.tag_count
        );
        Ok((bank, manifest))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}
