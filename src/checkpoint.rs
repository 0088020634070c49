//! Checkpoint and target-distribution I/O.
//!
//! Checkpoints are self-describing JSON records (epoch + learnable
//! parameters + the epoch's metrics); loading validates the shape and
//! fails with a typed error instead of silently defaulting. Targets come
//! from a JSON array, a newline/whitespace-delimited text file, or are
//! derived deterministically from the input energies.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::learning::LearningMetrics;
use crate::update::LearnableParameters;

/// One epoch's persisted learning state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: u64,
    pub params: LearnableParameters,
    pub metrics: LearningMetrics,
}

pub fn save_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<(), FlowError> {
    let json = serde_json::to_string_pretty(checkpoint)
        .map_err(|e| FlowError::parse(path, e.to_string()))?;
    fs::write(path, json).map_err(|e| FlowError::io(path, e))
}

pub fn load_checkpoint(path: &Path) -> Result<Checkpoint, FlowError> {
    let text = fs::read_to_string(path).map_err(|e| FlowError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| FlowError::parse(path, e.to_string()))
}

/// Load a checkpoint and verify its gain vector matches the bin count.
pub fn load_checkpoint_for_bins(path: &Path, bins: usize) -> Result<Checkpoint, FlowError> {
    let checkpoint = load_checkpoint(path)?;
    if checkpoint.params.gains.len() != bins {
        return Err(FlowError::Shape {
            what: "checkpoint gain count",
            expected: bins,
            actual: checkpoint.params.gains.len(),
        });
    }
    Ok(checkpoint)
}

/// Derive a target distribution from the input energies:
/// each energy lands in bin `floor(e) mod bins`, contributions summed.
pub fn derive_target(energies: &[f32], bins: usize) -> Vec<f32> {
    let mut target = vec![0.0f32; bins];
    for &input in energies {
        let e = input.max(0.0);
        let bin = (e.floor() as u64 % bins as u64) as usize;
        target[bin] += e;
    }
    target
}

/// Load a target distribution of exactly `bins` floats.
///
/// A leading `[` means a JSON array; anything else is parsed as
/// whitespace/newline-delimited floats. A count mismatch is a hard error.
pub fn load_target(path: &Path, bins: usize) -> Result<Vec<f32>, FlowError> {
    let text = fs::read_to_string(path).map_err(|e| FlowError::io(path, e))?;

    let values: Vec<f32> = if text.trim_start().starts_with('[') {
        serde_json::from_str(&text).map_err(|e| FlowError::parse(path, e.to_string()))?
    } else {
        text.split_whitespace()
            .map(|tok| {
                tok.parse::<f32>()
                    .map_err(|e| FlowError::parse(path, format!("bad float '{tok}': {e}")))
            })
            .collect::<Result<_, _>>()?
    };

    if values.len() != bins {
        return Err(FlowError::Shape {
            what: "target bin count",
            expected: bins,
            actual: values.len(),
        });
    }
    Ok(values)
}
