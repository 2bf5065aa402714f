// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanlayerError};
use crate::types::PreprocessingFlags;

/// Render zoom that rasterizes a page at roughly 200 DPI.
pub const DEFAULT_RENDER_ZOOM: f32 = 200.0 / 72.0;

/// Tuning parameters for the image preprocessing steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessParams {
    /// Largest skew (degrees) `deskew` will correct.
    pub max_skew_angle: f32,
    /// Linear contrast gain applied before local equalization.
    pub contrast: f32,
    /// Linear brightness offset applied before local equalization.
    pub brightness: f32,
    /// Pixels brighter than this are lifted to white before binarization.
    pub background_threshold: u8,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            max_skew_angle: 10.0,
            contrast: 1.5,
            brightness: 0.0,
            background_threshold: 200,
        }
    }
}

/// Persistent pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Recognition language tag, or `"auto"` to tag regions by script.
    pub language: String,
    /// Zoom pages are rasterized at before recognition.
    pub render_zoom: f32,
    /// Regions scored below this are dropped by the recognizer.
    pub min_confidence: f32,
    /// Regions scored below this are reported as suspicious.
    pub suspicious_threshold: f32,
    /// Pages sampled by the scan classifier.
    pub scan_sample_count: usize,
    /// Tables scored below this are discarded by the detector.
    pub min_table_confidence: f32,
    pub preprocessing: PreprocessingFlags,
    pub preprocess_params: PreprocessParams,
    /// Prune, renumber and compress objects when saving.
    pub compress_output: bool,
    /// Directory holding the recognition model files.
    pub model_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: "en".into(),
            render_zoom: DEFAULT_RENDER_ZOOM,
            min_confidence: 0.5,
            suspicious_threshold: 0.75,
            scan_sample_count: 5,
            min_table_confidence: 0.5,
            preprocessing: PreprocessingFlags::default(),
            preprocess_params: PreprocessParams::default(),
            compress_output: true,
            model_dir: PathBuf::from("models"),
        }
    }
}

impl PipelineConfig {
    /// Read a configuration file. Missing keys take their default values.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(self.render_zoom.is_finite() && self.render_zoom > 0.0) {
            return Err(ScanlayerError::Config(format!(
                "render_zoom must be positive, got {}",
                self.render_zoom
            )));
        }
        if self.scan_sample_count == 0 {
            return Err(ScanlayerError::Config(
                "scan_sample_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
