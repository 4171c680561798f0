use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DatasetError;

/// How many frames a sample spans.
///
/// Deserialized from an integer: `-1` selects the whole clip, a positive value a window of
/// that many frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum ClipLength {
    Full,
    Frames(u64),
}

impl TryFrom<i64> for ClipLength {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(ClipLength::Full),
            n if n > 0 => Ok(ClipLength::Frames(n as u64)),
            n => Err(format!("num_frame must be -1 or > 0, got {n}")),
        }
    }
}

/// Training dataset options, usually one section of a JSON options file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetConfig {
    pub dataroot_gt: PathBuf,
    pub dataroot_lq: PathBuf,
    pub dataroot_meta: PathBuf,
    pub num_frame: ClipLength,
    /// Clips shorter than this are skipped at scan time. Defaults to `num_frame`.
    #[serde(default)]
    pub min_num_frame: Option<u64>,
    #[serde(default = "default_scale")]
    pub scale: u32,
    #[serde(default = "default_size")]
    pub lq_size: u32,
    /// Accepted for options-file compatibility. GT frames are returned at native resolution.
    #[serde(default = "default_size")]
    pub gt_size: u32,
    #[serde(default)]
    pub use_hflip: bool,
    #[serde(default)]
    pub use_rot: bool,
    #[serde(default = "default_video_ext")]
    pub video_ext: String,
    /// Fixes window sampling and augmentation randomness when set.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_scale() -> u32 {
    1
}

fn default_size() -> u32 {
    256
}

fn default_video_ext() -> String {
    "mp4".to_string()
}

impl DatasetConfig {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DatasetError> {
        let cfg: DatasetConfig = serde_json::from_slice(bytes)
            .map_err(|e| DatasetError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_json_slice(&bytes)
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.scale == 0 {
            return Err(DatasetError::InvalidConfig(
                "scale must be > 0".to_string(),
            ));
        }
        if self.lq_size == 0 || self.gt_size == 0 {
            return Err(DatasetError::InvalidConfig(
                "lq_size and gt_size must be > 0".to_string(),
            ));
        }
        if self.video_ext.trim().is_empty() || self.video_ext.contains('/') {
            return Err(DatasetError::InvalidConfig(
                "video_ext must be a non-empty file extension".to_string(),
            ));
        }
        Ok(())
    }

    /// Clips with fewer frames than this are excluded from the dataset.
    pub fn min_frame_count(&self) -> u64 {
        self.min_num_frame.unwrap_or(match self.num_frame {
            ClipLength::Full => 0,
            ClipLength::Frames(n) => n,
        })
    }

    pub fn clip_file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.video_ext.trim_start_matches('.'))
    }
}
