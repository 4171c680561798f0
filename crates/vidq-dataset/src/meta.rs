use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::DatasetConfig;
use crate::error::DatasetError;

/// Per-clip metadata sidecar. Only `frame_count` is read; other keys are ignored.
#[derive(Debug, Deserialize)]
struct MetaFile {
    frame_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipMeta {
    /// Video file name shared by the LQ and GT roots, e.g. `clip_0001.mp4`.
    pub clip_name: String,
    pub frame_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaScan {
    pub clips: Vec<ClipMeta>,
    pub skipped_short: u64,
}

/// Reads every metadata file under `cfg.dataroot_meta` in file-name order.
///
/// Hidden files are ignored. Clips with fewer than `cfg.min_frame_count()` frames are
/// skipped; an unreadable or malformed metadata file fails the scan.
pub fn scan_meta_dir(cfg: &DatasetConfig) -> Result<MetaScan, DatasetError> {
    let min_frames = cfg.min_frame_count();
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&cfg.dataroot_meta)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let hidden = entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false);
        if !hidden {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut clips = Vec::with_capacity(paths.len());
    let mut skipped_short = 0u64;
    for path in &paths {
        let meta = read_meta_file(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DatasetError::Meta {
                path: path.clone(),
                detail: "file name is not valid utf-8".to_string(),
            })?;
        let clip_name = cfg.clip_file_name(stem);
        if meta.frame_count < min_frames {
            warn!(
                clip = %clip_name,
                frame_count = meta.frame_count,
                min_frames,
                "skipping short clip"
            );
            skipped_short += 1;
            continue;
        }
        clips.push(ClipMeta {
            clip_name,
            frame_count: meta.frame_count,
        });
    }

    info!(
        meta_root = %cfg.dataroot_meta.display(),
        clips = clips.len() as u64,
        skipped_short,
        "scanned clip metadata"
    );
    Ok(MetaScan {
        clips,
        skipped_short,
    })
}

fn read_meta_file(path: &Path) -> Result<MetaFile, DatasetError> {
    let bytes = std::fs::read(path).map_err(|e| DatasetError::Meta {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| DatasetError::Meta {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
