#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use vidq_dataset::config::{ClipLength, DatasetConfig};
use vidq_dataset::frames::{DecodeFailureClass, Frame, FrameDecodeError, FrameSource};
use vidq_dataset::window::FrameWindow;

/// Scratch directory removed when the returned guard drops.
pub fn temp_dir(test_name: &str) -> Result<TempDir> {
    Ok(tempfile::Builder::new()
        .prefix(&format!("vidq-dataset-{test_name}-"))
        .tempdir()?)
}

/// Lays out `meta/`, `lq/`, `gt/` under `root` and writes one metadata file per clip.
pub fn write_meta(root: &Path, clips: &[(&str, u64)]) -> Result<()> {
    let meta = root.join("meta");
    std::fs::create_dir_all(&meta)?;
    std::fs::create_dir_all(root.join("lq"))?;
    std::fs::create_dir_all(root.join("gt"))?;
    for (stem, frames) in clips {
        std::fs::write(
            meta.join(format!("{stem}.json")),
            format!(r#"{{"frame_count": {frames}, "fps": 25.0}}"#),
        )?;
    }
    Ok(())
}

pub fn config(root: &Path, num_frame: ClipLength, min_num_frame: Option<u64>) -> DatasetConfig {
    DatasetConfig {
        dataroot_gt: root.join("gt"),
        dataroot_lq: root.join("lq"),
        dataroot_meta: root.join("meta"),
        num_frame,
        min_num_frame,
        scale: 1,
        lq_size: 4,
        gt_size: 8,
        use_hflip: false,
        use_rot: false,
        video_ext: "mp4".to_string(),
        seed: Some(42),
    }
}

/// Generates frames without touching the file system. Every pixel of frame `n` is
/// `n % 256`; GT frames are `width`x`height`, LQ frames half that.
pub struct SyntheticSource {
    pub width: u32,
    pub height: u32,
    pub delay: Duration,
    pub reads: AtomicU64,
    pub fail_on: Option<&'static str>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            delay: Duration::ZERO,
            reads: AtomicU64::new(0),
            fail_on: None,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn read_frames(
        &self,
        path: &Path,
        window: FrameWindow,
    ) -> Result<Vec<Frame>, FrameDecodeError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(marker) = self.fail_on {
            if name.contains(marker) {
                return Err(FrameDecodeError::new(
                    path,
                    DecodeFailureClass::CorruptMedia,
                    "synthetic failure",
                ));
            }
        }
        let is_lq = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n == "lq")
            .unwrap_or(false);
        let (w, h) = if is_lq {
            (self.width / 2, self.height / 2)
        } else {
            (self.width, self.height)
        };
        Ok((window.start..window.end)
            .map(|n| Frame {
                width: w,
                height: h,
                rgb: vec![(n % 256) as u8; (w * h * 3) as usize],
            })
            .collect())
    }
}
