use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use vidq_observe::metrics::{Counter, DurationAgg, ScopedTimer};

use crate::augment::{AugmentFlags, ClipAugment, NoAugment};
use crate::config::{ClipLength, DatasetConfig};
use crate::error::DatasetError;
use crate::frames::{resize_frames, FfmpegCliSource, FrameSource};
use crate::meta::{scan_meta_dir, ClipMeta};
use crate::tensor::ClipTensor;
use crate::window::{select_window, FrameWindow};

/// One training sample: aligned LQ and GT frame tensors for the same window of a clip.
#[derive(Debug, Clone)]
pub struct PairedClip {
    /// `(t, c, lq_size, lq_size)`
    pub lq: ClipTensor,
    /// `(t, c, h, w)` at the GT source's native resolution.
    pub gt: ClipTensor,
    /// `"{clip}--({start:06}-{end:06})"`
    pub key: String,
    pub clip: String,
    pub window: FrameWindow,
}

#[derive(Debug, Default)]
pub struct DatasetMetrics {
    pub samples_total: Counter,
    pub sample_errors_total: Counter,
    pub read_time: DurationAgg,
}

/// Indexed access to paired LQ/GT clips described by a metadata directory.
///
/// `get` is safe to call from several threads; random state is shared behind a mutex.
pub struct PairedClipDataset {
    cfg: DatasetConfig,
    clips: Vec<ClipMeta>,
    source: Arc<dyn FrameSource>,
    augment: Arc<dyn ClipAugment>,
    rng: Mutex<StdRng>,
    metrics: DatasetMetrics,
}

impl std::fmt::Debug for PairedClipDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairedClipDataset")
            .field("meta_root", &self.cfg.dataroot_meta)
            .field("clips", &self.clips.len())
            .finish()
    }
}

impl PairedClipDataset {
    /// Opens a dataset decoding through ffmpeg, without augmentation.
    pub fn open_default(cfg: DatasetConfig) -> Result<Self, DatasetError> {
        Self::open(cfg, Arc::new(FfmpegCliSource::from_env()), Arc::new(NoAugment))
    }

    pub fn open(
        cfg: DatasetConfig,
        source: Arc<dyn FrameSource>,
        augment: Arc<dyn ClipAugment>,
    ) -> Result<Self, DatasetError> {
        cfg.validate()?;
        if let ClipLength::Frames(n) = cfg.num_frame {
            if cfg.min_frame_count() < n {
                warn!(
                    min_num_frame = cfg.min_frame_count(),
                    num_frame = n,
                    "min_num_frame is below num_frame; short clips will fail with invalid sample range"
                );
            }
        }
        let scan = scan_meta_dir(&cfg)?;
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            clips = scan.clips.len() as u64,
            skipped_short = scan.skipped_short,
            lq_size = cfg.lq_size,
            "opened paired clip dataset"
        );
        Ok(Self {
            cfg,
            clips: scan.clips,
            source,
            augment,
            rng: Mutex::new(rng),
            metrics: DatasetMetrics::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.cfg
    }

    pub fn metrics(&self) -> &DatasetMetrics {
        &self.metrics
    }

    pub fn clips(&self) -> &[ClipMeta] {
        &self.clips
    }

    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.clips.iter().map(|c| c.clip_name.as_str())
    }

    pub fn get(&self, index: usize) -> Result<PairedClip, DatasetError> {
        let result = self.load(index);
        match &result {
            Ok(_) => self.metrics.samples_total.inc(),
            Err(_) => self.metrics.sample_errors_total.inc(),
        }
        result
    }

    fn load(&self, index: usize) -> Result<PairedClip, DatasetError> {
        let clip = self.clips.get(index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.clips.len(),
        })?;

        // Draw everything random up front so the lock is not held while decoding.
        let (window, augment_seed) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let window = select_window(clip.frame_count, self.cfg.num_frame, &mut *rng)?;
            (window, rng.gen::<u64>())
        };

        let lq_path = self.cfg.dataroot_lq.join(&clip.clip_name);
        let gt_path = self.cfg.dataroot_gt.join(&clip.clip_name);
        let (lq_frames, gt_frames) = {
            let _timer = ScopedTimer::new(&self.metrics.read_time);
            let (lq, gt) = rayon::join(
                || {
                    self.source
                        .read_frames(&lq_path, window)
                        .map_err(DatasetError::from)
                        .and_then(|frames| resize_frames(frames, self.cfg.lq_size))
                },
                || self.source.read_frames(&gt_path, window).map_err(DatasetError::from),
            );
            (lq?, gt?)
        };

        let expected = window.len();
        if lq_frames.len() as u64 != expected || gt_frames.len() as u64 != expected {
            return Err(DatasetError::FrameCountMismatch {
                clip: clip.clip_name.clone(),
                expected,
                lq: lq_frames.len(),
                gt: gt_frames.len(),
            });
        }

        let flags = AugmentFlags {
            hflip: self.cfg.use_hflip,
            rot: self.cfg.use_rot,
        };
        let lq_count = lq_frames.len();
        let mut frames = lq_frames;
        frames.extend(gt_frames);
        let mut rng = StdRng::seed_from_u64(augment_seed);
        let mut frames = self.augment.apply(frames, flags, &mut rng);
        if frames.len() != lq_count * 2 {
            return Err(DatasetError::Shape(format!(
                "augmentation returned {} frames, expected {}",
                frames.len(),
                lq_count * 2
            )));
        }
        let gt_frames = frames.split_off(lq_count);

        Ok(PairedClip {
            lq: ClipTensor::from_frames(&frames)?,
            gt: ClipTensor::from_frames(&gt_frames)?,
            key: window.key(&clip.clip_name),
            clip: clip.clip_name.clone(),
            window,
        })
    }
}
