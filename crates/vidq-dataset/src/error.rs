use std::path::PathBuf;

use thiserror::Error;
use vidq_queue::queue::QueueError;

use crate::frames::FrameDecodeError;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid sample range: window of {num_frame} frames exceeds clip frame_count {frame_count}")]
    InvalidSampleRange { frame_count: u64, num_frame: u64 },
    #[error("clip metadata {path}: {detail}")]
    Meta { path: PathBuf, detail: String },
    #[error("index {index} out of range for dataset of {len} clips")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("clip {clip}: expected {expected} frames, got lq={lq} gt={gt}")]
    FrameCountMismatch {
        clip: String,
        expected: u64,
        lq: usize,
        gt: usize,
    },
    #[error("frame shape error: {0}")]
    Shape(String),
    #[error("resize failed: {0}")]
    Resize(String),
    #[error(transparent)]
    Decode(#[from] FrameDecodeError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("prefetch producer thread panicked")]
    ProducerPanicked,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
