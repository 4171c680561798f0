use rand::RngCore;

use crate::frames::Frame;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AugmentFlags {
    pub hflip: bool,
    pub rot: bool,
}

/// Geometric augmentation applied to a sample.
///
/// `frames` holds the LQ frames followed by the GT frames (equal counts). Implementations
/// must apply one random decision to the whole list so both quality levels stay aligned,
/// and must return the frames in the same order.
pub trait ClipAugment: Send + Sync + 'static {
    fn apply(&self, frames: Vec<Frame>, flags: AugmentFlags, rng: &mut dyn RngCore)
        -> Vec<Frame>;
}

/// Returns frames unchanged. Used when no augmentation backend is plugged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAugment;

impl ClipAugment for NoAugment {
    fn apply(
        &self,
        frames: Vec<Frame>,
        _flags: AugmentFlags,
        _rng: &mut dyn RngCore,
    ) -> Vec<Frame> {
        frames
    }
}
