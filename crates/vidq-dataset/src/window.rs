use rand::Rng;

use crate::config::ClipLength;
use crate::error::DatasetError;

/// Frames `[start, end)` of a clip selected for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    pub start: u64,
    pub end: u64,
    /// End index written into the sample key. Equals `end` for sampled windows and the last
    /// frame index (`end - 1`) for full clips.
    pub key_end: u64,
}

impl FrameWindow {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `"{clip}--({start:06}-{end:06})"`
    pub fn key(&self, clip_name: &str) -> String {
        format!("{clip_name}--({:06}-{:06})", self.start, self.key_end)
    }
}

/// Picks the frames for one sample of a clip with `frame_count` frames.
///
/// Sampled windows start uniformly in `[0, frame_count - n]` (inclusive).
pub fn select_window<R: Rng + ?Sized>(
    frame_count: u64,
    length: ClipLength,
    rng: &mut R,
) -> Result<FrameWindow, DatasetError> {
    match length {
        ClipLength::Full => {
            if frame_count == 0 {
                return Err(DatasetError::InvalidSampleRange {
                    frame_count,
                    num_frame: 0,
                });
            }
            Ok(FrameWindow {
                start: 0,
                end: frame_count,
                key_end: frame_count - 1,
            })
        }
        ClipLength::Frames(n) => {
            if n > frame_count {
                return Err(DatasetError::InvalidSampleRange {
                    frame_count,
                    num_frame: n,
                });
            }
            let start = rng.gen_range(0..=frame_count - n);
            Ok(FrameWindow {
                start,
                end: start + n,
                key_end: start + n,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn window_of_ten_from_fifty_frames() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen_low = false;
        let mut seen_high = false;
        for _ in 0..5_000 {
            let w = select_window(50, ClipLength::Frames(10), &mut rng).unwrap();
            assert_eq!(w.len(), 10);
            assert!(w.start <= 40);
            seen_low |= w.start == 0;
            seen_high |= w.start == 40;
        }
        assert!(seen_low && seen_high, "both range ends should be reachable");
    }

    #[test]
    fn window_equal_to_clip_starts_at_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = select_window(12, ClipLength::Frames(12), &mut rng).unwrap();
        assert_eq!((w.start, w.end), (0, 12));
    }

    #[test]
    fn window_longer_than_clip_is_invalid() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = select_window(5, ClipLength::Frames(6), &mut rng).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InvalidSampleRange {
                frame_count: 5,
                num_frame: 6
            }
        ));
    }

    #[test]
    fn full_clip_key_uses_last_frame_index() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = select_window(30, ClipLength::Full, &mut rng).unwrap();
        assert_eq!(w.len(), 30);
        assert_eq!(w.key("a.mp4"), "a.mp4--(000000-000029)");
    }

    #[test]
    fn sampled_key_is_zero_padded() {
        let w = FrameWindow {
            start: 7,
            end: 17,
            key_end: 17,
        };
        assert_eq!(w.key("clip.mp4"), "clip.mp4--(000007-000017)");
    }
}
