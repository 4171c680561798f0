use crate::error::DatasetError;
use crate::frames::Frame;

/// Dense `f32` clip tensor in `(t, c, h, w)` layout with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipTensor {
    /// `[t, c, h, w]`
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl ClipTensor {
    pub fn frames(&self) -> usize {
        self.shape[0]
    }

    /// Element strides for `[t, c, h, w]`.
    pub fn strides(&self) -> [usize; 4] {
        let [_, c, h, w] = self.shape;
        [c * h * w, h * w, w, 1]
    }

    pub fn get(&self, t: usize, c: usize, y: usize, x: usize) -> Option<f32> {
        let [st, sc, sh, sw] = self.strides();
        let [nt, nc, nh, nw] = self.shape;
        if t >= nt || c >= nc || y >= nh || x >= nw {
            return None;
        }
        self.data.get(t * st + c * sc + y * sh + x * sw).copied()
    }

    /// Stacks RGB24 frames, which must all share one size, into a tensor.
    pub fn from_frames(frames: &[Frame]) -> Result<Self, DatasetError> {
        let Some(first) = frames.first() else {
            return Ok(Self {
                shape: [0, 3, 0, 0],
                data: Vec::new(),
            });
        };
        let h = usize::try_from(first.height)
            .map_err(|_| DatasetError::Shape("frame height does not fit usize".to_string()))?;
        let w = usize::try_from(first.width)
            .map_err(|_| DatasetError::Shape("frame width does not fit usize".to_string()))?;
        let plane = h * w;
        let mut data = vec![0f32; frames.len() * 3 * plane];

        for (t, frame) in frames.iter().enumerate() {
            if frame.width != first.width || frame.height != first.height {
                return Err(DatasetError::Shape(format!(
                    "frame {t} is {}x{}, expected {}x{}",
                    frame.width, frame.height, first.width, first.height
                )));
            }
            if frame.rgb.len() != plane * 3 {
                return Err(DatasetError::Shape(format!(
                    "frame {t} has {} bytes, expected {}",
                    frame.rgb.len(),
                    plane * 3
                )));
            }
            let base = t * 3 * plane;
            for (i, px) in frame.rgb.chunks_exact(3).enumerate() {
                for (c, &v) in px.iter().enumerate() {
                    data[base + c * plane + i] = f32::from(v) / 255.0;
                }
            }
        }
        Ok(Self {
            shape: [frames.len(), 3, h, w],
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hwc_bytes_become_chw_floats() {
        // 2x1 frame: pixel0 = (255, 0, 51), pixel1 = (0, 255, 102)
        let f0 = Frame::new(2, 1, vec![255, 0, 51, 0, 255, 102]).unwrap();
        let f1 = Frame::new(2, 1, vec![0; 6]).unwrap();
        let t = ClipTensor::from_frames(&[f0, f1]).unwrap();
        assert_eq!(t.shape, [2, 3, 1, 2]);
        assert_eq!(t.get(0, 0, 0, 0), Some(1.0));
        assert_eq!(t.get(0, 0, 0, 1), Some(0.0));
        assert_eq!(t.get(0, 1, 0, 1), Some(1.0));
        assert_eq!(t.get(0, 2, 0, 0), Some(0.2));
        assert_eq!(t.get(1, 1, 0, 1), Some(0.0));
        assert_eq!(t.get(2, 0, 0, 0), None);
    }

    #[test]
    fn mixed_frame_sizes_are_rejected() {
        let a = Frame::new(1, 1, vec![0; 3]).unwrap();
        let b = Frame::new(2, 1, vec![0; 6]).unwrap();
        assert!(matches!(
            ClipTensor::from_frames(&[a, b]),
            Err(DatasetError::Shape(_))
        ));
    }
}
