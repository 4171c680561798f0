use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use fast_image_resize::images::Image as FirImage;
use fast_image_resize::{
    FilterType as FirFilterType, PixelType as FirPixelType, ResizeAlg as FirResizeAlg,
    ResizeOptions as FirResizeOptions, Resizer as FirResizer,
};
use rayon::prelude::*;
use thiserror::Error;

use crate::error::DatasetError;
use crate::window::FrameWindow;

/// One decoded RGB24 frame, row-major, 3 bytes per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgb.len())
            .finish()
    }
}

impl Frame {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, DatasetError> {
        let expected = rgb_len(width, height)
            .ok_or_else(|| DatasetError::Shape(format!("frame {width}x{height} overflows")))?;
        if rgb.len() != expected {
            return Err(DatasetError::Shape(format!(
                "rgb length {} does not match {width}x{height}x3",
                rgb.len()
            )));
        }
        Ok(Self { width, height, rgb })
    }
}

fn rgb_len(width: u32, height: u32) -> Option<usize> {
    let w = usize::try_from(width).ok()?;
    let h = usize::try_from(height).ok()?;
    w.checked_mul(h)?.checked_mul(3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailureClass {
    IoReadFailed,
    CorruptMedia,
    ShortMedia,
    UnsupportedCodec,
    MissingStream,
    BackendUnavailable,
    DecodeFailed,
}

impl DecodeFailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DecodeFailureClass::IoReadFailed => "io_read_failed",
            DecodeFailureClass::CorruptMedia => "corrupt_media",
            DecodeFailureClass::ShortMedia => "short_media",
            DecodeFailureClass::UnsupportedCodec => "unsupported_codec",
            DecodeFailureClass::MissingStream => "missing_stream",
            DecodeFailureClass::BackendUnavailable => "decode_backend_unavailable",
            DecodeFailureClass::DecodeFailed => "decode_failed",
        }
    }

    /// Maps ffmpeg/ffprobe stderr to a failure class.
    pub fn from_ffmpeg_stderr(stderr: &str) -> Self {
        let lower = stderr.to_ascii_lowercase();
        if lower.contains("no such file or directory") {
            return DecodeFailureClass::IoReadFailed;
        }
        if lower.contains("invalid data found when processing input")
            || lower.contains("moov atom not found")
            || lower.contains("error reading header")
        {
            return DecodeFailureClass::CorruptMedia;
        }
        if lower.contains("matches no streams")
            || lower.contains("stream specifier")
            || lower.contains("output file #0 does not contain any stream")
        {
            return DecodeFailureClass::MissingStream;
        }
        if lower.contains("unsupported codec")
            || lower.contains("unknown codec")
            || lower.contains("decoder")
        {
            return DecodeFailureClass::UnsupportedCodec;
        }
        if lower.contains("end of file") {
            return DecodeFailureClass::ShortMedia;
        }
        DecodeFailureClass::DecodeFailed
    }
}

impl fmt::Display for DecodeFailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{class} decoding {}: {detail}", .path.display())]
pub struct FrameDecodeError {
    pub class: DecodeFailureClass,
    pub path: PathBuf,
    pub detail: String,
}

impl FrameDecodeError {
    pub fn new(path: &Path, class: DecodeFailureClass, detail: impl Into<String>) -> Self {
        Self {
            class,
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }
}

/// Reads the frames of a video file that fall inside a window.
pub trait FrameSource: Send + Sync + 'static {
    fn read_frames(&self, path: &Path, window: FrameWindow)
        -> Result<Vec<Frame>, FrameDecodeError>;
}

/// Decodes through the `ffmpeg`/`ffprobe` command line tools.
///
/// Binaries are taken from `VIDQ_FFMPEG_BIN` / `VIDQ_FFPROBE_BIN`, defaulting to the names
/// on `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegCliSource {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl Default for FfmpegCliSource {
    fn default() -> Self {
        Self::from_env()
    }
}

impl FfmpegCliSource {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("VIDQ_FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()),
            std::env::var("VIDQ_FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string()),
        )
    }

    fn run(&self, bin: &str, cmd: &mut Command, path: &Path) -> Result<Vec<u8>, FrameDecodeError> {
        let output = cmd.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FrameDecodeError::new(
                path,
                DecodeFailureClass::BackendUnavailable,
                format!("binary not found: {bin}"),
            ),
            _ => FrameDecodeError::new(path, DecodeFailureClass::IoReadFailed, e.to_string()),
        })?;
        if !output.status.success() {
            let stderr_text = String::from_utf8_lossy(&output.stderr);
            let class = DecodeFailureClass::from_ffmpeg_stderr(&stderr_text);
            let detail = stderr_text
                .lines()
                .find(|line| !line.trim().is_empty())
                .map(str::trim)
                .unwrap_or("ffmpeg decode failed");
            return Err(FrameDecodeError::new(path, class, detail));
        }
        Ok(output.stdout)
    }

    fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), FrameDecodeError> {
        let mut cmd = Command::new(&self.ffprobe_bin);
        cmd.arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-show_entries")
            .arg("stream=width,height")
            .arg("-of")
            .arg("csv=p=0:s=x")
            .arg(path);
        let stdout = self.run(&self.ffprobe_bin, &mut cmd, path)?;
        let text = String::from_utf8_lossy(&stdout);
        let line = text.lines().find(|l| !l.trim().is_empty()).ok_or_else(|| {
            FrameDecodeError::new(path, DecodeFailureClass::MissingStream, "no video stream")
        })?;
        let parsed = line
            .trim()
            .split_once('x')
            .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)));
        match parsed {
            Some((w, h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(FrameDecodeError::new(
                path,
                DecodeFailureClass::DecodeFailed,
                format!("unexpected ffprobe dimensions {line:?}"),
            )),
        }
    }
}

impl FrameSource for FfmpegCliSource {
    fn read_frames(
        &self,
        path: &Path,
        window: FrameWindow,
    ) -> Result<Vec<Frame>, FrameDecodeError> {
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let (width, height) = self.probe_dimensions(path)?;
        let frame_bytes = rgb_len(width, height).ok_or_else(|| {
            FrameDecodeError::new(path, DecodeFailureClass::DecodeFailed, "frame size overflow")
        })?;
        let frame_count = usize::try_from(window.len()).map_err(|_| {
            FrameDecodeError::new(path, DecodeFailureClass::DecodeFailed, "window too long")
        })?;
        let expected = frame_bytes.checked_mul(frame_count).ok_or_else(|| {
            FrameDecodeError::new(path, DecodeFailureClass::DecodeFailed, "clip size overflow")
        })?;

        let select = format!(
            "select=between(n\\,{}\\,{})",
            window.start,
            window.end - 1
        );
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostdin")
            .arg("-i")
            .arg(path)
            .arg("-an")
            .arg("-sn")
            .arg("-dn")
            .arg("-vf")
            .arg(select)
            .arg("-vsync")
            .arg("0")
            .arg("-frames:v")
            .arg(frame_count.to_string())
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("pipe:1");
        let mut decoded = self.run(&self.ffmpeg_bin, &mut cmd, path)?;

        if decoded.len() < expected {
            return Err(FrameDecodeError::new(
                path,
                DecodeFailureClass::ShortMedia,
                format!("decoded bytes {} below expected {expected}", decoded.len()),
            ));
        }
        decoded.truncate(expected);
        Ok(decoded
            .chunks_exact(frame_bytes)
            .map(|chunk| Frame {
                width,
                height,
                rgb: chunk.to_vec(),
            })
            .collect())
    }
}

/// Resizes every frame to `side`x`side` with bilinear convolution. Frames already at that
/// size pass through untouched.
pub fn resize_frames(frames: Vec<Frame>, side: u32) -> Result<Vec<Frame>, DatasetError> {
    frames
        .into_par_iter()
        .map(|frame| resize_frame(frame, side))
        .collect()
}

fn resize_frame(frame: Frame, side: u32) -> Result<Frame, DatasetError> {
    if frame.width == side && frame.height == side {
        return Ok(frame);
    }
    let src_image = FirImage::from_vec_u8(frame.width, frame.height, frame.rgb, FirPixelType::U8x3)
        .map_err(|e| DatasetError::Resize(format!("source init failed: {e}")))?;
    let mut dst_image = FirImage::new(side, side, FirPixelType::U8x3);
    let mut resizer = FirResizer::new();
    let resize_options =
        FirResizeOptions::new().resize_alg(FirResizeAlg::Convolution(FirFilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, &resize_options)
        .map_err(|e| DatasetError::Resize(e.to_string()))?;
    Ok(Frame {
        width: side,
        height: side,
        rgb: dst_image.into_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_ffmpeg_failures() {
        assert_eq!(
            DecodeFailureClass::from_ffmpeg_stderr("x.mp4: No such file or directory"),
            DecodeFailureClass::IoReadFailed
        );
        assert_eq!(
            DecodeFailureClass::from_ffmpeg_stderr("moov atom not found"),
            DecodeFailureClass::CorruptMedia
        );
        assert_eq!(
            DecodeFailureClass::from_ffmpeg_stderr("Stream specifier 'v' matches no streams"),
            DecodeFailureClass::MissingStream
        );
        assert_eq!(
            DecodeFailureClass::from_ffmpeg_stderr("something else"),
            DecodeFailureClass::DecodeFailed
        );
    }

    #[test]
    fn missing_binary_is_backend_unavailable() {
        let source = FfmpegCliSource::new(
            "/nonexistent/vidq-ffmpeg",
            "/nonexistent/vidq-ffprobe",
        );
        let window = FrameWindow {
            start: 0,
            end: 2,
            key_end: 2,
        };
        let err = source
            .read_frames(Path::new("/tmp/none.mp4"), window)
            .unwrap_err();
        assert_eq!(err.class, DecodeFailureClass::BackendUnavailable);
    }

    #[test]
    fn frame_new_checks_buffer_length() {
        assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            Frame::new(2, 2, vec![0; 11]),
            Err(DatasetError::Shape(_))
        ));
    }

    #[test]
    fn resize_changes_dimensions() {
        let frames = vec![Frame::new(8, 4, vec![200; 8 * 4 * 3]).unwrap(); 3];
        let out = resize_frames(frames, 6).unwrap();
        assert_eq!(out.len(), 3);
        for f in &out {
            assert_eq!((f.width, f.height), (6, 6));
            assert_eq!(f.rgb.len(), 6 * 6 * 3);
            // Uniform input stays uniform.
            assert!(f.rgb.iter().all(|&v| v.abs_diff(200) <= 1));
        }
    }

    #[test]
    fn resize_is_skipped_at_target_size() {
        let frame = Frame::new(4, 4, (0..48).collect()).unwrap();
        let out = resize_frames(vec![frame.clone()], 4).unwrap();
        assert_eq!(out[0], frame);
    }
}
