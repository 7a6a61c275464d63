//! Media source abstraction and decoded media types.
//!
//! The demuxer/decoder itself is a collaborator: the engine only needs a
//! stream of decoded units and a seekable cursor, so everything codec-shaped
//! hides behind [`MediaSource`]. The binary provides a Symphonia-backed
//! implementation; tests use scripted sources.

use std::time::Duration;

/// One decoded video image ready for display.
///
/// Self-contained copy of the pixel data (RGBA8, row-major). The pipeline
/// never touches the buffer again after handoff; the renderer consumes it
/// exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixels, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Build a frame, validating the pixel buffer length.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }
}

/// One stereo amplitude pair at the configured audio rate.
pub type Sample = [f32; 2];

/// Stream parameters reported by the demuxer when a source is opened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaInfo {
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Video frame rate in frames per second.
    pub frame_rate: f64,
    /// Total video frames in the stream (0 when unknown).
    pub total_frames: u64,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
}

impl MediaInfo {
    /// Total stream duration derived from frame count and rate.
    ///
    /// Returns zero when either is unknown.
    pub fn duration(&self) -> Duration {
        if self.frame_rate <= 0.0 || self.total_frames == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_frames as f64 / self.frame_rate)
    }

    /// Interval between successive video frames.
    ///
    /// Falls back to ~30 fps when the demuxer reported no usable rate, so a
    /// render loop always has a sane tick.
    pub fn frame_interval(&self) -> Duration {
        if self.frame_rate > 0.0 {
            Duration::from_secs_f64(1.0 / self.frame_rate)
        } else {
            Duration::from_secs_f64(1.0 / 30.0)
        }
    }
}

/// Output of decoding one packet.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaUnit {
    /// A decoded video frame.
    Video(Frame),
    /// A run of decoded stereo samples, in playback order.
    Audio(Vec<Sample>),
}

/// Errors surfaced by a media source.
///
/// The pipeline treats the two variants very differently: `Decode` is
/// skipped (best effort, one bad packet must not kill playback) while
/// `Stream` terminates the producer loop.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// A single packet failed to decode; playback continues.
    #[error("decode error: {0}")]
    Decode(String),
    /// Reading the next packet failed; the stream is unusable.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Demuxer/decoder collaborator consumed by the decode pipeline.
///
/// Implementations own the underlying streams; dropping the source closes
/// them and releases the media resource.
pub trait MediaSource: Send {
    /// Stream parameters captured when the source was opened.
    fn info(&self) -> MediaInfo;

    /// Decode the next media unit.
    ///
    /// `Ok(None)` signals end of stream. `Err(MediaError::Decode(_))` marks
    /// a skippable bad packet; `Err(MediaError::Stream(_))` is fatal.
    fn next_unit(&mut self) -> Result<Option<MediaUnit>, MediaError>;

    /// Reposition the stream cursor to `target` from the start.
    fn seek(&mut self, target: Duration) -> Result<(), MediaError>;
}
