//! Buffer tuning shared by the pipeline and its consumers.

/// Sizing knobs for the two decode channels.
///
/// Both bound end-to-end latency, not byte volume: the video channel by a
/// frame count, the audio channel by a wall-clock target converted at the
/// stream sample rate.
#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    /// Video channel capacity in decoded frames.
    pub video_buffer_frames: usize,
    /// Audio channel target depth in seconds of samples.
    pub audio_buffer_seconds: f32,
}

impl Default for SyncConfig {
    /// Defaults tuned for smooth playback without noticeable seek latency.
    fn default() -> Self {
        Self {
            video_buffer_frames: 24,
            audio_buffer_seconds: 0.5,
        }
    }
}

/// Compute the audio channel capacity in stereo samples for a
/// `(rate, seconds)` target.
///
/// - If `buffer_seconds` is non-finite or `<= 0.0`, a safe fallback is used.
/// - The result is `ceil(rate_hz * buffer_seconds)`, never zero.
pub fn calc_audio_buffer_samples(rate_hz: u32, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        0.5
    };

    ((rate_hz as f32 * secs).ceil() as usize).max(1)
}
