use serde::{Deserialize, Serialize};

/// Playback state driven by user commands.
///
/// Mutated only through `PlaybackController` commands; every other component
/// observes it read-only.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Frames are presented and audio is drained.
    #[default]
    Playing,
    /// Position is held; the audio callback emits silence without draining.
    Paused,
    /// Rewound to the start; the renderer repeats the first frame.
    Stopped,
}

/// Reason why playback ended.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    /// Natural end of stream/file.
    Eof,
    /// Decoder or stream error interrupted playback.
    Error,
    /// Playback was explicitly stopped by a command.
    Stopped,
}

/// Playback status snapshot exposed to a UI/scrub indicator.
///
/// Assembled on demand from live controller/channel state; nothing here is a
/// stored entity of its own.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerStatus {
    /// Current file/path being played, if available.
    pub now_playing: Option<String>,
    /// Current controller state.
    pub state: PlaybackState,
    /// Fraction of the video played, in [0, 1].
    pub progress: f64,
    /// Video frames presented so far.
    pub frames_played: u64,
    /// Total video frames reported by the demuxer.
    pub total_frames: u64,
    /// Decoded frames currently buffered ahead of the renderer.
    pub buffered_frames: usize,
    /// Decoded samples currently buffered ahead of the audio callback.
    pub buffered_samples: usize,
    /// End reason when playback has transitioned to idle.
    pub end_reason: Option<PlaybackEndReason>,
}
