//! Playback state machine.
//!
//! Turns user commands (toggle, stop, seek) into ticks, seeks, and purges
//! against the decode pipeline, and exposes a progress fraction for a scrub
//! indicator. One instance owns the pipeline and is shared by reference with
//! the render loop, the input handler, and the audio pull adapter; there is
//! no process-wide state.

use std::sync::Mutex;
use std::time::Duration;

use player_types::PlaybackState;

use crate::media::Frame;
use crate::pipeline::DecodePipeline;

/// Finite-state playback controller over a running [`DecodePipeline`].
///
/// ## Locking
/// Every mutating command and the pause flag read by the audio callback go
/// through one exclusive mutex, so a state flip can never land mid-callback.
/// The blocking frame pop in [`next_frame`](Self::next_frame) happens
/// *outside* that lock to keep commands responsive while the renderer waits
/// on the decoder.
pub struct PlaybackController {
    pipeline: DecodePipeline,
    total_frames: u64,
    shared: Mutex<ControllerState>,
}

struct ControllerState {
    state: PlaybackState,
    frames_played: u64,
}

impl PlaybackController {
    /// Wrap a freshly started pipeline; playback begins immediately.
    pub fn new(pipeline: DecodePipeline) -> Self {
        let total_frames = pipeline.info().total_frames;
        Self {
            pipeline,
            total_frames,
            shared: Mutex::new(ControllerState {
                state: PlaybackState::Playing,
                frames_played: 0,
            }),
        }
    }

    /// The pipeline this controller drives.
    pub fn pipeline(&self) -> &DecodePipeline {
        &self.pipeline
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.shared.lock().unwrap().state
    }

    /// Whether the audio callback should emit silence.
    ///
    /// Both Paused and Stopped silence audio; only Playing drains samples.
    pub fn is_paused(&self) -> bool {
        self.shared.lock().unwrap().state != PlaybackState::Playing
    }

    /// Flip Playing↔Paused; from Stopped, resume Playing.
    ///
    /// Stop always forces a rewind, so resuming from Stopped starts at
    /// position 0 without an explicit seek.
    pub fn toggle(&self) -> PlaybackState {
        let mut g = self.shared.lock().unwrap();
        g.state = match g.state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused | PlaybackState::Stopped => PlaybackState::Playing,
        };
        tracing::info!(state = ?g.state, "playback toggled");
        g.state
    }

    /// Stop playback: land in Stopped and rewind to the start.
    ///
    /// The renderer is expected to keep repeating the first displayed frame
    /// until the next `toggle()`.
    pub fn stop(&self) {
        let mut g = self.shared.lock().unwrap();
        g.state = PlaybackState::Stopped;
        g.frames_played = 0;
        self.pipeline.seek(Duration::ZERO);
        tracing::info!("playback stopped");
    }

    /// Jump to `fraction` of the stream, valid in any state.
    ///
    /// Runs the pipeline seek contract (publish target, purge, reposition)
    /// and sets `frames_played = ceil(total_frames × fraction)` so progress
    /// reflects the jump immediately, without waiting for decode catch-up.
    pub fn seek(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let target = self
            .pipeline
            .info()
            .duration()
            .mul_f64(fraction);

        let mut g = self.shared.lock().unwrap();
        self.pipeline.seek(target);
        g.frames_played = ((self.total_frames as f64 * fraction).ceil() as u64)
            .min(self.total_frames);
        tracing::info!(fraction, target_ms = target.as_millis() as u64, "seek");
    }

    /// Video frames presented so far.
    pub fn frames_played(&self) -> u64 {
        self.shared.lock().unwrap().frames_played
    }

    /// Fraction of the video played, clamped to [0, 1].
    ///
    /// Monotonically non-decreasing while Playing, except for the reset on
    /// Stop/Seek(0) and the discontinuous jump on any other seek. Returns 0
    /// when the demuxer reported no frame count.
    pub fn progress(&self) -> f64 {
        let g = self.shared.lock().unwrap();
        if self.total_frames == 0 {
            return 0.0;
        }
        (g.frames_played as f64 / self.total_frames as f64).clamp(0.0, 1.0)
    }

    /// Pull the next frame for the renderer.
    ///
    /// While Playing, blocks until a decoded frame is available (or EOF) and
    /// counts it as played. In any other state returns `None` without
    /// consuming, so the renderer repeats whatever it last presented.
    pub fn next_frame(&self) -> Option<Frame> {
        if self.shared.lock().unwrap().state != PlaybackState::Playing {
            return None;
        }

        // Popping outside the lock keeps commands (and the audio callback's
        // pause check) responsive while the decoder catches up.
        let frame = self.pipeline.video().pop()?;
        self.shared.lock().unwrap().frames_played += 1;
        Some(frame)
    }
}
