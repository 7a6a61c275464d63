//! Status snapshot assembly for UI consumers.

use std::sync::{Arc, Mutex};

use player_types::{PlaybackEndReason, PlayerStatus};

use crate::controller::PlaybackController;

/// Builds [`PlayerStatus`] snapshots from live controller state.
///
/// Progress is a derived value, recomputed on every snapshot; nothing here
/// caches playback position.
pub struct StatusReporter {
    controller: Arc<PlaybackController>,
    now_playing: Option<String>,
    end_reason: Mutex<Option<PlaybackEndReason>>,
}

impl StatusReporter {
    pub fn new(controller: Arc<PlaybackController>, now_playing: Option<String>) -> Self {
        Self {
            controller,
            now_playing,
            end_reason: Mutex::new(None),
        }
    }

    /// Record why playback ended. The first reason recorded wins.
    pub fn mark_ended(&self, reason: PlaybackEndReason) {
        let mut g = self.end_reason.lock().unwrap();
        if g.is_none() {
            *g = Some(reason);
        }
    }

    /// Assemble a snapshot suitable for a scrub indicator or status line.
    pub fn snapshot(&self) -> PlayerStatus {
        let pipeline = self.controller.pipeline();
        PlayerStatus {
            now_playing: self.now_playing.clone(),
            state: self.controller.state(),
            progress: self.controller.progress(),
            frames_played: self.controller.frames_played(),
            total_frames: pipeline.info().total_frames,
            buffered_frames: pipeline.video().len(),
            buffered_samples: pipeline.audio().len(),
            end_reason: *self.end_reason.lock().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use player_types::PlaybackState;

    use crate::config::SyncConfig;
    use crate::media::{Frame, MediaError, MediaInfo, MediaSource, MediaUnit};
    use crate::pipeline::DecodePipeline;

    struct EndlessFrames;

    impl MediaSource for EndlessFrames {
        fn info(&self) -> MediaInfo {
            MediaInfo {
                width: 2,
                height: 2,
                frame_rate: 25.0,
                total_frames: 200,
                sample_rate: 16,
            }
        }

        fn next_unit(&mut self) -> Result<Option<MediaUnit>, MediaError> {
            Ok(Some(MediaUnit::Video(
                Frame::new(2, 2, vec![0u8; 16]).unwrap(),
            )))
        }

        fn seek(&mut self, _target: Duration) -> Result<(), MediaError> {
            Ok(())
        }
    }

    fn reporter() -> (StatusReporter, Arc<PlaybackController>) {
        let pipeline = DecodePipeline::start(Box::new(EndlessFrames), &SyncConfig::default());
        let controller = Arc::new(PlaybackController::new(pipeline));
        (
            StatusReporter::new(controller.clone(), Some("clip.mp4".into())),
            controller,
        )
    }

    #[test]
    fn snapshot_tracks_controller_state() {
        let (reporter, ctl) = reporter();
        ctl.seek(0.5);
        ctl.toggle();

        let snap = reporter.snapshot();
        assert_eq!(snap.now_playing.as_deref(), Some("clip.mp4"));
        assert_eq!(snap.state, PlaybackState::Paused);
        assert_eq!(snap.progress, 0.5);
        assert_eq!(snap.frames_played, 100);
        assert_eq!(snap.total_frames, 200);
        assert!(snap.end_reason.is_none());
    }

    #[test]
    fn first_end_reason_wins() {
        let (reporter, _ctl) = reporter();
        reporter.mark_ended(PlaybackEndReason::Eof);
        reporter.mark_ended(PlaybackEndReason::Stopped);
        assert_eq!(reporter.snapshot().end_reason, Some(PlaybackEndReason::Eof));
    }
}
