//! Paced presentation loop.
//!
//! Pulls frames from the controller at the media frame rate and holds the
//! last presented frame across pauses. There is no real display surface;
//! "presenting" means keeping the current frame and logging playback state
//! once per second.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{select, tick};

use player_core::controller::PlaybackController;
use player_core::media::Frame;
use player_core::status::StatusReporter;
use player_types::{PlaybackEndReason, PlaybackState};

/// Run the present loop until `shutdown` is set.
///
/// Returns the last presented frame, if any.
pub fn run(
    controller: &Arc<PlaybackController>,
    reporter: &Arc<StatusReporter>,
    shutdown: &Arc<AtomicBool>,
) -> Option<Frame> {
    let info = controller.pipeline().info();
    let frame_tick = tick(info.frame_interval());
    let status_tick = tick(std::time::Duration::from_secs(1));

    let mut first: Option<Frame> = None;
    let mut last: Option<Frame> = None;
    let mut ended = false;

    while !shutdown.load(Ordering::Relaxed) {
        select! {
            recv(frame_tick) -> _ => {
                match controller.state() {
                    PlaybackState::Playing => {
                        if let Some(frame) = controller.next_frame() {
                            if first.is_none() {
                                first = Some(frame.clone());
                            }
                            last = Some(frame);
                        } else if controller.pipeline().video().is_closed()
                            && controller.pipeline().video().is_empty()
                            && !ended
                        {
                            ended = true;
                            reporter.mark_ended(PlaybackEndReason::Eof);
                            tracing::info!("end of stream");
                        }
                    }
                    // Stop rewinds the display to the opening frame.
                    PlaybackState::Stopped => {
                        if let Some(frame) = &first {
                            last = Some(frame.clone());
                        }
                    }
                    // Pause holds the current frame.
                    PlaybackState::Paused => {}
                }
            }
            recv(status_tick) -> _ => {
                let status = reporter.snapshot();
                tracing::info!(
                    state = ?status.state,
                    progress = format!("{:.1}%", status.progress * 100.0),
                    frames_played = status.frames_played,
                    buffered_frames = status.buffered_frames,
                    buffered_samples = status.buffered_samples,
                    "playback"
                );
            }
        }
    }

    last
}
