//! Pull adapter between the audio channel and the audio sink callback.
//!
//! The sink (a CPAL output stream, or anything with the same pull contract)
//! asks for fixed-size batches at the hardware buffer cadence; this adapter
//! drains the audio channel to satisfy each request, emits silence while
//! paused, and turns channel EOF into a short read instead of a stall.

use std::sync::Arc;

use crate::channel::BoundedChannel;
use crate::controller::PlaybackController;
use crate::media::Sample;

/// Silence, used for paused output and unfilled tails.
const SILENCE: Sample = [0.0, 0.0];

/// Drains the audio [`BoundedChannel`] into caller-provided sample batches.
pub struct AudioSampleSource {
    audio: Arc<BoundedChannel<Sample>>,
    controller: Arc<PlaybackController>,
    ended: bool,
}

impl AudioSampleSource {
    /// Build the adapter for `controller`'s audio channel.
    pub fn new(controller: Arc<PlaybackController>) -> Self {
        let audio = controller.pipeline().audio().clone();
        Self {
            audio,
            controller,
            ended: false,
        }
    }

    /// Whether the audio stream has ended.
    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Fill `out` with the next samples, in channel order.
    ///
    /// Returns `(filled, more)`:
    /// - While paused or stopped: `out` is zeroed and `(out.len(), true)` is
    ///   returned; nothing is drained while paused.
    /// - On the first EOF encountered mid-fill: the count filled so far and
    ///   `false` ("stream ended"). Every later call returns `(0, false)`
    ///   immediately; an exhausted stream never stalls the callback.
    pub fn fill(&mut self, out: &mut [Sample]) -> (usize, bool) {
        if self.ended {
            return (0, false);
        }

        if self.controller.is_paused() {
            out.fill(SILENCE);
            return (out.len(), true);
        }

        for (i, slot) in out.iter_mut().enumerate() {
            match self.audio.pop() {
                Some(sample) => *slot = sample,
                None => {
                    self.ended = true;
                    tracing::debug!(filled = i, "audio stream ended mid-fill");
                    return (i, false);
                }
            }
        }
        (out.len(), true)
    }
}
