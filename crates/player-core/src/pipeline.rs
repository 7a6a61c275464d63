//! Background decode stage.
//!
//! Spawns exactly one producer thread per open media source. The thread
//! pulls decoded units from the [`MediaSource`] collaborator and fans them
//! out onto two bounded channels (video frames, audio samples) that provide
//! backpressure against the decoder. Decode errors go out on a dedicated
//! side channel so one bad packet never kills playback.
//!
//! ## Seek contract
//! `seek()` publishes the reposition target, then purges both channels; the
//! producer notices the pending target before every push and applies it at
//! the top of its loop. Publish and purge are not atomic with an in-flight
//! push: at most one stale unit can land after the purge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::channel::BoundedChannel;
use crate::config::{SyncConfig, calc_audio_buffer_samples};
use crate::media::{Frame, MediaError, MediaInfo, MediaSource, MediaUnit, Sample};

/// Handle to the producer thread and its output channels.
///
/// Dropping the pipeline requests cancellation and joins the producer.
pub struct DecodePipeline {
    video: Arc<BoundedChannel<Frame>>,
    audio: Arc<BoundedChannel<Sample>>,
    info: MediaInfo,
    pending_seek: Arc<Mutex<Option<Duration>>>,
    errors: Receiver<MediaError>,
    cancel: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl DecodePipeline {
    /// Open the decode stage over `source` and launch the producer thread.
    ///
    /// Channel capacities come from `cfg`: a frame count for video, a
    /// seconds target converted at the stream sample rate for audio.
    pub fn start(source: Box<dyn MediaSource>, cfg: &SyncConfig) -> Self {
        let info = source.info();
        let video = Arc::new(BoundedChannel::new(cfg.video_buffer_frames.max(1)));
        let audio = Arc::new(BoundedChannel::new(calc_audio_buffer_samples(
            info.sample_rate,
            cfg.audio_buffer_seconds,
        )));

        let (err_tx, err_rx) = crossbeam_channel::unbounded();
        let pending_seek = Arc::new(Mutex::new(None));
        let cancel = Arc::new(AtomicBool::new(false));

        let video_thread = video.clone();
        let audio_thread = audio.clone();
        let pending_thread = pending_seek.clone();
        let cancel_thread = cancel.clone();
        let handle = thread::spawn(move || {
            producer_loop(
                source,
                &video_thread,
                &audio_thread,
                &err_tx,
                &pending_thread,
                &cancel_thread,
            );
        });

        tracing::debug!(
            video_capacity = video.capacity(),
            audio_capacity = audio.capacity(),
            "decode pipeline started"
        );

        Self {
            video,
            audio,
            info,
            pending_seek,
            errors: err_rx,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stream parameters captured when the source was opened.
    pub fn info(&self) -> MediaInfo {
        self.info
    }

    /// Channel carrying decoded video frames, read by the renderer.
    pub fn video(&self) -> &Arc<BoundedChannel<Frame>> {
        &self.video
    }

    /// Channel carrying decoded audio samples, read by the audio adapter.
    pub fn audio(&self) -> &Arc<BoundedChannel<Sample>> {
        &self.audio
    }

    /// Receiver for decode-level errors forwarded by the producer.
    ///
    /// Disconnects once the producer has terminated.
    pub fn errors(&self) -> Receiver<MediaError> {
        self.errors.clone()
    }

    /// Discard buffered media and reposition the stream cursor to `target`.
    ///
    /// The target is published before the purge so the producer stops
    /// feeding stale media as soon as it looks; only the one push already in
    /// flight can land after the purge. A later seek overwrites an unapplied
    /// earlier one. After the producer has terminated (EOF or stream error)
    /// this degrades to a purge of whatever remains.
    pub fn seek(&self, target: Duration) {
        *self.pending_seek.lock().unwrap() = Some(target);
        self.video.purge();
        self.audio.purge();
        tracing::debug!(target_ms = target.as_millis() as u64, "seek requested");
    }

    /// Request cancellation and join the producer thread.
    ///
    /// Closing both channels is what actually unblocks a producer stuck in
    /// `push`; the flag alone only covers the decode path. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.video.close();
        self.audio.close();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DecodePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Producer body: decode units until EOF, stream failure, or cancellation,
/// then tear down exactly once and in order.
fn producer_loop(
    mut source: Box<dyn MediaSource>,
    video: &BoundedChannel<Frame>,
    audio: &BoundedChannel<Sample>,
    err_tx: &Sender<MediaError>,
    pending_seek: &Mutex<Option<Duration>>,
    cancel: &AtomicBool,
) {
    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        // Apply a pending reposition, if any.
        if let Some(target) = pending_seek.lock().unwrap().take() {
            if let Err(e) = source.seek(target) {
                let _ = err_tx.send(e);
            }
        }

        match source.next_unit() {
            Ok(Some(MediaUnit::Video(frame))) => video.push(frame),
            Ok(Some(MediaUnit::Audio(batch))) => {
                for sample in batch {
                    // A pending seek invalidates the rest of this batch;
                    // abandoning it keeps the stale-item window at one.
                    if pending_seek.lock().unwrap().is_some() {
                        break;
                    }
                    audio.push(sample);
                }
            }
            Ok(None) => {
                tracing::debug!("media stream exhausted");
                break;
            }
            Err(e @ MediaError::Decode(_)) => {
                let _ = err_tx.send(e);
            }
            Err(e) => {
                let _ = err_tx.send(e);
                break;
            }
        }
    }

    // Teardown order matters: consumers learn about EOF from the channel
    // close, the media resource is released by dropping the source, and the
    // error channel disconnects when this closure drops `err_tx`.
    video.close();
    audio.close();
    drop(source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn test_info() -> MediaInfo {
        MediaInfo {
            width: 2,
            height: 2,
            frame_rate: 25.0,
            total_frames: 100,
            sample_rate: 16,
        }
    }

    fn test_frame(fill: u8) -> Frame {
        Frame::new(2, 2, vec![fill; 16]).unwrap()
    }

    /// Plays back a fixed script of decode results, then reports EOF.
    struct ScriptedSource {
        script: VecDeque<Result<Option<MediaUnit>, MediaError>>,
    }

    impl MediaSource for ScriptedSource {
        fn info(&self) -> MediaInfo {
            test_info()
        }

        fn next_unit(&mut self) -> Result<Option<MediaUnit>, MediaError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }

        fn seek(&mut self, _target: Duration) -> Result<(), MediaError> {
            Ok(())
        }
    }

    /// Endless source whose sample value flips after a seek, and which
    /// records every reposition it was asked for.
    struct SeekableSource {
        value: f32,
        seeks: Arc<Mutex<Vec<Duration>>>,
    }

    impl MediaSource for SeekableSource {
        fn info(&self) -> MediaInfo {
            test_info()
        }

        fn next_unit(&mut self) -> Result<Option<MediaUnit>, MediaError> {
            let v = self.value;
            Ok(Some(MediaUnit::Audio(vec![[v, v]; 4])))
        }

        fn seek(&mut self, target: Duration) -> Result<(), MediaError> {
            self.seeks.lock().unwrap().push(target);
            self.value = 1.0;
            Ok(())
        }
    }

    #[test]
    fn eof_closes_channels_and_disconnects_error_channel() {
        let source = ScriptedSource {
            script: VecDeque::from([
                Ok(Some(MediaUnit::Video(test_frame(1)))),
                Ok(Some(MediaUnit::Audio(vec![[0.1, 0.2], [0.3, 0.4]]))),
                Ok(None),
            ]),
        };
        let pipeline = DecodePipeline::start(Box::new(source), &SyncConfig::default());
        let errors = pipeline.errors();

        assert_eq!(pipeline.video().pop(), Some(test_frame(1)));
        assert_eq!(pipeline.audio().pop(), Some([0.1, 0.2]));
        assert_eq!(pipeline.audio().pop(), Some([0.3, 0.4]));

        // Drain-then-EOF on both channels.
        assert_eq!(pipeline.video().pop(), None);
        assert_eq!(pipeline.audio().pop(), None);

        // Producer dropped its sender without forwarding any error.
        assert!(errors.recv_timeout(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn decode_errors_are_forwarded_and_skipped() {
        let source = ScriptedSource {
            script: VecDeque::from([
                Err(MediaError::Decode("bad packet".into())),
                Ok(Some(MediaUnit::Video(test_frame(2)))),
                Ok(None),
            ]),
        };
        let pipeline = DecodePipeline::start(Box::new(source), &SyncConfig::default());
        let errors = pipeline.errors();

        // The frame behind the bad packet still arrives.
        assert_eq!(pipeline.video().pop(), Some(test_frame(2)));

        let err = errors.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(err, MediaError::Decode(_)));
    }

    #[test]
    fn stream_error_terminates_producer() {
        let source = ScriptedSource {
            script: VecDeque::from([
                Ok(Some(MediaUnit::Video(test_frame(3)))),
                Err(MediaError::Stream("read failed".into())),
                Ok(Some(MediaUnit::Video(test_frame(4)))),
            ]),
        };
        let pipeline = DecodePipeline::start(Box::new(source), &SyncConfig::default());
        let errors = pipeline.errors();

        assert_eq!(pipeline.video().pop(), Some(test_frame(3)));
        // The unit after the stream error never arrives.
        assert_eq!(pipeline.video().pop(), None);

        let err = errors.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(err, MediaError::Stream(_)));
    }

    #[test]
    fn seek_purges_and_repositions() {
        let seeks = Arc::new(Mutex::new(Vec::new()));
        let source = SeekableSource {
            value: 0.0,
            seeks: seeks.clone(),
        };
        let pipeline = DecodePipeline::start(Box::new(source), &SyncConfig::default());

        // Let some pre-seek audio accumulate.
        assert_eq!(pipeline.audio().pop(), Some([0.0, 0.0]));

        pipeline.seek(Duration::from_secs(5));

        // Post-seek samples flow after at most one stale unit.
        let mut stale = 0;
        loop {
            match pipeline.audio().pop() {
                Some([v, _]) if v == 1.0 => break,
                Some(_) => stale += 1,
                None => panic!("channel closed before post-seek audio arrived"),
            }
            assert!(stale <= 1, "more than one stale sample survived the seek");
        }

        assert_eq!(seeks.lock().unwrap().as_slice(), &[Duration::from_secs(5)]);
        pipeline.shutdown();
    }

    #[test]
    fn shutdown_cancels_endless_producer() {
        let source = SeekableSource {
            value: 0.0,
            seeks: Arc::new(Mutex::new(Vec::new())),
        };
        let pipeline = DecodePipeline::start(Box::new(source), &SyncConfig::default());

        assert_eq!(pipeline.audio().pop(), Some([0.0, 0.0]));
        pipeline.shutdown();

        assert!(pipeline.video().is_closed());
        assert!(pipeline.audio().is_closed());
        // Idempotent.
        pipeline.shutdown();
    }
}
