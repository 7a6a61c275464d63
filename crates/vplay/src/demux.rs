//! Symphonia-backed media source.
//!
//! Decodes the audio track of a local file into stereo sample batches and
//! synthesizes a level-meter video frame per frame interval, so the engine's
//! video path is exercised even for audio-only containers. GPU presentation
//! stays out of scope; frames are plain RGBA buffers.

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use player_core::media::{Frame, MediaError, MediaInfo, MediaSource, MediaUnit, Sample};

/// Synthesized frame dimensions.
const FRAME_WIDTH: u32 = 160;
const FRAME_HEIGHT: u32 = 90;

/// File-backed demuxer/decoder collaborator.
pub struct SymphoniaSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    info: MediaInfo,
    /// Decoded samples per synthesized video frame.
    samples_per_frame: f64,
    samples_until_frame: f64,
    /// Peak amplitude observed since the last synthesized frame.
    peak: f32,
    pending: VecDeque<MediaUnit>,
}

impl SymphoniaSource {
    /// Probe `path` and prepare the decode state.
    ///
    /// Fatal on open/probe/track/decoder failures; playback never starts
    /// over a half-initialized source.
    pub fn open(path: &Path, frame_rate: f64) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {:?}", path))?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("No default audio track"))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let channels = codec_params
            .channels
            .ok_or_else(|| anyhow!("Unknown channels"))?
            .count();
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("Unknown sample rate"))?;

        let decoder =
            symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

        let frame_rate = if frame_rate > 0.0 { frame_rate } else { 30.0 };
        let info = MediaInfo {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            frame_rate,
            total_frames: total_frames_for(&codec_params, frame_rate),
            sample_rate,
        };
        let samples_per_frame = sample_rate as f64 / frame_rate;

        Ok(Self {
            format,
            decoder,
            track_id,
            channels,
            info,
            samples_per_frame,
            samples_until_frame: samples_per_frame,
            peak: 0.0,
            pending: VecDeque::new(),
        })
    }

    /// Track peak level and synthesize frames owed for `batch`.
    fn advance_meter(&mut self, batch: &[Sample]) {
        for s in batch {
            self.peak = self.peak.max(s[0].abs()).max(s[1].abs());
        }
        self.samples_until_frame -= batch.len() as f64;
        while self.samples_until_frame <= 0.0 {
            self.pending.push_back(MediaUnit::Video(level_frame(
                FRAME_WIDTH,
                FRAME_HEIGHT,
                self.peak,
            )));
            self.samples_until_frame += self.samples_per_frame;
            self.peak = 0.0;
        }
    }
}

impl MediaSource for SymphoniaSource {
    fn info(&self) -> MediaInfo {
        self.info
    }

    fn next_unit(&mut self) -> Result<Option<MediaUnit>, MediaError> {
        if let Some(unit) = self.pending.pop_front() {
            return Ok(Some(unit));
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(MediaError::Stream(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(e) => return Err(MediaError::Decode(e.to_string())),
            };

            let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
            buf.copy_interleaved_ref(decoded);

            let batch = fold_to_stereo(buf.samples(), self.channels);
            if batch.is_empty() {
                continue;
            }
            self.advance_meter(&batch);
            return Ok(Some(MediaUnit::Audio(batch)));
        }
    }

    fn seek(&mut self, target: Duration) -> Result<(), MediaError> {
        let time = Time::new(target.as_secs(), target.subsec_millis() as f64 / 1000.0);
        self.format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| MediaError::Stream(e.to_string()))?;
        self.decoder.reset();

        self.pending.clear();
        self.samples_until_frame = self.samples_per_frame;
        self.peak = 0.0;
        Ok(())
    }
}

/// Total synthesized video frames for the track duration at `frame_rate`.
///
/// Returns 0 when the container reports no usable duration.
fn total_frames_for(codec_params: &CodecParameters, frame_rate: f64) -> u64 {
    let (Some(n_frames), Some(rate)) = (codec_params.n_frames, codec_params.sample_rate) else {
        return 0;
    };
    if rate == 0 || frame_rate <= 0.0 {
        return 0;
    }
    let secs = n_frames as f64 / rate as f64;
    (secs * frame_rate).ceil() as u64
}

/// Fold interleaved `f32` samples into stereo pairs.
///
/// Mono duplicates the channel; layouts beyond stereo keep the first two
/// channels (best effort, matching the playback stage's mapping rules).
fn fold_to_stereo(samples: &[f32], channels: usize) -> Vec<Sample> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().map(|&s| [s, s]).collect(),
        n => samples.chunks_exact(n).map(|c| [c[0], c[1]]).collect(),
    }
}

/// Render a horizontal level meter: `level` of the width lit green on black.
fn level_frame(width: u32, height: u32, level: f32) -> Frame {
    let lit = (level.clamp(0.0, 1.0) * width as f32).round() as u32;
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for _y in 0..height {
        for x in 0..width {
            if x < lit {
                pixels.extend_from_slice(&[0x20, 0xc0, 0x40, 0xff]);
            } else {
                pixels.extend_from_slice(&[0x00, 0x00, 0x00, 0xff]);
            }
        }
    }
    Frame::new(width, height, pixels).expect("level frame dimensions")
}
