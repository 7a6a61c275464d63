//! Playback stage (CPAL output stream).
//!
//! Builds the CPAL output stream and provides the real-time audio callback.
//! The callback:
//! - pulls stereo samples from the engine's audio channel via [`AudioSampleSource`]
//! - applies the volume curve
//! - maps stereo to the device channel layout and converts to the device format
//!
//! The engine feeds samples at the media rate; no resampling is performed. When
//! the device rate differs, playback speed is off by the ratio and a warning is
//! logged at startup.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use player_core::controller::PlaybackController;
use player_core::media::Sample;
use player_core::source::AudioSampleSource;

/// Owns the output stream; dropping it stops audio output.
pub struct AudioSink {
    _stream: cpal::Stream,
}

/// Build and start the output stream for `controller`'s audio channel.
///
/// `needle` selects a device by substring match; `volume` is read by the
/// callback on every cycle so `vol` commands take effect immediately.
pub fn start(
    controller: Arc<PlaybackController>,
    needle: Option<&str>,
    volume: Arc<AtomicU8>,
) -> Result<AudioSink> {
    let host = cpal::default_host();
    let device = pick_device(&host, needle)?;
    let supported = device
        .default_output_config()
        .context("No default output config")?;

    let media_rate = controller.pipeline().info().sample_rate;
    if supported.sample_rate() != media_rate {
        tracing::warn!(
            device_rate = supported.sample_rate(),
            media_rate,
            "output device rate differs from media rate; playback speed will be off"
        );
    }

    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let source = AudioSampleSource::new(controller);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, source, volume),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, source, volume),
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, source, volume),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, source, volume),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }?;

    stream.play().context("Start output stream")?;
    Ok(AudioSink { _stream: stream })
}

/// Type-specialized stream builder for CPAL sample formats.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut source: AudioSampleSource,
    volume: Arc<AtomicU8>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let mut scratch: Vec<Sample> = Vec::new();

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let frames = data.len() / channels_out;
            scratch.resize(frames, [0.0, 0.0]);

            let (filled, _more) = source.fill(&mut scratch[..frames]);
            let gain = volume_gain(volume.load(Ordering::Relaxed));

            for frame in 0..filled {
                let [l, r] = scratch[frame];
                write_frame(
                    &mut data[frame * channels_out..(frame + 1) * channels_out],
                    l * gain,
                    r * gain,
                );
            }
            for slot in &mut data[filled * channels_out..] {
                *slot = <T as cpal::Sample>::from_sample::<f32>(0.0);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Write one stereo frame into a device frame of arbitrary channel count.
///
/// Mapping rules:
/// - mono output: average L/R
/// - stereo and wider: L, R, remaining channels silent
fn write_frame<T>(out: &mut [T], l: f32, r: f32)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    match out.len() {
        0 => {}
        1 => out[0] = <T as cpal::Sample>::from_sample::<f32>(0.5 * (l + r)),
        _ => {
            out[0] = <T as cpal::Sample>::from_sample::<f32>(l);
            out[1] = <T as cpal::Sample>::from_sample::<f32>(r);
            for slot in &mut out[2..] {
                *slot = <T as cpal::Sample>::from_sample::<f32>(0.0);
            }
        }
    }
}

/// Map a 0..100 volume percent to a linear gain.
///
/// `2^(0.04·percent − 2)`: 50 is unity, 100 is +12 dB, and 5 or below is
/// muted outright.
pub fn volume_gain(percent: u8) -> f32 {
    if percent <= 5 {
        return 0.0;
    }
    (0.04 * f32::from(percent.min(100)) - 2.0).exp2()
}

/// Pick the first output device matching `needle` (case-insensitive), or the
/// default device.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let mut devices: Vec<cpal::Device> = host
        .output_devices()
        .context("No output devices")?
        .collect();

    if let Some(needle) = needle {
        if let Some(d) = devices.drain(..).find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.name(), needle))
                .unwrap_or(false)
        }) {
            return Ok(d);
        }
        return Err(anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Print available output devices to stdout (`--list-devices`).
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_gain_unity_at_fifty() {
        assert!((volume_gain(50) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn volume_gain_quadruples_at_hundred() {
        assert!((volume_gain(100) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn volume_gain_mutes_low_percentages() {
        assert_eq!(volume_gain(0), 0.0);
        assert_eq!(volume_gain(5), 0.0);
        assert!(volume_gain(6) > 0.0);
    }

    #[test]
    fn volume_gain_is_monotonic_above_mute() {
        let mut last = 0.0;
        for p in 6..=100 {
            let g = volume_gain(p);
            assert!(g > last);
            last = g;
        }
    }

    #[test]
    fn write_frame_averages_to_mono() {
        let mut out = [0.0f32];
        write_frame(&mut out, 0.2, 0.6);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn write_frame_passes_stereo_and_silences_extras() {
        let mut out = [9.0f32; 4];
        write_frame(&mut out, 0.25, -0.25);
        assert_eq!(out, [0.25, -0.25, 0.0, 0.0]);
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }
}
