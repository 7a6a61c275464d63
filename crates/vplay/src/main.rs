//! vplay: command-line media player built on the sync engine.
//!
//! Wires the decode pipeline, playback controller, CPAL output, and stdin
//! command handling together. Ctrl-C or the `quit` command requests shutdown;
//! teardown closes the channels, joins the producer, and stops the stream.

mod cli;
mod demux;
mod render;
mod sink;

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use player_core::config::SyncConfig;
use player_core::controller::PlaybackController;
use player_core::media::MediaError;
use player_core::pipeline::DecodePipeline;
use player_core::status::StatusReporter;
use player_types::PlaybackEndReason;

use cli::{Args, Command};
use demux::SymphoniaSource;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        return sink::list_devices(&cpal::default_host());
    }

    let path = args.path.as_deref().ok_or_else(|| anyhow!("No media file given"))?;
    let source = SymphoniaSource::open(path, args.frame_rate)
        .with_context(|| format!("open media {:?}", path))?;

    let config = SyncConfig {
        video_buffer_frames: args.video_buffer_frames,
        audio_buffer_seconds: args.audio_buffer_seconds,
    };
    let pipeline = DecodePipeline::start(Box::new(source), &config);
    tracing::info!(
        total_frames = pipeline.info().total_frames,
        sample_rate = pipeline.info().sample_rate,
        frame_rate = pipeline.info().frame_rate,
        "pipeline started"
    );

    let controller = Arc::new(PlaybackController::new(pipeline));
    let reporter = Arc::new(StatusReporter::new(
        controller.clone(),
        Some(path.display().to_string()),
    ));

    // Decode errors arrive on a side channel; only stream errors end playback.
    let errors = controller.pipeline().errors();
    let err_reporter = reporter.clone();
    let error_drain = thread::spawn(move || {
        for err in errors {
            match err {
                MediaError::Decode(msg) => tracing::warn!(%msg, "skipping undecodable unit"),
                MediaError::Stream(msg) => {
                    tracing::error!(%msg, "stream error, ending playback");
                    err_reporter.mark_ended(PlaybackEndReason::Error);
                }
            }
        }
    });

    let volume = Arc::new(AtomicU8::new(args.volume.min(100)));
    let _sink = sink::start(controller.clone(), args.device.as_deref(), volume.clone())
        .context("start audio output")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        ctrlc_shutdown.store(true, Ordering::SeqCst);
    })
    .context("install Ctrl-C handler")?;

    spawn_command_loop(
        controller.clone(),
        reporter.clone(),
        volume,
        shutdown.clone(),
    );

    let _ = render::run(&controller, &reporter, &shutdown);

    reporter.mark_ended(PlaybackEndReason::Stopped);
    controller.pipeline().shutdown();
    error_drain.join().ok();

    let status = reporter.snapshot();
    tracing::info!(
        end_reason = ?status.end_reason,
        frames_played = status.frames_played,
        "playback finished"
    );
    Ok(())
}

/// Read stdin commands until quit or EOF.
///
/// The thread is detached: a blocking `read_line` cannot be interrupted, so
/// shutdown proceeds without joining it.
fn spawn_command_loop(
    controller: Arc<PlaybackController>,
    reporter: Arc<StatusReporter>,
    volume: Arc<AtomicU8>,
    shutdown: Arc<AtomicBool>,
) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match cli::parse_command(&line) {
                Some(Command::Toggle) => {
                    controller.toggle();
                }
                Some(Command::Stop) => controller.stop(),
                Some(Command::Seek(fraction)) => controller.seek(fraction),
                Some(Command::Volume(percent)) => {
                    volume.store(percent, Ordering::Relaxed);
                    tracing::info!(percent, "volume set");
                }
                Some(Command::Status) => match serde_json::to_string(&reporter.snapshot()) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!("status serialization failed: {e}"),
                },
                Some(Command::Quit) => {
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
                None => {
                    if !line.trim().is_empty() {
                        tracing::warn!(line, "unrecognized command");
                    }
                }
            }
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
        }
    });
}
