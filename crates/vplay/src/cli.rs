use std::path::PathBuf;

use clap::Parser;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "vplay", version = VERSION)]
pub struct Args {
    /// Path to the media file to play
    pub path: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Presentation frame rate for the synthesized video stream
    #[arg(long, default_value_t = 30.0)]
    pub frame_rate: f64,

    /// Video channel depth in decoded frames
    #[arg(long, default_value_t = 24)]
    pub video_buffer_frames: usize,

    /// Audio channel target depth in seconds
    #[arg(long, default_value_t = 0.5)]
    pub audio_buffer_seconds: f32,

    /// Initial volume percent (0..100); 50 is unity gain
    #[arg(long, default_value_t = 50)]
    pub volume: u8,
}

/// Interactive commands accepted on stdin while playing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Toggle,
    Stop,
    Seek(f64),
    Volume(u8),
    Status,
    Quit,
}

/// Parse one stdin line into a command.
///
/// Unknown or malformed lines yield `None` and are ignored by the caller.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    match words.next()? {
        "p" | "pause" | "play" | "toggle" => Some(Command::Toggle),
        "s" | "stop" => Some(Command::Stop),
        "seek" => {
            let fraction: f64 = words.next()?.parse().ok()?;
            Some(Command::Seek(fraction))
        }
        "vol" | "volume" => {
            let percent: u8 = words.next()?.parse().ok()?;
            Some(Command::Volume(percent.min(100)))
        }
        "st" | "status" => Some(Command::Status),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}
