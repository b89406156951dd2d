use std::path::PathBuf;

use clap::Parser;

/// Steps through a video frame by frame, right in the terminal.
#[derive(Parser, Debug)]
#[clap(version, about)]
pub struct Args {
    /// The video file to open. Asked for interactively when omitted.
    #[clap(value_parser)]
    pub input: Option<PathBuf>,
    /// Start playing immediately instead of paused on the first frame.
    #[clap(long)]
    pub play: bool,
    /// Playback rate in frames per second. Defaults to the video's own rate.
    #[clap(long, value_parser = parse_fps)]
    pub fps: Option<f64>,
    /// Quit once playback reaches the last frame.
    #[clap(long)]
    pub exit_at_end: bool,
    /// Count frames by reading the whole file instead of trusting the
    /// container's frame count.
    #[clap(long)]
    pub count_frames: bool,
}

fn parse_fps(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(fps) if fps.is_finite() && fps > 0.0 => Ok(fps),
        Ok(_) => Err("must be a positive number".to_owned()),
        Err(e) => Err(e.to_string()),
    }
}
