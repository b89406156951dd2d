#![deny(clippy::all)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::similar_names)]
#![allow(clippy::use_self)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::default_numeric_fallback)]
#![warn(clippy::exit)]
#![warn(clippy::float_cmp_const)]
#![warn(clippy::if_then_some_else_none)]
#![warn(clippy::lossy_float_literal)]
#![warn(clippy::map_err_ignore)]
#![warn(clippy::mem_forget)]
#![warn(clippy::multiple_inherent_impl)]
#![warn(clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::same_name_method)]
#![warn(clippy::str_to_string)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::unneeded_field_pattern)]
#![warn(clippy::verbose_file_reads)]
// For binary-only crates
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cli;
pub mod keymap;
pub mod misc;
pub mod playback;
pub mod reader;
pub mod session;
pub mod terminal;

use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Input;
use log::info;

use crate::{
    cli::Args,
    keymap::CONTROLS,
    reader::VideoReader,
    session::{FrameSource, Session, SessionOptions},
    terminal::TerminalDisplay,
};

pub fn main() -> Result<()> {
    let filters = env::var("RUST_LOG").unwrap_or_else(|_| "error,framestep=info".to_owned());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();

    let args = Args::parse();

    let input = match args.input {
        Some(input) => input,
        None => PathBuf::from(
            Input::<String>::new()
                .with_prompt("Enter video file path")
                .interact_text()?
                .trim(),
        ),
    };

    let mut reader = VideoReader::open(&input, args.count_frames)
        .with_context(|| format!("Failed to load video: {}", input.to_string_lossy()))?;
    let controller = session::load(&mut reader)
        .with_context(|| format!("Failed to load video: {}", input.to_string_lossy()))?;

    let details = reader.get_video_details();
    info!("Video loaded successfully");
    info!("  Total frames: {}", details.frame_count);
    info!("  FPS: {:.3}", reader.frame_rate());
    info!("  Resolution: {}x{}", details.width, details.height);

    eprintln!("=== Controls ===");
    for (keys, action) in CONTROLS {
        eprintln!("{keys:<10}: {action}");
    }

    let options = SessionOptions {
        start_playing: args.play,
        exit_at_end: args.exit_at_end,
        ..SessionOptions::at_rate(args.fps.unwrap_or_else(|| reader.frame_rate()))
    };
    let display = TerminalDisplay::new()?;
    Session::new(reader, display, controller, options).run()?;

    eprintln!("Playback stopped.");
    Ok(())
}
