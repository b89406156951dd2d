use std::path::Path;

use anyhow::{Result, anyhow};
use ffmpeg::{format, media};

/// Counts the packets of the best video stream in `video`.
///
/// Some containers report a frame count that's off, or none at all. This
/// demuxes the whole file, so it takes a while on long videos.
pub fn count_frames(video: &Path) -> Result<usize> {
    ffmpeg::init()?;

    let mut input_ctx = format::input(&video)?;
    let stream_index = input_ctx
        .streams()
        .best(media::Type::Video)
        .ok_or_else(|| anyhow!("Could not find video stream"))?
        .index();

    let mut frames = 0usize;
    for read in input_ctx.packets() {
        let (stream, _) = read?;
        if stream.index() == stream_index {
            frames += 1;
        }
    }
    Ok(frames)
}
