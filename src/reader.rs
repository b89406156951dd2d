use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use ffmpeg::{
    Rational,
    codec::decoder,
    format::{self, context::Input},
    frame, media,
};
use log::{debug, trace};

use crate::{misc::count_frames, session::FrameSource};

/// Rate used when a stream doesn't report a usable one.
const FALLBACK_FRAME_RATE: Rational = Rational(30, 1);

pub struct VideoReader {
    input_ctx: Input,
    decoder: decoder::Video,
    stream_index: usize,
    video_details: VideoDetails,
    current: Option<frame::Video>,
    next_index: Option<usize>,
    eof_sent: bool,
}

impl VideoReader {
    /// Opens the best video stream of `input`. With `count_frames` the
    /// container's frame count is ignored and the video packets are counted
    /// instead.
    pub fn open<P: AsRef<Path>>(input: P, count_frames: bool) -> Result<Self> {
        ffmpeg::init()?;

        let input_ctx = format::input(&input)?;
        let container_duration = input_ctx.duration();
        let stream = input_ctx
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| anyhow!("Could not find video stream"))?;
        let stream_index = stream.index();
        let mut decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        decoder.set_parameters(stream.parameters())?;

        let frame_rate = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .find(|rate| rate.numerator() > 0 && rate.denominator() > 0)
            .unwrap_or(FALLBACK_FRAME_RATE);
        let time_base = stream.time_base();
        let start_pts = match stream.start_time() {
            // AV_NOPTS_VALUE
            i64::MIN => 0,
            start => start,
        };

        let duration_secs = if stream.duration() > 0 {
            stream.duration() as f64 * f64::from(time_base)
        } else {
            container_duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        };
        let reported_frames = stream.frames();

        let frame_count = if count_frames {
            count_frames_in(&input)?
        } else {
            estimate_frame_count(reported_frames, duration_secs, f64::from(frame_rate))
        };
        if frame_count == 0 {
            bail!("Video reports no frames");
        }

        let video_details = VideoDetails {
            width: decoder.width() as usize,
            height: decoder.height() as usize,
            frame_count,
            frame_rate,
            time_base,
            start_pts,
        };
        debug!("Opened {}: {video_details:?}", input.as_ref().display());

        Ok(Self {
            input_ctx,
            decoder,
            stream_index,
            video_details,
            current: None,
            next_index: Some(0),
            eof_sent: false,
        })
    }

    #[must_use]
    pub const fn get_video_details(&self) -> &VideoDetails {
        &self.video_details
    }

    /// Pulls the next decoded frame out of the decoder, feeding it packets of
    /// our stream as needed. `Ok(None)` once the stream is drained.
    fn decode_next(&mut self) -> Result<Option<frame::Video>> {
        loop {
            let mut decoded = frame::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.eof_sent {
                return Ok(None);
            }

            // A fresh iterator every time, so it doesn't hold on to `input_ctx`.
            let next = self
                .input_ctx
                .packets()
                .next()
                .map(|read| read.map(|(stream, packet)| (stream.index(), packet)));
            match next {
                Some(Ok((index, packet))) if index == self.stream_index => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        // Damaged packets are skipped, the decoder recovers at the next keyframe.
                        debug!("Decoder rejected packet: {e}");
                    }
                }
                Some(Ok(_)) => (),
                Some(Err(e)) => return Err(e).context("Failed to read packet"),
                None => {
                    let _ = self.decoder.send_eof();
                    self.eof_sent = true;
                }
            }
        }
    }

    fn show(&mut self, frame: frame::Video, index: usize) -> &frame::Video {
        self.next_index = Some(index + 1);
        self.current.insert(frame)
    }
}

impl FrameSource for VideoReader {
    type Image = frame::Video;

    fn frame_count(&self) -> usize {
        self.video_details.frame_count
    }

    fn frame_rate(&self) -> f64 {
        f64::from(self.video_details.frame_rate)
    }

    fn position(&self) -> Option<usize> {
        self.next_index
    }

    fn read_next_frame(&mut self) -> Result<&frame::Video> {
        let index = self
            .next_index
            .take()
            .ok_or_else(|| anyhow!("Decoder position is unknown"))?;
        let frame = self
            .decode_next()?
            .ok_or_else(|| anyhow!("Stream ended before frame {}", index + 1))?;
        trace!("Decoded frame {} sequentially", index + 1);
        Ok(self.show(frame, index))
    }

    fn seek_to_index(&mut self, index: usize) -> Result<&frame::Video> {
        if index >= self.video_details.frame_count {
            bail!(
                "Frame {} is out of range (1-{})",
                index + 1,
                self.video_details.frame_count
            );
        }

        self.next_index = None;
        let timestamp = self.video_details.seek_timestamp(index);
        // Backward seek: land on the keyframe at or before the target, then
        // decode up to it.
        self.input_ctx
            .seek(timestamp, ..=timestamp)
            .with_context(|| format!("Failed to seek to frame {}", index + 1))?;
        self.decoder.flush();
        self.eof_sent = false;

        let mut skipped = 0usize;
        loop {
            let frame = self
                .decode_next()?
                .ok_or_else(|| anyhow!("Stream ended before frame {}", index + 1))?;
            let Some(frame_index) = self
                .video_details
                .frame_index(frame.timestamp().or_else(|| frame.pts()))
            else {
                bail!("Frame {} can't be located, the stream has no timestamps", index + 1);
            };
            if frame_index >= index {
                trace!("Seeked to frame {} after {skipped} pre-roll frames", index + 1);
                return Ok(self.show(frame, index));
            }
            skipped += 1;
        }
    }

    fn current(&self) -> Option<&frame::Video> {
        self.current.as_ref()
    }
}

fn count_frames_in<P: AsRef<Path>>(input: P) -> Result<usize> {
    let frames = count_frames(input.as_ref())?;
    debug!("Counted {frames} video packets");
    Ok(frames)
}

/// Trusts the frame count the container reports, falling back to an
/// estimate from the duration when there is none.
#[must_use]
pub fn estimate_frame_count(reported: i64, duration_secs: f64, fps: f64) -> usize {
    if reported > 0 {
        return reported as usize;
    }
    let estimate = (duration_secs * fps).round();
    if estimate.is_finite() && estimate > 0.0 {
        estimate as usize
    } else {
        0
    }
}

/// Contains important video details
#[derive(Debug, Clone, Copy)]
pub struct VideoDetails {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Number of frames navigation is bounded by.
    pub frame_count: usize,
    /// Frame rate of the Video.
    pub frame_rate: Rational,
    /// Time base of the video stream's timestamps.
    pub time_base: Rational,
    /// Presentation timestamp of the first frame, in `time_base` units.
    pub start_pts: i64,
}

impl VideoDetails {
    /// Maps a presentation timestamp to the index of the frame shown at it.
    #[must_use]
    pub fn pts_to_index(&self, pts: i64) -> usize {
        let secs = (pts - self.start_pts) as f64 * f64::from(self.time_base);
        let index = (secs * f64::from(self.frame_rate)).round();
        if index > 0.0 { index as usize } else { 0 }
    }

    /// Index of a decoded frame from its best-effort timestamp. Without a
    /// timestamp there's no telling which frame it is.
    #[must_use]
    pub fn frame_index(&self, timestamp: Option<i64>) -> Option<usize> {
        timestamp.map(|pts| self.pts_to_index(pts))
    }

    /// Container timestamp, in `AV_TIME_BASE` units, at which frame `index`
    /// starts.
    #[must_use]
    pub fn seek_timestamp(&self, index: usize) -> i64 {
        let start_secs = self.start_pts as f64 * f64::from(self.time_base);
        let secs = start_secs + index as f64 / f64::from(self.frame_rate);
        (secs * f64::from(ffmpeg::ffi::AV_TIME_BASE)).round() as i64
    }
}


#[cfg(all(test, feature = "decode_tests"))]
mod decode_tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const FRAMES: usize = 10;
    const SIDE: usize = 16;

    /// Frame `index` has every luma sample set to this value.
    fn luma(index: usize) -> u8 {
        (16 + index * 8) as u8
    }

    /// A 10 fps `yuv4mpegpipe` clip of flat gray frames getting brighter.
    fn gray_ramp() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".y4m").tempfile().unwrap();
        write!(file, "YUV4MPEG2 W{SIDE} H{SIDE} F10:1 Ip A1:1 C420jpeg\n").unwrap();
        for index in 0..FRAMES {
            file.write_all(b"FRAME\n").unwrap();
            file.write_all(&[luma(index); SIDE * SIDE]).unwrap();
            file.write_all(&[128_u8; SIDE * SIDE / 2]).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn open(file: &NamedTempFile) -> VideoReader {
        VideoReader::open(file.path(), true).unwrap()
    }

    #[test]
    fn opens_with_exact_details() {
        let file = gray_ramp();
        let reader = open(&file);
        let details = reader.get_video_details();
        assert_eq!(details.frame_count, FRAMES);
        assert_eq!((details.width, details.height), (SIDE, SIDE));
        assert!((reader.frame_rate() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn sequential_reads_cover_every_frame() {
        let file = gray_ramp();
        let mut reader = open(&file);
        for index in 0..FRAMES {
            assert_eq!(reader.position(), Some(index));
            let frame = reader.read_next_frame().unwrap();
            assert_eq!(frame.data(0)[0], luma(index), "frame {index}");
        }
        assert!(reader.read_next_frame().is_err());
    }

    #[test]
    fn seek_lands_on_requested_frame() {
        let file = gray_ramp();
        let mut reader = open(&file);
        let details = *reader.get_video_details();
        for index in [7, 0, 9, 3, 3, 4] {
            let frame = reader.seek_to_index(index).unwrap();
            assert_eq!(frame.data(0)[0], luma(index), "frame {index}");
            let timestamp = frame.timestamp().or_else(|| frame.pts());
            assert_eq!(details.frame_index(timestamp), Some(index));
            assert_eq!(reader.position(), Some(index + 1));
        }
    }

    #[test]
    fn reading_continues_after_seek() {
        let file = gray_ramp();
        let mut reader = open(&file);
        reader.seek_to_index(5).unwrap();
        for index in 6..FRAMES {
            assert_eq!(reader.read_next_frame().unwrap().data(0)[0], luma(index));
        }
        assert!(reader.read_next_frame().is_err());
        assert!(reader.seek_to_index(FRAMES).is_err());
    }
}
