use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use log::{debug, trace};

use crate::{
    keymap::{self, Binding, Key},
    playback::{Command, Effect, Notice, PlaybackController, PlaybackState},
};

/// Something that decodes frames of a single video stream.
pub trait FrameSource {
    type Image;

    fn frame_count(&self) -> usize;

    /// Frames per second reported by the video.
    fn frame_rate(&self) -> f64;

    /// Index of the frame the next call to `read_next_frame` will return,
    /// or `None` if a failure left the decoder somewhere unknown.
    fn position(&self) -> Option<usize>;

    /// Decodes the frame at the current position and advances by one.
    fn read_next_frame(&mut self) -> Result<&Self::Image>;

    /// Repositions the decoder and decodes the frame at `index`.
    fn seek_to_index(&mut self, index: usize) -> Result<&Self::Image>;

    /// The most recently decoded frame.
    fn current(&self) -> Option<&Self::Image>;
}

/// Somewhere to show frames and read keys from.
pub trait Display<I> {
    fn render_image(&mut self, image: &I, caption: &str, status: &str) -> Result<()>;

    /// Waits up to `timeout` for a key. A zero timeout waits indefinitely.
    fn poll_key_event(&mut self, timeout: Duration) -> Result<Option<Key>>;

    /// Asks the user for a line of text. `None` if the prompt was dismissed.
    fn prompt(&mut self, text: &str) -> Result<Option<String>>;

    fn release_display(&mut self) -> Result<()>;
}

/// Checks that `source` has something to show and decodes its first frame.
pub fn load<S: FrameSource>(source: &mut S) -> Result<PlaybackController> {
    let Some(state) = PlaybackState::new(source.frame_count()) else {
        bail!("Video reports no frames");
    };
    source
        .read_next_frame()
        .context("Cannot read first frame")?;
    Ok(PlaybackController::new(state))
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Time between frames while playing.
    pub frame_interval: Duration,
    pub start_playing: bool,
    /// End the session once playback runs into the last frame.
    pub exit_at_end: bool,
}

impl SessionOptions {
    /// Options for playback at `fps`, falling back to 30 fps for rates that
    /// make no sense.
    #[must_use]
    pub fn at_rate(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        Self {
            frame_interval: Duration::from_secs_f64(1.0 / fps),
            start_playing: false,
            exit_at_end: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct Session<S, D> {
    source: S,
    display: D,
    controller: PlaybackController,
    options: SessionOptions,
    status: String,
    last_shown: Instant,
}

impl<S, D> Session<S, D>
where
    S: FrameSource,
    D: Display<S::Image>,
{
    pub fn new(
        source: S,
        display: D,
        mut controller: PlaybackController,
        options: SessionOptions,
    ) -> Self {
        if options.start_playing {
            controller.handle(Command::TogglePlay);
        }
        Self {
            source,
            display,
            controller,
            options,
            status: String::new(),
            last_shown: Instant::now(),
        }
    }

    /// Runs until the user quits, then releases the display and hands back
    /// its parts.
    pub fn run(mut self) -> Result<(S, D)> {
        loop {
            self.redraw()?;
            let Some(command) = self.next_command()? else {
                continue;
            };
            if self.apply(command) == Flow::Stop {
                break;
            }
        }
        self.display.release_display()?;
        Ok((self.source, self.display))
    }

    fn redraw(&mut self) -> Result<()> {
        let state = self.controller.state();
        let Some(image) = self.source.current() else {
            bail!("No frame decoded");
        };
        let caption = format!(
            "Frame: {}/{}",
            state.current_index() + 1,
            state.total_frames()
        );
        let status = status_line(state, &self.status);
        self.display.render_image(image, &caption, &status)
    }

    fn next_command(&mut self) -> Result<Option<Command>> {
        let playing = self.controller.state().is_playing();
        let timeout = if playing {
            self.options
                .frame_interval
                .saturating_sub(self.last_shown.elapsed())
                .max(Duration::from_millis(1))
        } else {
            Duration::ZERO
        };

        let key = self.display.poll_key_event(timeout)?;
        trace!("Key {key:?} after waiting up to {timeout:?}");
        let binding = match key {
            None | Some(Key::Resize) if !playing => return Ok(None),
            None => return Ok(Some(Command::Tick)),
            Some(Key::Resize) => return Ok(None),
            Some(key) => keymap::lookup(key),
        };

        Ok(match binding {
            Some(Binding::Command(command)) => Some(command),
            Some(Binding::GoTo) => self.prompt_frame_number()?,
            None if playing => Some(Command::Tick),
            None => None,
        })
    }

    fn prompt_frame_number(&mut self) -> Result<Option<Command>> {
        let total = self.controller.state().total_frames();
        let Some(input) = self
            .display
            .prompt(&format!("Enter frame number (1-{total})"))?
        else {
            return Ok(None);
        };
        if let Ok(number) = input.trim().parse::<i64>() {
            Ok(Some(Command::JumpToIndex(number.saturating_sub(1))))
        } else {
            self.notify(Notice::InvalidIndex, self.controller.state().current_index());
            Ok(None)
        }
    }

    fn apply(&mut self, command: Command) -> Flow {
        let before = self.controller.state();
        let outcome = self.controller.handle(command);
        debug!("{command:?} -> {outcome:?}");
        let index = self.controller.state().current_index();
        if let Some(notice) = outcome.notice {
            self.notify(notice, index);
            if notice == Notice::EndReached && before.is_playing() && self.options.exit_at_end {
                return Flow::Stop;
            }
        }

        let result = match outcome.effect {
            Effect::Terminate => return Flow::Stop,
            Effect::None => {
                if command == Command::TogglePlay {
                    self.status = if self.controller.state().is_playing() {
                        "▶ Playing".to_owned()
                    } else {
                        "⏸ Paused".to_owned()
                    };
                }
                return Flow::Continue;
            }
            Effect::AdvanceOne if self.source.position() == Some(index) => {
                self.source.read_next_frame().map(|_| ())
            }
            Effect::AdvanceOne | Effect::SeekTo(_) => {
                self.source.seek_to_index(index).map(|_| ())
            }
        };

        match result {
            Ok(()) => {
                self.last_shown = Instant::now();
                match command {
                    Command::JumpToStart => self.status = "Jumped to first frame".to_owned(),
                    Command::JumpToEnd => self.status = "Jumped to last frame".to_owned(),
                    Command::JumpToIndex(_) => {
                        self.status = format!("Jumped to frame {}", index + 1);
                    }
                    _ => (),
                }
            }
            Err(e) => {
                debug!("Could not show frame {}: {e:#}", index + 1);
                match self.controller.read_failed(before) {
                    Some(notice) => self.notify(notice, index),
                    None => self.status.clear(),
                }
            }
        }
        Flow::Continue
    }

    /// `index` is the frame the notice is about.
    fn notify(&mut self, notice: Notice, index: usize) {
        self.status = match notice {
            Notice::EndReached => "End of video reached".to_owned(),
            Notice::StartReached => "Beginning of video reached".to_owned(),
            Notice::InvalidIndex => "Invalid frame number!".to_owned(),
            Notice::ReadFailed => format!("Could not read frame {}", index + 1),
        };
    }
}

fn status_line(state: PlaybackState, message: &str) -> String {
    let position = state.current_index() + 1;
    let progress = position as f64 / state.total_frames() as f64 * 100.0;
    let marker = if state.is_playing() { '▶' } else { '⏸' };
    if message.is_empty() {
        format!("{marker} {position}/{} ({progress:.1}%)", state.total_frames())
    } else {
        format!(
            "{marker} {position}/{} ({progress:.1}%)  {message}",
            state.total_frames()
        )
    }
}
