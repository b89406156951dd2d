use std::{
    io::{self, BufWriter, Stdout, Write},
    time::{Duration, Instant},
};

use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use dialoguer::Input;
use ffmpeg::{
    format::Pixel,
    frame,
    software::scaling::{context::Context, flag::Flags},
};
use log::debug;

use crate::{keymap::Key, session::Display};

const CAPTION_COLOR: Color = Color::Green;

/// Draws frames into the terminal using half-block cells, two pixels per
/// cell stacked vertically. Owns the terminal's raw mode and alternate screen
/// until released.
pub struct TerminalDisplay {
    out: BufWriter<Stdout>,
    scaler: ScalerCache,
    last_size: Option<(u16, u16)>,
    active: bool,
}

impl TerminalDisplay {
    pub fn new() -> Result<Self> {
        let mut display = Self {
            out: BufWriter::with_capacity(1 << 16, io::stdout()),
            scaler: ScalerCache::default(),
            last_size: None,
            active: false,
        };
        display.enter()?;
        Ok(display)
    }

    fn enter(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(self.out, EnterAlternateScreen, cursor::Hide)?;
        self.active = true;
        self.last_size = None;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.active {
            self.active = false;
            execute!(self.out, ResetColor, cursor::Show, LeaveAlternateScreen)?;
            terminal::disable_raw_mode()?;
        }
        Ok(())
    }
}

impl Display<frame::Video> for TerminalDisplay {
    fn render_image(&mut self, image: &frame::Video, caption: &str, status: &str) -> Result<()> {
        let (cols, rows) = terminal::size()?;
        if self.last_size != Some((cols, rows)) {
            queue!(self.out, ResetColor, Clear(ClearType::All))?;
            self.last_size = Some((cols, rows));
        }

        // The bottom row is reserved for the status line.
        let image_rows = rows.saturating_sub(1);
        let (width, height) = fit(
            image.width(),
            image.height(),
            u32::from(cols),
            u32::from(image_rows) * 2,
        );
        if width > 0 {
            let x = (u32::from(cols) - width) / 2;
            let y = (u32::from(image_rows) - height / 2) / 2;
            let rgb = self.scaler.scale(image, width, height)?;
            draw_half_blocks(&mut self.out, rgb, x as u16, y as u16)?;
            queue!(
                self.out,
                cursor::MoveTo(x as u16 + 1, y as u16),
                SetForegroundColor(CAPTION_COLOR),
                SetBackgroundColor(Color::Black),
                Print(inset_caption(caption, width)),
            )?;
        }

        queue!(
            self.out,
            cursor::MoveTo(0, image_rows),
            ResetColor,
            Print(status.chars().take(usize::from(cols)).collect::<String>()),
            Clear(ClearType::UntilNewLine),
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn poll_key_event(&mut self, timeout: Duration) -> Result<Option<Key>> {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        loop {
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() || !event::poll(remaining)? {
                    return Ok(None);
                }
            }
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    return Ok(Some(key_from_event(&key)));
                }
                Event::Resize(..) => return Ok(Some(Key::Resize)),
                _ => (),
            }
        }
    }

    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        // dialoguer needs a cooked terminal to read a line.
        self.leave()?;
        let answer = Input::<String>::new()
            .with_prompt(text)
            .allow_empty(true)
            .interact_text();
        self.enter()?;

        match answer {
            Ok(answer) if answer.trim().is_empty() => Ok(None),
            Ok(answer) => Ok(Some(answer)),
            Err(e) => {
                debug!("Prompt dismissed: {e}");
                Ok(None)
            }
        }
    }

    fn release_display(&mut self) -> Result<()> {
        self.leave()
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// Keeps the scaling context around until the source or target geometry
/// changes.
#[derive(Default)]
struct ScalerCache {
    context: Option<(ScalerKey, Context)>,
    output: Option<frame::Video>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalerKey {
    format: Pixel,
    width: u32,
    height: u32,
    out_width: u32,
    out_height: u32,
}

impl ScalerCache {
    fn scale(&mut self, image: &frame::Video, width: u32, height: u32) -> Result<&frame::Video> {
        let key = ScalerKey {
            format: image.format(),
            width: image.width(),
            height: image.height(),
            out_width: width,
            out_height: height,
        };
        let context = match &mut self.context {
            Some((cached, context)) if *cached == key => context,
            slot => {
                debug!("New scaler {key:?}");
                let context = Context::get(
                    key.format,
                    key.width,
                    key.height,
                    Pixel::RGB24,
                    width,
                    height,
                    Flags::BILINEAR,
                )?;
                self.output = None;
                &mut slot.insert((key, context)).1
            }
        };
        let output = self.output.get_or_insert_with(frame::Video::empty);
        context.run(image, output)?;
        Ok(output)
    }
}

fn draw_half_blocks<W: Write>(out: &mut W, rgb: &frame::Video, x: u16, y: u16) -> Result<()> {
    let data = rgb.data(0);
    let stride = rgb.stride(0);
    let width = rgb.width() as usize;
    let height = rgb.height() as usize;
    let pixel = |px: usize, py: usize| {
        let offset = py * stride + px * 3;
        Color::Rgb {
            r: data[offset],
            g: data[offset + 1],
            b: data[offset + 2],
        }
    };

    for row in 0..height / 2 {
        queue!(out, cursor::MoveTo(x, y + row as u16))?;
        let mut colors = None;
        for px in 0..width {
            let cell = (pixel(px, row * 2), pixel(px, row * 2 + 1));
            if colors != Some(cell) {
                queue!(out, SetForegroundColor(cell.0), SetBackgroundColor(cell.1))?;
                colors = Some(cell);
            }
            queue!(out, Print('▀'))?;
        }
    }
    Ok(())
}

/// Caption drawn one cell in from the image's left edge, cut so it ends
/// inside the image.
fn inset_caption(caption: &str, width: u32) -> String {
    caption
        .chars()
        .take(width.saturating_sub(1) as usize)
        .collect()
}

/// Largest size with the aspect ratio of `width`×`height` that fits in
/// `max_width`×`max_height`. The height is even so rows pair up into cells.
#[must_use]
pub fn fit(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || max_width == 0 || max_height < 2 {
        return (0, 0);
    }
    let scale = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height));
    let out_width = ((f64::from(width) * scale).round() as u32).clamp(1, max_width);
    let out_height = ((f64::from(height) * scale).round() as u32).clamp(2, max_height) & !1;
    (out_width, out_height)
}

fn key_from_event(event: &KeyEvent) -> Key {
    match event.code {
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Esc => Key::Escape,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        _ => Key::Other,
    }
}
