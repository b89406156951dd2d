use crate::playback::Command;

/// A key event, stripped of whatever terminal backend produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Left,
    Right,
    Home,
    End,
    /// Ctrl-C. Raw mode swallows the signal, so it arrives as a key.
    Interrupt,
    /// The display changed size. Not a key press, only forces a redraw.
    Resize,
    Other,
}

/// What a bound key asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Command(Command),
    /// Ask the user for a frame number, then jump to it.
    GoTo,
}

const BINDINGS: &[(Key, Binding)] = &[
    (Key::Char('q'), Binding::Command(Command::Quit)),
    (Key::Escape, Binding::Command(Command::Quit)),
    (Key::Interrupt, Binding::Command(Command::Quit)),
    (Key::Char(' '), Binding::Command(Command::TogglePlay)),
    (Key::Char('d'), Binding::Command(Command::StepForward)),
    (Key::Right, Binding::Command(Command::StepForward)),
    (Key::Char('a'), Binding::Command(Command::StepBackward)),
    (Key::Left, Binding::Command(Command::StepBackward)),
    (Key::Char('h'), Binding::Command(Command::JumpToStart)),
    (Key::Home, Binding::Command(Command::JumpToStart)),
    (Key::Char('e'), Binding::Command(Command::JumpToEnd)),
    (Key::End, Binding::Command(Command::JumpToEnd)),
    (Key::Char('g'), Binding::GoTo),
];

/// Help text printed before playback starts, one row per control.
pub const CONTROLS: &[(&str, &str)] = &[
    ("SPACE", "Play/Pause"),
    ("→ or D", "Next frame"),
    ("← or A", "Previous frame"),
    ("HOME or H", "Go to first frame"),
    ("END or E", "Go to last frame"),
    ("G", "Go to specific frame"),
    ("ESC or Q", "Quit"),
];

/// Looks up the binding for `key`. Letters match regardless of case.
#[must_use]
pub fn lookup(key: Key) -> Option<Binding> {
    let key = match key {
        Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
        key => key,
    };
    BINDINGS
        .iter()
        .find(|&&(bound, _)| bound == key)
        .map(|&(_, binding)| binding)
}
