/// A logical playback command, independent of how it was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    TogglePlay,
    StepForward,
    StepBackward,
    JumpToStart,
    JumpToEnd,
    /// Zero-based target frame. Signed because it comes straight from user
    /// input and may be out of range in either direction.
    JumpToIndex(i64),
    /// Auto-advance fired by the playback clock.
    Tick,
}

/// Work the frame source has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Decode the next frame sequentially.
    AdvanceOne,
    /// Reposition the decoder and decode the frame at this index.
    SeekTo(usize),
    Terminate,
}

/// Conditions reported back to the user. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    EndReached,
    StartReached,
    InvalidIndex,
    ReadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub effect: Effect,
    pub notice: Option<Notice>,
}

impl Outcome {
    const fn effect(effect: Effect) -> Self {
        Self {
            effect,
            notice: None,
        }
    }

    const fn notice(notice: Notice) -> Self {
        Self {
            effect: Effect::None,
            notice: Some(notice),
        }
    }
}

/// Navigation state of a loaded video.
///
/// `current_index < total_frames` always holds, which is why a state can only
/// be created for a non-empty video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    total_frames: usize,
    current_index: usize,
    is_playing: bool,
}

impl PlaybackState {
    #[must_use]
    pub const fn new(total_frames: usize) -> Option<Self> {
        if total_frames == 0 {
            return None;
        }
        Some(Self {
            total_frames,
            current_index: 0,
            is_playing: false,
        })
    }

    #[must_use]
    pub const fn total_frames(&self) -> usize {
        self.total_frames
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.is_playing
    }

    #[must_use]
    pub const fn last_index(&self) -> usize {
        self.total_frames - 1
    }

    /// Applies `command` and returns the resulting state along with the
    /// effect the frame source has to execute.
    #[must_use]
    pub const fn apply(mut self, command: Command) -> (Self, Outcome) {
        let outcome = match command {
            Command::Quit => Outcome::effect(Effect::Terminate),
            Command::TogglePlay => {
                self.is_playing = !self.is_playing;
                Outcome::effect(Effect::None)
            }
            Command::Tick if !self.is_playing => Outcome::effect(Effect::None),
            Command::StepForward | Command::Tick => {
                if self.current_index == self.last_index() {
                    self.is_playing = false;
                    Outcome::notice(Notice::EndReached)
                } else {
                    self.current_index += 1;
                    Outcome::effect(Effect::AdvanceOne)
                }
            }
            Command::StepBackward => {
                if self.current_index == 0 {
                    Outcome::notice(Notice::StartReached)
                } else {
                    // Decoders can't run backwards, so stepping back always seeks.
                    self.current_index -= 1;
                    Outcome::effect(Effect::SeekTo(self.current_index))
                }
            }
            Command::JumpToStart => {
                self.current_index = 0;
                Outcome::effect(Effect::SeekTo(0))
            }
            Command::JumpToEnd => {
                self.current_index = self.last_index();
                Outcome::effect(Effect::SeekTo(self.current_index))
            }
            Command::JumpToIndex(index) => {
                if index >= 0 && (index as u64) < self.total_frames as u64 {
                    self.current_index = index as usize;
                    Outcome::effect(Effect::SeekTo(self.current_index))
                } else {
                    Outcome::notice(Notice::InvalidIndex)
                }
            }
        };
        (self, outcome)
    }
}

/// Owns the [`PlaybackState`] of a session and never touches decoding
/// resources; it only tells the caller which [`Effect`] to run.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    state: PlaybackState,
}

impl PlaybackController {
    #[must_use]
    pub const fn new(state: PlaybackState) -> Self {
        Self { state }
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    pub const fn handle(&mut self, command: Command) -> Outcome {
        let (state, outcome) = self.state.apply(command);
        self.state = state;
        outcome
    }

    /// Called when the frame source failed to execute the effect produced
    /// from `before`. The last frame that was actually shown stays current.
    ///
    /// Failures during playback just stop auto-advance; failures during
    /// manual navigation are returned so they can be reported.
    pub const fn read_failed(&mut self, before: PlaybackState) -> Option<Notice> {
        self.state.current_index = before.current_index;
        if before.is_playing {
            self.state.is_playing = false;
            None
        } else {
            Some(Notice::ReadFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use interpolate_name::interpolate_test;
    use quickcheck::{Arbitrary, Gen, TestResult};
    use quickcheck_macros::quickcheck;

    use super::*;

    impl Arbitrary for Command {
        fn arbitrary(g: &mut Gen) -> Self {
            match u8::arbitrary(g) % 8 {
                0 => Command::Quit,
                1 => Command::TogglePlay,
                2 => Command::StepForward,
                3 => Command::StepBackward,
                4 => Command::JumpToStart,
                5 => Command::JumpToEnd,
                6 => Command::JumpToIndex(i64::from(i8::arbitrary(g))),
                _ => Command::Tick,
            }
        }
    }

    fn controller(total_frames: usize) -> PlaybackController {
        PlaybackController::new(PlaybackState::new(total_frames).unwrap())
    }

    fn playing(total_frames: usize) -> PlaybackController {
        let mut controller = controller(total_frames);
        controller.handle(Command::TogglePlay);
        controller
    }

    #[test]
    fn empty_video_has_no_state() {
        assert_eq!(PlaybackState::new(0), None);
    }

    #[quickcheck]
    fn index_stays_in_bounds(total_frames: u8, commands: Vec<Command>) -> TestResult {
        let Some(state) = PlaybackState::new(usize::from(total_frames)) else {
            return TestResult::discard();
        };
        if state.current_index() != 0 {
            return TestResult::failed();
        }
        let mut controller = PlaybackController::new(state);
        for command in commands {
            controller.handle(command);
            let state = controller.state();
            if state.current_index() >= state.total_frames() {
                return TestResult::failed();
            }
        }
        TestResult::passed()
    }

    #[quickcheck]
    fn toggle_twice_is_identity(total_frames: u8, prefix: Vec<Command>) -> TestResult {
        if total_frames == 0 {
            return TestResult::discard();
        }
        let mut controller = controller(usize::from(total_frames));
        for command in prefix {
            controller.handle(command);
        }
        let before = controller.state();
        controller.handle(Command::TogglePlay);
        controller.handle(Command::TogglePlay);
        TestResult::from_bool(controller.state() == before)
    }

    #[quickcheck]
    fn jump_to_index(total_frames: u8, start: u8, target: i16) -> TestResult {
        if total_frames == 0 {
            return TestResult::discard();
        }
        let total_frames = usize::from(total_frames);
        let mut controller = controller(total_frames);
        controller.handle(Command::JumpToIndex(i64::from(start) % total_frames as i64));
        let before = controller.state();

        let outcome = controller.handle(Command::JumpToIndex(i64::from(target)));
        if target >= 0 && (target as usize) < total_frames {
            TestResult::from_bool(
                controller.state().current_index() == target as usize
                    && outcome.effect == Effect::SeekTo(target as usize)
                    && outcome.notice.is_none(),
            )
        } else {
            TestResult::from_bool(
                controller.state() == before
                    && outcome
                        == Outcome {
                            effect: Effect::None,
                            notice: Some(Notice::InvalidIndex),
                        },
            )
        }
    }

    #[interpolate_test(single_frame, 1)]
    #[interpolate_test(two_frames, 2)]
    #[interpolate_test(ten_frames, 10)]
    #[interpolate_test(many_frames, 1000)]
    fn step_forward_to_end(total_frames: usize) {
        let mut controller = controller(total_frames);
        for expected in 1..total_frames {
            let outcome = controller.handle(Command::StepForward);
            assert_eq!(outcome.effect, Effect::AdvanceOne);
            assert_eq!(controller.state().current_index(), expected);
        }

        let outcome = controller.handle(Command::StepForward);
        assert_eq!(outcome.effect, Effect::None);
        assert_eq!(outcome.notice, Some(Notice::EndReached));
        assert_eq!(controller.state().current_index(), total_frames - 1);
    }

    #[test]
    fn step_forward_at_end_stops_playback() {
        let mut controller = playing(2);
        controller.handle(Command::StepForward);
        let outcome = controller.handle(Command::StepForward);
        assert_eq!(outcome.notice, Some(Notice::EndReached));
        assert!(!controller.state().is_playing());
    }

    #[test]
    fn step_backward_at_start() {
        let mut controller = controller(4);
        let before = controller.state();
        let outcome = controller.handle(Command::StepBackward);
        assert_eq!(outcome.effect, Effect::None);
        assert_eq!(outcome.notice, Some(Notice::StartReached));
        assert_eq!(controller.state(), before);
    }

    #[test]
    fn step_backward_seeks() {
        let mut controller = controller(4);
        controller.handle(Command::JumpToEnd);
        let outcome = controller.handle(Command::StepBackward);
        assert_eq!(outcome.effect, Effect::SeekTo(2));
        assert_eq!(controller.state().current_index(), 2);
    }

    #[test]
    fn jump_to_start_after_stepping() {
        let mut controller = controller(10);
        let seeks = [
            Command::StepForward,
            Command::StepForward,
            Command::JumpToStart,
        ]
        .into_iter()
        .map(|command| controller.handle(command).effect)
        .filter(|effect| matches!(effect, Effect::SeekTo(_)))
        .collect::<Vec<_>>();

        assert_eq!(controller.state().current_index(), 0);
        assert_eq!(seeks, vec![Effect::SeekTo(0)]);
    }

    #[test]
    fn jump_to_start_seeks_even_at_start() {
        let mut controller = controller(3);
        assert_eq!(
            controller.handle(Command::JumpToStart).effect,
            Effect::SeekTo(0)
        );
    }

    #[test]
    fn jump_to_end() {
        let mut controller = controller(7);
        assert_eq!(controller.handle(Command::JumpToEnd).effect, Effect::SeekTo(6));
        assert_eq!(controller.state().current_index(), 6);
    }

    #[test]
    fn ticks_until_end_of_stream() {
        let mut controller = playing(5);
        for _ in 0..4 {
            assert_eq!(controller.handle(Command::Tick).effect, Effect::AdvanceOne);
        }
        assert_eq!(controller.state().current_index(), 4);
        assert!(controller.state().is_playing());

        let outcome = controller.handle(Command::Tick);
        assert_eq!(outcome.notice, Some(Notice::EndReached));
        assert_eq!(controller.state().current_index(), 4);
        assert!(!controller.state().is_playing());
    }

    #[test]
    fn tick_while_paused_does_nothing() {
        let mut controller = controller(5);
        let outcome = controller.handle(Command::Tick);
        assert_eq!(outcome, Outcome::effect(Effect::None));
        assert_eq!(controller.state().current_index(), 0);
    }

    #[test]
    fn invalid_jump_keeps_state() {
        let mut controller = controller(3);
        controller.handle(Command::StepForward);
        let outcome = controller.handle(Command::JumpToIndex(5));
        assert_eq!(controller.state().current_index(), 1);
        assert_eq!(outcome.notice, Some(Notice::InvalidIndex));
        assert_eq!(outcome.effect, Effect::None);
    }

    #[test]
    fn quit_terminates_without_changing_state() {
        let mut controller = playing(3);
        let before = controller.state();
        assert_eq!(controller.handle(Command::Quit).effect, Effect::Terminate);
        assert_eq!(controller.state(), before);
    }

    #[test]
    fn read_failure_during_playback_is_silent() {
        let mut controller = playing(5);
        let before = controller.state();
        controller.handle(Command::Tick);
        assert_eq!(controller.read_failed(before), None);
        assert_eq!(controller.state().current_index(), 0);
        assert!(!controller.state().is_playing());
    }

    #[test]
    fn read_failure_while_paused_is_reported() {
        let mut controller = controller(5);
        controller.handle(Command::JumpToIndex(2));
        let before = controller.state();
        controller.handle(Command::StepBackward);
        assert_eq!(controller.read_failed(before), Some(Notice::ReadFailed));
        assert_eq!(controller.state(), before);
    }
}
