//! Tap dance / hold-tap.
//!
//! A tap dance is an ordered list of `(hold, tap)` pairs. Each press within the
//! tapping term advances to the next pair; the dance resolves to the current
//! pair's tap on the final release, or to its hold when the term expires or
//! unrelated input arrives while the key is down.

use embassy_time::Duration;

use crate::command::CommandId;
use crate::MAX_POINTING_DEVICES;

/// Max number of tap dances in a keymap
pub const TAP_DANCE_MAX_NUM: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TapDancePair {
    pub hold: CommandId,
    /// Falls back to `hold` when absent
    pub tap: Option<CommandId>,
}

impl TapDancePair {
    pub const fn new(hold: CommandId, tap: CommandId) -> Self {
        Self { hold, tap: Some(tap) }
    }

    pub const fn hold_only(hold: CommandId) -> Self {
        Self { hold, tap: None }
    }

    fn tap_or_hold(&self) -> CommandId {
        self.tap.unwrap_or(self.hold)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TapDance<'a> {
    pub pairs: &'a [TapDancePair],
    /// Tapping term, `TapDanceConfig::default_term` when `None`
    pub term: Option<Duration>,
}

impl<'a> TapDance<'a> {
    pub const fn new(pairs: &'a [TapDancePair]) -> Self {
        Self { pairs, term: None }
    }

    pub const fn with_term(self, term: Duration) -> Self {
        Self {
            pairs: self.pairs,
            term: Some(term),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TapDanceState {
    #[default]
    Unexecuted,
    Pressed,
    /// Released before the term, waiting for the next press or the term
    TapOrNextCommand,
    DecidedToHold,
}

/// What the engine has to do after a tap dance transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TapDanceTransition {
    /// (Re)start the tapping term; `first` when the dance just began
    Wait { first: bool },
    /// Press the hold command and keep it until release
    Hold(CommandId),
    /// Resolved: tap this command once
    Tap(CommandId),
    /// Release the held command
    ReleaseHold(CommandId),
    Ignore,
}

/// Runtime state of one tap dance
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct TapDanceRuntime {
    pub(crate) state: TapDanceState,
    /// Number of presses in this dance, the current pair is `presses - 1`
    presses: u8,
    held: Option<CommandId>,
    movement: [(i16, i16); MAX_POINTING_DEVICES],
}

impl TapDanceRuntime {
    fn current_pair<'d>(&self, dance: &'d TapDance<'_>) -> Option<&'d TapDancePair> {
        dance.pairs.get(self.presses.saturating_sub(1) as usize)
    }

    fn reset(&mut self) {
        self.state = TapDanceState::Unexecuted;
        self.presses = 0;
        self.held = None;
    }

    pub(crate) fn on_press(&mut self, dance: &TapDance<'_>) -> TapDanceTransition {
        if dance.pairs.is_empty() {
            return TapDanceTransition::Ignore;
        }
        match self.state {
            TapDanceState::Unexecuted => {
                self.presses = 1;
                self.movement = [(0, 0); MAX_POINTING_DEVICES];
                self.state = TapDanceState::Pressed;
                TapDanceTransition::Wait { first: true }
            }
            TapDanceState::TapOrNextCommand => {
                if (self.presses as usize) < dance.pairs.len() {
                    self.presses += 1;
                }
                self.state = TapDanceState::Pressed;
                TapDanceTransition::Wait { first: false }
            }
            TapDanceState::Pressed | TapDanceState::DecidedToHold => TapDanceTransition::Ignore,
        }
    }

    pub(crate) fn on_release(&mut self, dance: &TapDance<'_>) -> TapDanceTransition {
        match self.state {
            TapDanceState::Pressed => {
                if self.presses as usize >= dance.pairs.len() {
                    let pair = self.current_pair(dance).map(|p| p.tap_or_hold());
                    self.reset();
                    pair.map_or(TapDanceTransition::Ignore, TapDanceTransition::Tap)
                } else {
                    self.state = TapDanceState::TapOrNextCommand;
                    TapDanceTransition::Wait { first: false }
                }
            }
            TapDanceState::DecidedToHold => {
                let held = self.held;
                self.reset();
                held.map_or(TapDanceTransition::Ignore, TapDanceTransition::ReleaseHold)
            }
            TapDanceState::Unexecuted | TapDanceState::TapOrNextCommand => TapDanceTransition::Ignore,
        }
    }

    /// Term expiry or an interruption
    pub(crate) fn on_decide(&mut self, dance: &TapDance<'_>) -> TapDanceTransition {
        match self.state {
            TapDanceState::Pressed => match self.current_pair(dance) {
                Some(pair) => {
                    self.state = TapDanceState::DecidedToHold;
                    self.held = Some(pair.hold);
                    TapDanceTransition::Hold(pair.hold)
                }
                None => {
                    self.reset();
                    TapDanceTransition::Ignore
                }
            },
            TapDanceState::TapOrNextCommand => {
                let pair = self.current_pair(dance).map(|p| p.tap_or_hold());
                self.reset();
                pair.map_or(TapDanceTransition::Ignore, TapDanceTransition::Tap)
            }
            TapDanceState::Unexecuted | TapDanceState::DecidedToHold => TapDanceTransition::Ignore,
        }
    }

    /// Accumulate pointer motion, returns `true` once either axis reaches `threshold`
    pub(crate) fn add_movement(&mut self, device: u8, dx: i16, dy: i16, threshold: u16) -> bool {
        let Some((x, y)) = self.movement.get_mut(device as usize) else {
            debug!("Pointing device {} out of range for tap dance movement", device);
            return false;
        };
        *x = x.saturating_add(dx);
        *y = y.saturating_add(dy);
        x.unsigned_abs() >= threshold || y.unsigned_abs() >= threshold
    }
}
