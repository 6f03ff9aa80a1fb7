//! Two-key combos.
//!
//! A combo fires its command when both of its key ids are pressed within the
//! combo term. After firing it stays matched until the keys are released and
//! only re-arms once both are up. A partial match is aborted by the term, by
//! releasing the pressed key, or by unrelated input.

use embassy_time::Duration;

use crate::command::CommandId;
use crate::event::KeyId;

/// Max number of combos in a keymap
pub const COMBO_MAX_NUM: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Combo {
    pub first: KeyId,
    pub second: KeyId,
    pub command: CommandId,
    /// Combo term, `ComboConfig::default_term` when `None`
    pub term: Option<Duration>,
    /// Match either press order, otherwise `first` must be pressed first
    pub any_order: bool,
    /// Release the command on the first key release instead of waiting for both
    pub fast_release: bool,
}

impl Combo {
    pub const fn new(first: KeyId, second: KeyId, command: CommandId) -> Self {
        Self {
            first,
            second,
            command,
            term: None,
            any_order: true,
            fast_release: false,
        }
    }

    pub const fn with_term(mut self, term: Duration) -> Self {
        self.term = Some(term);
        self
    }

    pub const fn in_order(mut self) -> Self {
        self.any_order = false;
        self
    }

    pub const fn with_fast_release(mut self) -> Self {
        self.fast_release = true;
        self
    }

    fn contains(&self, id: KeyId) -> bool {
        id == self.first || id == self.second
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComboState {
    #[default]
    Idle,
    /// One key is down, waiting for the other
    Partial { pressed: KeyId },
    /// Fired, the command is pressed
    Matched { first_held: bool, second_held: bool },
    /// Released early, waiting for the remaining key before re-arming
    WaitingRearm { first_held: bool, second_held: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ComboTransition {
    /// Partial match began, start the term and listen for interruptions
    StartTerm,
    /// Partial match dropped without firing
    Abort,
    /// Press the combo command
    Fire,
    /// Release the combo command
    Release,
    None,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ComboRuntime {
    pub(crate) state: ComboState,
}

impl ComboRuntime {
    pub(crate) fn on_key_press(&mut self, combo: &Combo, id: KeyId) -> ComboTransition {
        match self.state {
            ComboState::Idle => {
                if id == combo.first || (combo.any_order && id == combo.second) {
                    self.state = ComboState::Partial { pressed: id };
                    ComboTransition::StartTerm
                } else {
                    ComboTransition::None
                }
            }
            ComboState::Partial { pressed } => {
                let other = if pressed == combo.first { combo.second } else { combo.first };
                if id == other {
                    self.state = ComboState::Matched {
                        first_held: true,
                        second_held: true,
                    };
                    ComboTransition::Fire
                } else if id == pressed {
                    ComboTransition::None
                } else {
                    self.state = ComboState::Idle;
                    ComboTransition::Abort
                }
            }
            ComboState::Matched { .. } | ComboState::WaitingRearm { .. } => ComboTransition::None,
        }
    }

    pub(crate) fn on_key_release(&mut self, combo: &Combo, id: KeyId) -> ComboTransition {
        if !combo.contains(id) {
            return ComboTransition::None;
        }
        match self.state {
            ComboState::Idle => ComboTransition::None,
            ComboState::Partial { pressed } => {
                if id == pressed {
                    self.state = ComboState::Idle;
                    ComboTransition::Abort
                } else {
                    ComboTransition::None
                }
            }
            ComboState::Matched {
                mut first_held,
                mut second_held,
            } => {
                if id == combo.first {
                    first_held = false;
                }
                if id == combo.second {
                    second_held = false;
                }
                let all_up = !first_held && !second_held;
                if combo.fast_release {
                    self.state = if all_up {
                        ComboState::Idle
                    } else {
                        ComboState::WaitingRearm {
                            first_held,
                            second_held,
                        }
                    };
                    ComboTransition::Release
                } else if all_up {
                    self.state = ComboState::Idle;
                    ComboTransition::Release
                } else {
                    self.state = ComboState::Matched {
                        first_held,
                        second_held,
                    };
                    ComboTransition::None
                }
            }
            ComboState::WaitingRearm {
                mut first_held,
                mut second_held,
            } => {
                if id == combo.first {
                    first_held = false;
                }
                if id == combo.second {
                    second_held = false;
                }
                self.state = if !first_held && !second_held {
                    ComboState::Idle
                } else {
                    ComboState::WaitingRearm {
                        first_held,
                        second_held,
                    }
                };
                ComboTransition::None
            }
        }
    }

    /// Term expiry or unrelated input
    pub(crate) fn on_interrupt(&mut self) -> ComboTransition {
        match self.state {
            ComboState::Partial { .. } => {
                self.state = ComboState::Idle;
                ComboTransition::Abort
            }
            _ => ComboTransition::None,
        }
    }
}
