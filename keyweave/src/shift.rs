//! Shift overlays.
//!
//! A shift temporarily remaps keys, encoders or pointer motion while its shift
//! command is held. Several shifts can be started at once; the most recently
//! started one wins where their mappings overlap.

use heapless::Vec;

use crate::command::{CommandId, ShiftId};
use crate::keymap::{EncoderMap, Key};

/// Max number of shifts started at the same time
pub const SHIFT_MAX_ACTIVE: usize = 8;

/// When the pre-command of a shift is pressed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PreCommandTiming {
    /// As soon as the shift starts
    Immediately,
    /// Right before the first action routed through the overlay
    JustBeforeFirstAction,
    /// In place of the first action, which is swallowed
    InsteadOfFirstAction,
}

/// A command held for the lifetime of a shift, e.g. a modifier for an app switcher
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PreCommand {
    pub command: CommandId,
    pub timing: PreCommandTiming,
}

/// Keymap overlay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyShift<'a> {
    pub keys: &'a [Key],
    pub pre_command: Option<PreCommand>,
}

/// Encoder map overlay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderShift<'a> {
    pub encoders: &'a [EncoderMap],
    pub pre_command: Option<PreCommand>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PreState {
    None,
    Waiting(PreCommand),
    Pressed(CommandId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StartedShift {
    id: ShiftId,
    pre: PreState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ShiftStartError {
    AlreadyStarted,
    Full,
}

/// How to proceed with the first action routed through a shift
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FirstAction {
    Proceed,
    /// Press the pre-command, then perform the action
    PressBefore(CommandId),
    /// Press the pre-command and drop the action
    PressInstead(CommandId),
}

#[derive(Default)]
pub(crate) struct ShiftStack {
    started: Vec<StartedShift, SHIFT_MAX_ACTIVE>,
}

impl ShiftStack {
    pub(crate) fn new() -> Self {
        Self { started: Vec::new() }
    }

    pub(crate) fn is_started(&self, id: ShiftId) -> bool {
        self.started.iter().any(|s| s.id == id)
    }

    /// Push `id`, returning the pre-command to press right away.
    pub(crate) fn start(
        &mut self,
        id: ShiftId,
        pre_command: Option<PreCommand>,
    ) -> Result<Option<CommandId>, ShiftStartError> {
        if self.is_started(id) {
            return Err(ShiftStartError::AlreadyStarted);
        }
        let (pre, press_now) = match pre_command {
            Some(PreCommand {
                command,
                timing: PreCommandTiming::Immediately,
            }) => (PreState::Pressed(command), Some(command)),
            Some(pre) => (PreState::Waiting(pre), None),
            None => (PreState::None, None),
        };
        self.started.push(StartedShift { id, pre }).map_err(|_| ShiftStartError::Full)?;
        Ok(press_now)
    }

    /// Remove `id`, returning the pre-command to release if it was pressed.
    pub(crate) fn stop(&mut self, id: ShiftId) -> Option<CommandId> {
        let pos = self.started.iter().position(|s| s.id == id)?;
        match self.started.remove(pos).pre {
            PreState::Pressed(command) => Some(command),
            PreState::None | PreState::Waiting(_) => None,
        }
    }

    /// Record that an action is routed through `id`
    pub(crate) fn first_action(&mut self, id: ShiftId) -> FirstAction {
        let Some(shift) = self.started.iter_mut().find(|s| s.id == id) else {
            return FirstAction::Proceed;
        };
        match shift.pre {
            PreState::Waiting(pre) => {
                shift.pre = PreState::Pressed(pre.command);
                match pre.timing {
                    PreCommandTiming::InsteadOfFirstAction => FirstAction::PressInstead(pre.command),
                    PreCommandTiming::JustBeforeFirstAction | PreCommandTiming::Immediately => {
                        FirstAction::PressBefore(pre.command)
                    }
                }
            }
            PreState::None | PreState::Pressed(_) => FirstAction::Proceed,
        }
    }

    /// Started shifts, most recent first
    pub(crate) fn recent(&self) -> impl Iterator<Item = ShiftId> + '_ {
        self.started.iter().rev().map(|s| s.id)
    }
}

#[cfg(test)]
mod tests {
    use super::{FirstAction, PreCommand, PreCommandTiming, ShiftStack, ShiftStartError};
    use crate::command::{CommandId, ShiftId};

    const PRE: CommandId = CommandId(7);

    fn pre(timing: PreCommandTiming) -> Option<PreCommand> {
        Some(PreCommand { command: PRE, timing })
    }

    #[test]
    fn test_immediate_pre_command() {
        let mut shifts = ShiftStack::new();
        assert_eq!(shifts.start(ShiftId::Key(0), pre(PreCommandTiming::Immediately)), Ok(Some(PRE)));
        assert_eq!(shifts.first_action(ShiftId::Key(0)), FirstAction::Proceed);
        assert_eq!(shifts.stop(ShiftId::Key(0)), Some(PRE));
        assert!(!shifts.is_started(ShiftId::Key(0)));
    }

    #[test]
    fn test_deferred_pre_command() {
        let mut shifts = ShiftStack::new();
        shifts.start(ShiftId::Encoder(0), pre(PreCommandTiming::JustBeforeFirstAction)).unwrap();
        shifts.start(ShiftId::Key(1), pre(PreCommandTiming::InsteadOfFirstAction)).unwrap();
        assert_eq!(shifts.first_action(ShiftId::Encoder(0)), FirstAction::PressBefore(PRE));
        assert_eq!(shifts.first_action(ShiftId::Encoder(0)), FirstAction::Proceed);
        assert_eq!(shifts.first_action(ShiftId::Key(1)), FirstAction::PressInstead(PRE));
        assert_eq!(shifts.first_action(ShiftId::Key(1)), FirstAction::Proceed);
    }

    #[test]
    fn test_unused_pre_command_not_released() {
        let mut shifts = ShiftStack::new();
        shifts.start(ShiftId::Gesture(0), pre(PreCommandTiming::JustBeforeFirstAction)).unwrap();
        assert_eq!(shifts.stop(ShiftId::Gesture(0)), None);
        assert_eq!(shifts.stop(ShiftId::Gesture(0)), None);
    }

    #[test]
    fn test_most_recent_first() {
        let mut shifts = ShiftStack::new();
        shifts.start(ShiftId::Key(0), None).unwrap();
        shifts.start(ShiftId::Key(1), None).unwrap();
        assert_eq!(shifts.start(ShiftId::Key(0), None), Err(ShiftStartError::AlreadyStarted));
        let order: heapless::Vec<ShiftId, 4> = shifts.recent().collect();
        assert_eq!(order.as_slice(), &[ShiftId::Key(1), ShiftId::Key(0)]);
    }
}
