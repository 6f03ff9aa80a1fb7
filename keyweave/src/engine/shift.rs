use embassy_time::Instant;

use super::Engine;
use crate::command::{CommandId, ShiftId};
use crate::event::KeyId;
use crate::hid::ReportSink;
use crate::shift::{FirstAction, PreCommand};

impl<'a, S: ReportSink> Engine<'a, S> {
    fn pre_command_of(&self, shift: ShiftId) -> Option<Option<PreCommand>> {
        match shift {
            ShiftId::Key(i) => self.keymap.key_shifts.get(i as usize).map(|s| s.pre_command),
            ShiftId::Encoder(i) => self.keymap.encoder_shifts.get(i as usize).map(|s| s.pre_command),
            ShiftId::Gesture(i) => {
                if i as usize >= self.gestures.len() {
                    return None;
                }
                self.keymap.gestures.get(i as usize).map(|g| g.pre_command)
            }
        }
    }

    pub(super) fn start_shift(&mut self, shift: ShiftId, now: Instant) {
        let Some(pre_command) = self.pre_command_of(shift) else {
            warn!("Shift {:?} is not configured", shift);
            return;
        };
        match self.shifts.start(shift, pre_command) {
            Ok(press_now) => {
                debug!("Shift {:?} started", shift);
                if let ShiftId::Gesture(i) = shift {
                    self.gestures[i as usize].reset();
                }
                if let Some(command) = press_now {
                    self.press_command(command, 1, now);
                }
            }
            Err(e) => warn!("Shift {:?} not started: {:?}", shift, e),
        }
    }

    pub(super) fn stop_shift(&mut self, shift: ShiftId, now: Instant) {
        if !self.shifts.is_started(shift) {
            return;
        }
        debug!("Shift {:?} stopped", shift);
        if let Some(command) = self.shifts.stop(shift) {
            self.release_command(command, now);
        }
        if let ShiftId::Gesture(i) = shift {
            if let Some(gesture) = self.gestures.get_mut(i as usize) {
                gesture.reset();
            }
        }
    }

    /// Command a key id maps to: the most recently started key shift that
    /// maps it, else the base keymap.
    pub(super) fn resolve_key(&mut self, id: KeyId, now: Instant) -> Option<CommandId> {
        let key_shifts = self.keymap.key_shifts;
        let shifted = self.shifts.recent().find_map(|shift| match shift {
            ShiftId::Key(i) => key_shifts
                .get(i as usize)?
                .keys
                .iter()
                .find(|k| k.id == id)
                .map(|k| (shift, k.command)),
            ShiftId::Encoder(_) | ShiftId::Gesture(_) => None,
        });
        match shifted {
            Some((shift, command)) => self.route_through_shift(shift, command, now),
            None => self.keymap.key(id),
        }
    }

    /// Apply the pre-command policy of `shift` to an action resolved through it.
    ///
    /// Returns `None` when the action is swallowed.
    pub(super) fn route_through_shift(&mut self, shift: ShiftId, command: CommandId, now: Instant) -> Option<CommandId> {
        match self.shifts.first_action(shift) {
            FirstAction::Proceed => Some(command),
            FirstAction::PressBefore(pre) => {
                self.press_command(pre, 1, now);
                Some(command)
            }
            FirstAction::PressInstead(pre) => {
                debug!("First action of {:?} replaced by its pre-command", shift);
                self.press_command(pre, 1, now);
                None
            }
        }
    }
}
