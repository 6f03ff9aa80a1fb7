use embassy_time::Instant;

use super::Engine;
use crate::command::CommandId;
use crate::hid::ReportSink;
use crate::listener::{Listener, ListenerKind, Signal};
use crate::tap_dance::{TapDance, TapDanceState, TapDanceTransition};
use crate::timer::TimerOwner;

const SIGNALS: [Signal; 3] = [
    Signal::BeforeOtherCommandPress,
    Signal::BeforeMovePointer,
    Signal::BeforeRotateEncoder,
];

impl<'a, S: ReportSink> Engine<'a, S> {
    fn tap_dance(&self, index: u8) -> Option<&'a TapDance<'a>> {
        let tap_dances: &'a [TapDance<'a>] = self.keymap.tap_dances;
        if index as usize >= self.tap_dances.len() {
            return None;
        }
        tap_dances.get(index as usize)
    }

    pub(super) fn tap_dance_press(&mut self, index: u8, owner: CommandId, now: Instant) {
        let Some(dance) = self.tap_dance(index) else {
            warn!("Tap dance {} is not configured", index);
            return;
        };
        let transition = self.tap_dances[index as usize].on_press(dance);
        self.apply_tap_dance(index, Some(owner), dance, transition, now);
    }

    pub(super) fn tap_dance_release(&mut self, index: u8, now: Instant) {
        let Some(dance) = self.tap_dance(index) else {
            return;
        };
        let transition = self.tap_dances[index as usize].on_release(dance);
        self.apply_tap_dance(index, None, dance, transition, now);
    }

    /// Tapping term expired or something else happened: resolve now
    pub(super) fn tap_dance_decide(&mut self, index: u8, now: Instant) {
        let Some(dance) = self.tap_dance(index) else {
            return;
        };
        let transition = self.tap_dances[index as usize].on_decide(dance);
        self.apply_tap_dance(index, None, dance, transition, now);
    }

    pub(super) fn tap_dance_move(&mut self, index: u8, device: u8, dx: i16, dy: i16, now: Instant) {
        let threshold = self.config.tap_dance.move_threshold;
        let Some(runtime) = self.tap_dances.get_mut(index as usize) else {
            return;
        };
        if matches!(
            runtime.state,
            TapDanceState::Pressed | TapDanceState::TapOrNextCommand
        ) && runtime.add_movement(device, dx, dy, threshold)
        {
            debug!("Pointer moved past threshold, resolving tap dance {}", index);
            self.tap_dance_decide(index, now);
        }
    }

    fn apply_tap_dance(
        &mut self,
        index: u8,
        owner: Option<CommandId>,
        dance: &TapDance<'_>,
        transition: TapDanceTransition,
        now: Instant,
    ) {
        trace!("Tap dance {}: {:?}", index, transition);
        match transition {
            TapDanceTransition::Wait { first } => {
                if first {
                    if let Some(owner) = owner {
                        self.listen_tap_dance(index, owner);
                    }
                }
                let term = dance.term.unwrap_or(self.config.tap_dance.default_term);
                if let Err(e) = self.timers.schedule(TimerOwner::TapDance(index), now + term) {
                    error!("Can't schedule tapping term of tap dance {}: {:?}", index, e);
                }
            }
            TapDanceTransition::Hold(command) => {
                self.stop_tap_dance_wait(index);
                self.press_command(command, 1, now);
            }
            TapDanceTransition::Tap(command) => {
                self.stop_tap_dance_wait(index);
                self.enqueue_tap(command, 1, now);
            }
            TapDanceTransition::ReleaseHold(command) => {
                self.release_command(command, now);
            }
            TapDanceTransition::Ignore => {}
        }
    }

    fn listen_tap_dance(&mut self, index: u8, owner: CommandId) {
        let listener = Listener {
            kind: ListenerKind::TapDance(index),
            owner,
        };
        for signal in SIGNALS {
            if let Err(e) = self.listeners.subscribe(signal, listener) {
                warn!("Tap dance {} can't listen to {:?}: {:?}", index, signal, e);
            }
        }
    }

    fn stop_tap_dance_wait(&mut self, index: u8) {
        self.timers.cancel(TimerOwner::TapDance(index));
        for signal in SIGNALS {
            self.listeners.unsubscribe(signal, ListenerKind::TapDance(index));
        }
    }
}
