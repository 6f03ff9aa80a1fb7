use embassy_time::Instant;

use super::Engine;
use crate::combo::{Combo, ComboTransition};
use crate::event::KeyId;
use crate::hid::ReportSink;
use crate::listener::{Listener, ListenerKind, Signal};
use crate::timer::TimerOwner;

const SIGNALS: [Signal; 2] = [Signal::BeforeMovePointer, Signal::BeforeRotateEncoder];

impl<'a, S: ReportSink> Engine<'a, S> {
    /// Combos the engine tracks, extras beyond the runtime capacity are ignored
    fn tracked_combos(&self) -> &'a [Combo] {
        let combos: &'a [Combo] = self.keymap.combos;
        &combos[..combos.len().min(self.combos.len())]
    }

    pub(super) fn combo_key_press(&mut self, id: KeyId, now: Instant) {
        for (index, combo) in self.tracked_combos().iter().enumerate() {
            let transition = self.combos[index].on_key_press(combo, id);
            self.apply_combo(index as u8, combo, transition, now);
        }
    }

    pub(super) fn combo_key_release(&mut self, id: KeyId, now: Instant) {
        for (index, combo) in self.tracked_combos().iter().enumerate() {
            let transition = self.combos[index].on_key_release(combo, id);
            self.apply_combo(index as u8, combo, transition, now);
        }
    }

    /// Term expiry or unrelated input while partially matched
    pub(super) fn combo_interrupt(&mut self, index: u8, now: Instant) {
        let Some(combo) = self.tracked_combos().get(index as usize) else {
            return;
        };
        let transition = self.combos[index as usize].on_interrupt();
        self.apply_combo(index, combo, transition, now);
    }

    pub(super) fn combo_move(&mut self, index: u8, dx: i16, dy: i16, now: Instant) {
        let threshold = self.config.combo.move_interrupt_threshold;
        if dx.unsigned_abs() > threshold || dy.unsigned_abs() > threshold {
            debug!("Pointer moved, interrupting combo {}", index);
            self.combo_interrupt(index, now);
        }
    }

    fn apply_combo(&mut self, index: u8, combo: &Combo, transition: ComboTransition, now: Instant) {
        match transition {
            ComboTransition::StartTerm => {
                let listener = Listener {
                    kind: ListenerKind::Combo(index),
                    owner: combo.command,
                };
                for signal in SIGNALS {
                    if let Err(e) = self.listeners.subscribe(signal, listener) {
                        warn!("Combo {} can't listen to {:?}: {:?}", index, signal, e);
                    }
                }
                let term = combo.term.unwrap_or(self.config.combo.default_term);
                if let Err(e) = self.timers.schedule(TimerOwner::Combo(index), now + term) {
                    error!("Can't schedule term of combo {}: {:?}", index, e);
                }
            }
            ComboTransition::Abort => {
                debug!("Combo {} aborted", index);
                self.stop_combo_wait(index);
            }
            ComboTransition::Fire => {
                debug!("Combo {} matched", index);
                self.stop_combo_wait(index);
                self.press_command(combo.command, 1, now);
            }
            ComboTransition::Release => {
                self.release_command(combo.command, now);
            }
            ComboTransition::None => {}
        }
    }

    fn stop_combo_wait(&mut self, index: u8) {
        self.timers.cancel(TimerOwner::Combo(index));
        for signal in SIGNALS {
            self.listeners.unsubscribe(signal, ListenerKind::Combo(index));
        }
    }
}
