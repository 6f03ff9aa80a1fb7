use embassy_time::Instant;

use super::Engine;
use crate::command::ShiftId;
use crate::hid::ReportSink;
use crate::keymap::EncoderMap;
use crate::listener::{ListenerKind, Signal};

impl<'a, S: ReportSink> Engine<'a, S> {
    /// Encoder map of `id`: the most recently started encoder shift mapping it, else the base map
    fn resolve_encoder(&self, id: u8) -> Option<(Option<ShiftId>, &'a EncoderMap)> {
        let encoder_shifts = self.keymap.encoder_shifts;
        let shifted = self.shifts.recent().find_map(|shift| match shift {
            ShiftId::Encoder(i) => encoder_shifts
                .get(i as usize)?
                .encoders
                .iter()
                .find(|e| e.id == id)
                .map(|e| (Some(shift), e)),
            ShiftId::Key(_) | ShiftId::Gesture(_) => None,
        });
        shifted.or_else(|| self.keymap.encoder(id).map(|e| (None, e)))
    }

    pub(super) fn rotate_encoder(&mut self, id: u8, step: i8, now: Instant) {
        for listener in self.listeners.snapshot(Signal::BeforeRotateEncoder) {
            if !self.listeners.is_subscribed(Signal::BeforeRotateEncoder, listener.kind) {
                continue;
            }
            match listener.kind {
                ListenerKind::TapDance(index) => self.tap_dance_decide(index, now),
                ListenerKind::Combo(index) => self.combo_interrupt(index, now),
            }
        }

        let Some((shift, encoder)) = self.resolve_encoder(id) else {
            debug!("Encoder {} has no mapping", id);
            return;
        };
        let resolution = match encoder.resolution {
            0 => self.config.encoder.default_resolution.max(1),
            r => r,
        } as i16;
        let Some(steps) = self.encoder_steps.get_mut(id as usize) else {
            warn!("Encoder id {} out of range", id);
            return;
        };
        *steps = steps.saturating_add(step as i16);
        let times = *steps / resolution;
        *steps -= times * resolution;
        if times == 0 {
            return;
        }

        let command = if times > 0 {
            encoder.clockwise
        } else {
            encoder.counter_clockwise
        };
        let Some(command) = command else {
            return;
        };
        let command = match shift {
            Some(shift) => match self.route_through_shift(shift, command, now) {
                Some(command) => command,
                None => return,
            },
            None => command,
        };
        self.enqueue_tap(command, times.unsigned_abs().min(u8::MAX as u16) as u8, now);
    }
}
