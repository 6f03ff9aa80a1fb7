use embassy_time::Instant;

use super::Engine;
use crate::hid::ReportSink;
use crate::listener::{ListenerKind, Signal};

impl<S: ReportSink> Engine<'_, S> {
    /// Listeners see the motion first, then an active gesture consumes it,
    /// otherwise it moves the cursor.
    pub(super) fn move_pointer(&mut self, device: u8, dx: i16, dy: i16, now: Instant) {
        for listener in self.listeners.snapshot(Signal::BeforeMovePointer) {
            if !self.listeners.is_subscribed(Signal::BeforeMovePointer, listener.kind) {
                continue;
            }
            match listener.kind {
                ListenerKind::TapDance(index) => self.tap_dance_move(index, device, dx, dy, now),
                ListenerKind::Combo(index) => self.combo_move(index, dx, dy, now),
            }
        }

        if self.gesture_move(device, dx, dy, now) {
            return;
        }
        self.forward_motion(device, dx, dy);
    }

    /// Scale motion by the pointer config and hand it to the mouse report
    fn forward_motion(&mut self, device: u8, dx: i16, dy: i16) {
        let numerator = self.config.pointer.scale_numerator as i32;
        let denominator = self.config.pointer.scale_denominator as i32;
        if denominator == 0 {
            warn!("Pointer scale denominator is 0, dropping motion");
            return;
        }
        let (rx, ry) = self
            .pointer_remainder
            .get(device as usize)
            .copied()
            .unwrap_or((0, 0));
        let total_x = dx as i32 * numerator + rx;
        let total_y = dy as i32 * numerator + ry;
        let (x, y) = (total_x / denominator, total_y / denominator);
        if let Some(remainder) = self.pointer_remainder.get_mut(device as usize) {
            *remainder = (total_x - x * denominator, total_y - y * denominator);
        }
        if x != 0 || y != 0 {
            self.hid.add_motion(x, y, 0, 0);
        }
    }
}
