use embassy_time::Instant;

use super::Engine;
use crate::command::ShiftId;
use crate::gesture::Gesture;
use crate::hid::ReportSink;

impl<'a, S: ReportSink> Engine<'a, S> {
    /// Most recently started gesture consuming motion of `device`
    fn active_gesture(&self, device: u8) -> Option<(u8, &'a Gesture)> {
        let gestures: &'a [Gesture] = self.keymap.gestures;
        let tracked = self.gestures.len();
        self.shifts.recent().find_map(|shift| match shift {
            ShiftId::Gesture(i) if (i as usize) < tracked => gestures
                .get(i as usize)
                .filter(|g| g.device == device)
                .map(|g| (i, g)),
            _ => None,
        })
    }

    /// Feed motion into the active gesture of `device`.
    ///
    /// Returns `false` if no gesture is active and the motion is left to the cursor.
    pub(super) fn gesture_move(&mut self, device: u8, dx: i16, dy: i16, now: Instant) -> bool {
        let Some((index, gesture)) = self.active_gesture(device) else {
            return false;
        };
        let fired = self.gestures[index as usize].accumulate(gesture, dx, dy);
        for (direction, times) in fired {
            let Some(command) = gesture.command(direction) else {
                trace!("Gesture {} has no command for {:?}", index, direction);
                continue;
            };
            debug!("Gesture {} fired {:?} x{}", index, direction, times);
            if let Some(command) = self.route_through_shift(ShiftId::Gesture(index), command, now) {
                self.enqueue_tap(command, times, now);
            }
        }
        true
    }
}
