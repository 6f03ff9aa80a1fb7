//! Queued taps.
//!
//! A tap is a press followed by a release in a later report. Taps from
//! different sources (tap dances, gestures, encoders) are serialized in arrival
//! order: the next one starts only after the previous release was reported.

use embassy_time::Instant;

use super::{Engine, InFlightTap, QueuedTap};
use crate::command::{CommandId, CommandState};
use crate::event::EngineEvent;
use crate::hid::ReportSink;

impl<S: ReportSink> Engine<'_, S> {
    pub(super) fn enqueue_tap(&mut self, command: CommandId, times: u8, now: Instant) {
        if times == 0 {
            return;
        }
        if self.tap_queue.push_back(QueuedTap { command, times }).is_err() {
            warn!("Tap queue full, dropping tap of {:?}", command);
            return;
        }
        if self.tap_in_flight.is_none() && !self.tap_start_pending {
            self.start_next_tap(now);
        }
    }

    fn start_next_tap(&mut self, now: Instant) {
        let Some(tap) = self.tap_queue.pop_front() else {
            return;
        };
        let pressed = self.command_state(tap.command) == CommandState::Released;
        self.tap_in_flight = Some(InFlightTap { tap, pressed });
        if pressed {
            self.press_command(tap.command, tap.times, now);
        } else {
            debug!("Tap of {:?} skipped, the command is already held", tap.command);
        }
        self.push_unprocessed(EngineEvent::TapCompletion);
    }

    /// Release the in-flight tap. The next tap starts on the following completion.
    pub(super) fn complete_tap(&mut self, now: Instant) {
        let Some(in_flight) = self.tap_in_flight.take() else {
            self.tap_start_pending = false;
            self.start_next_tap(now);
            return;
        };
        self.release_tap(in_flight, now);
        if !self.tap_queue.is_empty() && !self.tap_start_pending {
            self.tap_start_pending = true;
            self.push_unprocessed(EngineEvent::TapCompletion);
        }
    }

    /// Send both halves of the in-flight tap right away.
    ///
    /// Used when another command is about to go down, so its press can't share
    /// a report with the tap. The completion queued with the tap then starts
    /// the next one.
    pub(super) fn finish_tap(&mut self, now: Instant) {
        let Some(in_flight) = self.tap_in_flight.take() else {
            return;
        };
        self.hid.flush(&mut self.sink);
        self.release_tap(in_flight, now);
        self.hid.flush(&mut self.sink);
        self.tap_start_pending = true;
    }

    fn release_tap(&mut self, in_flight: InFlightTap, now: Instant) {
        let consumed = if in_flight.pressed {
            self.release_command(in_flight.tap.command, now).max(1)
        } else {
            1
        };
        let remaining = in_flight.tap.times.saturating_sub(consumed);
        if remaining > 0 {
            let rest = QueuedTap {
                command: in_flight.tap.command,
                times: remaining,
            };
            if self.tap_queue.push_front(rest).is_err() {
                warn!("Tap queue full, dropping {} repeats of {:?}", remaining, rest.command);
            }
        }
    }
}
