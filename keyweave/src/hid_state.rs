//! Reference-counted HID state.
//!
//! Every keycode, modifier bit and mouse button has a counter, so commands that
//! share an output compose: a usage is reported while any of them holds it.
//! [`HidState::flush`] compares the derived reports with the last ones sent and
//! emits only what changed.

use heapless::Vec;
use keyweave_types::keycode::HidKeyCode;
use keyweave_types::modifier::HidModifiers;
use keyweave_types::mouse_button::MouseButtons;

use crate::hid::{
    KeyboardReport, MediaKeyboardReport, MouseReport, RadialControllerReport, Report, ReportKind, ReportSink,
    SystemControlReport,
};

/// Max number of distinct keycodes tracked in press order, the report carries the first 6
pub const KEY_ORDER_MAX: usize = 16;

/// Max number of consumer or system usages held at the same time
pub const USAGE_STACK_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Motion {
    x: i32,
    y: i32,
    wheel: i32,
    pan: i32,
}

impl Motion {
    fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0 && self.wheel == 0 && self.pan == 0
    }
}

/// Modifier bits whose counter is non-zero
fn mask_of(counts: &[u8; 8]) -> HidModifiers {
    let mut bits = 0u8;
    for (i, count) in counts.iter().enumerate() {
        if *count > 0 {
            bits |= 1 << i;
        }
    }
    HidModifiers::from_bits(bits)
}

fn clamp_i8(v: i32) -> i8 {
    v.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

pub struct HidState {
    key_counts: [u8; 256],
    /// Active keycodes in press order
    key_order: Vec<u8, KEY_ORDER_MAX>,
    modifier_counts: [u8; 8],
    button_counts: [u8; MouseButtons::COUNT],
    /// One-shot modifier counters waiting for the next report that adds a key
    osm_armed: [u8; 8],
    /// One-shot modifier counters applied to the current key set
    osm_triggered: [u8; 8],
    consumer: Vec<u16, USAGE_STACK_SIZE>,
    system: Vec<u8, USAGE_STACK_SIZE>,
    radial_button: u8,
    motion: Motion,
    dial: i32,

    last_keycodes: [u8; 6],
    last_modifiers: HidModifiers,
    last_buttons: MouseButtons,
    last_consumer: u16,
    last_system: u8,
    last_radial_button: u8,
}

impl Default for HidState {
    fn default() -> Self {
        Self::new()
    }
}

impl HidState {
    pub fn new() -> Self {
        Self {
            key_counts: [0; 256],
            key_order: Vec::new(),
            modifier_counts: [0; 8],
            button_counts: [0; MouseButtons::COUNT],
            osm_armed: [0; 8],
            osm_triggered: [0; 8],
            consumer: Vec::new(),
            system: Vec::new(),
            radial_button: 0,
            motion: Motion::default(),
            dial: 0,
            last_keycodes: [0; 6],
            last_modifiers: HidModifiers::new(),
            last_buttons: MouseButtons::new(),
            last_consumer: 0,
            last_system: 0,
            last_radial_button: 0,
        }
    }

    pub fn add_key(&mut self, key: HidKeyCode) {
        if let Some(bit) = key.modifier_bit() {
            self.modifier_counts[bit as usize] = self.modifier_counts[bit as usize].saturating_add(1);
            return;
        }
        if key == HidKeyCode::No {
            return;
        }
        let code = key as u8;
        let count = &mut self.key_counts[code as usize];
        *count = count.saturating_add(1);
        if *count == 1 && self.key_order.push(code).is_err() {
            warn!("Too many keys held, {:?} is not reported", key);
        }
    }

    pub fn remove_key(&mut self, key: HidKeyCode) {
        if let Some(bit) = key.modifier_bit() {
            let count = &mut self.modifier_counts[bit as usize];
            if *count == 0 {
                debug!("Unmatched modifier release: {:?}", key);
            }
            *count = count.saturating_sub(1);
            return;
        }
        let code = key as u8;
        let count = &mut self.key_counts[code as usize];
        if *count == 0 {
            debug!("Unmatched key release: {:?}", key);
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.key_order.retain(|k| *k != code);
            self.backfill_key_order();
        }
    }

    /// Give a freed slot to keys which were held while the order list was full
    fn backfill_key_order(&mut self) {
        if self.key_order.len() + 1 < KEY_ORDER_MAX {
            return;
        }
        for code in 1..=u8::MAX {
            if self.key_counts[code as usize] > 0 && !self.key_order.contains(&code) {
                if self.key_order.push(code).is_err() {
                    return;
                }
                debug!("Reporting key {:#X} held while the key list was full", code);
            }
        }
    }

    pub fn add_modifiers(&mut self, modifiers: HidModifiers) {
        for bit in modifiers.bit_indices() {
            self.modifier_counts[bit] = self.modifier_counts[bit].saturating_add(1);
        }
    }

    pub fn remove_modifiers(&mut self, modifiers: HidModifiers) {
        for bit in modifiers.bit_indices() {
            self.modifier_counts[bit] = self.modifier_counts[bit].saturating_sub(1);
        }
    }

    /// Arm one-shot modifiers for the next report that adds a key
    pub fn arm_one_shot(&mut self, modifiers: HidModifiers) {
        for bit in modifiers.bit_indices() {
            self.osm_armed[bit] = self.osm_armed[bit].saturating_add(1);
        }
    }

    /// One-shot modifiers armed and not yet applied to a key
    pub fn armed_one_shot(&self) -> HidModifiers {
        mask_of(&self.osm_armed)
    }

    pub fn press_buttons(&mut self, buttons: MouseButtons) {
        for bit in buttons.bit_indices() {
            self.button_counts[bit] = self.button_counts[bit].saturating_add(1);
        }
    }

    pub fn release_buttons(&mut self, buttons: MouseButtons) {
        for bit in buttons.bit_indices() {
            self.button_counts[bit] = self.button_counts[bit].saturating_sub(1);
        }
    }

    pub fn press_consumer(&mut self, usage: u16) {
        if self.consumer.push(usage).is_err() {
            warn!("Consumer usage stack full, dropping {:#X}", usage);
        }
    }

    pub fn release_consumer(&mut self, usage: u16) {
        if let Some(pos) = self.consumer.iter().rposition(|u| *u == usage) {
            self.consumer.remove(pos);
        }
    }

    pub fn press_system(&mut self, usage: u8) {
        if self.system.push(usage).is_err() {
            warn!("System control stack full, dropping {:#X}", usage);
        }
    }

    pub fn release_system(&mut self, usage: u8) {
        if let Some(pos) = self.system.iter().rposition(|u| *u == usage) {
            self.system.remove(pos);
        }
    }

    pub fn press_radial_button(&mut self) {
        self.radial_button = self.radial_button.saturating_add(1);
    }

    pub fn release_radial_button(&mut self) {
        self.radial_button = self.radial_button.saturating_sub(1);
    }

    /// Accumulate relative pointer and scroll motion
    pub fn add_motion(&mut self, x: i32, y: i32, wheel: i32, pan: i32) {
        self.motion.x = self.motion.x.saturating_add(x);
        self.motion.y = self.motion.y.saturating_add(y);
        self.motion.wheel = self.motion.wheel.saturating_add(wheel);
        self.motion.pan = self.motion.pan.saturating_add(pan);
    }

    pub fn add_dial(&mut self, dial: i32) {
        self.dial = self.dial.saturating_add(dial);
    }

    /// Whether `key` is currently held by any command
    pub fn is_key_active(&self, key: HidKeyCode) -> bool {
        match key.modifier_bit() {
            Some(bit) => self.modifier_counts[bit as usize] > 0,
            None => self.key_counts[key as usize] > 0,
        }
    }

    /// Modifiers held by counters, one-shot modifiers excluded
    pub fn modifiers(&self) -> HidModifiers {
        mask_of(&self.modifier_counts)
    }

    fn buttons(&self) -> MouseButtons {
        let mut bits = 0u8;
        for (i, count) in self.button_counts.iter().enumerate() {
            if *count > 0 {
                bits |= 1 << i;
            }
        }
        MouseButtons::from_bits(bits)
    }

    fn keycodes(&self) -> [u8; 6] {
        let mut keycodes = [0; 6];
        for (slot, code) in keycodes.iter_mut().zip(self.key_order.iter()) {
            *slot = *code;
        }
        keycodes
    }

    /// Emit every report whose content changed since it was last sent
    pub fn flush<S: ReportSink + ?Sized>(&mut self, sink: &mut S) {
        self.flush_keyboard(sink);
        self.flush_mouse(sink);
        self.flush_consumer(sink);
        self.flush_system(sink);
        self.flush_radial(sink);
    }

    fn flush_keyboard<S: ReportSink + ?Sized>(&mut self, sink: &mut S) {
        let keycodes = self.keycodes();
        if !sink.is_ready(ReportKind::Keyboard) {
            if keycodes != self.last_keycodes || self.modifiers() != self.last_modifiers {
                debug!("Keyboard report skipped, transport not ready");
            }
            return;
        }

        let key_added = keycodes.iter().any(|k| *k != 0 && !self.last_keycodes.contains(k));
        if keycodes != self.last_keycodes {
            self.osm_triggered = [0; 8];
        }
        if key_added && self.osm_armed.iter().any(|c| *c > 0) {
            self.osm_triggered = self.osm_armed;
            self.osm_armed = [0; 8];
        }
        let modifiers = self.modifiers() | mask_of(&self.osm_triggered);
        if keycodes == self.last_keycodes && modifiers == self.last_modifiers {
            return;
        }

        // A key and a modifier which arrive in the same tick are split: the
        // modifier lands first with the old keys, then the key follows.
        let new_modifiers = modifiers & !self.last_modifiers;
        if key_added && !new_modifiers.is_empty() {
            sink.send(Report::KeyboardReport(KeyboardReport {
                modifier: modifiers.into_bits(),
                reserved: 0,
                leds: 0,
                keycodes: self.last_keycodes,
            }));
        }
        sink.send(Report::KeyboardReport(KeyboardReport {
            modifier: modifiers.into_bits(),
            reserved: 0,
            leds: 0,
            keycodes,
        }));
        self.last_keycodes = keycodes;
        self.last_modifiers = modifiers;
    }

    fn flush_mouse<S: ReportSink + ?Sized>(&mut self, sink: &mut S) {
        let buttons = self.buttons();
        loop {
            if buttons == self.last_buttons && self.motion.is_zero() {
                return;
            }
            if !sink.is_ready(ReportKind::Mouse) {
                trace!("Mouse transport not ready, keeping motion");
                return;
            }
            let report = MouseReport {
                buttons: buttons.into_bits(),
                x: clamp_i8(self.motion.x),
                y: clamp_i8(self.motion.y),
                wheel: clamp_i8(self.motion.wheel),
                pan: clamp_i8(self.motion.pan),
            };
            self.motion.x -= report.x as i32;
            self.motion.y -= report.y as i32;
            self.motion.wheel -= report.wheel as i32;
            self.motion.pan -= report.pan as i32;
            self.last_buttons = buttons;
            sink.send(Report::MouseReport(report));
        }
    }

    fn flush_consumer<S: ReportSink + ?Sized>(&mut self, sink: &mut S) {
        let usage = self.consumer.last().copied().unwrap_or(0);
        if usage == self.last_consumer {
            return;
        }
        if !sink.is_ready(ReportKind::Consumer) {
            debug!("Consumer report skipped, transport not ready");
            return;
        }
        sink.send(Report::MediaKeyboardReport(MediaKeyboardReport { usage_id: usage }));
        self.last_consumer = usage;
    }

    fn flush_system<S: ReportSink + ?Sized>(&mut self, sink: &mut S) {
        let usage = self.system.last().copied().unwrap_or(0);
        if usage == self.last_system {
            return;
        }
        if !sink.is_ready(ReportKind::SystemControl) {
            debug!("System control report skipped, transport not ready");
            return;
        }
        sink.send(Report::SystemControlReport(SystemControlReport { usage_id: usage }));
        self.last_system = usage;
    }

    fn flush_radial<S: ReportSink + ?Sized>(&mut self, sink: &mut S) {
        let button = u8::from(self.radial_button > 0);
        if button == self.last_radial_button && self.dial == 0 {
            return;
        }
        if !sink.is_ready(ReportKind::RadialController) {
            trace!("Radial controller transport not ready, keeping dial");
            return;
        }
        let dial = self.dial.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        self.dial -= dial as i32;
        self.last_radial_button = button;
        sink.send(Report::RadialControllerReport(RadialControllerReport { button, dial }));
    }
}

#[cfg(test)]
mod tests {
    use keyweave_types::keycode::{ConsumerKey, HidKeyCode};
    use keyweave_types::modifier::HidModifiers;
    use keyweave_types::mouse_button::MouseButtons;

    use super::{HidState, KEY_ORDER_MAX};
    use crate::hid::{Report, ReportKind, ReportSink};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Keyboard(u8, [u8; 6]),
        Mouse(u8, i8, i8),
        Consumer(u16),
        Radial(u8, i16),
        Other,
    }

    #[derive(Default)]
    struct TestSink {
        sent: std::vec::Vec<Sent>,
        mouse_ready: bool,
        keyboard_blocked: bool,
    }

    impl ReportSink for TestSink {
        fn is_ready(&self, kind: ReportKind) -> bool {
            match kind {
                ReportKind::Mouse => self.mouse_ready,
                ReportKind::Keyboard => !self.keyboard_blocked,
                _ => true,
            }
        }

        fn send(&mut self, report: Report) {
            self.sent.push(match report {
                Report::KeyboardReport(r) => Sent::Keyboard(r.modifier, r.keycodes),
                Report::MouseReport(r) => Sent::Mouse(r.buttons, r.x, r.y),
                Report::MediaKeyboardReport(r) => Sent::Consumer(r.usage_id),
                Report::RadialControllerReport(r) => Sent::Radial(r.button, r.dial),
                Report::SystemControlReport(_) => Sent::Other,
            });
        }
    }

    fn sink() -> TestSink {
        TestSink {
            mouse_ready: true,
            ..Default::default()
        }
    }

    const A: u8 = HidKeyCode::A as u8;
    const B: u8 = HidKeyCode::B as u8;

    #[test]
    fn test_shared_keycode_is_reference_counted() {
        let mut state = HidState::new();
        let mut sink = sink();
        state.add_key(HidKeyCode::A);
        state.flush(&mut sink);
        state.add_key(HidKeyCode::A);
        state.flush(&mut sink);
        state.remove_key(HidKeyCode::A);
        state.flush(&mut sink);
        assert_eq!(sink.sent, [Sent::Keyboard(0, [A, 0, 0, 0, 0, 0])]);
        state.remove_key(HidKeyCode::A);
        state.remove_key(HidKeyCode::A);
        state.flush(&mut sink);
        assert_eq!(sink.sent.last(), Some(&Sent::Keyboard(0, [0; 6])));
        assert!(!state.is_key_active(HidKeyCode::A));
    }

    #[test]
    fn test_key_and_modifier_in_one_tick_split() {
        let mut state = HidState::new();
        let mut sink = sink();
        state.add_key(HidKeyCode::B);
        state.flush(&mut sink);
        state.add_modifiers(HidModifiers::LSHIFT);
        state.add_key(HidKeyCode::A);
        state.flush(&mut sink);
        let shift = HidModifiers::LSHIFT.into_bits();
        assert_eq!(
            sink.sent,
            [
                Sent::Keyboard(0, [B, 0, 0, 0, 0, 0]),
                Sent::Keyboard(shift, [B, 0, 0, 0, 0, 0]),
                Sent::Keyboard(shift, [B, A, 0, 0, 0, 0]),
            ]
        );
    }

    #[test]
    fn test_one_shot_applies_to_next_key_only() {
        let mut state = HidState::new();
        let mut sink = sink();
        state.arm_one_shot(HidModifiers::LSHIFT);
        state.flush(&mut sink);
        assert!(sink.sent.is_empty());

        state.add_key(HidKeyCode::A);
        state.flush(&mut sink);
        state.remove_key(HidKeyCode::A);
        state.flush(&mut sink);
        state.add_key(HidKeyCode::B);
        state.flush(&mut sink);
        let shift = HidModifiers::LSHIFT.into_bits();
        assert_eq!(
            sink.sent,
            [
                Sent::Keyboard(shift, [0; 6]),
                Sent::Keyboard(shift, [A, 0, 0, 0, 0, 0]),
                Sent::Keyboard(0, [0; 6]),
                Sent::Keyboard(0, [B, 0, 0, 0, 0, 0]),
            ]
        );
    }

    #[test]
    fn test_overlapping_one_shots_share_the_next_key() {
        let mut state = HidState::new();
        let mut sink = sink();
        state.arm_one_shot(HidModifiers::LSHIFT);
        state.arm_one_shot(HidModifiers::LSHIFT | HidModifiers::LCTRL);
        assert_eq!(state.armed_one_shot(), HidModifiers::LSHIFT | HidModifiers::LCTRL);

        state.add_key(HidKeyCode::A);
        state.flush(&mut sink);
        assert!(state.armed_one_shot().is_empty());
        state.remove_key(HidKeyCode::A);
        state.add_key(HidKeyCode::B);
        state.flush(&mut sink);
        let both = (HidModifiers::LSHIFT | HidModifiers::LCTRL).into_bits();
        assert_eq!(
            sink.sent,
            [
                Sent::Keyboard(both, [0; 6]),
                Sent::Keyboard(both, [A, 0, 0, 0, 0, 0]),
                Sent::Keyboard(0, [B, 0, 0, 0, 0, 0]),
            ]
        );
    }

    #[test]
    fn test_key_held_past_order_capacity_is_reported_later() {
        let mut state = HidState::new();
        let mut sink = sink();
        let first = HidKeyCode::A as u8;
        for code in first..first + KEY_ORDER_MAX as u8 {
            state.add_key(HidKeyCode::from(code));
        }
        state.add_key(HidKeyCode::Z);
        state.flush(&mut sink);

        for code in first..first + KEY_ORDER_MAX as u8 {
            state.remove_key(HidKeyCode::from(code));
        }
        state.flush(&mut sink);
        assert!(state.is_key_active(HidKeyCode::Z));
        assert_eq!(
            sink.sent.last(),
            Some(&Sent::Keyboard(0, [HidKeyCode::Z as u8, 0, 0, 0, 0, 0]))
        );
    }

    #[test]
    fn test_keyboard_not_ready_skips_without_losing_state() {
        let mut state = HidState::new();
        let mut sink = sink();
        sink.keyboard_blocked = true;
        state.add_key(HidKeyCode::A);
        state.flush(&mut sink);
        assert!(sink.sent.is_empty());
        sink.keyboard_blocked = false;
        state.flush(&mut sink);
        assert_eq!(sink.sent, [Sent::Keyboard(0, [A, 0, 0, 0, 0, 0])]);
    }

    #[test]
    fn test_mouse_motion_waits_for_ready_and_splits() {
        let mut state = HidState::new();
        let mut sink = TestSink::default();
        state.add_motion(200, -3, 0, 0);
        state.flush(&mut sink);
        assert!(sink.sent.is_empty());
        sink.mouse_ready = true;
        state.flush(&mut sink);
        assert_eq!(sink.sent, [Sent::Mouse(0, 127, -3), Sent::Mouse(0, 73, 0)]);

        state.press_buttons(MouseButtons::LEFT);
        state.flush(&mut sink);
        state.release_buttons(MouseButtons::LEFT);
        state.release_buttons(MouseButtons::LEFT);
        state.flush(&mut sink);
        assert_eq!(sink.sent[2..], [Sent::Mouse(1, 0, 0), Sent::Mouse(0, 0, 0)]);
    }

    #[test]
    fn test_consumer_reports_latest_active_usage() {
        let mut state = HidState::new();
        let mut sink = sink();
        state.press_consumer(ConsumerKey::Mute.usage());
        state.press_consumer(ConsumerKey::PlayPause.usage());
        state.flush(&mut sink);
        state.release_consumer(ConsumerKey::PlayPause.usage());
        state.flush(&mut sink);
        state.release_consumer(ConsumerKey::Mute.usage());
        state.flush(&mut sink);
        assert_eq!(
            sink.sent,
            [
                Sent::Consumer(ConsumerKey::PlayPause.usage()),
                Sent::Consumer(ConsumerKey::Mute.usage()),
                Sent::Consumer(0),
            ]
        );
    }

    #[test]
    fn test_radial_dial_and_button() {
        let mut state = HidState::new();
        let mut sink = sink();
        state.press_radial_button();
        state.add_dial(-30);
        state.flush(&mut sink);
        state.flush(&mut sink);
        state.release_radial_button();
        state.flush(&mut sink);
        assert_eq!(sink.sent, [Sent::Radial(1, -30), Sent::Radial(0, 0)]);
    }
}
