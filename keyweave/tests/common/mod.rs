#![allow(dead_code)]

pub mod test_macro;

use embassy_time::{Duration, Instant};
use keyweave::combo::Combo;
use keyweave::command::{CommandDef, CommandId, CommandKind, ShiftId};
use keyweave::config::EngineConfig;
use keyweave::engine::Engine;
use keyweave::event::{EngineEvent, KeyId};
use keyweave::gesture::Gesture;
use keyweave::hid::{Report, ReportKind, ReportSink};
use keyweave::input::KeySetTracker;
use keyweave::keymap::{EncoderMap, Key, Keymap};
use keyweave::shift::{EncoderShift, KeyShift, PreCommand, PreCommandTiming};
use keyweave::tap_dance::{TapDance, TapDancePair};
use keyweave::types::keycode::{ConsumerKey, HidKeyCode};
use keyweave::types::modifier::HidModifiers;

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub(crate) const KC_LSHIFT: u8 = 1 << 1;
pub(crate) const KC_LCTRL: u8 = 1 << 0;
pub(crate) const KC_LGUI: u8 = 1 << 3;

/// Everything the engine sent, with the usbd-hid structs flattened for comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sent {
    Keyboard(u8, [u8; 6]),
    Mouse { buttons: u8, x: i8, y: i8, wheel: i8, pan: i8 },
    Consumer(u16),
    System(u8),
    Radial(u8, i16),
}

#[derive(Default)]
pub struct RecordingSink {
    pub reports: Vec<Sent>,
    /// Report kinds the transport refuses
    pub not_ready: Vec<ReportKind>,
}

impl ReportSink for RecordingSink {
    fn is_ready(&self, kind: ReportKind) -> bool {
        !self.not_ready.contains(&kind)
    }

    fn send(&mut self, report: Report) {
        let sent = match report {
            Report::KeyboardReport(r) => Sent::Keyboard(r.modifier, r.keycodes),
            Report::MouseReport(r) => Sent::Mouse {
                buttons: r.buttons,
                x: r.x,
                y: r.y,
                wheel: r.wheel,
                pan: r.pan,
            },
            Report::MediaKeyboardReport(r) => Sent::Consumer(r.usage_id),
            Report::SystemControlReport(r) => Sent::System(r.usage_id),
            Report::RadialControllerReport(r) => Sent::Radial(r.button, r.dial),
        };
        self.reports.push(sent);
    }
}

#[derive(Debug, Clone)]
pub struct TestKeyPress {
    pub id: KeyId,
    pub pressed: bool,
    pub delay: u64, // Delay before this key event in milliseconds
}

/// An engine driven by a simulated millisecond clock
pub struct TestEngine {
    pub engine: Engine<'static, RecordingSink>,
    tracker: KeySetTracker,
    now: u64,
}

impl TestEngine {
    pub fn new(keymap: Keymap<'static>) -> Self {
        Self::with_config(keymap, EngineConfig::default())
    }

    pub fn with_config(keymap: Keymap<'static>, config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(keymap, config, RecordingSink::default()),
            tracker: KeySetTracker::new(),
            now: 0,
        }
    }

    pub fn now(&self) -> Instant {
        Instant::from_millis(self.now)
    }

    /// Move the clock forward, firing timers at their own deadlines
    pub fn advance(&mut self, ms: u64) {
        let target = self.now + ms;
        while let Some(deadline) = self.engine.next_deadline() {
            if deadline.as_millis() > target {
                break;
            }
            self.now = self.now.max(deadline.as_millis());
            self.engine.poll_timers(self.now());
        }
        self.now = target;
    }

    pub fn key(&mut self, id: KeyId, pressed: bool) {
        if let Some(event) = self.tracker.key_changed(id, pressed) {
            self.engine.process(event, self.now());
        }
    }

    pub fn press(&mut self, id: KeyId) {
        self.key(id, true);
    }

    pub fn release(&mut self, id: KeyId) {
        self.key(id, false);
    }

    pub fn move_pointer(&mut self, device: u8, dx: i16, dy: i16) {
        self.engine
            .process(EngineEvent::MovePointer { device, dx, dy }, self.now());
    }

    pub fn rotate(&mut self, id: u8, step: i8) {
        self.engine.process(EngineEvent::RotateEncoder { id, step }, self.now());
    }

    pub fn run(&mut self, sequence: &[TestKeyPress]) {
        for key in sequence {
            self.advance(key.delay);
            self.key(key.id, key.pressed);
        }
    }

    pub fn reports(&self) -> &[Sent] {
        &self.engine.sink().reports
    }

    pub fn keyboard_reports(&self) -> Vec<(u8, [u8; 6])> {
        self.reports()
            .iter()
            .filter_map(|r| match r {
                Sent::Keyboard(modifier, keys) => Some((*modifier, *keys)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_reports(&mut self) {
        self.engine.sink_mut().reports.clear();
    }
}

// Run a key sequence and compare the keyboard reports it produced
pub fn run_key_sequence_test(engine: &mut TestEngine, key_sequence: &[TestKeyPress], expected: &[(u8, [u8; 6])]) {
    engine.run(key_sequence);
    // Let every pending term expire
    engine.advance(1000);
    let reports = engine.keyboard_reports();
    for (i, (expected, actual)) in expected.iter().zip(reports.iter()).enumerate() {
        assert_eq!(expected, actual, "on #{} reports, expected left but actually right", i);
    }
    assert_eq!(
        expected.len(),
        reports.len(),
        "report count differs, all reports: {:?}",
        reports
    );
}

pub const fn kc(key: HidKeyCode) -> u8 {
    key as u8
}

pub const fn keys1(key: HidKeyCode) -> [u8; 6] {
    [key as u8, 0, 0, 0, 0, 0]
}

pub const EMPTY: [u8; 6] = [0; 6];

// Command ids of the shared test keymap
pub const A: CommandId = CommandId(0);
pub const B: CommandId = CommandId(1);
pub const C: CommandId = CommandId(2);
pub const LSHIFT: CommandId = CommandId(3);
pub const TD_A_SHIFT: CommandId = CommandId(4);
pub const LAYERING_AB: CommandId = CommandId(5);
pub const MO1: CommandId = CommandId(6);
pub const L: CommandId = CommandId(7);
pub const GESTURE_SHIFT: CommandId = CommandId(8);
pub const A_AGAIN: CommandId = CommandId(9);
pub const LCTRL: CommandId = CommandId(10);
pub const VOLUME_UP: CommandId = CommandId(11);
pub const VOLUME_DOWN: CommandId = CommandId(12);
pub const X: CommandId = CommandId(13);
pub const KEY_SHIFT: CommandId = CommandId(14);
pub const INTERCEPT_A: CommandId = CommandId(15);
pub const OSM_SHIFT: CommandId = CommandId(16);
pub const SHIFTED_A: CommandId = CommandId(17);
pub const MOUSE_RIGHT: CommandId = CommandId(18);
pub const ENCODER_SHIFT: CommandId = CommandId(19);
pub const KC1: CommandId = CommandId(20);
pub const TD_TWO_WAY: CommandId = CommandId(21);
pub const LGUI: CommandId = CommandId(22);
pub const H: CommandId = CommandId(23);
pub const Z: CommandId = CommandId(24);
pub const TG2: CommandId = CommandId(25);
pub const LAYERING_TRANSPARENT: CommandId = CommandId(26);

#[rustfmt::skip]
pub static COMMANDS: [CommandDef<'static>; 27] = [
    CommandDef::new(CommandKind::Key(HidKeyCode::A)),
    CommandDef::new(CommandKind::Key(HidKeyCode::B)),
    CommandDef::new(CommandKind::Key(HidKeyCode::C)),
    CommandDef::new(CommandKind::Modifier(HidModifiers::LSHIFT)),
    CommandDef::new(CommandKind::TapDance(0)),
    CommandDef::new(CommandKind::Layering(&[Some(A), Some(B)])),
    CommandDef::new(CommandKind::LayerHold(1)),
    CommandDef::new(CommandKind::Key(HidKeyCode::L)),
    CommandDef::new(CommandKind::Shift(ShiftId::Gesture(0))),
    CommandDef::new(CommandKind::Key(HidKeyCode::A)),
    CommandDef::new(CommandKind::Modifier(HidModifiers::LCTRL)),
    CommandDef::new(CommandKind::Consumer(ConsumerKey::VolumeIncrement)),
    CommandDef::new(CommandKind::Consumer(ConsumerKey::VolumeDecrement)),
    CommandDef::new(CommandKind::Key(HidKeyCode::X)),
    CommandDef::new(CommandKind::Shift(ShiftId::Key(0))),
    CommandDef::new(CommandKind::Intercept { target: A, replacement: B }),
    CommandDef::new(CommandKind::OneShotModifier(HidModifiers::LSHIFT)),
    CommandDef::new(CommandKind::KeyWithModifiers(HidKeyCode::A, HidModifiers::LSHIFT)),
    CommandDef::new(CommandKind::MouseMove { x: 10, y: 0 }),
    CommandDef::new(CommandKind::Shift(ShiftId::Encoder(0))),
    CommandDef::new(CommandKind::Key(HidKeyCode::Kc1)),
    CommandDef::new(CommandKind::TapDance(1)),
    CommandDef::new(CommandKind::Modifier(HidModifiers::LGUI)),
    CommandDef::new(CommandKind::Key(HidKeyCode::H)),
    CommandDef::new(CommandKind::Key(HidKeyCode::Z)),
    CommandDef::new(CommandKind::LayerToggle(2)),
    CommandDef::new(CommandKind::Layering(&[Some(A), Some(B), None])),
];

// Key ids of the shared test keymap
pub const KEY_A: KeyId = 0;
pub const KEY_B: KeyId = 1;
pub const KEY_TD: KeyId = 2;
pub const KEY_LAYERING: KeyId = 3;
pub const KEY_MO1: KeyId = 4;
pub const KEY_GESTURE: KeyId = 5;
pub const KEY_A_AGAIN: KeyId = 6;
pub const KEY_SHIFT_OVERLAY: KeyId = 7;
pub const KEY_INTERCEPT: KeyId = 8;
pub const KEY_OSM: KeyId = 9;
pub const KEY_SHIFTED_A: KeyId = 10;
pub const KEY_ENCODER_SHIFT: KeyId = 11;
pub const KEY_TD_TWO_WAY: KeyId = 12;
pub const KEY_LSHIFT: KeyId = 13;
pub const KEY_TG2: KeyId = 14;
pub const KEY_LAYERING_TRANSPARENT: KeyId = 15;
// Combo-only key ids, they have no keymap entry
pub const KEY_COMBO_1: KeyId = 20;
pub const KEY_COMBO_2: KeyId = 21;
pub const KEY_ORDERED_1: KeyId = 22;
pub const KEY_ORDERED_2: KeyId = 23;

pub static KEYS: [Key; 16] = [
    Key::new(KEY_A, A),
    Key::new(KEY_B, B),
    Key::new(KEY_TD, TD_A_SHIFT),
    Key::new(KEY_LAYERING, LAYERING_AB),
    Key::new(KEY_MO1, MO1),
    Key::new(KEY_GESTURE, GESTURE_SHIFT),
    Key::new(KEY_A_AGAIN, A_AGAIN),
    Key::new(KEY_SHIFT_OVERLAY, KEY_SHIFT),
    Key::new(KEY_INTERCEPT, INTERCEPT_A),
    Key::new(KEY_OSM, OSM_SHIFT),
    Key::new(KEY_SHIFTED_A, SHIFTED_A),
    Key::new(KEY_ENCODER_SHIFT, ENCODER_SHIFT),
    Key::new(KEY_TD_TWO_WAY, TD_TWO_WAY),
    Key::new(KEY_LSHIFT, LSHIFT),
    Key::new(KEY_TG2, TG2),
    Key::new(KEY_LAYERING_TRANSPARENT, LAYERING_TRANSPARENT),
];

pub static TAP_DANCES: [TapDance<'static>; 2] = [
    TapDance::new(&[TapDancePair::new(LSHIFT, A)]).with_term(Duration::from_millis(200)),
    TapDance::new(&[TapDancePair::new(LSHIFT, A), TapDancePair::new(LCTRL, B)]),
];

pub static COMBOS: [Combo; 2] = [
    Combo::new(KEY_COMBO_1, KEY_COMBO_2, Z),
    Combo::new(KEY_ORDERED_1, KEY_ORDERED_2, C).in_order().with_fast_release(),
];

pub static GESTURES: [Gesture; 1] = [Gesture {
    angle_snap: true,
    right: Some(L),
    left: Some(H),
    ..Gesture::new(0, 20)
}];

pub static ENCODERS: [EncoderMap; 1] = [EncoderMap::new(0, VOLUME_UP, VOLUME_DOWN).with_resolution(2)];

pub static KEY_SHIFTS: [KeyShift<'static>; 1] = [KeyShift {
    keys: &[Key::new(KEY_A, X)],
    pre_command: None,
}];

pub static ENCODER_SHIFTS: [EncoderShift<'static>; 1] = [EncoderShift {
    encoders: &[EncoderMap::new(0, L, KC1)],
    pre_command: Some(PreCommand {
        command: LGUI,
        timing: PreCommandTiming::JustBeforeFirstAction,
    }),
}];

pub fn test_keymap() -> Keymap<'static> {
    Keymap {
        combos: &COMBOS,
        gestures: &GESTURES,
        encoders: &ENCODERS,
        key_shifts: &KEY_SHIFTS,
        encoder_shifts: &ENCODER_SHIFTS,
        tap_dances: &TAP_DANCES,
        ..Keymap::new(&COMMANDS, &KEYS)
    }
}

pub fn create_test_engine() -> TestEngine {
    TestEngine::new(test_keymap())
}
