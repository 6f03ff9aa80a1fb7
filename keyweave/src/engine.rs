//! The engine context and its dispatcher.
//!
//! [`Engine`] owns every piece of mutable state: command lifecycles, the layer
//! bitmap, started shifts, tap dance / combo / gesture runtimes, the timer pool
//! and the HID counters. The only way in is [`Engine::process`] (plus the
//! direct press/release helpers); each call applies one event, drains the
//! follow-up events it produced and flushes HID reports.
//!
//! The engine doesn't read a clock, the caller passes `now` into every call.

mod combo;
mod command;
mod encoder;
mod gesture;
mod layer;
mod pointer;
mod shift;
mod tap_dance;
mod tap_queue;

use embassy_time::Instant;
use heapless::Deque;

use crate::combo::{ComboRuntime, ComboState, COMBO_MAX_NUM};
use crate::command::{CommandId, CommandSlot, CommandState, ShiftId, COMMAND_MAX_NUM};
use crate::config::EngineConfig;
use crate::event::{EngineEvent, KeyId, KeySet};
use crate::gesture::{GestureRuntime, GESTURE_MAX_NUM};
use crate::hid::ReportSink;
use crate::hid_state::HidState;
use crate::hook::HookTable;
use crate::keymap::Keymap;
use crate::listener::ListenerRegistry;
use crate::shift::ShiftStack;
use crate::tap_dance::{TapDanceRuntime, TapDanceState, TAP_DANCE_MAX_NUM};
use crate::timer::{TimerOwner, TimerPool};
use crate::{ENCODER_MAX_NUM, MAX_POINTING_DEVICES, TAP_QUEUE_SIZE};

/// Capacity of the follow-up event queue
const UNPROCESSED_EVENTS_SIZE: usize = 16;

/// A tap waiting in the tap queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct QueuedTap {
    command: CommandId,
    times: u8,
}

/// The tap whose press half was sent and whose release is pending
#[derive(Clone, Copy, Debug)]
struct InFlightTap {
    tap: QueuedTap,
    /// `false` if the command was already held, so the tap must not release it
    pressed: bool,
}

pub struct Engine<'a, S: ReportSink> {
    keymap: Keymap<'a>,
    config: EngineConfig,
    sink: S,
    slots: [CommandSlot; COMMAND_MAX_NUM],
    hooks: HookTable,
    listeners: ListenerRegistry,
    timers: TimerPool,
    hid: HidState,
    /// Active layers, bit 0 is the base layer and always set
    layers: u32,
    /// Key ids of the last applied key set
    keys: KeySet,
    /// Command each pressed key id resolved to, released as-is
    key_commands: [Option<CommandId>; 256],
    tap_dances: [TapDanceRuntime; TAP_DANCE_MAX_NUM],
    combos: [ComboRuntime; COMBO_MAX_NUM],
    gestures: [GestureRuntime; GESTURE_MAX_NUM],
    shifts: ShiftStack,
    encoder_steps: [i16; ENCODER_MAX_NUM],
    /// Division remainder of scaled pointer motion, per device
    pointer_remainder: [(i32, i32); MAX_POINTING_DEVICES],
    tap_queue: Deque<QueuedTap, TAP_QUEUE_SIZE>,
    tap_in_flight: Option<InFlightTap>,
    /// A tap was just released, the next one starts after that report is out
    tap_start_pending: bool,
    /// Events produced while processing, handled before the next external event
    unprocessed_events: Deque<EngineEvent, UNPROCESSED_EVENTS_SIZE>,
}

impl<'a, S: ReportSink> Engine<'a, S> {
    pub fn new(keymap: Keymap<'a>, config: EngineConfig, sink: S) -> Self {
        if keymap.commands.len() > COMMAND_MAX_NUM {
            warn!(
                "{} commands configured, only the first {} are usable",
                keymap.commands.len(),
                COMMAND_MAX_NUM
            );
        }
        if keymap.tap_dances.len() > TAP_DANCE_MAX_NUM
            || keymap.combos.len() > COMBO_MAX_NUM
            || keymap.gestures.len() > GESTURE_MAX_NUM
        {
            warn!("Keymap has more tap dances, combos or gestures than the engine tracks, extras are ignored");
        }

        Self {
            keymap,
            config,
            sink,
            slots: [CommandSlot::default(); COMMAND_MAX_NUM],
            hooks: HookTable::new(),
            listeners: ListenerRegistry::new(),
            timers: TimerPool::new(),
            hid: HidState::new(),
            layers: 1,
            keys: KeySet::new(),
            key_commands: [None; 256],
            tap_dances: [TapDanceRuntime::default(); TAP_DANCE_MAX_NUM],
            combos: [ComboRuntime::default(); COMBO_MAX_NUM],
            gestures: [GestureRuntime::default(); GESTURE_MAX_NUM],
            shifts: ShiftStack::new(),
            encoder_steps: [0; ENCODER_MAX_NUM],
            pointer_remainder: [(0, 0); MAX_POINTING_DEVICES],
            tap_queue: Deque::new(),
            tap_in_flight: None,
            tap_start_pending: false,
            unprocessed_events: Deque::new(),
        }
    }

    /// Apply one event, then every follow-up event it caused.
    ///
    /// HID reports are flushed after each of them, so a tap's press and
    /// release end up in separate reports.
    pub fn process(&mut self, event: EngineEvent, now: Instant) {
        self.dispatch(event, now);
        self.settle(now);
    }

    /// Fire every timer whose deadline has passed
    pub fn poll_timers(&mut self, now: Instant) {
        while let Some((owner, generation)) = self.timers.take_expired(now) {
            self.process(EngineEvent::Timer { owner, generation }, now);
        }
    }

    /// Earliest deadline the caller has to wake up for
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Retry reports held back while the transport wasn't ready
    pub fn flush_pending(&mut self) {
        self.hid.flush(&mut self.sink);
    }

    /// Press a command directly, as a key bound to it would
    pub fn press(&mut self, id: CommandId, times: u8, now: Instant) {
        self.press_command(id, times, now);
        self.settle(now);
    }

    /// Release a command directly, returns the number of repeats its press satisfied
    pub fn release(&mut self, id: CommandId, now: Instant) -> u8 {
        let consumed = self.release_command(id, now);
        self.settle(now);
        consumed
    }

    pub fn command_state(&self, id: CommandId) -> CommandState {
        self.slots.get(id.index()).map_or(CommandState::Released, |s| s.state)
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub fn tap_dance_state(&self, index: u8) -> Option<TapDanceState> {
        self.tap_dances.get(index as usize).map(|t| t.state)
    }

    pub fn combo_state(&self, index: u8) -> Option<ComboState> {
        self.combos.get(index as usize).map(|c| c.state)
    }

    pub fn is_shift_started(&self, shift: ShiftId) -> bool {
        self.shifts.is_started(shift)
    }

    pub fn hid(&self) -> &HidState {
        &self.hid
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn keymap(&self) -> &Keymap<'a> {
        &self.keymap
    }

    fn settle(&mut self, now: Instant) {
        self.hid.flush(&mut self.sink);
        // Process events produced while handling the last one
        while let Some(event) = self.unprocessed_events.pop_front() {
            self.dispatch(event, now);
            self.hid.flush(&mut self.sink);
        }
    }

    fn dispatch(&mut self, event: EngineEvent, now: Instant) {
        trace!("Processing {:?}", event);
        match event {
            EngineEvent::ApplyKeySet(keys) => self.apply_key_set(keys, now),
            EngineEvent::MovePointer { device, dx, dy } => self.move_pointer(device, dx, dy, now),
            EngineEvent::RotateEncoder { id, step } => self.rotate_encoder(id, step, now),
            EngineEvent::Timer { owner, generation } => self.fire_timer(owner, generation, now),
            EngineEvent::TapCompletion => self.complete_tap(now),
        }
    }

    fn push_unprocessed(&mut self, event: EngineEvent) {
        if self.unprocessed_events.push_back(event).is_err() {
            error!("Unprocessed event queue full, dropping {:?}", event);
        }
    }

    /// Diff against the previous key set: releases first, then presses, each in
    /// ascending id order. The keymap sees every change before the combos do.
    fn apply_key_set(&mut self, keys: KeySet, now: Instant) {
        let previous = self.keys;
        self.keys = keys;

        for id in previous.difference(&keys) {
            self.release_key(id, now);
        }
        for id in previous.difference(&keys) {
            self.combo_key_release(id, now);
        }
        for id in keys.difference(&previous) {
            self.press_key(id, now);
        }
        for id in keys.difference(&previous) {
            self.combo_key_press(id, now);
        }
    }

    fn press_key(&mut self, id: KeyId, now: Instant) {
        let Some(command) = self.resolve_key(id, now) else {
            trace!("Key {} has no command", id);
            return;
        };
        self.key_commands[id as usize] = Some(command);
        self.press_command(command, 1, now);
    }

    fn release_key(&mut self, id: KeyId, now: Instant) {
        if let Some(command) = self.key_commands[id as usize].take() {
            self.release_command(command, now);
        }
    }

    fn fire_timer(&mut self, owner: TimerOwner, generation: u32, now: Instant) {
        if !self.timers.accept(owner, generation) {
            debug!("Discarding stale timer {:?}, generation {}", owner, generation);
            return;
        }
        match owner {
            TimerOwner::TapDance(index) => self.tap_dance_decide(index, now),
            TimerOwner::Combo(index) => self.combo_interrupt(index, now),
        }
    }
}
