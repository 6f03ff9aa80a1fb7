//! Command lifecycle: press/release routing, hooks and the per-kind handlers.

use embassy_time::Instant;

use super::Engine;
use crate::command::{root_of, CommandId, CommandKind, CommandSlot, CommandState};
use crate::hid::ReportSink;
use crate::listener::{ListenerKind, Signal};

fn scale_i8(value: i8, times: u8) -> i32 {
    (value as i32 * times as i32).clamp(i8::MIN as i32, i8::MAX as i32)
}

impl<'a, S: ReportSink> Engine<'a, S> {
    fn kind_of(&self, id: CommandId) -> Option<CommandKind<'a>> {
        let commands: &'a [_] = self.keymap.commands;
        commands.get(id.index()).map(|c| c.kind)
    }

    /// Press `id` unless it is already down.
    ///
    /// Listeners of other roots hear about the press before the command's
    /// own handler runs. A hook claiming `id` takes the press instead.
    pub(super) fn press_command(&mut self, id: CommandId, times: u8, now: Instant) {
        let Some(kind) = self.kind_of(id) else {
            warn!("Press of unknown command {:?}", id);
            return;
        };
        let Some(slot) = self.slots.get(id.index()).copied() else {
            warn!("Command {:?} is beyond the command capacity", id);
            return;
        };
        if slot.state != CommandState::Released {
            trace!("Command {:?} already pressed", id);
            return;
        }
        let times = times.max(1);

        if let Some(owner) = self.hooks.claimant(id) {
            self.hooked_press(owner, id, times, now);
            return;
        }

        self.slots[id.index()].state = CommandState::Notified;
        self.notify_before_press(id, now);
        self.slots[id.index()].times = times;
        self.on_press(id, kind, times, now);
        self.slots[id.index()].state = CommandState::Pressed;
    }

    /// Release `id`, returning how many repeats its press satisfied.
    pub(super) fn release_command(&mut self, id: CommandId, now: Instant) -> u8 {
        let Some(kind) = self.kind_of(id) else {
            warn!("Release of unknown command {:?}", id);
            return 0;
        };
        let Some(slot) = self.slots.get(id.index()).copied() else {
            return 0;
        };
        match slot.state {
            CommandState::Released => {
                trace!("Command {:?} already released", id);
                return 0;
            }
            CommandState::Notified => {
                debug!("Release of {:?} while its press is being broadcast, ignored", id);
                return 0;
            }
            CommandState::Pressed => {}
        }
        // Reset first, the handlers below may press this command again
        self.slots[id.index()] = CommandSlot::default();

        if slot.hooked {
            let consumed = slot.delegate.map_or(1, |d| self.release_command(d, now));
            if let Some(owner) = self.hooks.claimant(id) {
                self.hooks.end_hook(owner);
            }
            return consumed;
        }
        self.on_release(id, kind, slot, now)
    }

    fn hooked_press(&mut self, owner: CommandId, target: CommandId, times: u8, now: Instant) {
        let Some(CommandKind::Intercept { replacement, .. }) = self.kind_of(owner) else {
            warn!("Hook owner {:?} is not an intercept, dropping its claim", owner);
            self.hooks.end_hook(owner);
            return;
        };
        debug!("Press of {:?} routed to {:?} by hook {:?}", target, replacement, owner);
        self.slots[target.index()] = CommandSlot {
            state: CommandState::Pressed,
            delegate: Some(replacement),
            times,
            hooked: true,
        };
        self.press_command(replacement, times, now);
    }

    /// Combos learn about other keys by key id, only tap dances listen here.
    fn notify_before_press(&mut self, id: CommandId, now: Instant) {
        let commands = self.keymap.commands;
        let root = root_of(commands, id);
        let tap_was_in_flight = self.tap_in_flight.is_some();
        for listener in self.listeners.snapshot(Signal::BeforeOtherCommandPress) {
            // An earlier handler may have resolved this listener already
            if !self.listeners.is_subscribed(Signal::BeforeOtherCommandPress, listener.kind) {
                continue;
            }
            if root_of(commands, listener.owner) == root {
                continue;
            }
            if let ListenerKind::TapDance(index) = listener.kind {
                self.tap_dance_decide(index, now);
            }
        }
        // A tap resolved by this press goes out before the press itself
        if !tap_was_in_flight && self.tap_in_flight.is_some() {
            self.finish_tap(now);
        }
    }

    fn on_press(&mut self, id: CommandId, kind: CommandKind<'a>, times: u8, now: Instant) {
        match kind {
            CommandKind::Key(key) => self.hid.add_key(key),
            CommandKind::KeyWithModifiers(key, modifiers) => {
                self.hid.add_modifiers(modifiers);
                self.hid.add_key(key);
            }
            CommandKind::Modifier(modifiers) => self.hid.add_modifiers(modifiers),
            CommandKind::OneShotModifier(modifiers) => self.hid.arm_one_shot(modifiers),
            CommandKind::Consumer(key) => self.hid.press_consumer(key.usage()),
            CommandKind::SystemControl(key) => self.hid.press_system(key.usage()),
            CommandKind::MouseButton(buttons) => self.hid.press_buttons(buttons),
            CommandKind::MouseMove { x, y } => self.hid.add_motion(scale_i8(x, times), scale_i8(y, times), 0, 0),
            CommandKind::MouseScroll { wheel, pan } => {
                self.hid
                    .add_motion(0, 0, scale_i8(wheel, times), scale_i8(pan, times))
            }
            CommandKind::RadialButton => self.hid.press_radial_button(),
            CommandKind::Dial(step) => self
                .hid
                .add_dial((step as i32 * times as i32).clamp(i16::MIN as i32, i16::MAX as i32)),
            CommandKind::LayerHold(layer) => self.activate_layer(layer),
            CommandKind::LayerToggle(layer) => self.toggle_layer(layer),
            CommandKind::Layering(layers) => self.press_layering(id, layers, times, now),
            CommandKind::TapDance(index) => self.tap_dance_press(index, id, now),
            CommandKind::Shift(shift) => self.start_shift(shift, now),
            CommandKind::Multi(children) => {
                for child in children {
                    self.press_command(*child, times, now);
                }
            }
            CommandKind::Intercept { target, .. } => {
                if let Err(e) = self.hooks.start_hook(id, target) {
                    warn!("Intercept {:?} can't claim {:?}: {:?}", id, target, e);
                }
            }
            CommandKind::NoOp => {}
        }
    }

    fn on_release(&mut self, id: CommandId, kind: CommandKind<'a>, slot: CommandSlot, now: Instant) -> u8 {
        match kind {
            CommandKind::Key(key) => self.hid.remove_key(key),
            CommandKind::KeyWithModifiers(key, modifiers) => {
                self.hid.remove_key(key);
                self.hid.remove_modifiers(modifiers);
            }
            CommandKind::Modifier(modifiers) => self.hid.remove_modifiers(modifiers),
            CommandKind::Consumer(key) => self.hid.release_consumer(key.usage()),
            CommandKind::SystemControl(key) => self.hid.release_system(key.usage()),
            CommandKind::MouseButton(buttons) => self.hid.release_buttons(buttons),
            CommandKind::MouseMove { .. } | CommandKind::MouseScroll { .. } | CommandKind::Dial(_) => {
                return slot.times;
            }
            CommandKind::RadialButton => self.hid.release_radial_button(),
            CommandKind::LayerHold(layer) => self.deactivate_layer(layer),
            CommandKind::Layering(_) => {
                if let Some(delegate) = slot.delegate {
                    self.release_command(delegate, now);
                }
            }
            CommandKind::TapDance(index) => self.tap_dance_release(index, now),
            CommandKind::Shift(shift) => self.stop_shift(shift, now),
            CommandKind::Multi(children) => {
                for child in children.iter().rev() {
                    self.release_command(*child, now);
                }
            }
            CommandKind::Intercept { target, .. } => {
                // An unused claim ends with the intercept, a used one ends with the target
                let target_hooked = self.slots.get(target.index()).is_some_and(|s| s.hooked);
                if !target_hooked {
                    self.hooks.end_hook(id);
                }
            }
            CommandKind::OneShotModifier(_) | CommandKind::LayerToggle(_) | CommandKind::NoOp => {}
        }
        1
    }
}
