//! Commands: the press/release units everything in the keymap resolves to.
//!
//! All commands are declared once in a flat table and referenced by
//! [`CommandId`]. A command may name a parent, and the topmost ancestor is its
//! root; commands sharing a root never interrupt each other.

use keyweave_types::keycode::{ConsumerKey, HidKeyCode, SystemControlKey};
use keyweave_types::modifier::HidModifiers;
use keyweave_types::mouse_button::MouseButtons;

/// Max number of commands in a keymap
pub const COMMAND_MAX_NUM: usize = 256;

/// Parent links longer than this are treated as a configuration loop
pub(crate) const MAX_PARENT_DEPTH: usize = 16;

/// Index into the command table
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandId(pub u16);

impl CommandId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which overlay a shift command starts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShiftId {
    /// Index into `Keymap::key_shifts`
    Key(u8),
    /// Index into `Keymap::encoder_shifts`
    Encoder(u8),
    /// Index into `Keymap::gestures`
    Gesture(u8),
}

/// What a command does when pressed and released
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind<'a> {
    /// Keyboard usage, modifier usages go to the modifier byte
    Key(HidKeyCode),
    /// Keyboard usage together with modifiers, both land in the same report tick
    KeyWithModifiers(HidKeyCode, HidModifiers),
    Modifier(HidModifiers),
    /// Modifiers applied to the next report that adds a key
    OneShotModifier(HidModifiers),
    Consumer(ConsumerKey),
    SystemControl(SystemControlKey),
    MouseButton(MouseButtons),
    /// Relative pointer move, scaled by the number of repeats
    MouseMove { x: i8, y: i8 },
    /// Relative scroll, scaled by the number of repeats
    MouseScroll { wheel: i8, pan: i8 },
    /// The radial controller button
    RadialButton,
    /// Radial controller rotation, scaled by the number of repeats
    Dial(i16),
    /// Activate a layer while held
    LayerHold(u8),
    /// Flip a layer on press
    LayerToggle(u8),
    /// One command per layer, `None` is transparent
    Layering(&'a [Option<CommandId>]),
    /// Index into `Keymap::tap_dances`
    TapDance(u8),
    /// Start the overlay while held
    Shift(ShiftId),
    /// Press all children in order, release them in reverse
    Multi(&'a [CommandId]),
    /// Route the next press/release cycle of `target` to `replacement`
    Intercept { target: CommandId, replacement: CommandId },
    NoOp,
}

impl CommandKind<'_> {
    /// Repeat-producing commands satisfy several logical repeats with one report
    pub fn is_repeat(&self) -> bool {
        matches!(
            self,
            CommandKind::MouseMove { .. } | CommandKind::MouseScroll { .. } | CommandKind::Dial(_)
        )
    }
}

/// A command declaration in the keymap
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandDef<'a> {
    pub kind: CommandKind<'a>,
    pub parent: Option<CommandId>,
}

impl<'a> CommandDef<'a> {
    pub const fn new(kind: CommandKind<'a>) -> Self {
        Self { kind, parent: None }
    }

    pub const fn with_parent(self, parent: CommandId) -> Self {
        Self {
            kind: self.kind,
            parent: Some(parent),
        }
    }
}

/// Root of `id`: follow parent links to the top.
pub(crate) fn root_of(commands: &[CommandDef<'_>], id: CommandId) -> CommandId {
    let mut current = id;
    for _ in 0..MAX_PARENT_DEPTH {
        match commands.get(current.index()).and_then(|c| c.parent) {
            Some(parent) if parent != current => current = parent,
            _ => return current,
        }
    }
    warn!("Parent chain of {:?} is too deep, using {:?} as root", id, current);
    current
}

/// Lifecycle of a command
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandState {
    /// Press is being broadcast to listeners, `on_press` hasn't run yet
    Notified,
    Pressed,
    #[default]
    Released,
}

/// Runtime state of one command
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CommandSlot {
    pub(crate) state: CommandState,
    /// Command the press was delegated to, released instead of re-resolving
    pub(crate) delegate: Option<CommandId>,
    /// Number of repeats the press satisfied
    pub(crate) times: u8,
    /// The press was routed to a hook
    pub(crate) hooked: bool,
}
