//! Static configuration tables.
//!
//! A [`Keymap`] borrows every table for the lifetime of the engine and is never
//! mutated after startup. Commands are referenced by index from all other tables.

use crate::command::{CommandDef, CommandId, CommandKind, ShiftId, COMMAND_MAX_NUM};
use crate::combo::{Combo, COMBO_MAX_NUM};
use crate::event::KeyId;
use crate::gesture::{Gesture, GESTURE_MAX_NUM};
use crate::shift::{EncoderShift, KeyShift, PreCommand};
use crate::tap_dance::{TapDance, TAP_DANCE_MAX_NUM};
use crate::ENCODER_MAX_NUM;

/// A physical key bound to a command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Key {
    pub id: KeyId,
    pub command: CommandId,
}

impl Key {
    pub const fn new(id: KeyId, command: CommandId) -> Self {
        Self { id, command }
    }
}

/// An encoder bound to one command per direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderMap {
    pub id: u8,
    pub clockwise: Option<CommandId>,
    pub counter_clockwise: Option<CommandId>,
    /// Detent steps per fired command, 0 uses `EncoderConfig::default_resolution`
    pub resolution: u8,
}

impl EncoderMap {
    pub const fn new(id: u8, clockwise: CommandId, counter_clockwise: CommandId) -> Self {
        Self {
            id,
            clockwise: Some(clockwise),
            counter_clockwise: Some(counter_clockwise),
            resolution: 0,
        }
    }

    pub const fn with_resolution(mut self, resolution: u8) -> Self {
        self.resolution = resolution;
        self
    }
}

/// Errors reported by [`Keymap::validate`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    TooManyCommands,
    /// A table is larger than the engine can track
    TooManyEntries,
    /// A command id points past the command table
    CommandOutOfRange(CommandId),
    TapDanceOutOfRange(u8),
    EmptyTapDance(u8),
    ShiftOutOfRange(ShiftId),
    LayerOutOfRange(u8),
    /// Both keys of a combo are the same
    DuplicateComboKey { combo: u8 },
    /// A key shift maps a key id which has no base mapping
    UnmappedShiftKey { shift: u8, key: KeyId },
    ZeroGestureDistance(u8),
}

#[derive(Clone, Copy, Debug)]
pub struct Keymap<'a> {
    pub commands: &'a [CommandDef<'a>],
    pub keys: &'a [Key],
    pub combos: &'a [Combo],
    pub gestures: &'a [Gesture],
    pub encoders: &'a [EncoderMap],
    pub key_shifts: &'a [KeyShift<'a>],
    pub encoder_shifts: &'a [EncoderShift<'a>],
    pub tap_dances: &'a [TapDance<'a>],
}

impl<'a> Keymap<'a> {
    pub const fn new(commands: &'a [CommandDef<'a>], keys: &'a [Key]) -> Self {
        Self {
            commands,
            keys,
            combos: &[],
            gestures: &[],
            encoders: &[],
            key_shifts: &[],
            encoder_shifts: &[],
            tap_dances: &[],
        }
    }

    pub fn command(&self, id: CommandId) -> Option<&'a CommandDef<'a>> {
        self.commands.get(id.index())
    }

    /// Base mapping of a key id
    pub fn key(&self, id: KeyId) -> Option<CommandId> {
        self.keys.iter().find(|k| k.id == id).map(|k| k.command)
    }

    /// Base mapping of an encoder
    pub fn encoder(&self, id: u8) -> Option<&'a EncoderMap> {
        self.encoders.iter().find(|e| e.id == id)
    }

    /// Check references and constraints the engine relies on.
    ///
    /// The engine doesn't call this; violations only degrade to ignored input
    /// at runtime, so run it once where the tables are built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commands.len() > COMMAND_MAX_NUM {
            return Err(ConfigError::TooManyCommands);
        }
        if self.combos.len() > COMBO_MAX_NUM
            || self.tap_dances.len() > TAP_DANCE_MAX_NUM
            || self.gestures.len() > GESTURE_MAX_NUM
            || self.key_shifts.len() > u8::MAX as usize
            || self.encoder_shifts.len() > u8::MAX as usize
        {
            return Err(ConfigError::TooManyEntries);
        }

        for def in self.commands {
            if let Some(parent) = def.parent {
                self.check_command(parent)?;
            }
            self.check_kind(&def.kind)?;
        }
        for key in self.keys {
            self.check_command(key.command)?;
        }
        for (i, combo) in self.combos.iter().enumerate() {
            self.check_command(combo.command)?;
            if combo.first == combo.second {
                return Err(ConfigError::DuplicateComboKey { combo: i as u8 });
            }
        }
        for (i, dance) in self.tap_dances.iter().enumerate() {
            if dance.pairs.is_empty() {
                return Err(ConfigError::EmptyTapDance(i as u8));
            }
            for pair in dance.pairs {
                self.check_command(pair.hold)?;
                self.check_optional(pair.tap)?;
            }
        }
        for (i, gesture) in self.gestures.iter().enumerate() {
            if gesture.distance == 0 {
                return Err(ConfigError::ZeroGestureDistance(i as u8));
            }
            for command in [gesture.left, gesture.right, gesture.up, gesture.down] {
                self.check_optional(command)?;
            }
            self.check_pre_command(gesture.pre_command)?;
        }
        for encoder in self.encoders {
            self.check_encoder(encoder)?;
        }
        for (i, shift) in self.key_shifts.iter().enumerate() {
            self.check_pre_command(shift.pre_command)?;
            for key in shift.keys {
                self.check_command(key.command)?;
                if self.key(key.id).is_none() {
                    return Err(ConfigError::UnmappedShiftKey {
                        shift: i as u8,
                        key: key.id,
                    });
                }
            }
        }
        for shift in self.encoder_shifts {
            self.check_pre_command(shift.pre_command)?;
            for encoder in shift.encoders {
                self.check_encoder(encoder)?;
            }
        }
        Ok(())
    }

    fn check_command(&self, id: CommandId) -> Result<(), ConfigError> {
        if id.index() < self.commands.len() {
            Ok(())
        } else {
            Err(ConfigError::CommandOutOfRange(id))
        }
    }

    fn check_optional(&self, id: Option<CommandId>) -> Result<(), ConfigError> {
        id.map_or(Ok(()), |id| self.check_command(id))
    }

    fn check_pre_command(&self, pre: Option<PreCommand>) -> Result<(), ConfigError> {
        self.check_optional(pre.map(|p| p.command))
    }

    fn check_encoder(&self, encoder: &EncoderMap) -> Result<(), ConfigError> {
        if encoder.id as usize >= ENCODER_MAX_NUM {
            return Err(ConfigError::TooManyEntries);
        }
        self.check_optional(encoder.clockwise)?;
        self.check_optional(encoder.counter_clockwise)
    }

    fn check_kind(&self, kind: &CommandKind<'_>) -> Result<(), ConfigError> {
        match *kind {
            CommandKind::LayerHold(layer) | CommandKind::LayerToggle(layer) if layer >= 32 => {
                Err(ConfigError::LayerOutOfRange(layer))
            }
            CommandKind::Layering(layers) => {
                if layers.len() > 32 {
                    return Err(ConfigError::LayerOutOfRange(layers.len() as u8));
                }
                layers.iter().try_for_each(|c| self.check_optional(*c))
            }
            CommandKind::Multi(children) => children.iter().try_for_each(|c| self.check_command(*c)),
            CommandKind::Intercept { target, replacement } => {
                self.check_command(target)?;
                self.check_command(replacement)
            }
            CommandKind::TapDance(index) if index as usize >= self.tap_dances.len() => {
                Err(ConfigError::TapDanceOutOfRange(index))
            }
            CommandKind::Shift(shift) => {
                let in_range = match shift {
                    ShiftId::Key(i) => (i as usize) < self.key_shifts.len(),
                    ShiftId::Encoder(i) => (i as usize) < self.encoder_shifts.len(),
                    ShiftId::Gesture(i) => (i as usize) < self.gestures.len(),
                };
                if in_range {
                    Ok(())
                } else {
                    Err(ConfigError::ShiftOutOfRange(shift))
                }
            }
            _ => Ok(()),
        }
    }
}
