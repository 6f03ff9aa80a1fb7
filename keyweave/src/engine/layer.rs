//! Layer bitmap and layering commands.

use embassy_time::Instant;

use super::Engine;
use crate::command::CommandId;
use crate::hid::ReportSink;

/// Number of layers the bitmap holds
pub(crate) const NUM_LAYER: u8 = 32;

impl<S: ReportSink> Engine<'_, S> {
    pub(super) fn activate_layer(&mut self, layer_num: u8) {
        if layer_num >= NUM_LAYER {
            warn!("Not a valid layer {}, the engine supports only {} layers", layer_num, NUM_LAYER);
            return;
        }
        self.layers |= 1 << layer_num;
    }

    pub(super) fn deactivate_layer(&mut self, layer_num: u8) {
        if layer_num >= NUM_LAYER {
            warn!("Not a valid layer {}, the engine supports only {} layers", layer_num, NUM_LAYER);
            return;
        }
        // The base layer can't be turned off
        self.layers = (self.layers & !(1 << layer_num)) | 1;
    }

    pub(super) fn toggle_layer(&mut self, layer_num: u8) {
        if layer_num >= NUM_LAYER {
            warn!("Not a valid layer {}, the engine supports only {} layers", layer_num, NUM_LAYER);
            return;
        }
        self.layers = (self.layers ^ (1 << layer_num)) | 1;
    }

    /// Press the command of the highest active layer, falling through `None` entries.
    ///
    /// The resolved command is remembered and released as-is, so a layer
    /// change while held can't leave it stuck.
    pub(super) fn press_layering(&mut self, id: CommandId, layers: &[Option<CommandId>], times: u8, now: Instant) {
        let top = (u32::BITS - 1 - (self.layers | 1).leading_zeros()) as usize;
        let end = (top + 1).min(layers.len());
        let Some(resolved) = layers[..end].iter().rev().find_map(|c| *c) else {
            debug!("Layering {:?} is transparent down to the base layer", id);
            return;
        };
        self.slots[id.index()].delegate = Some(resolved);
        self.press_command(resolved, times, now);
    }
}
