//! Producer side helpers.
//!
//! Matrix scanners, pointing sensors and encoders run outside the engine task
//! and only post [`EngineEvent`]s. These helpers keep producers from flooding
//! the mailbox: key sets are posted only when they change, and pointer motion
//! is summed until the mailbox has room.

use embassy_sync::channel::{Channel, TrySendError};

use crate::channel::ENGINE_EVENT_CHANNEL;
use crate::event::{EngineEvent, KeyId, KeySet};
use crate::{EVENT_CHANNEL_SIZE, MAX_POINTING_DEVICES, RawMutex};

/// Post an event to the engine, waiting while the mailbox is full
pub async fn post_event(event: EngineEvent) {
    ENGINE_EVENT_CHANNEL.send(event).await;
}

/// Post an event to the engine without waiting, the event is handed back if the mailbox is full
pub fn try_post_event(event: EngineEvent) -> Result<(), EngineEvent> {
    ENGINE_EVENT_CHANNEL.try_send(event).map_err(|TrySendError::Full(e)| e)
}

/// Tracks the debounced key set of a matrix scanner
#[derive(Default)]
pub struct KeySetTracker {
    keys: KeySet,
}

impl KeySetTracker {
    pub fn new() -> Self {
        Self { keys: KeySet::new() }
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Replace the whole set, yielding an event only if it changed
    pub fn update(&mut self, keys: KeySet) -> Option<EngineEvent> {
        if keys == self.keys {
            return None;
        }
        self.keys = keys;
        Some(EngineEvent::ApplyKeySet(keys))
    }

    /// Apply a single key change, yielding an event only if it changed the set
    pub fn key_changed(&mut self, id: KeyId, pressed: bool) -> Option<EngineEvent> {
        let mut keys = self.keys;
        if pressed {
            keys.insert(id);
        } else {
            keys.remove(id);
        }
        self.update(keys)
    }
}

/// Sums pointer deltas per device until they can be posted
#[derive(Default)]
pub struct MotionCoalescer {
    pending: [(i16, i16); MAX_POINTING_DEVICES],
}

impl MotionCoalescer {
    pub fn new() -> Self {
        Self {
            pending: [(0, 0); MAX_POINTING_DEVICES],
        }
    }

    pub fn add(&mut self, device: u8, dx: i16, dy: i16) {
        match self.pending.get_mut(device as usize) {
            Some((x, y)) => {
                *x = x.saturating_add(dx);
                *y = y.saturating_add(dy);
            }
            None => warn!("Pointing device {} out of range, motion dropped", device),
        }
    }

    /// Take the accumulated motion of `device` as an event, if there is any
    pub fn take(&mut self, device: u8) -> Option<EngineEvent> {
        let (dx, dy) = self.pending.get_mut(device as usize).map(core::mem::take)?;
        if dx == 0 && dy == 0 {
            return None;
        }
        Some(EngineEvent::MovePointer { device, dx, dy })
    }

    /// Post every pending motion without waiting.
    ///
    /// Motion that finds the mailbox full is put back and merged with later deltas.
    pub fn try_flush(&mut self, channel: &Channel<RawMutex, EngineEvent, EVENT_CHANNEL_SIZE>) {
        for device in 0..MAX_POINTING_DEVICES as u8 {
            let Some(event) = self.take(device) else {
                continue;
            };
            if let Err(TrySendError::Full(EngineEvent::MovePointer { device, dx, dy })) = channel.try_send(event) {
                trace!("Engine mailbox full, keeping motion of device {}", device);
                self.add(device, dx, dy);
            }
        }
    }
}
