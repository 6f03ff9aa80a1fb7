//! Events consumed by the engine dispatcher.
//!
//! Every producer (matrix scan, pointing sensor, encoder, timer expiry) talks to
//! the engine only by posting an [`EngineEvent`] into the engine mailbox.

use crate::timer::TimerOwner;

/// Stable identity of a physical input
pub type KeyId = u8;

/// A set of pressed key ids, as produced by a debounced matrix scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeySet {
    bits: [u32; 8],
}

impl KeySet {
    pub const fn new() -> Self {
        Self { bits: [0; 8] }
    }

    pub fn from_ids(ids: &[KeyId]) -> Self {
        let mut set = Self::new();
        for &id in ids {
            set.insert(id);
        }
        set
    }

    pub fn insert(&mut self, id: KeyId) {
        self.bits[id as usize / 32] |= 1 << (id % 32);
    }

    pub fn remove(&mut self, id: KeyId) {
        self.bits[id as usize / 32] &= !(1 << (id % 32));
    }

    pub fn contains(&self, id: KeyId) -> bool {
        self.bits[id as usize / 32] & (1 << (id % 32)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Ids present in `self`, in ascending order
    pub fn iter(&self) -> impl Iterator<Item = KeyId> + '_ {
        (0..=u8::MAX).filter(move |id| self.contains(*id))
    }

    /// Ids present in `self` but not in `other`, in ascending order
    pub fn difference<'s>(&'s self, other: &'s KeySet) -> impl Iterator<Item = KeyId> + 's {
        self.iter().filter(move |id| !other.contains(*id))
    }
}

/// An event for the engine task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineEvent {
    /// The full set of currently pressed key ids
    ApplyKeySet(KeySet),
    /// Relative motion from a pointing device
    MovePointer { device: u8, dx: i16, dy: i16 },
    /// Signed detent steps from an encoder
    RotateEncoder { id: u8, step: i8 },
    /// Expiry of a scheduled timer, tagged with the generation it was scheduled under
    Timer { owner: TimerOwner, generation: u32 },
    /// Advance the tap queue: release the in-flight tap, or start the next one after a release
    TapCompletion,
}
