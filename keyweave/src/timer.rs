//! Timed-action scheduler.
//!
//! A fixed pool of one-shot deadlines, one slot per owning state machine.
//! Re-scheduling an owner bumps its generation; an expiry is delivered as
//! `(owner, generation)` and accepted only if that generation is still the
//! armed one. Cancelling clears the armed flag, so an expiry which was already
//! queued is filtered at delivery time instead of being recalled.

use embassy_time::Instant;
use heapless::Vec;

/// Number of state machines that can own a timer at the same time
pub const TIMER_POOL_SIZE: usize = 32;

/// The state machine a timer belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerOwner {
    /// Tapping term of the tap dance with the given index
    TapDance(u8),
    /// Combo term of the combo with the given index
    Combo(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerError {
    /// Every slot is taken by another owner
    PoolExhausted,
}

#[derive(Clone, Copy, Debug)]
struct TimerSlot {
    owner: TimerOwner,
    generation: u32,
    armed: bool,
    /// Pending deadline, `None` once it was handed out by `take_expired`
    deadline: Option<Instant>,
}

#[derive(Default)]
pub struct TimerPool {
    slots: Vec<TimerSlot, TIMER_POOL_SIZE>,
    /// Shared across slots, so a slot handed to a new owner never repeats a generation
    generation: u32,
}

impl TimerPool {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: 0,
        }
    }

    fn slot_mut(&mut self, owner: TimerOwner) -> Option<&mut TimerSlot> {
        self.slots.iter_mut().find(|s| s.owner == owner)
    }

    /// Arm (or re-arm) the timer of `owner`, returning the new generation.
    pub fn schedule(&mut self, owner: TimerOwner, deadline: Instant) -> Result<u32, TimerError> {
        if self.slot_mut(owner).is_none() {
            // Reuse an idle slot before growing the pool
            if let Some(idle) = self.slots.iter_mut().find(|s| !s.armed) {
                idle.owner = owner;
            } else {
                self.slots
                    .push(TimerSlot {
                        owner,
                        generation: 0,
                        armed: false,
                        deadline: None,
                    })
                    .map_err(|_| TimerError::PoolExhausted)?;
            }
        }

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        match self.slot_mut(owner) {
            Some(slot) => {
                slot.generation = generation;
                slot.armed = true;
                slot.deadline = Some(deadline);
                Ok(slot.generation)
            }
            None => Err(TimerError::PoolExhausted),
        }
    }

    /// Disarm the timer of `owner`. Expiries already handed out are rejected by [`Self::accept`].
    pub fn cancel(&mut self, owner: TimerOwner) {
        if let Some(slot) = self.slot_mut(owner) {
            slot.armed = false;
            slot.deadline = None;
        }
    }

    pub fn is_armed(&self, owner: TimerOwner) -> bool {
        self.slots.iter().any(|s| s.owner == owner && s.armed)
    }

    /// Validate a delivered expiry. Returns `true` exactly once per armed generation.
    pub fn accept(&mut self, owner: TimerOwner, generation: u32) -> bool {
        match self.slot_mut(owner) {
            Some(slot) if slot.armed && slot.generation == generation => {
                slot.armed = false;
                slot.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// The earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().filter_map(|s| s.deadline).min()
    }

    /// Hand out the earliest expired deadline, if any.
    pub fn take_expired(&mut self, now: Instant) -> Option<(TimerOwner, u32)> {
        let slot = self
            .slots
            .iter_mut()
            .filter(|s| s.deadline.is_some_and(|d| d <= now))
            .min_by_key(|s| s.deadline)?;
        slot.deadline = None;
        Some((slot.owner, slot.generation))
    }
}
