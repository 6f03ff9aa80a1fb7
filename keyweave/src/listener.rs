//! Listener registries.
//!
//! State machines which are waiting to resolve an ambiguity subscribe here to
//! learn about unrelated input before it is applied. Each signal has its own
//! FIFO list; subscribing twice or unsubscribing an absent listener is a no-op.

use heapless::Vec;

use crate::command::CommandId;

/// Max number of listeners per signal
pub const LISTENER_MAX_NUM: usize = 16;

/// Kinds of broadcast signal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    /// Another command is about to run its press handler
    BeforeOtherCommandPress,
    /// A pointing device is about to move
    BeforeMovePointer,
    /// An encoder is about to rotate
    BeforeRotateEncoder,
}

impl Signal {
    const fn slot(self) -> usize {
        match self {
            Signal::BeforeOtherCommandPress => 0,
            Signal::BeforeMovePointer => 1,
            Signal::BeforeRotateEncoder => 2,
        }
    }
}

/// The state machine behind a subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ListenerKind {
    TapDance(u8),
    Combo(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Listener {
    pub kind: ListenerKind,
    /// The command the listener belongs to, presses sharing its root are not broadcast to it
    pub owner: CommandId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ListenerError {
    Full,
}

#[derive(Default)]
pub struct ListenerRegistry {
    lists: [Vec<Listener, LISTENER_MAX_NUM>; 3],
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            lists: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    pub fn subscribe(&mut self, signal: Signal, listener: Listener) -> Result<(), ListenerError> {
        let list = &mut self.lists[signal.slot()];
        if list.iter().any(|l| l.kind == listener.kind) {
            return Ok(());
        }
        list.push(listener).map_err(|_| ListenerError::Full)
    }

    pub fn unsubscribe(&mut self, signal: Signal, kind: ListenerKind) {
        let list = &mut self.lists[signal.slot()];
        if let Some(pos) = list.iter().position(|l| l.kind == kind) {
            // Keep FIFO order
            list.remove(pos);
        }
    }

    pub fn is_subscribed(&self, signal: Signal, kind: ListenerKind) -> bool {
        self.lists[signal.slot()].iter().any(|l| l.kind == kind)
    }

    /// Copy of the current subscribers, so handlers can (un)subscribe while the broadcast runs
    pub fn snapshot(&self, signal: Signal) -> Vec<Listener, LISTENER_MAX_NUM> {
        self.lists[signal.slot()].clone()
    }
}
