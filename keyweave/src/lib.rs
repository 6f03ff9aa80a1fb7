//! # keyweave
//!
//! An event-processing engine for keyboard and pointing-device firmware. It
//! turns key-id sets, pointer deltas and encoder steps into HID reports, with
//! layers, tap dance / hold-tap, combos, gestures, shift overlays and one-shot
//! modifiers in between.
//!
//! All engine state is owned by one [`engine::Engine`]. Producers talk to it
//! only through [`channel::ENGINE_EVENT_CHANNEL`]; [`runner::EngineRunner`]
//! drains that channel and fires timers on a single task.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod channel;
pub mod combo;
pub mod command;
pub mod config;
pub mod engine;
pub mod event;
pub mod gesture;
pub mod hid;
pub mod hid_state;
pub mod hook;
pub mod input;
pub mod keymap;
pub mod listener;
pub mod runner;
pub mod shift;
pub mod tap_dance;
pub mod timer;

pub use keyweave_types as types;

pub type RawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Capacity of the engine event mailbox
pub const EVENT_CHANNEL_SIZE: usize = 16;
/// Capacity of the outgoing report channel
pub const REPORT_CHANNEL_SIZE: usize = 16;
/// Number of pointing devices with per-device state
pub const MAX_POINTING_DEVICES: usize = 4;
/// Encoder ids must be below this
pub const ENCODER_MAX_NUM: usize = 8;
/// Max number of queued taps
pub const TAP_QUEUE_SIZE: usize = 16;
