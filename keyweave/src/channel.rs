//! Exposed channels which connect producers, the engine task and the report writer

pub use embassy_sync::channel;
use embassy_sync::channel::Channel;

use crate::event::EngineEvent;
use crate::hid::Report;
use crate::{EVENT_CHANNEL_SIZE, REPORT_CHANNEL_SIZE, RawMutex};

/// Mailbox of the engine task, every producer posts here
pub static ENGINE_EVENT_CHANNEL: Channel<RawMutex, EngineEvent, EVENT_CHANNEL_SIZE> = Channel::new();
/// Reports from the engine to the hid writer
pub static REPORT_CHANNEL: Channel<RawMutex, Report, REPORT_CHANNEL_SIZE> = Channel::new();
