//! The engine task.
//!
//! [`EngineRunner`] is the single consumer of the engine mailbox. It waits for
//! whichever comes first, the next event or the next timer deadline, and
//! hands it to the engine with the current time. Timers which expired before
//! an event is applied always fire first.

use embassy_futures::select::{select, Either};
use embassy_sync::channel::{Channel, TrySendError};
use embassy_time::{Instant, Timer};

use crate::channel::{ENGINE_EVENT_CHANNEL, REPORT_CHANNEL};
use crate::engine::Engine;
use crate::event::EngineEvent;
use crate::hid::{Report, ReportKind, ReportSink};
use crate::{EVENT_CHANNEL_SIZE, REPORT_CHANNEL_SIZE, RawMutex};

/// A task which runs forever
#[allow(async_fn_in_trait)]
pub trait Runnable {
    async fn run(&mut self);
}

/// Sends reports into a channel drained by the hid writer task
pub struct ChannelReportSink<'c> {
    channel: &'c Channel<RawMutex, Report, REPORT_CHANNEL_SIZE>,
}

impl ChannelReportSink<'static> {
    pub fn new() -> Self {
        Self {
            channel: &REPORT_CHANNEL,
        }
    }
}

impl Default for ChannelReportSink<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c> ChannelReportSink<'c> {
    pub fn with_channel(channel: &'c Channel<RawMutex, Report, REPORT_CHANNEL_SIZE>) -> Self {
        Self { channel }
    }
}

impl ReportSink for ChannelReportSink<'_> {
    fn is_ready(&self, _kind: ReportKind) -> bool {
        !self.channel.is_full()
    }

    fn send(&mut self, report: Report) {
        if let Err(TrySendError::Full(report)) = self.channel.try_send(report) {
            warn!("Report channel full, dropping {:?} report", report.kind());
        }
    }
}

pub struct EngineRunner<'a, 'c, S: ReportSink> {
    engine: Engine<'a, S>,
    events: &'c Channel<RawMutex, EngineEvent, EVENT_CHANNEL_SIZE>,
}

impl<'a, S: ReportSink> EngineRunner<'a, 'static, S> {
    /// Runner draining [`ENGINE_EVENT_CHANNEL`]
    pub fn new(engine: Engine<'a, S>) -> Self {
        Self {
            engine,
            events: &ENGINE_EVENT_CHANNEL,
        }
    }
}

impl<'a, 'c, S: ReportSink> EngineRunner<'a, 'c, S> {
    pub fn with_channel(engine: Engine<'a, S>, events: &'c Channel<RawMutex, EngineEvent, EVENT_CHANNEL_SIZE>) -> Self {
        Self { engine, events }
    }

    pub fn engine(&self) -> &Engine<'a, S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<'a, S> {
        &mut self.engine
    }

    /// Handle the next event or the next expired timer, whichever comes first
    pub async fn run_once(&mut self) {
        let event = match self.engine.next_deadline() {
            Some(deadline) => match select(self.events.receive(), Timer::at(deadline)).await {
                Either::First(event) => Some(event),
                Either::Second(()) => None,
            },
            None => Some(self.events.receive().await),
        };

        let now = Instant::now();
        // Deadlines that passed before the event arrived are handled first
        self.engine.poll_timers(now);
        if let Some(event) = event {
            self.engine.process(event, now);
            self.engine.poll_timers(now);
        }
        // Motion held back by a busy transport
        self.engine.flush_pending();
    }
}

impl<S: ReportSink> Runnable for EngineRunner<'_, '_, S> {
    /// Main engine task: process events and timers forever
    async fn run(&mut self) {
        info!("Engine task started");
        loop {
            self.run_once().await;
        }
    }
}
