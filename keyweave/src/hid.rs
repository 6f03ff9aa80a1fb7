//! Reports the engine emits and the sink they go to.
//!
//! The sink is the transport boundary: USB, BLE or a channel to a writer task.
//! The engine never blocks on it, it asks [`ReportSink::is_ready`] first.

pub use usbd_hid::descriptor::{KeyboardReport, MediaKeyboardReport, MouseReport, SystemControlReport};

/// Radial controller input: one button plus relative dial rotation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadialControllerReport {
    pub button: u8,
    pub dial: i16,
}

pub enum Report {
    /// Normal keyboard hid report
    KeyboardReport(KeyboardReport),
    /// Mouse hid report
    MouseReport(MouseReport),
    /// Media keyboard report
    MediaKeyboardReport(MediaKeyboardReport),
    /// System control report
    SystemControlReport(SystemControlReport),
    /// Radial controller report
    RadialControllerReport(RadialControllerReport),
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::KeyboardReport(_) => ReportKind::Keyboard,
            Report::MouseReport(_) => ReportKind::Mouse,
            Report::MediaKeyboardReport(_) => ReportKind::Consumer,
            Report::SystemControlReport(_) => ReportKind::SystemControl,
            Report::RadialControllerReport(_) => ReportKind::RadialController,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportKind {
    Keyboard,
    Mouse,
    Consumer,
    SystemControl,
    RadialController,
}

/// Where reports go.
///
/// Keyboard, consumer and system reports that find the sink not ready are
/// skipped, the next flush re-derives them from current state. Mouse and dial
/// motion is held back until the sink is ready again.
pub trait ReportSink {
    /// Whether a report of `kind` can be accepted right now
    fn is_ready(&self, _kind: ReportKind) -> bool {
        true
    }

    fn send(&mut self, report: Report);
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn is_ready(&self, kind: ReportKind) -> bool {
        (**self).is_ready(kind)
    }

    fn send(&mut self, report: Report) {
        (**self).send(report)
    }
}
