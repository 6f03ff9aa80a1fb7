pub mod common;

use embassy_futures::block_on;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, MockDriver};
use keyweave::config::EngineConfig;
use keyweave::engine::Engine;
use keyweave::event::{EngineEvent, KeySet};
use keyweave::hid::{KeyboardReport, Report};
use keyweave::runner::{ChannelReportSink, EngineRunner};
use keyweave::types::keycode::HidKeyCode;
use keyweave::{EVENT_CHANNEL_SIZE, REPORT_CHANNEL_SIZE, RawMutex};
use rusty_fork::rusty_fork_test;

use crate::common::*;

static EVENTS: Channel<RawMutex, EngineEvent, EVENT_CHANNEL_SIZE> = Channel::new();
static REPORTS: Channel<RawMutex, Report, REPORT_CHANNEL_SIZE> = Channel::new();

fn create_runner() -> EngineRunner<'static, 'static, ChannelReportSink<'static>> {
    let engine = Engine::new(
        test_keymap(),
        EngineConfig::default(),
        ChannelReportSink::with_channel(&REPORTS),
    );
    EngineRunner::with_channel(engine, &EVENTS)
}

fn post_keys(ids: &[u8]) {
    assert!(EVENTS.try_send(EngineEvent::ApplyKeySet(KeySet::from_ids(ids))).is_ok());
}

fn empty_report() -> KeyboardReport {
    KeyboardReport {
        modifier: 0,
        reserved: 0,
        leds: 0,
        keycodes: [0; 6],
    }
}

fn next_keyboard_report() -> Option<(u8, [u8; 6])> {
    while let Ok(report) = REPORTS.try_receive() {
        if let Report::KeyboardReport(r) = report {
            return Some((r.modifier, r.keycodes));
        }
    }
    None
}

rusty_fork_test! {
    #[test]
    fn test_runner_processes_events() {
        block_on(async {
            let mut runner = create_runner();
            post_keys(&[KEY_A]);
            runner.run_once().await;
            post_keys(&[]);
            runner.run_once().await;

            assert_eq!(next_keyboard_report(), Some((0, keys1(HidKeyCode::A))));
            assert_eq!(next_keyboard_report(), Some((0, EMPTY)));
            assert_eq!(next_keyboard_report(), None);
        });
    }

    #[test]
    fn test_runner_fires_timer_at_deadline() {
        block_on(async {
            let mut runner = create_runner();
            post_keys(&[KEY_TD]);
            runner.run_once().await;
            assert!(runner.engine().next_deadline().is_some());
            assert_eq!(next_keyboard_report(), None);

            // No event arrives, the tapping term wakes the runner
            MockDriver::get().advance(Duration::from_millis(200));
            runner.run_once().await;
            assert_eq!(next_keyboard_report(), Some((KC_LSHIFT, EMPTY)));
            assert_eq!(runner.engine().next_deadline(), None);

            post_keys(&[]);
            runner.run_once().await;
            assert_eq!(next_keyboard_report(), Some((0, EMPTY)));
        });
    }

    #[test]
    fn test_runner_fires_passed_deadline_before_release() {
        block_on(async {
            let mut runner = create_runner();
            post_keys(&[KEY_TD]);
            runner.run_once().await;

            // The term passed while the release was already queued, the dance is a hold
            MockDriver::get().advance(Duration::from_millis(300));
            post_keys(&[]);
            runner.run_once().await;
            assert_eq!(next_keyboard_report(), Some((KC_LSHIFT, EMPTY)));
            assert_eq!(next_keyboard_report(), Some((0, EMPTY)));
            assert_eq!(next_keyboard_report(), None);
            assert_eq!(runner.engine().next_deadline(), None);
        });
    }

    #[test]
    fn test_runner_fires_passed_deadline_before_other_key() {
        block_on(async {
            let mut runner = create_runner();
            post_keys(&[KEY_TD]);
            runner.run_once().await;

            MockDriver::get().advance(Duration::from_millis(300));
            post_keys(&[KEY_TD, KEY_B]);
            runner.run_once().await;
            assert_eq!(next_keyboard_report(), Some((KC_LSHIFT, EMPTY)));
            assert_eq!(next_keyboard_report(), Some((KC_LSHIFT, keys1(HidKeyCode::B))));
        });
    }

    #[test]
    fn test_full_report_channel_skips_keyboard_report() {
        block_on(async {
            let mut runner = create_runner();
            while REPORTS.try_send(Report::KeyboardReport(empty_report())).is_ok() {}

            post_keys(&[KEY_A, KEY_B]);
            runner.run_once().await;
            assert!(REPORTS.is_full());

            REPORTS.clear();
            runner.engine_mut().flush_pending();
            assert_eq!(
                next_keyboard_report(),
                Some((0, [HidKeyCode::A as u8, HidKeyCode::B as u8, 0, 0, 0, 0]))
            );
        });
    }
}
