mod common;

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{FakeBus, RecordingDelay, ADS1115, AHT21, BMP280, ENS160};
use embedded_hal::digital::{ErrorType, OutputPin};
use serde_json::Value;
use smoke_detector::ads1115::{Ads1115, Gain};
use smoke_detector::alarm::{ActiveLevel, Alarm};
use smoke_detector::bus::SharedBus;
use smoke_detector::monitor::Monitor;
use smoke_detector::publish::{MessageId, Publisher};
use smoke_detector::{Collector, CollectorError, CollectorState, Config, PublishFault, ReportError};

#[derive(Clone, Default)]
struct Buzzer(Arc<Mutex<Vec<bool>>>);

impl ErrorType for Buzzer {
    type Error = Infallible;
}

impl OutputPin for Buzzer {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.lock().unwrap().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.lock().unwrap().push(true);
        Ok(())
    }
}

#[derive(Default)]
struct Outbox {
    sent: Vec<(String, Vec<u8>)>,
    offline: bool,
}

impl Publisher for Outbox {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<MessageId, PublishFault> {
        if self.offline {
            return Err(PublishFault::Disconnected);
        }
        self.sent.push((topic.to_string(), payload.to_vec()));
        Ok(self.sent.len() as MessageId)
    }
}

type TestMonitor = Monitor<FakeBus, Ads1115<FakeBus>, RecordingDelay, Buzzer>;

fn config() -> Config {
    let mut config = Config::from_env();
    config.device_id = "unit_test_device";
    config.sampling.samples_per_report = 4;
    config
}

fn monitor_on(board: &FakeBus, buzzer: &Buzzer) -> (TestMonitor, RecordingDelay) {
    let config = config();
    let bus = SharedBus::new(board.clone());
    let adc = Ads1115::new(bus.clone(), ADS1115, 0, Gain::TwoThirds);
    let delay = RecordingDelay::default();
    let collector = Collector::new(bus, adc, delay.clone(), config.sampling.clone());
    let alarm = Alarm::new(buzzer.clone(), ActiveLevel::Low).unwrap();
    (Monitor::new(collector, alarm, config), delay)
}

#[test]
fn bootstrap_warms_up_and_self_tests() {
    let board = FakeBus::full_board();
    let (mut monitor, delay) = monitor_on(&board, &Buzzer::default());
    let record = monitor.bootstrap().unwrap();
    assert_eq!(record.samples_count, 3);
    assert_eq!(monitor.collector().state(), CollectorState::Ready);
    // Warm-up alone is ten seconds of blocking delay.
    assert!(delay.elapsed() >= Duration::from_secs(11));
}

#[test]
fn bootstrap_fails_without_sensors() {
    let board = FakeBus::default();
    let (mut monitor, _) = monitor_on(&board, &Buzzer::default());
    assert_eq!(monitor.bootstrap().unwrap_err(), CollectorError::NoSensors);
}

#[test]
fn bootstrap_fails_when_self_test_reads_nothing() {
    // A lone AHT21 that accepts init but never finishes a measurement.
    let board = FakeBus::default();
    board.add_aht21();
    board.set_aht_frame([0x9C, 0, 0, 0, 0, 0]);
    let (mut monitor, _) = monitor_on(&board, &Buzzer::default());
    assert!(matches!(
        monitor.bootstrap(),
        Err(CollectorError::EmptyWindow(e)) if e.attempted == 3
    ));
}

#[test]
fn report_fails_when_every_sensor_goes_silent() {
    let board = FakeBus::full_board();
    let (mut monitor, _) = monitor_on(&board, &Buzzer::default());
    monitor.bootstrap().unwrap();
    for addr in [AHT21, BMP280, ENS160, ADS1115] {
        board.set_faulty(addr, true);
    }
    let mut outbox = Outbox::default();
    assert!(matches!(
        monitor.report(&mut outbox),
        Err(ReportError::Collect(CollectorError::EmptyWindow(_)))
    ));
    assert!(outbox.sent.is_empty());
}

#[test]
fn report_publishes_property_json() {
    let board = FakeBus::full_board();
    let (mut monitor, _) = monitor_on(&board, &Buzzer::default());
    monitor.bootstrap().unwrap();

    let mut outbox = Outbox::default();
    let id = monitor.report(&mut outbox).unwrap();
    assert_eq!(id, 1);
    let (topic, payload) = &outbox.sent[0];
    assert_eq!(topic, "$oc/devices/unit_test_device/sys/properties/report");

    let json: Value = serde_json::from_slice(payload).unwrap();
    let services = json["services"].as_array().unwrap();
    assert_eq!(services.len(), 4);
    assert_eq!(services[0]["service_id"], "EnvironmentData");
    assert_eq!(services[0]["properties"]["temperature"], 20.0);
    assert_eq!(services[0]["properties"]["pressure"], 1006.53);
    assert_eq!(services[1]["properties"]["aqi"], 2);
    assert_eq!(services[2]["properties"]["mq2_status"], 2);
    assert_eq!(services[3]["properties"]["data_source"], 1);
    assert_eq!(services[3]["properties"]["samples_count"], 4);
}

#[test]
fn publish_fault_is_reported() {
    let board = FakeBus::full_board();
    let (mut monitor, _) = monitor_on(&board, &Buzzer::default());
    monitor.bootstrap().unwrap();
    let mut outbox = Outbox {
        offline: true,
        ..Outbox::default()
    };
    assert!(matches!(
        monitor.report(&mut outbox),
        Err(ReportError::Publish(PublishFault::Disconnected))
    ));
}

#[test]
fn downlink_sounds_alarm_until_shutdown() {
    let board = FakeBus::full_board();
    let buzzer = Buzzer::default();
    let (mut monitor, _) = monitor_on(&board, &buzzer);
    monitor.bootstrap().unwrap();

    let topic = "$oc/devices/unit_test_device/sys/messages/down";
    monitor.on_downlink(topic, br#"{"content":"alarm"}"#).unwrap();
    assert!(monitor.alarm().is_active());
    monitor.on_downlink(topic, b"not json").unwrap();
    assert!(monitor.alarm().is_active());

    monitor.shutdown();
    assert!(!monitor.alarm().is_active());
    assert_eq!(monitor.collector().state(), CollectorState::Closed);
    // Active-low: idle high, sounding low, and high again at the end.
    let levels = buzzer.0.lock().unwrap().clone();
    assert_eq!(levels.first(), Some(&true));
    assert_eq!(levels.last(), Some(&true));
    assert!(levels.contains(&false));
}
