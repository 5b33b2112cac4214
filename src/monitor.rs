//! The detector's top-level loop body, free of any platform types.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use log::{debug, error, info, warn};

use crate::ads1115::AnalogInput;
use crate::alarm::Alarm;
use crate::collector::Collector;
use crate::config::{Config, Topics};
use crate::error::{AlarmError, CollectorError, ReportError};
use crate::publish::{MessageId, Publisher};
use crate::reading::AggregatedRecord;
use crate::telemetry::to_payload;

pub struct Monitor<I2C, A, D, P> {
    collector: Collector<I2C, A, D>,
    alarm: Alarm<P>,
    config: Config,
    topics: Topics,
}

impl<I2C, A, D, P> Monitor<I2C, A, D, P>
where
    I2C: I2c,
    A: AnalogInput,
    D: DelayNs,
    P: OutputPin + Send + 'static,
{
    pub fn new(collector: Collector<I2C, A, D>, alarm: Alarm<P>, config: Config) -> Self {
        let topics = config.topics();
        Self {
            collector,
            alarm,
            config,
            topics,
        }
    }

    pub fn collector(&self) -> &Collector<I2C, A, D> {
        &self.collector
    }

    pub fn alarm(&self) -> &Alarm<P> {
        &self.alarm
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Initialize, warm up, then prove the suite with a short window.
    pub fn bootstrap(&mut self) -> Result<AggregatedRecord, CollectorError> {
        self.collector.initialize()?;
        let sampling = self.collector.sampling().clone();
        self.collector.wait_for_warmup(sampling.warmup);

        info!("Self-test...");
        let record = self
            .collector
            .windowed_reading(sampling.self_test_samples, sampling.self_test_interval)
            .inspect_err(|e| error!("Self-test failed: {}", e))?;
        info!(
            "Self-test ok: {} samples, {}",
            record.samples_count, record
        );
        Ok(record)
    }

    /// Collect one report window and publish it.
    pub fn report<Pb: Publisher + ?Sized>(&mut self, publisher: &mut Pb) -> Result<MessageId, ReportError> {
        let sampling = self.collector.sampling().clone();
        let record = self
            .collector
            .windowed_reading(sampling.samples_per_report, sampling.sample_interval)?;
        let payload = to_payload(&record)?;
        debug!("Report payload: {}", String::from_utf8_lossy(&payload));

        let id = publisher.publish(&self.topics.report, &payload)?;
        info!(
            "Report published (msg id {}, {} samples, reading #{})",
            id, record.samples_count, record.reading_count
        );
        Ok(id)
    }

    /// Every downlink (command, message or property set) sounds the alarm.
    pub fn on_downlink(&mut self, topic: &str, payload: &[u8]) -> Result<(), AlarmError> {
        info!("Downlink on {}: {}", topic, String::from_utf8_lossy(payload));
        if serde_json::from_slice::<serde_json::Value>(payload).is_err() {
            debug!("Downlink payload is not JSON");
        }
        self.alarm.start(self.config.alarm_duration)
    }

    pub fn shutdown(&mut self) {
        if let Err(e) = self.alarm.shutdown() {
            warn!("Alarm shutdown failed: {}", e);
        }
        self.collector.shutdown();
    }
}
