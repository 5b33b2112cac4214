//! Driver registry and acquisition state machine.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{error, info, warn};

use crate::ads1115::AnalogInput;
use crate::aht21::Aht21;
use crate::bmp280::Bmp280;
use crate::bus::{pause, SharedBus};
use crate::config::SamplingConfig;
use crate::ens160::Ens160;
use crate::error::{CollectorError, EmptyWindowError, InitError};
use crate::mq2::Mq2;
use crate::reading::{AggregatedRecord, Field, Reading, TemperatureSource};
use crate::sensors::{Sensor, SensorKind};
use crate::window::{collect_window, reduce, ReadCycle};

const CALIBRATION_ATTEMPTS: usize = 3;
const CALIBRATION_RETRY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Uninitialized,
    Initializing,
    Ready,
    /// No driver came up. Terminal.
    Failed,
    /// Shut down. Terminal.
    Closed,
}

/// Snapshot for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorStatus {
    pub state: CollectorState,
    pub available: BTreeMap<SensorKind, bool>,
    pub environment_compensated: bool,
    pub total_readings: u64,
}

impl SensorStatus {
    pub fn initialized(&self) -> bool {
        self.state == CollectorState::Ready
    }

    pub fn ready_count(&self) -> usize {
        self.available.values().filter(|&&up| up).count()
    }
}

/// The set of drivers that initialized, polled together once per cycle.
pub struct DriverSuite<I2C, A> {
    aht21: Option<Aht21<I2C>>,
    bmp280: Option<Bmp280<I2C>>,
    ens160: Option<Ens160<I2C>>,
    mq2: Option<Mq2<A>>,
    reading_count: u64,
}

impl<I2C: I2c, A: AnalogInput> DriverSuite<I2C, A> {
    fn empty() -> Self {
        Self {
            aht21: None,
            bmp280: None,
            ens160: None,
            mq2: None,
            reading_count: 0,
        }
    }

    /// Priority order: the first driver to report temperature owns it.
    fn drivers_mut(&mut self) -> Vec<&mut dyn Sensor> {
        let mut drivers: Vec<&mut dyn Sensor> = Vec::with_capacity(SensorKind::ALL.len());
        if let Some(d) = self.aht21.as_mut() {
            drivers.push(d);
        }
        if let Some(d) = self.bmp280.as_mut() {
            drivers.push(d);
        }
        if let Some(d) = self.ens160.as_mut() {
            drivers.push(d);
        }
        if let Some(d) = self.mq2.as_mut() {
            drivers.push(d);
        }
        drivers
    }

    pub fn is_available(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Aht21 => self.aht21.is_some(),
            SensorKind::Bmp280 => self.bmp280.is_some(),
            SensorKind::Ens160 => self.ens160.is_some(),
            SensorKind::Mq2 => self.mq2.is_some(),
        }
    }

    pub fn active_count(&self) -> usize {
        SensorKind::ALL
            .iter()
            .filter(|&&kind| self.is_available(kind))
            .count()
    }

    pub fn reading_count(&self) -> u64 {
        self.reading_count
    }

    /// Shut every driver down; returns how many released cleanly.
    fn shutdown_all(&mut self) -> usize {
        let mut closed = 0;
        for driver in self.drivers_mut() {
            match driver.shutdown() {
                Ok(()) => closed += 1,
                Err(e) => warn!("{} shutdown failed: {}", driver.kind(), e),
            }
        }
        closed
    }
}

impl<I2C: I2c, A: AnalogInput> ReadCycle for DriverSuite<I2C, A> {
    fn read_cycle(&mut self, delay: &mut dyn DelayNs) -> Option<Reading> {
        let mut values = BTreeMap::new();
        for driver in self.drivers_mut() {
            let kind = driver.kind();
            let partial = match driver.read_once(delay) {
                Ok(partial) => partial,
                Err(e) => {
                    warn!("{} read failed: {}", kind, e);
                    continue;
                }
            };
            for (field, value) in partial.values {
                if field == Field::Temperature {
                    if values.contains_key(&Field::Temperature) {
                        continue;
                    }
                    let source = match kind {
                        SensorKind::Aht21 => TemperatureSource::Aht21,
                        SensorKind::Bmp280 => TemperatureSource::Bmp280,
                        _ => continue,
                    };
                    values.insert(Field::TemperatureSource, f64::from(source.code()));
                }
                values.entry(field).or_insert(value);
            }
        }

        if values.is_empty() {
            warn!("All sensor reads failed this cycle");
            return None;
        }
        let sequence = self.reading_count;
        self.reading_count += 1;
        Some(Reading::new(values, sequence, Utc::now()))
    }
}

/// Owns the shared bus, every driver and the delay provider.
pub struct Collector<I2C, A, D> {
    bus: SharedBus<I2C>,
    analog: Option<A>,
    delay: D,
    sampling: SamplingConfig,
    suite: DriverSuite<I2C, A>,
    state: CollectorState,
    environment_compensated: bool,
}

impl<I2C: I2c, A: AnalogInput, D: DelayNs> Collector<I2C, A, D> {
    pub fn new(bus: SharedBus<I2C>, analog: A, delay: D, sampling: SamplingConfig) -> Self {
        Self {
            bus,
            analog: Some(analog),
            delay,
            sampling,
            suite: DriverSuite::empty(),
            state: CollectorState::Uninitialized,
            environment_compensated: false,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    /// Bring every driver up independently. `Ok` iff at least one succeeded.
    pub fn initialize(&mut self) -> Result<(), CollectorError> {
        match self.state {
            CollectorState::Uninitialized => {}
            CollectorState::Ready => return Ok(()),
            CollectorState::Failed => return Err(CollectorError::NoSensors),
            CollectorState::Initializing | CollectorState::Closed => {
                return Err(CollectorError::NotInitialized)
            }
        }
        self.state = CollectorState::Initializing;
        info!("Initializing sensors...");

        self.suite.aht21 = report(Aht21::detect_and_init(self.bus.clone(), &mut self.delay));
        self.suite.bmp280 = report(Bmp280::detect_and_init(
            self.bus.clone(),
            self.sampling.sea_level_hpa,
            &mut self.delay,
        ));
        self.suite.ens160 = report(Ens160::detect_and_init(self.bus.clone(), &mut self.delay));
        self.suite.mq2 = match self.analog.take() {
            Some(input) => report(Mq2::detect_and_init(input)),
            None => None,
        };

        let ready = self.suite.active_count();
        if ready == 0 {
            error!("Sensor initialization failed: no sensor available");
            self.state = CollectorState::Failed;
            return Err(CollectorError::NoSensors);
        }
        info!("Sensors ready ({}/{})", ready, SensorKind::ALL.len());
        self.state = CollectorState::Ready;
        self.cross_calibrate();
        Ok(())
    }

    /// One-shot: feed the first valid AHT21 sample into the ENS160.
    fn cross_calibrate(&mut self) {
        let (Some(aht), Some(ens)) = (self.suite.aht21.as_mut(), self.suite.ens160.as_mut()) else {
            return;
        };
        for attempt in 1..=CALIBRATION_ATTEMPTS {
            let outcome = aht
                .measure(&mut self.delay)
                .map_err(|e| e.to_string())
                .and_then(|s| {
                    ens.set_environment(s.temperature_c, s.humidity_pct)
                        .map(|()| s)
                        .map_err(|e| e.to_string())
                });
            match outcome {
                Ok(sample) => {
                    info!(
                        "ENS160 compensation set ({:.1} C, {:.1} %)",
                        sample.temperature_c, sample.humidity_pct
                    );
                    self.environment_compensated = true;
                    return;
                }
                Err(e) => warn!("ENS160 compensation attempt {} failed: {}", attempt, e),
            }
            if attempt < CALIBRATION_ATTEMPTS {
                pause(&mut self.delay, CALIBRATION_RETRY);
            }
        }
        warn!("ENS160 running without environment compensation");
    }

    fn ensure_ready(&self) -> Result<(), CollectorError> {
        if self.state == CollectorState::Ready {
            Ok(())
        } else {
            Err(CollectorError::NotInitialized)
        }
    }

    /// One full-suite cycle as a single-shot record.
    pub fn single_reading(&mut self) -> Result<AggregatedRecord, CollectorError> {
        self.ensure_ready()?;
        let reading = self
            .suite
            .read_cycle(&mut self.delay)
            .ok_or(EmptyWindowError { attempted: 1 })?;
        Ok(AggregatedRecord::single(reading))
    }

    pub fn windowed_reading(
        &mut self,
        samples: usize,
        interval: Duration,
    ) -> Result<AggregatedRecord, CollectorError> {
        self.ensure_ready()?;
        let window = collect_window(&mut self.suite, samples, interval, &mut self.delay)?;
        Ok(reduce(&window, self.sampling.sea_level_hpa))
    }

    /// Block for the gas sensors' heater warm-up, logging a countdown.
    pub fn wait_for_warmup(&mut self, duration: Duration) {
        let seconds = duration.as_secs();
        info!("Waiting {} s for sensor warm-up...", seconds);
        for remaining in (1..=seconds).rev() {
            if remaining % 5 == 0 || remaining <= 3 {
                info!("  {} s...", remaining);
            }
            pause(&mut self.delay, Duration::from_secs(1));
        }
        let rest = duration - Duration::from_secs(seconds);
        if !rest.is_zero() {
            pause(&mut self.delay, rest);
        }
        info!("Warm-up complete");
    }

    pub fn sensor_status(&self) -> SensorStatus {
        SensorStatus {
            state: self.state,
            available: SensorKind::ALL
                .iter()
                .map(|&kind| (kind, self.suite.is_available(kind)))
                .collect(),
            environment_compensated: self.environment_compensated,
            total_readings: self.suite.reading_count(),
        }
    }

    /// Release every driver and close. Individual failures are logged only.
    pub fn shutdown(&mut self) {
        if self.state == CollectorState::Closed {
            return;
        }
        info!("Shutting down sensors...");
        let total = self.suite.active_count();
        let closed = self.suite.shutdown_all();
        info!("Sensors closed ({}/{})", closed, total);
        self.suite = DriverSuite::empty();
        self.state = CollectorState::Closed;
    }
}

fn report<T>(result: Result<T, InitError>) -> Option<T> {
    match result {
        Ok(driver) => Some(driver),
        Err(e) => {
            warn!("Sensor init failed: {}", e);
            None
        }
    }
}
