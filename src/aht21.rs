use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::bus::{pause, SharedBus};
use crate::codec::{decode_aht_frame, round_to};
use crate::error::{InitError, ReadError};
use crate::reading::Field;
use crate::sensors::{PartialReading, Sensor, SensorKind};

pub const AHT21_ADDR: u8 = 0x38;

const CMD_SOFT_RESET: [u8; 1] = [0xBA];
// Calibrate / normal-mode init.
const CMD_INIT: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_MEASURE: [u8; 3] = [0xAC, 0x33, 0x00];

const RESET_SETTLE: Duration = Duration::from_millis(20);
const INIT_SETTLE: Duration = Duration::from_millis(10);
const CONVERSION_TIME: Duration = Duration::from_millis(80);

const STATUS_BUSY: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AhtSample {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

pub struct Aht21<I2C> {
    bus: SharedBus<I2C>,
    addr: u8,
}

impl<I2C: I2c> Aht21<I2C> {
    pub fn detect_and_init(bus: SharedBus<I2C>, delay: &mut dyn DelayNs) -> Result<Self, InitError> {
        let kind = SensorKind::Aht21;
        bus.write(AHT21_ADDR, &CMD_SOFT_RESET)
            .map_err(|source| InitError::Absent { kind, source })?;
        pause(delay, RESET_SETTLE);
        bus.write(AHT21_ADDR, &CMD_INIT)
            .map_err(|source| InitError::Configure { kind, source })?;
        pause(delay, INIT_SETTLE);

        info!("Found AHT21 (addr 0x{:02X})", AHT21_ADDR);
        Ok(Self {
            bus,
            addr: AHT21_ADDR,
        })
    }

    /// Trigger a measurement and decode it, rounded to 0.1.
    pub fn measure(&mut self, delay: &mut dyn DelayNs) -> Result<AhtSample, ReadError> {
        let mut frame = [0u8; 6];
        self.bus
            .write_then_read(self.addr, &CMD_MEASURE, CONVERSION_TIME, delay, &mut frame)?;
        debug!("AHT21 frame: {:02X?}", frame);

        if frame[0] & STATUS_BUSY != 0 {
            return Err(ReadError::Busy);
        }

        let (humidity, temperature) = decode_aht_frame(&frame)?;
        Ok(AhtSample {
            temperature_c: round_to(temperature, 1),
            humidity_pct: round_to(humidity, 1),
        })
    }
}

impl<I2C: I2c> Sensor for Aht21<I2C> {
    fn kind(&self) -> SensorKind {
        SensorKind::Aht21
    }

    fn read_once(&mut self, delay: &mut dyn DelayNs) -> Result<PartialReading, ReadError> {
        let sample = self.measure(delay)?;
        Ok(PartialReading::new(SensorKind::Aht21)
            .with(Field::Temperature, sample.temperature_c)
            .with(Field::Humidity, sample.humidity_pct))
    }
}
