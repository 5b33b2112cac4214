use core::fmt;
use std::collections::BTreeMap;

use embedded_hal::delay::DelayNs;

use crate::error::{BusFault, ReadError};
use crate::reading::Field;

/// The four sensor kinds on the board, in temperature-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensorKind {
    Aht21,
    Bmp280,
    Ens160,
    Mq2,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [Self::Aht21, Self::Bmp280, Self::Ens160, Self::Mq2];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Aht21 => "AHT21",
            Self::Bmp280 => "BMP280",
            Self::Ens160 => "ENS160",
            Self::Mq2 => "MQ-2",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields produced by one driver in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialReading {
    pub kind: SensorKind,
    pub values: BTreeMap<Field, f64>,
}

impl PartialReading {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.values.insert(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }
}

/// Uniform contract of an initialized driver.
///
/// Construction is the driver's own `detect_and_init`, so a value of the
/// driver type is always a detected, configured device.
pub trait Sensor {
    fn kind(&self) -> SensorKind;

    /// One measurement. Never retries; the caller treats any error as
    /// "no fields from this driver this cycle".
    fn read_once(&mut self, delay: &mut dyn DelayNs) -> Result<PartialReading, ReadError>;

    /// Release the device. Drivers without a low-power state keep the default.
    fn shutdown(&mut self) -> Result<(), BusFault> {
        Ok(())
    }
}
