use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::bus::{pause, SharedBus};
use crate::codec::{decode_unsigned_16_le, ens160_humidity_word, ens160_temperature_word};
use crate::error::{BusFault, CompensationFault, InitError, ReadError};
use crate::reading::Field;
use crate::sensors::{PartialReading, Sensor, SensorKind};

pub const ENS160_ADDR: u8 = 0x52;

const REG_PART_ID: u8 = 0x00;
const PART_ID: u16 = 0x0160;
const REG_OPMODE: u8 = 0x10;
const REG_TEMP_IN: u8 = 0x13;
const REG_RH_IN: u8 = 0x15;
// DATA_AQI, DATA_TVOC (2), DATA_ECO2 (2) are contiguous.
const REG_DATA_AQI: u8 = 0x21;

const OPMODE_DEEP_SLEEP: u8 = 0x00;
const OPMODE_STANDARD: u8 = 0x02;
const OPMODE_RESET: u8 = 0xF0;

const RESET_SETTLE: Duration = Duration::from_millis(100);
const MODE_SETTLE: Duration = Duration::from_millis(500);

const AQI_MASK: u8 = 0x07;

pub struct Ens160<I2C> {
    bus: SharedBus<I2C>,
    addr: u8,
}

impl<I2C: I2c> Ens160<I2C> {
    pub fn detect_and_init(bus: SharedBus<I2C>, delay: &mut dyn DelayNs) -> Result<Self, InitError> {
        let kind = SensorKind::Ens160;
        let id = bus
            .read_register::<2>(ENS160_ADDR, REG_PART_ID)
            .map_err(|source| InitError::Absent { kind, source })?;
        let found = decode_unsigned_16_le(id);
        if found != PART_ID {
            return Err(InitError::IdentityMismatch {
                kind,
                expected: PART_ID,
                found,
            });
        }

        for (mode, settle) in [(OPMODE_RESET, RESET_SETTLE), (OPMODE_STANDARD, MODE_SETTLE)] {
            bus.write_register(ENS160_ADDR, REG_OPMODE, mode)
                .map_err(|source| InitError::Configure { kind, source })?;
            pause(delay, settle);
        }

        info!("Found ENS160 (addr 0x{:02X})", ENS160_ADDR);
        Ok(Self {
            bus,
            addr: ENS160_ADDR,
        })
    }

    /// Feed ambient conditions into the gas compensation.
    pub fn set_environment(&mut self, temperature_c: f64, humidity_pct: f64) -> Result<(), BusFault> {
        let [t_lo, t_hi] = ens160_temperature_word(temperature_c).to_le_bytes();
        let [h_lo, h_hi] = ens160_humidity_word(humidity_pct).to_le_bytes();
        self.bus.write(self.addr, &[REG_TEMP_IN, t_lo, t_hi])?;
        self.bus.write(self.addr, &[REG_RH_IN, h_lo, h_hi])
    }
}

impl<I2C: I2c> Sensor for Ens160<I2C> {
    fn kind(&self) -> SensorKind {
        SensorKind::Ens160
    }

    fn read_once(&mut self, _delay: &mut dyn DelayNs) -> Result<PartialReading, ReadError> {
        let data: [u8; 5] = self.bus.read_register(self.addr, REG_DATA_AQI)?;
        debug!("ENS160 data: {:02X?}", data);

        let aqi = CompensationFault::check("aqi", f64::from(data[0] & AQI_MASK), 1.0, 5.0)?;
        let tvoc = decode_unsigned_16_le([data[1], data[2]]);
        let eco2 = decode_unsigned_16_le([data[3], data[4]]);

        Ok(PartialReading::new(SensorKind::Ens160)
            .with(Field::Aqi, aqi)
            .with(Field::Tvoc, f64::from(tvoc))
            .with(Field::Eco2, f64::from(eco2)))
    }

    fn shutdown(&mut self) -> Result<(), BusFault> {
        self.bus
            .write_register(self.addr, REG_OPMODE, OPMODE_DEEP_SLEEP)
    }
}
