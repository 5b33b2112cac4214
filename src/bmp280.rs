use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::bus::{pause, SharedBus};
use crate::codec::{altitude_from_pressure, round_to, split_bmp_burst, CalibrationTable};
use crate::error::{BusFault, CompensationFault, InitError, ReadError};
use crate::reading::Field;
use crate::sensors::{PartialReading, Sensor, SensorKind};

pub const PRIMARY_ADDR: u8 = 0x76;
pub const SECONDARY_ADDR: u8 = 0x77;

const REG_CHIP_ID: u8 = 0xD0;
const CHIP_ID: u8 = 0x58;
const REG_CALIB: u8 = 0x88;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

// osrs_t x2, osrs_p x4, normal mode.
const CTRL_MEAS_NORMAL: u8 = 0x67;
const CTRL_MEAS_SLEEP: u8 = 0x00;
// IIR filter coefficient 4.
const CONFIG_IIR_X4: u8 = 0x10;

const CONFIG_SETTLE: Duration = Duration::from_millis(10);
const DATA_READY: Duration = Duration::from_millis(5);

// Datasheet operating range.
const TEMPERATURE_RANGE: (f64, f64) = (-40.0, 85.0);
const PRESSURE_RANGE_HPA: (f64, f64) = (300.0, 1100.0);

pub struct Bmp280<I2C> {
    bus: SharedBus<I2C>,
    addr: u8,
    calibration: CalibrationTable,
    sea_level_hpa: f64,
}

impl<I2C: I2c> Bmp280<I2C> {
    pub fn detect_and_init(
        bus: SharedBus<I2C>,
        sea_level_hpa: f64,
        delay: &mut dyn DelayNs,
    ) -> Result<Self, InitError> {
        let kind = SensorKind::Bmp280;
        let addr = probe(&bus)?;

        let regs: [u8; CalibrationTable::REGISTER_LEN] = bus
            .read_register(addr, REG_CALIB)
            .map_err(|source| InitError::Calibration { kind, source })?;
        let calibration = CalibrationTable::from_registers(&regs);
        debug!("BMP280 calibration: {:?}", calibration);

        for (reg, value) in [(REG_CTRL_MEAS, CTRL_MEAS_NORMAL), (REG_CONFIG, CONFIG_IIR_X4)] {
            bus.write_register(addr, reg, value)
                .map_err(|source| InitError::Configure { kind, source })?;
            pause(delay, CONFIG_SETTLE);
        }

        info!("Found BMP280 (addr 0x{:02X})", addr);
        Ok(Self {
            bus,
            addr,
            calibration,
            sea_level_hpa,
        })
    }
}

fn probe<I2C: I2c>(bus: &SharedBus<I2C>) -> Result<u8, InitError> {
    let kind = SensorKind::Bmp280;
    let mut last = InitError::Absent {
        kind,
        source: BusFault::NoAcknowledge(PRIMARY_ADDR),
    };
    for addr in [PRIMARY_ADDR, SECONDARY_ADDR] {
        match bus.read_register::<1>(addr, REG_CHIP_ID) {
            Ok([CHIP_ID]) => return Ok(addr),
            Ok([found]) => {
                warn!("BMP280 probe 0x{:02X}: chip id 0x{:02X}", addr, found);
                last = InitError::IdentityMismatch {
                    kind,
                    expected: u16::from(CHIP_ID),
                    found: u16::from(found),
                };
            }
            Err(source) => {
                debug!("BMP280 probe 0x{:02X}: {}", addr, source);
                last = InitError::Absent { kind, source };
            }
        }
    }
    Err(last)
}

impl<I2C: I2c> Sensor for Bmp280<I2C> {
    fn kind(&self) -> SensorKind {
        SensorKind::Bmp280
    }

    fn read_once(&mut self, delay: &mut dyn DelayNs) -> Result<PartialReading, ReadError> {
        pause(delay, DATA_READY);
        let burst: [u8; 6] = self.bus.read_register(self.addr, REG_DATA)?;
        let (raw_t, raw_p) = split_bmp_burst(&burst);
        let out = self.calibration.compensate(raw_t, raw_p)?;

        let temperature = CompensationFault::check(
            "temperature",
            round_to(out.temperature_c, 2),
            TEMPERATURE_RANGE.0,
            TEMPERATURE_RANGE.1,
        )?;
        let pressure = CompensationFault::check(
            "pressure",
            round_to(out.pressure_hpa, 2),
            PRESSURE_RANGE_HPA.0,
            PRESSURE_RANGE_HPA.1,
        )?;
        let altitude = altitude_from_pressure(pressure, self.sea_level_hpa);
        debug!("BMP280: pressure={:.2}, altitude={:.2}", pressure, altitude);

        Ok(PartialReading::new(SensorKind::Bmp280)
            .with(Field::Temperature, temperature)
            .with(Field::Pressure, pressure)
            .with(Field::Altitude, altitude))
    }

    fn shutdown(&mut self) -> Result<(), BusFault> {
        self.bus
            .write_register(self.addr, REG_CTRL_MEAS, CTRL_MEAS_SLEEP)
    }
}
