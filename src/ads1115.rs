use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::bus::{pause, SharedBus};
use crate::error::BusFault;

pub const ADS1115_ADDR: u8 = 0x49;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const OS_SINGLE: u16 = 0x8000;
const MUX_SINGLE_ENDED: u16 = 0x4000;
const MODE_SINGLE_SHOT: u16 = 0x0100;
const DR_128SPS: u16 = 0x0080;
const COMP_DISABLE: u16 = 0x0003;

// One conversion at 128 SPS, then poll the OS bit.
const CONVERSION_TIME: Duration = Duration::from_millis(8);
const POLL_INTERVAL: Duration = Duration::from_millis(1);
const POLL_ATTEMPTS: usize = 10;

/// Single analog channel read through a fixed-gain front end.
pub trait AnalogInput {
    /// Check the converter answers on the bus.
    fn probe(&mut self) -> Result<(), BusFault>;

    fn read_raw(&mut self, delay: &mut dyn DelayNs) -> Result<i16, BusFault>;

    fn full_scale_volts(&self) -> f64;
}

/// Programmable gain amplifier setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    TwoThirds,
    One,
    Two,
    Four,
    Eight,
    Sixteen,
}

impl Gain {
    const fn pga_bits(self) -> u16 {
        match self {
            Self::TwoThirds => 0b000,
            Self::One => 0b001,
            Self::Two => 0b010,
            Self::Four => 0b011,
            Self::Eight => 0b100,
            Self::Sixteen => 0b101,
        }
    }

    pub const fn full_scale_volts(self) -> f64 {
        match self {
            Self::TwoThirds => 6.144,
            Self::One => 4.096,
            Self::Two => 2.048,
            Self::Four => 1.024,
            Self::Eight => 0.512,
            Self::Sixteen => 0.256,
        }
    }
}

pub struct Ads1115<I2C> {
    bus: SharedBus<I2C>,
    addr: u8,
    channel: u8,
    gain: Gain,
}

impl<I2C: I2c> Ads1115<I2C> {
    /// `channel` is the single-ended input AIN0..=AIN3.
    pub fn new(bus: SharedBus<I2C>, addr: u8, channel: u8, gain: Gain) -> Self {
        Self {
            bus,
            addr,
            channel: channel & 0x03,
            gain,
        }
    }

    pub fn config_word(&self) -> u16 {
        OS_SINGLE
            | MUX_SINGLE_ENDED
            | (u16::from(self.channel) << 12)
            | (self.gain.pga_bits() << 9)
            | MODE_SINGLE_SHOT
            | DR_128SPS
            | COMP_DISABLE
    }

    fn conversion_done(&self) -> Result<bool, BusFault> {
        let config = self.bus.read_register::<2>(self.addr, REG_CONFIG)?;
        Ok(u16::from_be_bytes(config) & OS_SINGLE != 0)
    }
}

impl<I2C: I2c> AnalogInput for Ads1115<I2C> {
    fn probe(&mut self) -> Result<(), BusFault> {
        self.bus.read_register::<2>(self.addr, REG_CONFIG).map(|_| ())
    }

    fn read_raw(&mut self, delay: &mut dyn DelayNs) -> Result<i16, BusFault> {
        let [hi, lo] = self.config_word().to_be_bytes();
        self.bus.write(self.addr, &[REG_CONFIG, hi, lo])?;
        pause(delay, CONVERSION_TIME);

        let mut attempts = 0;
        while !self.conversion_done()? {
            attempts += 1;
            if attempts >= POLL_ATTEMPTS {
                return Err(BusFault::Timeout(self.addr));
            }
            pause(delay, POLL_INTERVAL);
        }

        let raw = self.bus.read_register::<2>(self.addr, REG_CONVERSION)?;
        Ok(i16::from_be_bytes(raw))
    }

    fn full_scale_volts(&self) -> f64 {
        self.gain.full_scale_volts()
    }
}
