use embedded_hal::delay::DelayNs;
use log::info;

use crate::ads1115::AnalogInput;
use crate::codec::{adc_code_to_volts, round_to};
use crate::error::{CompensationFault, InitError, ReadError};
use crate::reading::Field;
use crate::sensors::{PartialReading, Sensor, SensorKind};

/// Upper voltage bounds of tiers 0..=2; anything above is tier 3.
pub const STATUS_THRESHOLDS_V: [f64; 3] = [0.5, 0.8, 1.2];

/// 0 normal, 1 low, 2 medium, 3 high concentration.
pub fn classify_voltage(voltage: f64) -> u8 {
    STATUS_THRESHOLDS_V
        .iter()
        .filter(|&&threshold| voltage >= threshold)
        .count() as u8
}

/// MQ-2 combustible gas sensor behind an analog front end.
pub struct Mq2<A> {
    input: A,
}

impl<A: AnalogInput> Mq2<A> {
    pub fn detect_and_init(mut input: A) -> Result<Self, InitError> {
        input.probe().map_err(|source| InitError::Absent {
            kind: SensorKind::Mq2,
            source,
        })?;
        info!("MQ-2 analog front end ready ({} V full scale)", input.full_scale_volts());
        Ok(Self { input })
    }
}

impl<A: AnalogInput> Sensor for Mq2<A> {
    fn kind(&self) -> SensorKind {
        SensorKind::Mq2
    }

    fn read_once(&mut self, delay: &mut dyn DelayNs) -> Result<PartialReading, ReadError> {
        let raw = self.input.read_raw(delay)?;
        let code = CompensationFault::check("mq2_adc", f64::from(raw), 0.0, f64::from(i16::MAX))?;
        // Tier from the unrounded voltage; only the reported value is rounded.
        let volts = adc_code_to_volts(raw, self.input.full_scale_volts());

        Ok(PartialReading::new(SensorKind::Mq2)
            .with(Field::Mq2Adc, code)
            .with(Field::Mq2Voltage, round_to(volts, 3))
            .with(Field::Mq2Status, f64::from(classify_voltage(volts))))
    }
}
