use core::fmt;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Every quantity the suite can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Temperature,
    Humidity,
    Pressure,
    Altitude,
    Aqi,
    Tvoc,
    Eco2,
    Mq2Adc,
    Mq2Voltage,
    Mq2Status,
    TemperatureSource,
}

impl Field {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Altitude => "altitude",
            Self::Aqi => "aqi",
            Self::Tvoc => "tvoc",
            Self::Eco2 => "eco2",
            Self::Mq2Adc => "mq2_adc",
            Self::Mq2Voltage => "mq2_voltage",
            Self::Mq2Status => "mq2_status",
            Self::TemperatureSource => "temperature_source",
        }
    }

    /// Last value wins for these; everything else is averaged.
    /// TVOC and eCO2 are deliberately averaged even though they are integers.
    pub const fn is_categorical(self) -> bool {
        matches!(self, Self::Aqi | Self::Mq2Status | Self::TemperatureSource)
    }
}

/// Which driver supplied `Field::Temperature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureSource {
    Aht21 = 0,
    Bmp280 = 1,
}

impl TemperatureSource {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: f64) -> Option<Self> {
        match code as i64 {
            0 => Some(Self::Aht21),
            1 => Some(Self::Bmp280),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    SingleShot = 0,
    Windowed = 1,
}

impl DataSource {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// One full-suite cycle with at least one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    values: BTreeMap<Field, f64>,
    sequence: u64,
    captured_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(values: BTreeMap<Field, f64>, sequence: u64, captured_at: DateTime<Utc>) -> Self {
        Self {
            values,
            sequence,
            captured_at,
        }
    }

    pub fn from_pairs(pairs: &[(Field, f64)], sequence: u64) -> Self {
        Self::new(pairs.iter().copied().collect(), sequence, Utc::now())
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// Reduced result of one single-shot or windowed acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    values: BTreeMap<Field, f64>,
    pub samples_count: usize,
    pub reading_count: u64,
    pub captured_at: DateTime<Utc>,
    pub data_source: DataSource,
}

impl AggregatedRecord {
    pub fn new(
        values: BTreeMap<Field, f64>,
        samples_count: usize,
        reading_count: u64,
        data_source: DataSource,
    ) -> Self {
        Self {
            values,
            samples_count,
            reading_count,
            captured_at: Utc::now(),
            data_source,
        }
    }

    pub fn single(reading: Reading) -> Self {
        Self {
            values: reading.values,
            samples_count: 1,
            reading_count: reading.sequence,
            captured_at: reading.captured_at,
            data_source: DataSource::SingleShot,
        }
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn temperature_source(&self) -> Option<TemperatureSource> {
        self.get(Field::TemperatureSource)
            .and_then(TemperatureSource::from_code)
    }

    /// Capture time as fractional Unix seconds.
    pub fn timestamp(&self) -> f64 {
        self.captured_at.timestamp_millis() as f64 / 1000.0
    }
}

impl fmt::Display for AggregatedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, value) in &self.values {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", field.key(), value)?;
            first = false;
        }
        if first {
            f.write_str("(no fields)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorical_partition_is_fixed() {
        let categorical: Vec<Field> = [
            Field::Temperature,
            Field::Humidity,
            Field::Pressure,
            Field::Altitude,
            Field::Aqi,
            Field::Tvoc,
            Field::Eco2,
            Field::Mq2Adc,
            Field::Mq2Voltage,
            Field::Mq2Status,
            Field::TemperatureSource,
        ]
        .into_iter()
        .filter(|f| f.is_categorical())
        .collect();
        assert_eq!(
            categorical,
            [Field::Aqi, Field::Mq2Status, Field::TemperatureSource]
        );
    }

    #[test]
    fn single_keeps_reading_metadata() {
        let reading = Reading::from_pairs(&[(Field::Humidity, 45.0)], 9);
        let at = reading.captured_at();
        let record = AggregatedRecord::single(reading);
        assert_eq!(record.samples_count, 1);
        assert_eq!(record.reading_count, 9);
        assert_eq!(record.captured_at, at);
        assert_eq!(record.data_source, DataSource::SingleShot);
        assert_eq!(record.to_string(), "humidity=45");
    }

    #[test]
    fn temperature_source_codes() {
        assert_eq!(TemperatureSource::from_code(0.0), Some(TemperatureSource::Aht21));
        assert_eq!(TemperatureSource::from_code(1.0), Some(TemperatureSource::Bmp280));
        assert_eq!(TemperatureSource::from_code(2.0), None);
    }
}
