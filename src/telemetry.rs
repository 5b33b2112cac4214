//! Property-report payload for the cloud platform.
//!
//! Four services, each stamped with the record's capture time:
//!
//! ```json
//! {"services":[{"service_id":"EnvironmentData","properties":{...}}, ...]}
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::{round_to, SEA_LEVEL_HPA};
use crate::reading::{AggregatedRecord, Field};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyReport {
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service_id", content = "properties")]
pub enum Service {
    EnvironmentData(EnvironmentData),
    AirQuality(AirQuality),
    Gas(Gas),
    SystemInfo(SystemInfo),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentData {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub altitude: f64,
    /// 0 AHT21, 1 BMP280.
    pub temperature_source: u8,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub aqi: u8,
    /// ppb
    pub tvoc: f64,
    /// ppm
    pub eco2: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gas {
    pub mq2_adc: f64,
    pub mq2_voltage: f64,
    pub mq2_status: u8,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// 0 single-shot, 1 windowed average.
    pub data_source: u8,
    pub samples_count: usize,
    pub reading_count: u64,
    pub timestamp: f64,
}

/// Map a record onto the report schema, filling absent fields with defaults.
pub fn format_report(record: &AggregatedRecord) -> PropertyReport {
    let timestamp = record.timestamp();
    let value = |field: Field, default: f64| record.get(field).unwrap_or(default);
    // Tiers are small non-negative integers; `as` saturates anything else.
    let tier = |field: Field| value(field, 0.0) as u8;

    PropertyReport {
        services: vec![
            Service::EnvironmentData(EnvironmentData {
                temperature: round_to(value(Field::Temperature, 0.0), 2),
                humidity: round_to(value(Field::Humidity, 0.0), 2),
                pressure: round_to(value(Field::Pressure, SEA_LEVEL_HPA), 2),
                altitude: round_to(value(Field::Altitude, 0.0), 2),
                temperature_source: tier(Field::TemperatureSource),
                timestamp,
            }),
            Service::AirQuality(AirQuality {
                aqi: tier(Field::Aqi),
                tvoc: round_to(value(Field::Tvoc, 0.0), 2),
                eco2: value(Field::Eco2, 0.0),
                timestamp,
            }),
            Service::Gas(Gas {
                mq2_adc: round_to(value(Field::Mq2Adc, 0.0), 2),
                mq2_voltage: round_to(value(Field::Mq2Voltage, 0.0), 3),
                mq2_status: tier(Field::Mq2Status),
                timestamp,
            }),
            Service::SystemInfo(SystemInfo {
                data_source: record.data_source.code(),
                samples_count: record.samples_count,
                reading_count: record.reading_count,
                timestamp,
            }),
        ],
    }
}

pub fn to_payload(record: &AggregatedRecord) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&format_report(record))
}
