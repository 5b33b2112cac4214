// lib.rs
// Acquisition core for the smoke/air-quality detector.
//
// Sensors on one I2C bus:
//   AHT21   0x38  temperature + humidity
//   BMP280  0x76/0x77  temperature + pressure (altitude derived)
//   ENS160  0x52  AQI tier, TVOC, eCO2
//   ADS1115 0x49  MQ-2 analog gas channel (AIN0, gain 2/3)
//
// Everything here is host-portable (embedded-hal traits only); the ESP-IDF
// wiring lives in main.rs behind cfg(target_os = "espidf").

pub mod ads1115;
pub mod aht21;
pub mod alarm;
pub mod bmp280;
pub mod bus;
pub mod codec;
pub mod collector;
pub mod config;
pub mod ens160;
pub mod error;
pub mod monitor;
pub mod mq2;
pub mod publish;
pub mod reading;
pub mod sensors;
pub mod telemetry;
pub mod timer;
pub mod window;

pub use collector::{Collector, CollectorState, SensorStatus};
pub use config::Config;
pub use error::{
    AlarmError, BusFault, CollectorError, CompensationFault, EmptyWindowError, InitError,
    PublishFault, ReadError, ReportError,
};
pub use reading::{AggregatedRecord, DataSource, Field, Reading, TemperatureSource};
pub use sensors::{Sensor, SensorKind};
