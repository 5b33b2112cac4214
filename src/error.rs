use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

use crate::sensors::SensorKind;

/// Failure of a single bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusFault {
    #[error("no acknowledge from device 0x{0:02X}")]
    NoAcknowledge(u8),
    #[error("timeout waiting for device 0x{0:02X}")]
    Timeout(u8),
    #[error("transaction with 0x{address:02X} failed: {kind}")]
    Transport { address: u8, kind: ErrorKind },
    #[error("bus lock poisoned by a panicked holder")]
    Poisoned,
}

/// A decoded value that must not be reported.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CompensationFault {
    #[error("pressure compensation divisor evaluated to zero")]
    ZeroDivisor,
    #[error("pressure compensation left the 64-bit range")]
    Overflow,
    #[error("{quantity} {value} outside plausible range {min}..={max}")]
    Implausible {
        quantity: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl CompensationFault {
    pub(crate) fn check(quantity: &'static str, value: f64, min: f64, max: f64) -> Result<f64, Self> {
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(Self::Implausible {
                quantity,
                value,
                min,
                max,
            })
        }
    }
}

/// Fatal to one driver only; the collector keeps initializing the others.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InitError {
    #[error("{kind} not detected: {source}")]
    Absent { kind: SensorKind, source: BusFault },
    #[error("{kind} identity mismatch: expected 0x{expected:04X}, found 0x{found:04X}")]
    IdentityMismatch {
        kind: SensorKind,
        expected: u16,
        found: u16,
    },
    #[error("{kind} calibration load failed: {source}")]
    Calibration { kind: SensorKind, source: BusFault },
    #[error("{kind} configuration failed: {source}")]
    Configure { kind: SensorKind, source: BusFault },
}

/// Per-cycle read failure. Always absorbed by the suite as "no fields".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadError {
    #[error(transparent)]
    Bus(#[from] BusFault),
    #[error(transparent)]
    Compensation(#[from] CompensationFault),
    #[error("measurement still in progress")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sampling window produced no usable readings ({attempted} cycles attempted)")]
pub struct EmptyWindowError {
    pub attempted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    #[error("collector is not ready")]
    NotInitialized,
    #[error("no sensor could be initialized")]
    NoSensors,
    #[error(transparent)]
    EmptyWindow(#[from] EmptyWindowError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlarmError {
    #[error("alarm output pin fault: {0:?}")]
    Pin(embedded_hal::digital::ErrorKind),
    #[error("alarm state poisoned by a panicked timer")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishFault {
    #[error("broker session is not connected")]
    Disconnected,
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// One report cycle failed; the loop logs it and tries again next interval.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("collection failed: {0}")]
    Collect(#[from] CollectorError),
    #[error("report encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishFault),
}
