use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use log::{error, info};

use crate::error::BusFault;

/// Cloneable handle to the one physical I2C bus.
///
/// Every driver holds a clone; the mutex is the only serialization point, so
/// a multi-step sequence (command, settle, read) runs under a single lock.
pub struct SharedBus<I2C> {
    inner: Arc<Mutex<I2C>>,
}

impl<I2C> Clone for SharedBus<I2C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I2C: I2c> SharedBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(i2c)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, I2C>, BusFault> {
        self.inner.lock().map_err(|_| BusFault::Poisoned)
    }

    pub fn write(&self, address: u8, bytes: &[u8]) -> Result<(), BusFault> {
        self.lock()?
            .write(address, bytes)
            .map_err(|e| fault(address, e))
    }

    /// Register-pointer write followed by a repeated-start read.
    pub fn write_read(&self, address: u8, register: &[u8], buf: &mut [u8]) -> Result<(), BusFault> {
        self.lock()?
            .write_read(address, register, buf)
            .map_err(|e| fault(address, e))
    }

    /// Write a command, STOP, wait `settle`, then read the response.
    pub fn write_then_read(
        &self,
        address: u8,
        command: &[u8],
        settle: Duration,
        delay: &mut dyn DelayNs,
        buf: &mut [u8],
    ) -> Result<(), BusFault> {
        let mut i2c = self.lock()?;
        i2c.write(address, command).map_err(|e| fault(address, e))?;
        pause(delay, settle);
        i2c.read(address, buf).map_err(|e| fault(address, e))
    }

    pub fn read_register<const N: usize>(&self, address: u8, register: u8) -> Result<[u8; N], BusFault> {
        let mut buf = [0u8; N];
        self.write_read(address, &[register], &mut buf)?;
        Ok(buf)
    }

    pub fn write_register(&self, address: u8, register: u8, value: u8) -> Result<(), BusFault> {
        self.write(address, &[register, value])
    }

    /// Probe every 7-bit address with an empty write and return the responders.
    pub fn scan(&self) -> Vec<u8> {
        info!("Scanning I2C...");
        let found: Vec<u8> = (0x08u8..0x78u8)
            .filter(|&addr| self.write(addr, &[]).is_ok())
            .collect();
        for addr in &found {
            info!("I2C device at 0x{:02X}", addr);
        }
        if found.is_empty() {
            error!("No I2C devices found (wrong pins / no pullups / power gating)");
        }
        found
    }
}

fn fault<E: embedded_hal::i2c::Error>(address: u8, err: E) -> BusFault {
    match err.kind() {
        ErrorKind::NoAcknowledge(_) => BusFault::NoAcknowledge(address),
        kind => BusFault::Transport { address, kind },
    }
}

/// Block for `duration` on a `DelayNs`, which only takes u32 counts.
pub fn pause(delay: &mut dyn DelayNs, duration: Duration) {
    let ms = duration.as_millis();
    let us = (duration.as_micros() % 1000) as u32;
    delay.delay_ms(ms.min(u128::from(u32::MAX)) as u32);
    if us > 0 {
        delay.delay_us(us);
    }
}
