//! Register-level models of the board's I2C devices.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

pub const AHT21: u8 = 0x38;
pub const ENS160: u8 = 0x52;
pub const BMP280: u8 = 0x76;
pub const ADS1115: u8 = 0x49;

/// 40.0 %RH, 20.0 C, status idle.
pub const AHT_FRAME: [u8; 6] = [0x1C, 0x66, 0x66, 0x65, 0x99, 0x9A];

/// Datasheet calibration: T1=27504 T2=26435 T3=-1000 P1=36477 ... P9=6000.
pub const BMP_CALIBRATION: [u8; 24] = [
    0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C,
    0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
];
/// raw_p = 415148, raw_t = 519888 -> 25.08 C, 1006.53 hPa.
pub const BMP_BURST: [u8; 6] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00];

/// AQI 2, TVOC 120 ppb, eCO2 640 ppm.
pub const ENS_DATA: [u8; 5] = [0x02, 0x78, 0x00, 0x80, 0x02];

/// 0.9 V at gain 2/3 -> tier 2.
pub const ADS_CODE: i16 = 4800;

#[derive(Debug)]
pub struct BusError(pub ErrorKind);

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

enum Device {
    /// Command-driven: a measure command arms the next read.
    Aht21 { commands: Vec<Vec<u8>>, frame: [u8; 6] },
    /// Byte registers with an auto-incrementing pointer.
    Registers { regs: [u8; 256], pointer: u8 },
    /// Big-endian 16-bit registers, conversion always complete.
    Ads1115 { config: u16, conversion: i16, pointer: u8 },
}

impl Device {
    fn write(&mut self, bytes: &[u8]) {
        match self {
            Device::Aht21 { commands, .. } => {
                if !bytes.is_empty() {
                    commands.push(bytes.to_vec());
                }
            }
            Device::Registers { regs, pointer } => {
                if let Some((&reg, data)) = bytes.split_first() {
                    *pointer = reg;
                    for (i, b) in data.iter().enumerate() {
                        regs[reg.wrapping_add(i as u8) as usize] = *b;
                    }
                }
            }
            Device::Ads1115 { config, pointer, .. } => {
                if let Some((&reg, data)) = bytes.split_first() {
                    *pointer = reg;
                    if reg == 0x01 && data.len() == 2 {
                        *config = u16::from_be_bytes([data[0], data[1]]);
                    }
                }
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        match self {
            Device::Aht21 { frame, .. } => {
                for (dst, src) in buf.iter_mut().zip(frame.iter()) {
                    *dst = *src;
                }
            }
            Device::Registers { regs, pointer } => {
                for (i, dst) in buf.iter_mut().enumerate() {
                    *dst = regs[pointer.wrapping_add(i as u8) as usize];
                }
            }
            Device::Ads1115 {
                config,
                conversion,
                pointer,
            } => {
                let word = match *pointer {
                    0x00 => *conversion as u16,
                    _ => *config | 0x8000,
                };
                for (dst, src) in buf.iter_mut().zip(word.to_be_bytes()) {
                    *dst = src;
                }
            }
        }
    }
}

#[derive(Default)]
struct Board {
    devices: BTreeMap<u8, Device>,
    /// Present but every transaction fails.
    faulty: BTreeSet<u8>,
}

/// The simulated bus; clones share one board.
#[derive(Clone, Default)]
pub struct FakeBus {
    board: Arc<Mutex<Board>>,
}

impl FakeBus {
    /// Every sensor present with the reference values above.
    pub fn full_board() -> Self {
        let bus = Self::default();
        bus.add_aht21();
        bus.add_bmp280(BMP280);
        bus.add_ens160();
        bus.add_ads1115(ADS_CODE);
        bus
    }

    pub fn add_aht21(&self) {
        self.insert(
            AHT21,
            Device::Aht21 {
                commands: Vec::new(),
                frame: AHT_FRAME,
            },
        );
    }

    pub fn add_bmp280(&self, address: u8) {
        let mut regs = [0u8; 256];
        regs[0xD0] = 0x58;
        regs[0x88..0x88 + 24].copy_from_slice(&BMP_CALIBRATION);
        regs[0xF7..0xF7 + 6].copy_from_slice(&BMP_BURST);
        self.insert(address, Device::Registers { regs, pointer: 0 });
    }

    pub fn add_ens160(&self) {
        let mut regs = [0u8; 256];
        regs[0x00] = 0x60;
        regs[0x01] = 0x01;
        regs[0x21..0x21 + 5].copy_from_slice(&ENS_DATA);
        self.insert(ENS160, Device::Registers { regs, pointer: 0 });
    }

    pub fn add_ads1115(&self, code: i16) {
        self.insert(
            ADS1115,
            Device::Ads1115 {
                config: 0x8583,
                conversion: code,
                pointer: 0,
            },
        );
    }

    fn insert(&self, address: u8, device: Device) {
        self.board.lock().unwrap().devices.insert(address, device);
    }

    pub fn remove(&self, address: u8) {
        self.board.lock().unwrap().devices.remove(&address);
    }

    pub fn set_faulty(&self, address: u8, faulty: bool) {
        let mut board = self.board.lock().unwrap();
        if faulty {
            board.faulty.insert(address);
        } else {
            board.faulty.remove(&address);
        }
    }

    pub fn set_register(&self, address: u8, register: u8, value: u8) {
        if let Some(Device::Registers { regs, .. }) =
            self.board.lock().unwrap().devices.get_mut(&address)
        {
            regs[register as usize] = value;
        }
    }

    pub fn register(&self, address: u8, register: u8) -> Option<u8> {
        match self.board.lock().unwrap().devices.get(&address) {
            Some(Device::Registers { regs, .. }) => Some(regs[register as usize]),
            _ => None,
        }
    }

    pub fn set_aht_frame(&self, frame: [u8; 6]) {
        if let Some(Device::Aht21 { frame: f, .. }) =
            self.board.lock().unwrap().devices.get_mut(&AHT21)
        {
            *f = frame;
        }
    }

    pub fn aht_commands(&self) -> Vec<Vec<u8>> {
        match self.board.lock().unwrap().devices.get(&AHT21) {
            Some(Device::Aht21 { commands, .. }) => commands.clone(),
            _ => Vec::new(),
        }
    }
}

impl ErrorType for FakeBus {
    type Error = BusError;
}

impl I2c for FakeBus {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        let mut board = self.board.lock().unwrap();
        if board.faulty.contains(&address) {
            return Err(BusError(ErrorKind::Other));
        }
        let Some(device) = board.devices.get_mut(&address) else {
            return Err(BusError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        };
        for op in operations {
            match op {
                Operation::Write(bytes) => device.write(bytes),
                Operation::Read(buf) => device.read(buf),
            }
        }
        Ok(())
    }
}

/// Accumulates requested delay without sleeping; clones share the total.
#[derive(Clone, Default)]
pub struct RecordingDelay {
    nanos: Arc<AtomicU64>,
}

impl RecordingDelay {
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.nanos.fetch_add(u64::from(ns), Ordering::SeqCst);
    }
}
