//! Host-side test doubles for the `embedded-hal` traits used throughout the crate.

extern crate std;

use core::cell::Cell;
use core::convert::Infallible;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};
use embedded_hal::pwm::{self, SetDutyCycle};

/// One bus-level event recorded by [`FakeI2c`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOp {
    /// Write of `[reg, data..]` (data may be empty for command bytes).
    Write { addr: u8, reg: u8, data: Vec<u8> },
    /// Read of `len` bytes starting at `reg`.
    Read { addr: u8, reg: u8, len: usize },
}

/// Register-file I2C simulator.
///
/// Each `(device, register)` pair holds a byte vector. A read starting at `reg` consumes the
/// whole vector of each register in turn, then moves to the next address, which models both
/// multi-byte registers (PAC1934) and auto-incrementing byte registers (RTC, gyro).
///
/// Writes store one byte per register, auto-incrementing.
#[derive(Default)]
pub struct FakeI2c {
    regs: HashMap<(u8, u8), Vec<u8>>,
    pointer: HashMap<u8, u8>,
    pub log: Vec<BusOp>,
    /// Number of upcoming transactions that fail with `NoAcknowledge`.
    pub fail_next: usize,
}

impl FakeI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a register with raw bytes (big-endian as the chip would return them).
    pub fn set(&mut self, addr: u8, reg: u8, bytes: &[u8]) {
        self.regs.insert((addr, reg), bytes.to_vec());
    }

    pub fn with(mut self, addr: u8, reg: u8, bytes: &[u8]) -> Self {
        self.set(addr, reg, bytes);
        self
    }

    /// Current single-byte value of a register (0 if never written).
    pub fn reg(&self, addr: u8, reg: u8) -> u8 {
        self.regs
            .get(&(addr, reg))
            .and_then(|v| v.first().copied())
            .unwrap_or(0)
    }

    /// All writes issued to a device, in order, as `(reg, data)`.
    pub fn writes_to(&self, addr: u8) -> Vec<(u8, Vec<u8>)> {
        self.log
            .iter()
            .filter_map(|op| match op {
                BusOp::Write { addr: a, reg, data } if *a == addr => Some((*reg, data.clone())),
                _ => None,
            })
            .collect()
    }

    fn do_write(&mut self, addr: u8, bytes: &[u8]) {
        let Some((&reg, data)) = bytes.split_first() else {
            return;
        };
        self.pointer.insert(addr, reg);
        self.log.push(BusOp::Write {
            addr,
            reg,
            data: data.to_vec(),
        });
        for (i, b) in data.iter().enumerate() {
            self.regs
                .insert((addr, reg.wrapping_add(i as u8)), std::vec![*b]);
        }
    }

    fn do_read(&mut self, addr: u8, buf: &mut [u8]) {
        let start = self.pointer.get(&addr).copied().unwrap_or(0);
        self.log.push(BusOp::Read {
            addr,
            reg: start,
            len: buf.len(),
        });
        let mut reg = start;
        let mut filled = 0;
        while filled < buf.len() {
            let bytes = self
                .regs
                .get(&(addr, reg))
                .cloned()
                .unwrap_or_else(|| std::vec![0]);
            for b in bytes {
                if filled == buf.len() {
                    break;
                }
                buf[filled] = b;
                filled += 1;
            }
            reg = reg.wrapping_add(1);
        }
    }
}

impl i2c::ErrorType for FakeI2c {
    type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for FakeI2c {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        let mut frame: Vec<u8> = Vec::new();
        let mut ops = operations.iter_mut().peekable();
        while let Some(op) = ops.next() {
            match op {
                // Adjacent writes go out as one frame.
                Operation::Write(bytes) => {
                    frame.extend_from_slice(bytes);
                    match ops.peek() {
                        Some(Operation::Write(_)) => {}
                        // Register pointer of a write_read: move the pointer, log only the read.
                        Some(Operation::Read(_)) if frame.len() == 1 => {
                            self.pointer.insert(address, frame[0]);
                            frame.clear();
                        }
                        _ => {
                            self.do_write(address, &frame);
                            frame.clear();
                        }
                    }
                }
                Operation::Read(buf) => self.do_read(address, buf),
            }
        }
        Ok(())
    }
}

/// Delay that only accumulates the requested time.
#[derive(Default)]
pub struct FakeDelay {
    pub total_ns: u64,
}

impl FakeDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Output pin with a shared, observable level.
#[derive(Clone, Default)]
pub struct FakePin {
    level: Rc<Cell<bool>>,
}

impl FakePin {
    pub fn is_set_high(&self) -> bool {
        self.level.get()
    }
}

impl digital::ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(true);
        Ok(())
    }
}

/// Input pin whose level the test drives.
#[derive(Clone, Default)]
pub struct FakeKey {
    pressed: Rc<Cell<bool>>,
}

impl FakeKey {
    pub fn press(&self, pressed: bool) {
        self.pressed.set(pressed);
    }
}

impl digital::ErrorType for FakeKey {
    type Error = Infallible;
}

impl InputPin for FakeKey {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pressed.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pressed.get())
    }
}

/// PWM channel with a 13-bit duty range and a history of every duty written.
#[derive(Clone, Default)]
pub struct FakePwm {
    duty: Rc<Cell<u16>>,
    pub history: Rc<std::cell::RefCell<Vec<u16>>>,
}

impl FakePwm {
    pub const MAX: u16 = (1 << 13) - 1;

    pub fn duty(&self) -> u16 {
        self.duty.get()
    }
}

impl pwm::ErrorType for FakePwm {
    type Error = Infallible;
}

impl SetDutyCycle for FakePwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty.set(duty);
        self.history.borrow_mut().push(duty);
        Ok(())
    }
}
