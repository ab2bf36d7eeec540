// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! I2C register access shared by every chip on the board bus.
//!
//! All devices use the same framing: a register pointer byte followed by data for writes, or a
//! pointer write followed by a repeated-start read. Drivers never own the bus; it is passed in as
//! `&mut` to each call so that the RTC, gyro, power monitor and motor driver can share it.

use embedded_hal::i2c::{self, I2c, Operation, SevenBitAddress};

/// Bus clock used on the board.
pub const BUS_FREQUENCY_HZ: u32 = 400_000;

/// Read `buf.len()` bytes starting at register `reg`.
#[inline]
pub fn read_reg<I2C: I2c>(bus: &mut I2C, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), I2C::Error> {
    bus.write_read(addr, &[reg], buf)
}

/// Read a single byte register.
#[inline]
pub fn read_u8<I2C: I2c>(bus: &mut I2C, addr: u8, reg: u8) -> Result<u8, I2C::Error> {
    let mut buf = [0u8; 1];
    bus.write_read(addr, &[reg], &mut buf)?;
    Ok(buf[0])
}

/// Write `data` starting at register `reg` in a single transaction.
///
/// Adjacent write operations go out back to back without a repeated start, so the pointer and
/// the payload form one frame of any length.
pub fn write_reg<I2C: I2c>(bus: &mut I2C, addr: u8, reg: u8, data: &[u8]) -> Result<(), I2C::Error> {
    bus.transaction(addr, &mut [Operation::Write(&[reg]), Operation::Write(data)])
}

/// Send a bare command byte (no payload), e.g. the PAC1934 REFRESH commands.
#[inline]
pub fn send_command<I2C: I2c>(bus: &mut I2C, addr: u8, cmd: u8) -> Result<(), I2C::Error> {
    bus.write(addr, &[cmd])
}

/// Read-modify-write of a single byte register.
pub fn modify_reg<I2C: I2c, F>(bus: &mut I2C, addr: u8, reg: u8, f: F) -> Result<u8, I2C::Error>
where
    F: FnOnce(u8) -> u8,
{
    let value = f(read_u8(bus, addr, reg)?);
    write_reg(bus, addr, reg, &[value])?;
    Ok(value)
}

/// I2C adapter that retries a failed transaction once before reporting the error.
///
/// A second failure is returned to the caller unchanged.
pub struct RetryI2c<I2C> {
    bus: I2C,
    retries: u32,
}

impl<I2C> RetryI2c<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self { bus, retries: 0 }
    }

    /// Number of transactions that needed a retry since construction.
    #[inline]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    #[inline]
    pub fn free(self) -> I2C {
        self.bus
    }
}

impl<I2C: I2c> i2c::ErrorType for RetryI2c<I2C> {
    type Error = I2C::Error;
}

impl<I2C: I2c> I2c<SevenBitAddress> for RetryI2c<I2C> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match self.bus.transaction(address, operations) {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!("i2c: transaction to {=u8:#x} failed, retrying", address);
                self.retries = self.retries.wrapping_add(1);
                let result = self.bus.transaction(address, operations);
                if result.is_err() {
                    error!("i2c: retry to {=u8:#x} failed", address);
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BusOp, FakeI2c};

    #[test]
    fn write_reg_frames_pointer_then_data() {
        let mut bus = FakeI2c::new();
        write_reg(&mut bus, 0x51, 0x04, &[0x12, 0x34]).unwrap();
        assert_eq!(bus.writes_to(0x51), std::vec![(0x04, std::vec![0x12, 0x34])]);
        assert_eq!(bus.reg(0x51, 0x05), 0x34);
    }

    #[test]
    fn write_reg_sends_long_bursts_whole() {
        let mut bus = FakeI2c::new();
        let data: std::vec::Vec<u8> = (1..=12).collect();
        write_reg(&mut bus, 0x51, 0x03, &data).unwrap();
        assert_eq!(bus.writes_to(0x51), std::vec![(0x03, data)]);
        assert_eq!(bus.reg(0x51, 0x0E), 12);
    }

    #[test]
    fn register_read_logs_no_write() {
        let mut bus = FakeI2c::new().with(0x68, 0x75, &[0xB5]);
        assert_eq!(read_u8(&mut bus, 0x68, 0x75).unwrap(), 0xB5);
        assert!(bus.writes_to(0x68).is_empty());
        assert_eq!(
            bus.log,
            std::vec![BusOp::Read {
                addr: 0x68,
                reg: 0x75,
                len: 1
            }]
        );
    }

    #[test]
    fn modify_reg_preserves_other_bits() {
        let mut bus = FakeI2c::new().with(0x52, 0x01, &[0x03]);
        let v = modify_reg(&mut bus, 0x52, 0x01, |v| v | 0x80).unwrap();
        assert_eq!(v, 0x83);
        assert_eq!(bus.reg(0x52, 0x01), 0x83);
    }

    #[test]
    fn retry_recovers_from_single_failure() {
        let mut fake = FakeI2c::new().with(0x68, 0x75, &[0xB5]);
        fake.fail_next = 1;
        let mut bus = RetryI2c::new(fake);
        assert_eq!(read_u8(&mut bus, 0x68, 0x75).unwrap(), 0xB5);
        assert_eq!(bus.retries(), 1);
    }

    #[test]
    fn retry_gives_up_after_second_failure() {
        let mut fake = FakeI2c::new();
        fake.fail_next = 2;
        let mut bus = RetryI2c::new(fake);
        assert!(read_u8(&mut bus, 0x68, 0x75).is_err());
        let fake = bus.free();
        assert!(fake.log.is_empty());
    }

    #[test]
    fn command_is_a_bare_pointer_write() {
        let mut bus = FakeI2c::new();
        send_command(&mut bus, 0x11, 0x00).unwrap();
        assert_eq!(
            bus.log,
            std::vec![BusOp::Write {
                addr: 0x11,
                reg: 0x00,
                data: std::vec![]
            }]
        );
    }
}
