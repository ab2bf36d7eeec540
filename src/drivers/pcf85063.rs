// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! NXP PCF85063 real-time clock.
//!
//! Time registers hold BCD values. The clock is stopped while the time block is rewritten so the
//! prescaler does not roll over mid-update.

use embedded_hal::i2c::I2c;

use crate::hw::i2c;
use crate::time::{self, HumanTime};

pub const ADDRESS: u8 = 0x51;

// Register addresses
pub mod reg {
    pub const CONTROL_1: u8 = 0x00;
    pub const CONTROL_2: u8 = 0x01;
    pub const OFFSET: u8 = 0x02;
    pub const RAM_BYTE: u8 = 0x03;
    pub const SECONDS: u8 = 0x04;
    pub const MINUTES: u8 = 0x05;
    pub const HOURS: u8 = 0x06;
    pub const DAYS: u8 = 0x07;
    pub const WEEKDAYS: u8 = 0x08;
    pub const MONTHS: u8 = 0x09;
    pub const YEARS: u8 = 0x0A;
    pub const SECOND_ALARM: u8 = 0x0B;
    pub const MINUTE_ALARM: u8 = 0x0C;
    pub const HOUR_ALARM: u8 = 0x0D;
    pub const DAY_ALARM: u8 = 0x0E;
    pub const WEEKDAY_ALARM: u8 = 0x0F;
    pub const TIMER_VALUE: u8 = 0x10;
    pub const TIMER_MODE: u8 = 0x11;
}

const CTRL1_STOP: u8 = 1 << 5;
const CTRL1_SOFTWARE_RESET: u8 = 0x58;
const SECONDS_OS: u8 = 1 << 7;

/// Masks applied to SECONDS..YEARS when reading.
const TIME_MASKS: [u8; 7] = [0x7F, 0x7F, 0x3F, 0x3F, 0x07, 0x1F, 0xFF];

const BASE_YEAR: u16 = 2000;

/// Decode a packed BCD byte.
pub fn bcd_to_bin(bcd: u8) -> Option<u8> {
    let hi = bcd >> 4;
    let lo = bcd & 0x0F;
    if hi > 9 || lo > 9 {
        None
    } else {
        Some(hi * 10 + lo)
    }
}

/// Encode 0..=99 as packed BCD.
#[inline]
pub fn bin_to_bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

/// Calendar time as stored in the RTC.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub time: HumanTime,
    /// 0 = Sunday.
    pub weekday: u8,
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
    /// Day-of-month register does not hold a valid date; the clock lost its time.
    ClockInvalid,
    /// A time register did not contain valid BCD.
    InvalidBcd,
    /// Time cannot be represented by the RTC (years 2000..=2099) or is not a real date.
    OutOfRange,
}

pub struct Pcf85063 {
    addr: u8,
}

impl Default for Pcf85063 {
    fn default() -> Self {
        Self::new()
    }
}

impl Pcf85063 {
    pub fn new() -> Self {
        Self { addr: ADDRESS }
    }

    fn read_u8<I2C: I2c>(&self, bus: &mut I2C, reg: u8) -> Result<u8, Error<I2C::Error>> {
        i2c::read_u8(bus, self.addr, reg).map_err(Error::I2c)
    }

    fn write_u8<I2C: I2c>(&self, bus: &mut I2C, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        i2c::write_reg(bus, self.addr, reg, &[value]).map_err(Error::I2c)
    }

    /// Probe the clock by checking that DAYS holds a plausible day of month.
    pub fn init<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<(), Error<I2C::Error>> {
        let days = self.read_u8(bus, reg::DAYS)? & 0x3F;
        match bcd_to_bin(days) {
            Some(1..=31) => Ok(()),
            _ => Err(Error::ClockInvalid),
        }
    }

    pub fn stop_clock<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<(), Error<I2C::Error>> {
        i2c::modify_reg(bus, self.addr, reg::CONTROL_1, |v| v | CTRL1_STOP).map_err(Error::I2c)?;
        Ok(())
    }

    pub fn start_clock<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<(), Error<I2C::Error>> {
        i2c::modify_reg(bus, self.addr, reg::CONTROL_1, |v| v & !CTRL1_STOP).map_err(Error::I2c)?;
        Ok(())
    }

    /// Write the full time block. Writing SECONDS also clears the oscillator-stop flag.
    pub fn set_datetime<I2C: I2c>(&mut self, bus: &mut I2C, dt: &DateTime) -> Result<(), Error<I2C::Error>> {
        let t = &dt.time;
        if !(BASE_YEAR..BASE_YEAR + 100).contains(&t.year) || dt.weekday > 6 {
            return Err(Error::OutOfRange);
        }
        time::human_to_epoch(t).ok_or(Error::OutOfRange)?;
        let block = [
            bin_to_bcd(t.second) & 0x7F,
            bin_to_bcd(t.minute),
            bin_to_bcd(t.hour),
            bin_to_bcd(t.day),
            dt.weekday & 0x07,
            bin_to_bcd(t.month),
            bin_to_bcd((t.year - BASE_YEAR) as u8),
        ];

        self.stop_clock(bus)?;
        i2c::write_reg(bus, self.addr, reg::SECONDS, &block).map_err(Error::I2c)?;
        self.start_clock(bus)
    }

    /// Read the full time block.
    pub fn datetime<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<DateTime, Error<I2C::Error>> {
        let mut raw = [0u8; 7];
        i2c::read_reg(bus, self.addr, reg::SECONDS, &mut raw).map_err(Error::I2c)?;
        for (b, mask) in raw.iter_mut().zip(TIME_MASKS) {
            *b &= mask;
        }
        let bcd = |v: u8| -> Result<u8, Error<I2C::Error>> { bcd_to_bin(v).ok_or(Error::InvalidBcd) };

        Ok(DateTime {
            time: HumanTime {
                second: bcd(raw[0])?,
                minute: bcd(raw[1])?,
                hour: bcd(raw[2])?,
                day: bcd(raw[3])?,
                month: bcd(raw[5])?,
                year: BASE_YEAR + u16::from(bcd(raw[6])?),
            },
            weekday: raw[4],
        })
    }

    /// Set the clock from Unix epoch seconds (UTC).
    pub fn set_time<I2C: I2c>(&mut self, bus: &mut I2C, epoch: i64) -> Result<(), Error<I2C::Error>> {
        let time = time::epoch_to_human(epoch).ok_or(Error::OutOfRange)?;
        let weekday = time::weekday(epoch).ok_or(Error::OutOfRange)?;
        self.set_datetime(bus, &DateTime { time, weekday })
    }

    /// Current time as Unix epoch seconds (UTC).
    pub fn time<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<i64, Error<I2C::Error>> {
        let dt = self.datetime(bus)?;
        time::human_to_epoch(&dt.time).ok_or(Error::OutOfRange)
    }

    /// Oscillator-stop flag: the time is unreliable until it is set again.
    pub fn oscillator_stopped<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<bool, Error<I2C::Error>> {
        Ok((self.read_u8(bus, reg::SECONDS)? & SECONDS_OS) != 0)
    }

    pub fn software_reset<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<(), Error<I2C::Error>> {
        self.write_u8(bus, reg::CONTROL_1, CTRL1_SOFTWARE_RESET)
    }

    pub fn read_ram<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<u8, Error<I2C::Error>> {
        self.read_u8(bus, reg::RAM_BYTE)
    }

    pub fn write_ram<I2C: I2c>(&mut self, bus: &mut I2C, value: u8) -> Result<(), Error<I2C::Error>> {
        self.write_u8(bus, reg::RAM_BYTE, value)
    }
}
