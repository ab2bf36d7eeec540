//! TI DRV10975 sensorless BLDC motor driver, I2C control interface.
//!
//! Speed can be commanded either through the analog/PWM SPEED pin or over I2C. Setting the
//! OverRide bit in SPEEDCTRL2 hands control to the I2C speed registers; [`Drv10975::set_speed`]
//! refuses to write otherwise.

use embedded_hal::i2c::I2c;

use crate::hw::i2c;

pub const ADDRESS: u8 = 0x52;

/// Largest value of the 9-bit speed command.
pub const SPEED_MAX: u16 = 0x01FF;

// Register addresses
pub mod reg {
    pub const SPEEDCTRL1: u8 = 0x00;
    pub const SPEEDCTRL2: u8 = 0x01;
    pub const DEVCTRL: u8 = 0x02;
    pub const EECTRL: u8 = 0x03;
    pub const STATUS: u8 = 0x10;
    pub const MOTORSPEED1: u8 = 0x11;
    pub const MOTORSPEED2: u8 = 0x12;
    pub const MOTORPERIOD1: u8 = 0x13;
    pub const MOTORPERIOD2: u8 = 0x14;
    pub const MOTORKT1: u8 = 0x15;
    pub const MOTORKT2: u8 = 0x16;
    pub const MOTORCURRENT1: u8 = 0x17;
    pub const MOTORCURRENT2: u8 = 0x18;
    pub const IPDPOSITION: u8 = 0x19;
    pub const SUPPLYVOLTAGE: u8 = 0x1A;
    pub const SPEEDCMD: u8 = 0x1B;
    pub const SPDCMDBUFFER: u8 = 0x1C;
    pub const FAULTCODE: u8 = 0x1E;
    pub const MOTORPARAM1: u8 = 0x20;
    pub const MOTORPARAM2: u8 = 0x21;
    pub const MOTORPARAM3: u8 = 0x22;
    pub const SYSOPT1: u8 = 0x23;
    pub const SYSOPT2: u8 = 0x24;
    pub const SYSOPT3: u8 = 0x25;
    pub const SYSOPT4: u8 = 0x26;
    pub const SYSOPT5: u8 = 0x27;
    pub const SYSOPT6: u8 = 0x28;
    pub const SYSOPT7: u8 = 0x29;
    pub const SYSOPT8: u8 = 0x2A;
    pub const SYSOPT9: u8 = 0x2B;
}

const SPEEDCTRL2_OVERRIDE: u8 = 0x80;

/// STATUS register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    raw: u8,
}

impl Status {
    #[inline]
    pub fn raw(&self) -> u8 {
        self.raw
    }

    /// Over-temperature.
    #[inline]
    pub fn over_temp(&self) -> bool {
        (self.raw & (1 << 7)) != 0
    }

    /// Device is in sleep or standby.
    #[inline]
    pub fn sleep(&self) -> bool {
        (self.raw & (1 << 6)) != 0
    }

    /// Over-current.
    #[inline]
    pub fn over_current(&self) -> bool {
        (self.raw & (1 << 5)) != 0
    }

    /// Motor lock detected; details in FAULTCODE.
    #[inline]
    pub fn motor_lock(&self) -> bool {
        (self.raw & (1 << 4)) != 0
    }

    #[inline]
    pub fn any_fault(&self) -> bool {
        self.over_temp() || self.over_current() || self.motor_lock()
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
    /// Speed write attempted while the OverRide bit is clear.
    NotInI2cMode,
}

/// Map a 0..=100 % command to the 9-bit speed value.
#[inline]
pub fn percent_to_speed(percent: u8) -> u16 {
    u16::from(percent.min(100)) * SPEED_MAX / 100
}

/// Decode the 11-bit MOTORCURRENT value to amps.
pub fn decode_current(hi: u8, lo: u8) -> f32 {
    let raw = (u16::from(hi & 0x07) << 8) | u16::from(lo);
    if raw >= 1023 {
        3.0 * f32::from(raw - 1023) / 512.0
    } else {
        3.0 * f32::from(raw) / 512.0
    }
}

/// Decode SUPPLYVOLTAGE to volts.
#[inline]
pub fn decode_supply(raw: u8) -> f32 {
    f32::from(raw) * 22.8 / 256.0
}

pub struct Drv10975 {
    addr: u8,
}

impl Default for Drv10975 {
    fn default() -> Self {
        Self::new()
    }
}

impl Drv10975 {
    pub fn new() -> Self {
        Self { addr: ADDRESS }
    }

    fn read<I2C: I2c>(&self, bus: &mut I2C, reg: u8, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        i2c::read_reg(bus, self.addr, reg, buf).map_err(Error::I2c)
    }

    fn read_u8<I2C: I2c>(&self, bus: &mut I2C, reg: u8) -> Result<u8, Error<I2C::Error>> {
        i2c::read_u8(bus, self.addr, reg).map_err(Error::I2c)
    }

    fn read_u16<I2C: I2c>(&self, bus: &mut I2C, reg: u8) -> Result<u16, Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read(bus, reg, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_u8<I2C: I2c>(&self, bus: &mut I2C, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        i2c::write_reg(bus, self.addr, reg, &[value]).map_err(Error::I2c)
    }

    /// Hand speed control to the I2C registers.
    pub fn enable_i2c_mode<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<(), Error<I2C::Error>> {
        i2c::modify_reg(bus, self.addr, reg::SPEEDCTRL2, |v| v | SPEEDCTRL2_OVERRIDE)
            .map_err(Error::I2c)?;
        Ok(())
    }

    /// Whether the OverRide bit is set.
    pub fn i2c_mode<I2C: I2c>(&self, bus: &mut I2C) -> Result<bool, Error<I2C::Error>> {
        Ok((self.read_u8(bus, reg::SPEEDCTRL2)? & SPEEDCTRL2_OVERRIDE) != 0)
    }

    /// Write a 9-bit speed command (clamped to [`SPEED_MAX`]).
    ///
    /// SPEEDCTRL2 must be written first; the device latches the command on the SPEEDCTRL1 write.
    pub fn set_speed<I2C: I2c>(&mut self, bus: &mut I2C, speed: u16) -> Result<(), Error<I2C::Error>> {
        if !self.i2c_mode(bus)? {
            return Err(Error::NotInI2cMode);
        }
        let speed = speed.min(SPEED_MAX);
        self.write_u8(bus, reg::SPEEDCTRL2, ((speed >> 8) as u8) | SPEEDCTRL2_OVERRIDE)?;
        self.write_u8(bus, reg::SPEEDCTRL1, (speed & 0xFF) as u8)
    }

    pub fn set_speed_percent<I2C: I2c>(&mut self, bus: &mut I2C, percent: u8) -> Result<(), Error<I2C::Error>> {
        self.set_speed(bus, percent_to_speed(percent))
    }

    /// Electrical frequency in Hz.
    pub fn motor_frequency_hz<I2C: I2c>(&self, bus: &mut I2C) -> Result<f32, Error<I2C::Error>> {
        Ok(f32::from(self.read_u16(bus, reg::MOTORSPEED1)?) / 10.0)
    }

    /// Electrical period in microseconds.
    pub fn motor_period_us<I2C: I2c>(&self, bus: &mut I2C) -> Result<u32, Error<I2C::Error>> {
        Ok(u32::from(self.read_u16(bus, reg::MOTORPERIOD1)?) * 10)
    }

    /// Phase current in amps.
    pub fn motor_current_a<I2C: I2c>(&self, bus: &mut I2C) -> Result<f32, Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read(bus, reg::MOTORCURRENT1, &mut buf)?;
        Ok(decode_current(buf[0], buf[1]))
    }

    /// Supply voltage in volts.
    pub fn supply_voltage<I2C: I2c>(&self, bus: &mut I2C) -> Result<f32, Error<I2C::Error>> {
        Ok(decode_supply(self.read_u8(bus, reg::SUPPLYVOLTAGE)?))
    }

    /// Motor velocity constant, raw register value.
    pub fn motor_kt<I2C: I2c>(&self, bus: &mut I2C) -> Result<u16, Error<I2C::Error>> {
        self.read_u16(bus, reg::MOTORKT1)
    }

    /// Speed command currently applied by the device, raw.
    pub fn speed_command<I2C: I2c>(&self, bus: &mut I2C) -> Result<u8, Error<I2C::Error>> {
        self.read_u8(bus, reg::SPEEDCMD)
    }

    pub fn status<I2C: I2c>(&self, bus: &mut I2C) -> Result<Status, Error<I2C::Error>> {
        Ok(Status {
            raw: self.read_u8(bus, reg::STATUS)?,
        })
    }

    /// Lock-detect fault code, raw.
    pub fn fault_code<I2C: I2c>(&self, bus: &mut I2C) -> Result<u8, Error<I2C::Error>> {
        self.read_u8(bus, reg::FAULTCODE)
    }
}
