//! TDK InvenSense IAM-20380 three-axis gyroscope over I2C.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::hw::i2c;

/// 7-bit address with AD0 low.
pub const ADDRESS: u8 = 0x68;

/// WHO_AM_I value for the IAM-20380.
pub const DEVICE_ID: u8 = 0xB5;

/// Settling time after each configuration write.
pub const WRITE_SETTLE_MS: u32 = 50;

/// Temperature sensitivity in LSB/°C and the reading at 0 LSB.
const TEMP_SENSITIVITY: f32 = 326.8;
const TEMP_OFFSET_C: f32 = 25.0;

// Register addresses
pub mod reg {
    pub const SELF_TEST_X_GYRO: u8 = 0x00;
    pub const SELF_TEST_Y_GYRO: u8 = 0x01;
    pub const SELF_TEST_Z_GYRO: u8 = 0x02;
    pub const XG_OFFS_USRH: u8 = 0x13;
    pub const SMPLRT_DIV: u8 = 0x19;
    pub const CONFIG: u8 = 0x1A;
    pub const GYRO_CONFIG: u8 = 0x1B;
    pub const LP_MODE_CFG: u8 = 0x1E;
    pub const FIFO_EN: u8 = 0x23;
    pub const FSYNC_INT: u8 = 0x36;
    pub const INT_PIN_CFG: u8 = 0x37;
    pub const INT_ENABLE: u8 = 0x38;
    pub const INT_STATUS: u8 = 0x3A;
    pub const TEMP_OUT_H: u8 = 0x41;
    pub const GYRO_XOUT_H: u8 = 0x43;
    pub const SIGNAL_PATH_RESET: u8 = 0x68;
    pub const USER_CTRL: u8 = 0x6A;
    pub const PWR_MGMT_1: u8 = 0x6B;
    pub const PWR_MGMT_2: u8 = 0x6C;
    pub const FIFO_COUNTH: u8 = 0x72;
    pub const FIFO_R_W: u8 = 0x74;
    pub const WHO_AM_I: u8 = 0x75;
}

const PWR1_DEVICE_RESET: u8 = 0x80;
const PWR1_CLK_PLL: u8 = 0x01;
const INT_DATA_RDY: u8 = 0x01;
const FS_SEL_MASK: u8 = 0x18;

/// Gyro full-scale range, GYRO_CONFIG bits 4:3.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FullScale {
    Dps250 = 0,
    Dps500 = 1,
    Dps1000 = 2,
    Dps2000 = 3,
}

impl FullScale {
    #[inline]
    fn bits(self) -> u8 {
        (self as u8) << 3
    }

    fn from_bits(raw: u8) -> Self {
        match (raw & FS_SEL_MASK) >> 3 {
            0 => FullScale::Dps250,
            1 => FullScale::Dps500,
            2 => FullScale::Dps1000,
            _ => FullScale::Dps2000,
        }
    }

    /// Sensitivity in LSB per degree/second.
    pub fn sensitivity(self) -> f32 {
        match self {
            FullScale::Dps250 => 131.0,
            FullScale::Dps500 => 65.5,
            FullScale::Dps1000 => 32.8,
            FullScale::Dps2000 => 16.4,
        }
    }
}

/// Digital low-pass filter setting, CONFIG bits 2:0 (3-dB bandwidth).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dlpf {
    Hz250 = 0,
    Hz176 = 1,
    Hz92 = 2,
    Hz41 = 3,
    Hz20 = 4,
    Hz10 = 5,
    Hz5 = 6,
    Hz3281 = 7,
}

/// Output data rate, expressed as the SMPLRT_DIV value for a 1 kHz internal rate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleRate {
    Hz1000 = 0,
    Hz500 = 1,
    Hz200 = 4,
    Hz125 = 7,
    Hz100 = 9,
    Hz50 = 19,
    Hz20 = 49,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub full_scale: FullScale,
    pub dlpf: Dlpf,
    pub sample_rate: SampleRate,
}

impl Default for Config {
    /// Board setting: 500 Hz, 20 Hz filter, ±2000 dps.
    fn default() -> Self {
        Self {
            full_scale: FullScale::Dps2000,
            dlpf: Dlpf::Hz20,
            sample_rate: SampleRate::Hz500,
        }
    }
}

impl Config {
    pub fn with_full_scale(mut self, fs: FullScale) -> Self {
        self.full_scale = fs;
        self
    }

    pub fn with_dlpf(mut self, dlpf: Dlpf) -> Self {
        self.dlpf = dlpf;
        self
    }

    pub fn with_sample_rate(mut self, rate: SampleRate) -> Self {
        self.sample_rate = rate;
        self
    }
}

/// Raw gyro sample in LSB.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Raw {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Angular rate in degrees per second.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AngularRate {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
    /// WHO_AM_I did not match; holds the value read.
    InvalidDevice(u8),
    /// No new sample since the last read.
    NotReady,
}

pub struct Iam20380 {
    addr: u8,
    config: Config,
}

impl Iam20380 {
    pub fn new(config: Config) -> Self {
        Self {
            addr: ADDRESS,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn write<I2C: I2c, D: DelayNs>(
        &self,
        bus: &mut I2C,
        delay: &mut D,
        reg: u8,
        value: u8,
    ) -> Result<(), Error<I2C::Error>> {
        i2c::write_reg(bus, self.addr, reg, &[value]).map_err(Error::I2c)?;
        delay.delay_ms(WRITE_SETTLE_MS);
        Ok(())
    }

    fn read<I2C: I2c>(&self, bus: &mut I2C, reg: u8, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        i2c::read_reg(bus, self.addr, reg, buf).map_err(Error::I2c)
    }

    pub fn who_am_i<I2C: I2c>(&self, bus: &mut I2C) -> Result<u8, Error<I2C::Error>> {
        i2c::read_u8(bus, self.addr, reg::WHO_AM_I).map_err(Error::I2c)
    }

    /// Verify the part, reset it, select the PLL clock, enable all axes and apply the
    /// configuration. Data-ready interrupt is enabled so [`read_raw`](Self::read_raw) can poll it.
    pub fn init<I2C: I2c, D: DelayNs>(&mut self, bus: &mut I2C, delay: &mut D) -> Result<(), Error<I2C::Error>> {
        let id = self.who_am_i(bus)?;
        if id != DEVICE_ID {
            return Err(Error::InvalidDevice(id));
        }

        self.write(bus, delay, reg::PWR_MGMT_1, PWR1_DEVICE_RESET)?;
        self.write(bus, delay, reg::PWR_MGMT_1, PWR1_CLK_PLL)?;
        self.write(bus, delay, reg::PWR_MGMT_2, 0x00)?;
        self.write(bus, delay, reg::SMPLRT_DIV, self.config.sample_rate as u8)?;
        self.write(bus, delay, reg::CONFIG, self.config.dlpf as u8)?;
        self.write(bus, delay, reg::GYRO_CONFIG, self.config.full_scale.bits())?;
        self.write(bus, delay, reg::INT_ENABLE, INT_DATA_RDY)?;

        debug!("iam20380: init done");
        Ok(())
    }

    /// Device reset; all registers return to their defaults.
    pub fn reset<I2C: I2c, D: DelayNs>(&mut self, bus: &mut I2C, delay: &mut D) -> Result<(), Error<I2C::Error>> {
        self.write(bus, delay, reg::PWR_MGMT_1, PWR1_DEVICE_RESET)
    }

    /// Change the full-scale range, preserving the other GYRO_CONFIG bits.
    pub fn set_full_scale<I2C: I2c>(&mut self, bus: &mut I2C, fs: FullScale) -> Result<(), Error<I2C::Error>> {
        let value = i2c::modify_reg(bus, self.addr, reg::GYRO_CONFIG, |v| (v & !FS_SEL_MASK) | fs.bits())
            .map_err(Error::I2c)?;
        self.config.full_scale = FullScale::from_bits(value);
        Ok(())
    }

    pub fn set_dlpf<I2C: I2c>(&mut self, bus: &mut I2C, dlpf: Dlpf) -> Result<(), Error<I2C::Error>> {
        i2c::write_reg(bus, self.addr, reg::CONFIG, &[dlpf as u8]).map_err(Error::I2c)?;
        self.config.dlpf = dlpf;
        Ok(())
    }

    pub fn set_sample_rate<I2C: I2c>(&mut self, bus: &mut I2C, rate: SampleRate) -> Result<(), Error<I2C::Error>> {
        i2c::write_reg(bus, self.addr, reg::SMPLRT_DIV, &[rate as u8]).map_err(Error::I2c)?;
        self.config.sample_rate = rate;
        Ok(())
    }

    /// Load the user offset registers (X, Y, Z).
    pub fn set_offsets<I2C: I2c>(&mut self, bus: &mut I2C, offsets: Raw) -> Result<(), Error<I2C::Error>> {
        let mut buf = [0u8; 6];
        buf[0..2].copy_from_slice(&offsets.x.to_be_bytes());
        buf[2..4].copy_from_slice(&offsets.y.to_be_bytes());
        buf[4..6].copy_from_slice(&offsets.z.to_be_bytes());
        i2c::write_reg(bus, self.addr, reg::XG_OFFS_USRH, &buf).map_err(Error::I2c)
    }

    /// Data-ready flag. Reading INT_STATUS clears it.
    pub fn data_ready<I2C: I2c>(&self, bus: &mut I2C) -> Result<bool, Error<I2C::Error>> {
        let status = i2c::read_u8(bus, self.addr, reg::INT_STATUS).map_err(Error::I2c)?;
        Ok((status & INT_DATA_RDY) != 0)
    }

    /// Latest raw sample, or [`Error::NotReady`] if no new sample is available.
    pub fn read_raw<I2C: I2c>(&self, bus: &mut I2C) -> Result<Raw, Error<I2C::Error>> {
        if !self.data_ready(bus)? {
            return Err(Error::NotReady);
        }
        let mut buf = [0u8; 6];
        self.read(bus, reg::GYRO_XOUT_H, &mut buf)?;
        Ok(Raw {
            x: i16::from_be_bytes([buf[0], buf[1]]),
            y: i16::from_be_bytes([buf[2], buf[3]]),
            z: i16::from_be_bytes([buf[4], buf[5]]),
        })
    }

    /// Latest sample scaled to degrees per second.
    pub fn read_rate<I2C: I2c>(&self, bus: &mut I2C) -> Result<AngularRate, Error<I2C::Error>> {
        let raw = self.read_raw(bus)?;
        let s = self.config.full_scale.sensitivity();
        Ok(AngularRate {
            x: f32::from(raw.x) / s,
            y: f32::from(raw.y) / s,
            z: f32::from(raw.z) / s,
        })
    }

    /// Die temperature in °C.
    pub fn read_temperature<I2C: I2c>(&self, bus: &mut I2C) -> Result<f32, Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read(bus, reg::TEMP_OUT_H, &mut buf)?;
        Ok(f32::from(i16::from_be_bytes(buf)) / TEMP_SENSITIVITY + TEMP_OFFSET_C)
    }
}
