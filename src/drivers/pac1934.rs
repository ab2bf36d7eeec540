// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Microchip PAC1934 four-channel power/energy monitor.
//!
//! The PAC1934 samples VBUS and VSENSE on up to four channels and multiplies them into a power
//! reading and a power accumulator. Configuration registers (CTRL, CHANNEL_DIS, NEG_PWR) are
//! double-buffered: a write only takes effect at the next REFRESH command, and the data registers
//! are decoded using the settings that were in effect at that refresh. This driver mirrors that
//! model by tracking the values written to the chip separately from the values latched at the
//! last refresh, and always decodes with the latched set.
//!
//! Full-scale values:
//!
//! | Quantity | Full scale |
//! | -------- | ---------- |
//! | VBUS     | 32 V |
//! | VSENSE   | 100 mV, i.e. `0.1 / Rsense` amps |
//! | VPOWER   | `32 V * FSC` watts |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::hw::i2c;

/// 7-bit address with ADDRSEL tied to GND through 0 Ω.
pub const ADDRESS: u8 = 0x11;

/// Expected PRODUCT_ID for a PAC1934.
pub const PRODUCT_ID: u8 = 0x5B;
/// Expected MANUFACTURER_ID (Microchip).
pub const MANUFACTURER_ID: u8 = 0x5D;

/// Delay after the power-on refresh commands during init.
pub const INIT_REFRESH_MS: u32 = 100;
/// Minimum time between a REFRESH and valid data in the result registers.
pub const REFRESH_SETTLE_MS: u32 = 1;

const VBUS_FSR: f32 = 32.0;
const VSENSE_FSR: f32 = 0.1;

// Register addresses
pub mod reg {
    pub const REFRESH: u8 = 0x00;
    pub const CTRL: u8 = 0x01;
    pub const ACC_COUNT: u8 = 0x02;
    pub const VPOWER1_ACC: u8 = 0x03;
    pub const VBUS1: u8 = 0x07;
    pub const VSENSE1: u8 = 0x0B;
    pub const VBUS1_AVG: u8 = 0x0F;
    pub const VSENSE1_AVG: u8 = 0x13;
    pub const VPOWER1: u8 = 0x17;
    pub const CHANNEL_DIS: u8 = 0x1C;
    pub const NEG_PWR: u8 = 0x1D;
    pub const REFRESH_G: u8 = 0x1E;
    pub const REFRESH_V: u8 = 0x1F;
    pub const SLOW: u8 = 0x20;
    pub const CTRL_ACT: u8 = 0x21;
    pub const CHANNEL_DIS_ACT: u8 = 0x22;
    pub const NEG_PWR_ACT: u8 = 0x23;
    pub const CTRL_LAT: u8 = 0x24;
    pub const CHANNEL_DIS_LAT: u8 = 0x25;
    pub const NEG_PWR_LAT: u8 = 0x26;
    pub const PRODUCT_ID: u8 = 0xFD;
    pub const MANUFACTURER_ID: u8 = 0xFE;
    pub const REVISION_ID: u8 = 0xFF;
}

/// General-call address used by REFRESH_G.
const GENERAL_CALL: u8 = 0x00;

/// Measurement channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4];

    /// Zero-based channel index.
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    #[inline]
    fn offset(self, base: u8) -> u8 {
        base + self.index()
    }

    /// CHANNEL_DIS bit for this channel (bit set = channel disabled).
    #[inline]
    fn disable_mask(self) -> u8 {
        0x80 >> self.index()
    }

    /// NEG_PWR bit selecting bidirectional current.
    #[inline]
    fn bidi_current_mask(self) -> u8 {
        0x80 >> self.index()
    }

    /// NEG_PWR bit selecting bidirectional voltage.
    #[inline]
    fn bidi_voltage_mask(self) -> u8 {
        0x08 >> self.index()
    }
}

/// Conversion rate, CTRL bits 7:6.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleRate {
    Sps1024 = 0,
    Sps256 = 1,
    Sps64 = 2,
    Sps8 = 3,
}

impl SampleRate {
    #[inline]
    pub fn hz(self) -> u32 {
        match self {
            SampleRate::Sps1024 => 1024,
            SampleRate::Sps256 => 256,
            SampleRate::Sps64 => 64,
            SampleRate::Sps8 => 8,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => SampleRate::Sps1024,
            1 => SampleRate::Sps256,
            2 => SampleRate::Sps64,
            _ => SampleRate::Sps8,
        }
    }
}

/// CTRL register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ctrl {
    raw: u8,
}

impl Ctrl {
    pub const SLEEP: u8 = 1 << 5;
    pub const SING: u8 = 1 << 4;

    #[inline]
    pub fn raw(&self) -> u8 {
        self.raw
    }

    #[inline]
    pub fn sample_rate(&self) -> SampleRate {
        SampleRate::from_bits(self.raw >> 6)
    }

    /// Sleep mode: conversions stopped.
    #[inline]
    pub fn sleep(&self) -> bool {
        (self.raw & Self::SLEEP) != 0
    }

    /// Single-shot mode.
    #[inline]
    pub fn single_shot(&self) -> bool {
        (self.raw & Self::SING) != 0
    }
}

/// Snapshot of the three double-buffered configuration registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub ctrl: Ctrl,
    pub channel_dis: u8,
    pub neg_pwr: u8,
}

impl Settings {
    /// Power-on reset values.
    pub const POR: Settings = Settings {
        ctrl: Ctrl { raw: 0x00 },
        channel_dis: 0x00,
        neg_pwr: 0x00,
    };

    #[inline]
    pub fn channel_enabled(&self, ch: Channel) -> bool {
        (self.channel_dis & ch.disable_mask()) == 0
    }

    #[inline]
    pub fn bidirectional_current(&self, ch: Channel) -> bool {
        (self.neg_pwr & ch.bidi_current_mask()) != 0
    }

    #[inline]
    pub fn bidirectional_voltage(&self, ch: Channel) -> bool {
        (self.neg_pwr & ch.bidi_voltage_mask()) != 0
    }

    /// VPOWER is signed whenever either of its factors is.
    #[inline]
    pub fn bidirectional_power(&self, ch: Channel) -> bool {
        self.bidirectional_current(ch) || self.bidirectional_voltage(ch)
    }
}

/// User configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    pub sample_rate: SampleRate,
    pub sleep: bool,
    /// Raw CHANNEL_DIS value (bit 7 = CH1 ... bit 4 = CH4, set = disabled).
    pub channel_dis: u8,
    /// Raw NEG_PWR value (bits 7:4 = bidirectional current, bits 3:0 = bidirectional voltage).
    pub neg_pwr: u8,
    /// Shunt resistance in ohms.
    pub sense_resistor: f32,
}

impl Default for Config {
    /// Board configuration: 1024 SPS, all channels on, all bidirectional, 4 mΩ shunts (25 A).
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Sps1024,
            sleep: false,
            channel_dis: 0x00,
            neg_pwr: 0xFF,
            sense_resistor: 0.004,
        }
    }
}

impl Config {
    pub fn with_sample_rate(mut self, rate: SampleRate) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_sleep(mut self, sleep: bool) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn with_channel_enabled(mut self, ch: Channel, enabled: bool) -> Self {
        if enabled {
            self.channel_dis &= !ch.disable_mask();
        } else {
            self.channel_dis |= ch.disable_mask();
        }
        self
    }

    pub fn with_bidirectional(mut self, ch: Channel, current: bool, voltage: bool) -> Self {
        self.neg_pwr &= !(ch.bidi_current_mask() | ch.bidi_voltage_mask());
        if current {
            self.neg_pwr |= ch.bidi_current_mask();
        }
        if voltage {
            self.neg_pwr |= ch.bidi_voltage_mask();
        }
        self
    }

    pub fn with_sense_resistor(mut self, ohms: f32) -> Self {
        self.sense_resistor = ohms;
        self
    }

    #[inline]
    fn ctrl(&self) -> Ctrl {
        let mut raw = (self.sample_rate as u8) << 6;
        if self.sleep {
            raw |= Ctrl::SLEEP;
        }
        Ctrl { raw }
    }

    fn settings(&self) -> Settings {
        Settings {
            ctrl: self.ctrl(),
            channel_dis: self.channel_dis,
            neg_pwr: self.neg_pwr,
        }
    }

    /// Full-scale current in amps.
    #[inline]
    pub fn full_scale_current(&self) -> f32 {
        VSENSE_FSR / self.sense_resistor
    }

    /// Full-scale power in watts.
    #[inline]
    pub fn full_scale_power(&self) -> f32 {
        self.full_scale_current() * VBUS_FSR
    }
}

/// Chip identification registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ident {
    pub product: u8,
    pub manufacturer: u8,
    pub revision: u8,
}

impl Ident {
    #[inline]
    pub fn is_pac1934(&self) -> bool {
        self.product == PRODUCT_ID && self.manufacturer == MANUFACTURER_ID
    }
}

/// One decoded channel sample.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ChannelReading {
    pub volts: f32,
    pub amps: f32,
    pub watts: f32,
}

/// Accumulator snapshot for one channel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Accumulator {
    /// Number of power samples summed since the last REFRESH.
    pub count: u32,
    /// Raw 48-bit sum (sign-extended when the channel is bidirectional).
    pub sum: i64,
    /// Accumulated energy in joules.
    pub joules: f32,
}

/// Error type for PAC1934 operations.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
    /// The channel was disabled at the last refresh; its result registers are not updated.
    ChannelDisabled(Channel),
}

/// Decode a VBUS / VBUS_AVG word to volts.
pub fn decode_vbus(raw: u16, bipolar: bool) -> f32 {
    if bipolar {
        VBUS_FSR * f32::from(raw as i16) / 32768.0
    } else {
        VBUS_FSR * f32::from(raw) / 65536.0
    }
}

/// Decode a VSENSE / VSENSE_AVG word to amps given the full-scale current.
pub fn decode_vsense(raw: u16, bipolar: bool, fsc: f32) -> f32 {
    if bipolar {
        fsc * f32::from(raw as i16) / 32768.0
    } else {
        fsc * f32::from(raw) / 65536.0
    }
}

/// Decode a left-justified 28-bit VPOWER word to watts given the full-scale power.
pub fn decode_vpower(raw: u32, bipolar: bool, fsp: f32) -> f32 {
    if bipolar {
        fsp * ((raw as i32) >> 4) as f32 / (1u32 << 27) as f32
    } else {
        fsp * (raw >> 4) as f32 / (1u32 << 28) as f32
    }
}

/// Sign-extend or zero-extend a 48-bit accumulator.
fn extend_acc(bytes: &[u8; 6], bipolar: bool) -> i64 {
    let mut wide = [0u8; 8];
    wide[2..].copy_from_slice(bytes);
    let unsigned = u64::from_be_bytes(wide);
    if bipolar {
        ((unsigned << 16) as i64) >> 16
    } else {
        unsigned as i64
    }
}

/// Energy in joules for an accumulated VPOWER sum.
pub fn decode_energy(sum: i64, bipolar: bool, fsp: f32, rate: SampleRate) -> f32 {
    let denom = if bipolar { (1u32 << 27) as f32 } else { (1u32 << 28) as f32 };
    fsp * (sum as f32) / denom / rate.hz() as f32
}

/// PAC1934 driver instance.
///
/// The I2C bus is passed in as &mut to each method so that the monitor can share the board bus.
pub struct Pac1934 {
    addr: u8,
    config: Config,
    written: Settings,
    latched: Settings,
}

impl Pac1934 {
    pub fn new(config: Config) -> Self {
        Self::with_address(ADDRESS, config)
    }

    pub fn with_address(addr: u8, config: Config) -> Self {
        Self {
            addr,
            config,
            written: Settings::POR,
            latched: Settings::POR,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Settings in effect for the current contents of the result registers.
    #[inline]
    pub fn latched(&self) -> Settings {
        self.latched
    }

    /// Settings written to the chip, pending the next refresh.
    #[inline]
    pub fn pending(&self) -> Settings {
        self.written
    }

    fn read<I2C: I2c>(&self, bus: &mut I2C, reg: u8, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        i2c::read_reg(bus, self.addr, reg, buf).map_err(Error::I2c)
    }

    fn read_u8<I2C: I2c>(&self, bus: &mut I2C, reg: u8) -> Result<u8, Error<I2C::Error>> {
        i2c::read_u8(bus, self.addr, reg).map_err(Error::I2c)
    }

    fn write_u8<I2C: I2c>(&self, bus: &mut I2C, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        i2c::write_reg(bus, self.addr, reg, &[value]).map_err(Error::I2c)
    }

    fn read_u16<I2C: I2c>(&self, bus: &mut I2C, reg: u8) -> Result<u16, Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read(bus, reg, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn ensure_enabled<E>(&self, ch: Channel) -> Result<(), Error<E>> {
        if self.latched.channel_enabled(ch) {
            Ok(())
        } else {
            Err(Error::ChannelDisabled(ch))
        }
    }

    /// Power-on initialization: refresh, program CTRL / NEG_PWR / CHANNEL_DIS / SLOW from the
    /// configuration, then refresh again so the new settings are latched.
    pub fn init<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
    ) -> Result<(), Error<I2C::Error>> {
        self.send_refresh(bus, reg::REFRESH)?;
        delay.delay_ms(INIT_REFRESH_MS);

        self.stage(bus, self.config)?;
        self.write_u8(bus, reg::SLOW, 0x00)?;

        self.send_refresh(bus, reg::REFRESH)?;
        delay.delay_ms(INIT_REFRESH_MS);

        debug!(
            "pac1934: init ctrl={=u8:#x} neg_pwr={=u8:#x} dis={=u8:#x}",
            self.latched.ctrl.raw(),
            self.latched.neg_pwr,
            self.latched.channel_dis
        );
        Ok(())
    }

    /// Write a configuration to the chip without latching it.
    ///
    /// Result registers keep decoding with the previous settings until [`refresh`](Self::refresh)
    /// or [`refresh_v`](Self::refresh_v).
    pub fn stage<I2C: I2c>(&mut self, bus: &mut I2C, config: Config) -> Result<(), Error<I2C::Error>> {
        let settings = config.settings();
        self.write_u8(bus, reg::CTRL, settings.ctrl.raw())?;
        self.written.ctrl = settings.ctrl;
        self.write_u8(bus, reg::NEG_PWR, settings.neg_pwr)?;
        self.written.neg_pwr = settings.neg_pwr;
        self.write_u8(bus, reg::CHANNEL_DIS, settings.channel_dis)?;
        self.written.channel_dis = settings.channel_dis;
        self.config = config;
        Ok(())
    }

    /// Stage a new configuration and latch it.
    pub fn configure<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
        config: Config,
    ) -> Result<(), Error<I2C::Error>> {
        self.stage(bus, config)?;
        self.refresh(bus, delay)
    }

    fn send_refresh<I2C: I2c>(&mut self, bus: &mut I2C, cmd: u8) -> Result<(), Error<I2C::Error>> {
        i2c::send_command(bus, self.addr, cmd).map_err(Error::I2c)?;
        self.latched = self.written;
        Ok(())
    }

    /// REFRESH: latch pending settings and results, then reset the accumulators.
    pub fn refresh<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
    ) -> Result<(), Error<I2C::Error>> {
        self.send_refresh(bus, reg::REFRESH)?;
        delay.delay_ms(REFRESH_SETTLE_MS);
        Ok(())
    }

    /// REFRESH_V: latch pending settings and results without resetting the accumulators.
    pub fn refresh_v<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
    ) -> Result<(), Error<I2C::Error>> {
        self.send_refresh(bus, reg::REFRESH_V)?;
        delay.delay_ms(REFRESH_SETTLE_MS);
        Ok(())
    }

    /// REFRESH_G: general-call refresh that latches every PAC193x on the bus at once.
    pub fn refresh_general<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
    ) -> Result<(), Error<I2C::Error>> {
        i2c::send_command(bus, GENERAL_CALL, reg::REFRESH_G).map_err(Error::I2c)?;
        self.latched = self.written;
        delay.delay_ms(REFRESH_SETTLE_MS);
        Ok(())
    }

    /// Rebuild the written and latched settings from the chip's ACT/LAT registers.
    pub fn sync_latched<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<Settings, Error<I2C::Error>> {
        self.written = Settings {
            ctrl: Ctrl {
                raw: self.read_u8(bus, reg::CTRL_ACT)?,
            },
            channel_dis: self.read_u8(bus, reg::CHANNEL_DIS_ACT)?,
            neg_pwr: self.read_u8(bus, reg::NEG_PWR_ACT)?,
        };
        self.latched = Settings {
            ctrl: Ctrl {
                raw: self.read_u8(bus, reg::CTRL_LAT)?,
            },
            channel_dis: self.read_u8(bus, reg::CHANNEL_DIS_LAT)?,
            neg_pwr: self.read_u8(bus, reg::NEG_PWR_LAT)?,
        };
        Ok(self.latched)
    }

    /// Stop conversions. Result registers hold their last values.
    pub fn into_sleep_mode<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
    ) -> Result<(), Error<I2C::Error>> {
        self.set_sleep(bus, delay, true)
    }

    /// Resume conversions at the configured sample rate.
    pub fn into_normal_mode<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
    ) -> Result<(), Error<I2C::Error>> {
        self.set_sleep(bus, delay, false)
    }

    fn set_sleep<I2C: I2c, D: DelayNs>(
        &mut self,
        bus: &mut I2C,
        delay: &mut D,
        sleep: bool,
    ) -> Result<(), Error<I2C::Error>> {
        let mut raw = self.written.ctrl.raw() & !Ctrl::SLEEP;
        if sleep {
            raw |= Ctrl::SLEEP;
        }
        self.write_u8(bus, reg::CTRL, raw)?;
        self.written.ctrl = Ctrl { raw };
        self.config.sleep = sleep;
        self.refresh(bus, delay)
    }

    /// Bus voltage in volts.
    pub fn voltage<I2C: I2c>(&self, bus: &mut I2C, ch: Channel) -> Result<f32, Error<I2C::Error>> {
        self.ensure_enabled::<I2C::Error>(ch)?;
        let raw = self.read_u16(bus, ch.offset(reg::VBUS1))?;
        Ok(decode_vbus(raw, self.latched.bidirectional_voltage(ch)))
    }

    /// Rolling average of the last eight bus voltage samples, in volts.
    pub fn voltage_average<I2C: I2c>(&self, bus: &mut I2C, ch: Channel) -> Result<f32, Error<I2C::Error>> {
        self.ensure_enabled::<I2C::Error>(ch)?;
        let raw = self.read_u16(bus, ch.offset(reg::VBUS1_AVG))?;
        Ok(decode_vbus(raw, self.latched.bidirectional_voltage(ch)))
    }

    /// Sense current in amps.
    pub fn current<I2C: I2c>(&self, bus: &mut I2C, ch: Channel) -> Result<f32, Error<I2C::Error>> {
        self.ensure_enabled::<I2C::Error>(ch)?;
        let raw = self.read_u16(bus, ch.offset(reg::VSENSE1))?;
        Ok(decode_vsense(
            raw,
            self.latched.bidirectional_current(ch),
            self.config.full_scale_current(),
        ))
    }

    /// Rolling average of the last eight sense current samples, in amps.
    pub fn current_average<I2C: I2c>(&self, bus: &mut I2C, ch: Channel) -> Result<f32, Error<I2C::Error>> {
        self.ensure_enabled::<I2C::Error>(ch)?;
        let raw = self.read_u16(bus, ch.offset(reg::VSENSE1_AVG))?;
        Ok(decode_vsense(
            raw,
            self.latched.bidirectional_current(ch),
            self.config.full_scale_current(),
        ))
    }

    /// Instantaneous power in watts.
    pub fn power<I2C: I2c>(&self, bus: &mut I2C, ch: Channel) -> Result<f32, Error<I2C::Error>> {
        self.ensure_enabled::<I2C::Error>(ch)?;
        let mut buf = [0u8; 4];
        self.read(bus, ch.offset(reg::VPOWER1), &mut buf)?;
        Ok(decode_vpower(
            u32::from_be_bytes(buf),
            self.latched.bidirectional_power(ch),
            self.config.full_scale_power(),
        ))
    }

    /// Voltage, current and power of one channel.
    pub fn measure<I2C: I2c>(&self, bus: &mut I2C, ch: Channel) -> Result<ChannelReading, Error<I2C::Error>> {
        Ok(ChannelReading {
            volts: self.voltage(bus, ch)?,
            amps: self.current(bus, ch)?,
            watts: self.power(bus, ch)?,
        })
    }

    /// Accumulator count, sum and energy since the last REFRESH.
    pub fn accumulator<I2C: I2c>(&self, bus: &mut I2C, ch: Channel) -> Result<Accumulator, Error<I2C::Error>> {
        self.ensure_enabled::<I2C::Error>(ch)?;

        let mut count = [0u8; 4];
        self.read(bus, reg::ACC_COUNT, &mut count[1..])?;
        let count = u32::from_be_bytes(count);

        let mut acc = [0u8; 6];
        self.read(bus, ch.offset(reg::VPOWER1_ACC), &mut acc)?;
        let bipolar = self.latched.bidirectional_power(ch);
        let sum = extend_acc(&acc, bipolar);

        Ok(Accumulator {
            count,
            sum,
            joules: decode_energy(
                sum,
                bipolar,
                self.config.full_scale_power(),
                self.latched.ctrl.sample_rate(),
            ),
        })
    }

    /// Read PRODUCT_ID / MANUFACTURER_ID / REVISION_ID.
    pub fn identify<I2C: I2c>(&self, bus: &mut I2C) -> Result<Ident, Error<I2C::Error>> {
        Ok(Ident {
            product: self.read_u8(bus, reg::PRODUCT_ID)?,
            manufacturer: self.read_u8(bus, reg::MANUFACTURER_ID)?,
            revision: self.read_u8(bus, reg::REVISION_ID)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BusOp, FakeDelay, FakeI2c};
    use std::vec;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn ready() -> (Pac1934, FakeI2c, FakeDelay) {
        let mut pac = Pac1934::new(Config::default());
        let mut bus = FakeI2c::new();
        let mut delay = FakeDelay::default();
        pac.init(&mut bus, &mut delay).unwrap();
        bus.log.clear();
        (pac, bus, delay)
    }

    #[test]
    fn init_sequence_matches_datasheet_order() {
        let mut pac = Pac1934::new(Config::default());
        let mut bus = FakeI2c::new();
        let mut delay = FakeDelay::default();
        pac.init(&mut bus, &mut delay).unwrap();

        assert_eq!(
            bus.writes_to(ADDRESS),
            vec![
                (reg::REFRESH, vec![]),
                (reg::CTRL, vec![0x00]),
                (reg::NEG_PWR, vec![0xFF]),
                (reg::CHANNEL_DIS, vec![0x00]),
                (reg::SLOW, vec![0x00]),
                (reg::REFRESH, vec![]),
            ]
        );
        assert_eq!(delay.total_ms(), 200);
        assert_eq!(pac.latched().neg_pwr, 0xFF);
    }

    #[test]
    fn vbus_decodes_twos_complement_when_bipolar() {
        assert!(close(decode_vbus(0x7FFF, true), 32.0 * 32767.0 / 32768.0));
        assert!(close(decode_vbus(0xC000, true), -16.0));
        assert!(close(decode_vbus(0x8000, true), -32.0));
        assert!(close(decode_vbus(0xC000, false), 24.0));
    }

    #[test]
    fn vsense_scales_by_sense_resistor() {
        let cfg = Config::default();
        assert!(close(cfg.full_scale_current(), 25.0));
        assert!(close(decode_vsense(0x4000, true, cfg.full_scale_current()), 12.5));
        assert!(close(decode_vsense(0xFFFF, true, cfg.full_scale_current()), -25.0 / 32768.0));
        assert!(close(decode_vsense(0x8000, false, 10.0), 5.0));
    }

    #[test]
    fn vpower_uses_upper_28_bits() {
        let fsp = Config::default().full_scale_power();
        assert!(close(fsp, 800.0));
        assert!(close(decode_vpower(0x8000_0000, false, fsp), 400.0));
        assert!(close(decode_vpower(0x8000_0000, true, fsp), -800.0));
        // Low nibble is always zero on the chip and must not contribute.
        assert!(close(decode_vpower(0x0000_000F, false, fsp), 0.0));
    }

    #[test]
    fn reads_decode_with_latched_polarity() {
        let (mut pac, mut bus, mut delay) = ready();
        bus.set(ADDRESS, reg::VBUS1 + 1, &[0xC0, 0x00]);

        assert!(close(pac.voltage(&mut bus, Channel::Ch2).unwrap(), -16.0));

        // Unipolar staged but not latched: decoding keeps the old polarity.
        pac.stage(&mut bus, Config::default().with_bidirectional(Channel::Ch2, false, false))
            .unwrap();
        assert!(close(pac.voltage(&mut bus, Channel::Ch2).unwrap(), -16.0));

        pac.refresh(&mut bus, &mut delay).unwrap();
        assert!(close(pac.voltage(&mut bus, Channel::Ch2).unwrap(), 24.0));
    }

    #[test]
    fn disabled_channel_is_rejected_after_refresh() {
        let (mut pac, mut bus, mut delay) = ready();
        let cfg = Config::default().with_channel_enabled(Channel::Ch3, false);
        pac.configure(&mut bus, &mut delay, cfg).unwrap();
        assert_eq!(bus.reg(ADDRESS, reg::CHANNEL_DIS), 0x20);
        assert_eq!(
            pac.current(&mut bus, Channel::Ch3),
            Err(Error::ChannelDisabled(Channel::Ch3))
        );
        assert!(pac.current(&mut bus, Channel::Ch4).is_ok());
    }

    #[test]
    fn measure_reads_each_register_at_channel_offset() {
        let (pac, mut bus, _) = ready();
        bus.set(ADDRESS, reg::VBUS1 + 3, &[0x20, 0x00]);
        bus.set(ADDRESS, reg::VSENSE1 + 3, &[0x08, 0x00]);
        bus.set(ADDRESS, reg::VPOWER1 + 3, &[0x01, 0x00, 0x00, 0x00]);

        let r = pac.measure(&mut bus, Channel::Ch4).unwrap();
        assert!(close(r.volts, 8.0));
        assert!(close(r.amps, 1.5625));
        assert!(close(r.watts, 800.0 * (1 << 20) as f32 / (1 << 27) as f32));
    }

    #[test]
    fn sleep_and_wake_toggle_ctrl_bit() {
        let (mut pac, mut bus, mut delay) = ready();
        pac.into_sleep_mode(&mut bus, &mut delay).unwrap();
        assert_eq!(bus.reg(ADDRESS, reg::CTRL), 0x20);
        assert!(pac.latched().ctrl.sleep());

        pac.into_normal_mode(&mut bus, &mut delay).unwrap();
        assert_eq!(bus.reg(ADDRESS, reg::CTRL), 0x00);
        assert!(!pac.latched().ctrl.sleep());
        let last = bus.writes_to(ADDRESS).pop().unwrap();
        assert_eq!(last, (reg::REFRESH, vec![]));
    }

    #[test]
    fn refresh_v_keeps_accumulator_and_latches() {
        let (mut pac, mut bus, mut delay) = ready();
        pac.stage(&mut bus, Config::default().with_sample_rate(SampleRate::Sps8))
            .unwrap();
        pac.refresh_v(&mut bus, &mut delay).unwrap();
        assert_eq!(pac.latched().ctrl.sample_rate(), SampleRate::Sps8);
        assert_eq!(bus.writes_to(ADDRESS).pop().unwrap(), (reg::REFRESH_V, vec![]));
    }

    #[test]
    fn accumulator_energy_over_sample_period() {
        let (mut pac, mut bus, mut delay) = ready();
        pac.configure(
            &mut bus,
            &mut delay,
            Config::default()
                .with_sample_rate(SampleRate::Sps8)
                .with_bidirectional(Channel::Ch1, false, false),
        )
        .unwrap();
        bus.set(ADDRESS, reg::ACC_COUNT, &[0x00, 0x00, 0x08]);
        // Eight samples at half of full scale (2^27 each).
        bus.set(ADDRESS, reg::VPOWER1_ACC, &[0x00, 0x00, 0x40, 0x00, 0x00, 0x00]);

        let acc = pac.accumulator(&mut bus, Channel::Ch1).unwrap();
        assert_eq!(acc.count, 8);
        assert_eq!(acc.sum, 1 << 30);
        // 400 W for one second.
        assert!(close(acc.joules, 400.0));
    }

    #[test]
    fn bipolar_accumulator_is_sign_extended() {
        let (pac, mut bus, _) = ready();
        bus.set(ADDRESS, reg::VPOWER1_ACC + 1, &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xF0]);
        let acc = pac.accumulator(&mut bus, Channel::Ch2).unwrap();
        assert_eq!(acc.sum, -16);
        assert!(acc.joules < 0.0);
    }

    #[test]
    fn sync_latched_reads_lat_registers() {
        let mut pac = Pac1934::new(Config::default());
        let mut bus = FakeI2c::new()
            .with(ADDRESS, reg::CTRL_LAT, &[0x40])
            .with(ADDRESS, reg::CHANNEL_DIS_LAT, &[0x10])
            .with(ADDRESS, reg::NEG_PWR_LAT, &[0x88]);
        let lat = pac.sync_latched(&mut bus).unwrap();
        assert_eq!(lat.ctrl.sample_rate(), SampleRate::Sps256);
        assert!(!lat.channel_enabled(Channel::Ch4));
        assert!(lat.bidirectional_current(Channel::Ch1));
        assert!(lat.bidirectional_voltage(Channel::Ch1));
        assert!(!lat.bidirectional_power(Channel::Ch2));
    }

    #[test]
    fn identify_reports_pac1934() {
        let pac = Pac1934::new(Config::default());
        let mut bus = FakeI2c::new()
            .with(ADDRESS, reg::PRODUCT_ID, &[PRODUCT_ID])
            .with(ADDRESS, reg::MANUFACTURER_ID, &[MANUFACTURER_ID])
            .with(ADDRESS, reg::REVISION_ID, &[0x03]);
        let id = pac.identify(&mut bus).unwrap();
        assert!(id.is_pac1934());
        assert_eq!(id.revision, 3);
    }

    #[test]
    fn averages_read_the_avg_registers() {
        let (pac, mut bus, _) = ready();
        bus.set(ADDRESS, reg::VBUS1, &[0x7F, 0xFF]);
        bus.set(ADDRESS, reg::VBUS1_AVG, &[0x40, 0x00]);
        bus.set(ADDRESS, reg::VSENSE1, &[0x7F, 0xFF]);
        bus.set(ADDRESS, reg::VSENSE1_AVG, &[0xC0, 0x00]);

        assert!(close(pac.voltage_average(&mut bus, Channel::Ch1).unwrap(), 16.0));
        assert!(close(pac.current_average(&mut bus, Channel::Ch1).unwrap(), -12.5));
        assert_eq!(
            bus.log,
            vec![
                BusOp::Read { addr: ADDRESS, reg: reg::VBUS1_AVG, len: 2 },
                BusOp::Read { addr: ADDRESS, reg: reg::VSENSE1_AVG, len: 2 },
            ]
        );
    }

    #[test]
    fn general_refresh_goes_to_general_call_address() {
        let (mut pac, mut bus, mut delay) = ready();
        pac.stage(&mut bus, Config::default().with_sample_rate(SampleRate::Sps64))
            .unwrap();
        bus.log.clear();

        pac.refresh_general(&mut bus, &mut delay).unwrap();
        assert_eq!(bus.writes_to(GENERAL_CALL), vec![(reg::REFRESH_G, vec![])]);
        assert!(bus.writes_to(ADDRESS).is_empty());
        assert_eq!(pac.latched().ctrl.sample_rate(), SampleRate::Sps64);
    }

    #[test]
    fn energy_halves_the_denominator_when_bipolar() {
        let fsp = Config::default().full_scale_power();
        assert!(close(decode_energy(1 << 28, false, fsp, SampleRate::Sps8), 100.0));
        assert!(close(decode_energy(1 << 28, true, fsp, SampleRate::Sps8), 200.0));
        assert!(close(decode_energy(-(1 << 27), true, fsp, SampleRate::Sps1024), -0.78125));
    }

    #[test]
    fn disabled_channel_rejects_power_and_accumulator_without_bus_traffic() {
        let (mut pac, mut bus, mut delay) = ready();
        let cfg = Config::default().with_channel_enabled(Channel::Ch3, false);
        pac.configure(&mut bus, &mut delay, cfg).unwrap();
        bus.log.clear();

        assert_eq!(pac.power(&mut bus, Channel::Ch3), Err(Error::ChannelDisabled(Channel::Ch3)));
        assert_eq!(
            pac.accumulator(&mut bus, Channel::Ch3),
            Err(Error::ChannelDisabled(Channel::Ch3))
        );
        assert!(bus.log.is_empty());
    }
}
