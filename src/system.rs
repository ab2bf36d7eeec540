//! Board services: bring-up of every chip on the shared I2C bus and the periodic sample taken by
//! the main loop.
//!
//! [`Board`] owns the bus and all drivers. Bring-up never aborts on a single failed chip; the
//! outcome of each step is recorded in a [`BootReport`] so the rest of the board keeps running.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::ble::DeviceSettings;
use crate::drivers::iam20380::{self, AngularRate, Iam20380};
use crate::drivers::pac1934::{self, Channel, ChannelReading, Pac1934};
use crate::drivers::{drv10975, pcf85063, Pcf85063};
use crate::hw::adc::{self, AdcRead, BatteryMonitor};
use crate::motors::blower::{self, Blower};
use crate::time;

/// Error from one of the board's chips.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    PowerMonitor(pac1934::Error<E>),
    Gyro(iam20380::Error<E>),
    Clock(pcf85063::Error<E>),
    Motor(drv10975::Error<E>),
}

impl<E> From<pac1934::Error<E>> for Error<E> {
    fn from(e: pac1934::Error<E>) -> Self {
        Error::PowerMonitor(e)
    }
}

impl<E> From<iam20380::Error<E>> for Error<E> {
    fn from(e: iam20380::Error<E>) -> Self {
        Error::Gyro(e)
    }
}

impl<E> From<pcf85063::Error<E>> for Error<E> {
    fn from(e: pcf85063::Error<E>) -> Self {
        Error::Clock(e)
    }
}

impl<E> From<drv10975::Error<E>> for Error<E> {
    fn from(e: drv10975::Error<E>) -> Self {
        Error::Motor(e)
    }
}

/// Which chips came up during [`Board::boot`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    pub clock: bool,
    pub gyro: bool,
    pub power_monitor: bool,
    pub motor: bool,
}

impl BootReport {
    pub fn all_ok(&self) -> bool {
        self.clock && self.gyro && self.power_monitor && self.motor
    }
}

/// One pass of board measurements.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Telemetry {
    /// `None` when the gyro had no new sample or could not be read.
    pub rate: Option<AngularRate>,
    /// Indexed by [`Channel::index`].
    pub channels: [Option<ChannelReading>; 4],
    pub epoch: Option<i64>,
    pub battery_mv: u16,
    pub battery_percent: u8,
}

impl Telemetry {
    #[inline]
    pub fn channel(&self, ch: Channel) -> Option<ChannelReading> {
        self.channels[usize::from(ch.index())]
    }
}

pub struct Board<I2C, D, R, DIR, PWR>
where
    I2C: I2c,
    D: DelayNs,
    R: AdcRead,
    DIR: OutputPin,
    PWR: OutputPin,
{
    bus: I2C,
    delay: D,
    pac: Pac1934,
    gyro: Iam20380,
    rtc: Pcf85063,
    blower: Blower<DIR, PWR>,
    battery: BatteryMonitor<R>,
}

impl<I2C, D, R, DIR, PWR> Board<I2C, D, R, DIR, PWR>
where
    I2C: I2c,
    D: DelayNs,
    R: AdcRead,
    DIR: OutputPin,
    PWR: OutputPin,
{
    pub fn new(
        bus: I2C,
        delay: D,
        pac: Pac1934,
        gyro: Iam20380,
        rtc: Pcf85063,
        blower: Blower<DIR, PWR>,
        battery: BatteryMonitor<R>,
    ) -> Self {
        Self {
            bus,
            delay,
            pac,
            gyro,
            rtc,
            blower,
            battery,
        }
    }

    /// Initialize the RTC, gyro, power monitor and motor driver, in that order.
    pub fn boot(&mut self) -> BootReport {
        let mut report = BootReport::default();

        report.clock = match self.rtc.init(&mut self.bus) {
            Ok(()) => true,
            Err(_) => {
                error!("boot: rtc init failed");
                false
            }
        };

        report.gyro = match self.gyro.init(&mut self.bus, &mut self.delay) {
            Ok(()) => true,
            Err(iam20380::Error::InvalidDevice(id)) => {
                error!("boot: gyro WHO_AM_I={=u8:#x}", id);
                false
            }
            Err(_) => {
                error!("boot: gyro init failed");
                false
            }
        };

        report.power_monitor = match self.pac.init(&mut self.bus, &mut self.delay) {
            Ok(()) => true,
            Err(_) => {
                error!("boot: power monitor init failed");
                false
            }
        };

        report.motor = match self.blower.start(&mut self.bus) {
            Ok(()) => true,
            Err(_) => {
                error!("boot: motor driver init failed");
                false
            }
        };

        if report.clock {
            self.log_clock();
        }
        info!(
            "boot: rtc={=bool} gyro={=bool} pm={=bool} motor={=bool}",
            report.clock,
            report.gyro,
            report.power_monitor,
            report.motor
        );
        report
    }

    fn log_clock(&mut self) {
        match self.rtc.time(&mut self.bus) {
            Ok(epoch) => {
                if let Some(ts) = time::format_timestamp(epoch) {
                    info!("rtc: {=str}", ts.as_str());
                }
            }
            Err(_) => warn!("rtc: time unreadable"),
        }
    }

    /// Set the RTC from Unix epoch seconds and return the time read back.
    pub fn sync_time(&mut self, epoch: i64) -> Result<i64, Error<I2C::Error>> {
        self.rtc.set_time(&mut self.bus, epoch)?;
        let now = self.rtc.time(&mut self.bus)?;
        if let Some(ts) = time::format_timestamp(now) {
            info!("rtc: synced to {=str}", ts.as_str());
        }
        Ok(now)
    }

    /// Latch fresh power-monitor results and read every sensor once.
    pub fn sample(&mut self) -> Telemetry {
        let rate = match self.gyro.read_rate(&mut self.bus) {
            Ok(rate) => Some(rate),
            Err(iam20380::Error::NotReady) => None,
            Err(_) => {
                warn!("sample: gyro read failed");
                None
            }
        };

        let mut channels = [None; 4];
        if self.pac.refresh_v(&mut self.bus, &mut self.delay).is_ok() {
            for ch in Channel::ALL {
                channels[usize::from(ch.index())] = self.pac.measure(&mut self.bus, ch).ok();
            }
        } else {
            warn!("sample: power monitor refresh failed");
        }

        let epoch = self.rtc.time(&mut self.bus).ok();
        let battery_mv = self.battery.battery_millivolts();

        Telemetry {
            rate,
            channels,
            epoch,
            battery_mv,
            battery_percent: adc::level_percent(battery_mv),
        }
    }

    /// Drive the blower from the app's settings.
    pub fn apply_settings(&mut self, settings: &DeviceSettings) -> Result<(), Error<I2C::Error>> {
        let percent = blower::pressure_to_percent(settings.pressure);
        if percent != self.blower.speed_percent() {
            debug!("blower: pressure={=u8} speed={=u8}%", settings.pressure, percent);
            self.blower.set_speed_percent(&mut self.bus, percent)?;
        }
        Ok(())
    }

    /// Motor driver telemetry.
    pub fn motor_telemetry(&mut self) -> Result<blower::Telemetry, Error<I2C::Error>> {
        Ok(self.blower.telemetry(&mut self.bus)?)
    }

    #[inline]
    pub fn blower(&mut self) -> &mut Blower<DIR, PWR> {
        &mut self.blower
    }

    #[inline]
    pub fn delay(&mut self) -> &mut D {
        &mut self.delay
    }

    #[allow(clippy::type_complexity)]
    pub fn free(self) -> (I2C, D, Pac1934, Iam20380, Pcf85063, Blower<DIR, PWR>, BatteryMonitor<R>) {
        (
            self.bus,
            self.delay,
            self.pac,
            self.gyro,
            self.rtc,
            self.blower,
            self.battery,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::drv10975::Drv10975;
    use crate::drivers::{iam20380::reg as gyro_reg, pac1934::reg as pac_reg, pcf85063::reg as rtc_reg};
    use crate::testing::{FakeDelay, FakeI2c, FakePin};

    type TestBoard = Board<FakeI2c, FakeDelay, fn() -> u16, FakePin, FakePin>;

    fn battery_pin() -> u16 {
        // 3750 mV battery through the divider
        2501
    }

    fn board(bus: FakeI2c) -> TestBoard {
        Board::new(
            bus,
            FakeDelay::default(),
            Pac1934::new(pac1934::Config::default()),
            Iam20380::new(iam20380::Config::default()),
            Pcf85063::new(),
            Blower::new(Drv10975::new(), FakePin::default(), FakePin::default()),
            BatteryMonitor::new(battery_pin as fn() -> u16).with_samples(1),
        )
    }

    fn healthy_bus() -> FakeI2c {
        FakeI2c::new()
            .with(pcf85063::ADDRESS, rtc_reg::DAYS, &[0x14])
            .with(iam20380::ADDRESS, gyro_reg::WHO_AM_I, &[iam20380::DEVICE_ID])
    }

    #[test]
    fn boot_brings_up_every_chip_in_order() {
        let mut board = board(healthy_bus());
        let report = board.boot();
        assert!(report.all_ok());

        let (bus, ..) = board.free();
        let addrs: std::vec::Vec<u8> = bus
            .log
            .iter()
            .map(|op| match op {
                crate::testing::BusOp::Write { addr, .. } | crate::testing::BusOp::Read { addr, .. } => *addr,
            })
            .collect();
        let first = |a: u8| addrs.iter().position(|&x| x == a).unwrap();
        assert!(first(pcf85063::ADDRESS) < first(iam20380::ADDRESS));
        assert!(first(iam20380::ADDRESS) < first(pac1934::ADDRESS));
        assert!(first(pac1934::ADDRESS) < first(drv10975::ADDRESS));
    }

    #[test]
    fn boot_continues_past_failed_chips() {
        let mut board = board(FakeI2c::new());
        let report = board.boot();
        assert_eq!(
            report,
            BootReport {
                clock: false,
                gyro: false,
                power_monitor: true,
                motor: true,
            }
        );
        assert!(!report.all_ok());
    }

    #[test]
    fn sync_time_round_trips_through_rtc() {
        let mut board = board(healthy_bus());
        assert_eq!(board.sync_time(1_700_000_000), Ok(1_700_000_000));
    }

    #[test]
    fn sync_time_rejects_years_the_rtc_cannot_hold() {
        let mut board = board(healthy_bus());
        assert_eq!(
            board.sync_time(0),
            Err(Error::Clock(pcf85063::Error::OutOfRange))
        );
    }

    #[test]
    fn sample_collects_every_sensor() {
        let mut bus = healthy_bus();
        bus.set(pac1934::ADDRESS, pac_reg::VBUS1, &[0x40, 0x00]);
        let mut board = board(bus);
        board.boot();
        board.sync_time(1_700_000_000).unwrap();

        let t = board.sample();
        assert_eq!(t.rate, None);
        assert!(t.channels.iter().all(Option::is_some));
        assert!((t.channel(Channel::Ch1).unwrap().volts - 16.0).abs() < 1e-3);
        assert_eq!(t.epoch, Some(1_700_000_000));
        assert_eq!(t.battery_mv, 3749);
        assert_eq!(t.battery_percent, 50);
    }

    #[test]
    fn sample_reads_gyro_when_ready() {
        let bus = healthy_bus()
            .with(iam20380::ADDRESS, gyro_reg::INT_STATUS, &[0x01])
            .with(iam20380::ADDRESS, gyro_reg::GYRO_XOUT_H, &[0x00, 0x10]);
        let mut board = board(bus);
        let t = board.sample();
        let rate = t.rate.unwrap();
        assert!((rate.x - 16.0 / 16.4).abs() < 1e-3);
    }

    #[test]
    fn settings_drive_blower_speed() {
        let mut board = board(healthy_bus());
        board.boot();
        let settings = DeviceSettings {
            pressure: 10,
            ..DeviceSettings::new()
        };
        board.apply_settings(&settings).unwrap();
        assert_eq!(board.blower().speed_percent(), 50);
    }
}
