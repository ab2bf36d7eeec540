//! Blower motor built on the DRV10975.
//!
//! Combines the I2C motor driver with the direction and power-enable GPIOs. Speed is commanded
//! over I2C; the driver is switched into I2C speed mode by [`Blower::start`].

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::drivers::drv10975::{self, Drv10975, Status};

/// Highest pressure setting accepted from the app, in cmH2O.
pub const PRESSURE_MAX_CMH2O: u8 = 20;

/// Rotation direction, driven on the DIR pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// DIR low.
    Forward,
    /// DIR high.
    Reverse,
}

/// Snapshot of the motor driver's measurement registers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Telemetry {
    pub frequency_hz: f32,
    pub period_us: u32,
    pub current_a: f32,
    pub supply_v: f32,
    pub status: Status,
}

/// Map a pressure setting linearly onto blower speed.
#[inline]
pub fn pressure_to_percent(cmh2o: u8) -> u8 {
    let p = u16::from(cmh2o.min(PRESSURE_MAX_CMH2O));
    (p * 100 / u16::from(PRESSURE_MAX_CMH2O)) as u8
}

pub struct Blower<DIR: OutputPin, PWR: OutputPin> {
    driver: Drv10975,
    dir: DIR,
    power: PWR,
    direction: Direction,
    percent: u8,
}

impl<DIR: OutputPin, PWR: OutputPin> Blower<DIR, PWR> {
    /// Create the blower with power off and direction forward.
    pub fn new(driver: Drv10975, mut dir: DIR, mut power: PWR) -> Self {
        dir.set_low().ok();
        power.set_low().ok();
        Self {
            driver,
            dir,
            power,
            direction: Direction::Forward,
            percent: 0,
        }
    }

    pub fn power_on(&mut self) {
        self.power.set_high().ok();
    }

    pub fn power_off(&mut self) {
        self.power.set_low().ok();
        self.percent = 0;
    }

    /// Power the driver and take speed control over I2C.
    pub fn start<I2C: I2c>(&mut self, bus: &mut I2C) -> Result<(), drv10975::Error<I2C::Error>> {
        self.power_on();
        self.driver.enable_i2c_mode(bus)
    }

    pub fn set_direction(&mut self, direction: Direction) {
        match direction {
            Direction::Forward => self.dir.set_low().ok(),
            Direction::Reverse => self.dir.set_high().ok(),
        };
        self.direction = direction;
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_speed_percent<I2C: I2c>(
        &mut self,
        bus: &mut I2C,
        percent: u8,
    ) -> Result<(), drv10975::Error<I2C::Error>> {
        let percent = percent.min(100);
        self.driver.set_speed_percent(bus, percent)?;
        self.percent = percent;
        Ok(())
    }

    /// Last speed successfully commanded.
    #[inline]
    pub fn speed_percent(&self) -> u8 {
        self.percent
    }

    pub fn telemetry<I2C: I2c>(&self, bus: &mut I2C) -> Result<Telemetry, drv10975::Error<I2C::Error>> {
        Ok(Telemetry {
            frequency_hz: self.driver.motor_frequency_hz(bus)?,
            period_us: self.driver.motor_period_us(bus)?,
            current_a: self.driver.motor_current_a(bus)?,
            supply_v: self.driver.supply_voltage(bus)?,
            status: self.driver.status(bus)?,
        })
    }

    /// Access the underlying driver.
    #[inline]
    pub fn inner_driver(&mut self) -> &mut Drv10975 {
        &mut self.driver
    }

    pub fn free(self) -> (Drv10975, DIR, PWR) {
        (self.driver, self.dir, self.power)
    }
}
