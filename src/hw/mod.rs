//! # Board-Level Hardware Wrappers
//!
//! Thin wrappers over `embedded-hal` 1.0 traits: the shared I2C register bus, PWM-driven
//! indicators and the battery ADC input. The [`pins`] map is only built for the board target.

pub mod adc;
pub mod buzzer;
pub mod i2c;
pub mod led;
#[cfg(feature = "board")]
pub mod pins;

pub use adc::BatteryMonitor;
pub use buzzer::Buzzer;
pub use i2c::RetryI2c;
pub use led::{Color, Led, StatusLeds};
