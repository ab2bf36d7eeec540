// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! This module contains device-specific drivers that sit above the raw `hw/` layer and below the
//! board services. Every chip lives on the shared board I2C bus, which is passed as `&mut` to each
//! driver call.
//!
//! ## Existing drivers
//!
//! - [`drv10975`] – TI DRV10975 sensorless BLDC motor driver (blower)
//! - [`iam20380`] – TDK IAM-20380 three-axis gyroscope
//! - [`pac1934`] – Microchip PAC1934 four-channel power monitor
//! - [`pcf85063`] – NXP PCF85063 real-time clock

pub mod drv10975;
pub mod iam20380;
pub mod pac1934;
pub mod pcf85063;

pub use drv10975::Drv10975;
pub use iam20380::Iam20380;
pub use pac1934::Pac1934;
pub use pcf85063::Pcf85063;
