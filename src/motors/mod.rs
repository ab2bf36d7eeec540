// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Actuator Abstractions
//!
//! Motor-level wrappers that sit above device-level drivers in `drivers`.
//!
//! ## Modules
//!
//! - [`blower`] - CPAP blower built on the DRV10975 plus its DIR and power-enable pins.

pub mod blower;

pub use blower::{Blower, Direction};
