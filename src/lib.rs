// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # CPAP Controller Firmware
//!
//! This crate contains the firmware components for a CPAP blower controller, written in Rust,
//! targeting an ESP32-C3 MCU. Every chip sits on one shared I2C bus, passed as `&mut` into each
//! driver call.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`hw`] | MCU-level wrappers: I2C register helpers, PWM LEDs and buzzer, battery ADC |
//! | [`drivers`] | Device-level drivers (PAC1934, DRV10975, IAM-20380, PCF85063) |
//! | [`motors`] | Blower motor built on the DRV10975 |
//! | [`power`] | Power key, latch and startup/shutdown indication |
//! | [`time`] | Epoch and calendar conversions |
//! | [`system`] | Board bring-up and periodic sampling |
//! | [`ble`] | GATT characteristic table and the `trouble-host` server |
//!
//! ## Getting Started
//!
//! Run the host tests:
//!
//! ```text
//! cargo test
//! ```
//!
//! Flash the board:
//!
//! ```text
//! cargo run --release --features board --target riscv32imc-unknown-none-elf
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ble;
pub mod drivers;
pub mod hw;
pub mod motors;
pub mod power;
pub mod system;
pub mod time;

#[cfg(test)]
mod testing;
