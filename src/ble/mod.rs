// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # BLE GATT Services
//!
//! | Service | UUID | Characteristics |
//! | ------- | ---- | --------------- |
//! | Battery | `0x180F` | level `0x2A19` (read, notify) |
//! | Device settings | `0x1234` | pressure, ramp time, alarm hour/minute (write) |
//! | User data | `0x2234` | operation hour/minute, sleep position (read) |
//! | Time sync | `0x3234` | epoch time, `i32` LE (write) |
//!
//! Vendor UUIDs expand on a 128-bit base, see [`uuid`]. The characteristic table and access
//! rules live in [`table`] and are independent of the host stack; [`server`] binds them to
//! `trouble-host` on the board.

pub mod services;
pub mod table;
pub mod uuid;

#[cfg(feature = "board")]
pub mod server;

pub use services::{BatteryService, DeviceSettings, TimeSync, UserData};
pub use table::{AttError, CharId, GattState, WriteEffect};

/// Advertised complete local name.
pub const DEVICE_NAME: &str = "BLE_CPAP_1.0";
