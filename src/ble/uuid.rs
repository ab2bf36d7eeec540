// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! UUIDs for the GATT services.
//!
//! Vendor services use a 128-bit base with the 16-bit short value in bytes 12..14 (little-endian
//! layout, as sent on air). The string form of `vendor(0x1234)` is
//! `00001234-b38d-4985-720e-0f993a68ee41`.

/// Vendor base UUID, little-endian, with the short-value slot zeroed.
pub const VENDOR_BASE: [u8; 16] = [
    0x41, 0xEE, 0x68, 0x3A, 0x99, 0x0F, 0x0E, 0x72, 0x85, 0x49, 0x8D, 0xB3, 0x00, 0x00, 0x00, 0x00,
];

/// Expand a 16-bit short value into the vendor 128-bit UUID (little-endian bytes).
pub const fn vendor(short: u16) -> [u8; 16] {
    let mut uuid = VENDOR_BASE;
    uuid[12] = (short & 0xFF) as u8;
    uuid[13] = (short >> 8) as u8;
    uuid
}

// SIG-assigned
pub const BATTERY_SERVICE: u16 = 0x180F;
pub const BATTERY_LEVEL: u16 = 0x2A19;

// Device settings
pub const DEVICE_SETTINGS_SERVICE: u16 = 0x1234;
pub const PRESSURE: u16 = 0x1235;
pub const RAMP_TIME: u16 = 0x1236;
pub const ALARM_HOUR: u16 = 0x1237;
pub const ALARM_MINUTE: u16 = 0x1238;

// User data
pub const USER_DATA_SERVICE: u16 = 0x2234;
pub const OPERATION_HOUR: u16 = 0x2235;
pub const OPERATION_MINUTE: u16 = 0x2236;
pub const SLEEP_POSITION: u16 = 0x2237;

// Time sync
pub const TIME_SYNC_SERVICE: u16 = 0x3234;
pub const EPOCH_TIME: u16 = 0x3235;

/// A characteristic or service UUID.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Uuid {
    Sig(u16),
    Vendor(u16),
}

impl Uuid {
    /// Little-endian 128-bit form. SIG UUIDs expand on the Bluetooth base UUID.
    pub const fn to_le_bytes(self) -> [u8; 16] {
        match self {
            Uuid::Vendor(short) => vendor(short),
            Uuid::Sig(short) => {
                let mut uuid = [
                    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00,
                    0x00, 0x00, 0x00,
                ];
                uuid[12] = (short & 0xFF) as u8;
                uuid[13] = (short >> 8) as u8;
                uuid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use core::fmt::Write;

    fn to_string(le: [u8; 16]) -> String {
        let mut s = String::new();
        for (i, b) in le.iter().rev().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                s.push('-');
            }
            write!(s, "{:02x}", b).unwrap();
        }
        s
    }

    #[test]
    fn vendor_uuid_string_form() {
        assert_eq!(
            to_string(vendor(DEVICE_SETTINGS_SERVICE)),
            "00001234-b38d-4985-720e-0f993a68ee41"
        );
        assert_eq!(to_string(vendor(EPOCH_TIME)), "00003235-b38d-4985-720e-0f993a68ee41");
    }

    #[test]
    fn sig_uuid_expands_on_bluetooth_base() {
        assert_eq!(
            to_string(Uuid::Sig(BATTERY_LEVEL).to_le_bytes()),
            "00002a19-0000-1000-8000-00805f9b34fb"
        );
    }
}
