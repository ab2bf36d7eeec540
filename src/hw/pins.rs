// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin definitions for the ESP32-C3 CPAP controller board.
//!
//! GPIO18/19 stay free for the USB-Serial-JTAG console. GPIO2, GPIO8 and GPIO9 are strapping pins
//! and are only used as outputs after boot or left alone.

use esp_hal::peripherals::{
    GPIO0, GPIO1, GPIO10, GPIO20, GPIO21, GPIO3, GPIO4, GPIO5, GPIO6, GPIO7,
};

/// All board pins. Construct this once at startup using:
///
/// ```ignore
/// let pins = board_pins!(peripherals);
/// ```
pub struct BoardPins {
    pub i2c: I2cPins,
    pub leds: LedPins,
    pub buzzer: GPIO4<'static>,
    pub battery: GPIO3<'static>,
    pub power: PowerPins,
    pub motor: MotorPins,
}

/// Shared sensor/motor bus (DRV10975, IAM-20380, PAC1934, PCF85063).
pub struct I2cPins {
    pub sda: GPIO5<'static>,
    pub scl: GPIO6<'static>,
}

/// LEDC-driven status LEDs, active high.
pub struct LedPins {
    pub red: GPIO7<'static>,
    pub green: GPIO10<'static>,
}

pub struct PowerPins {
    /// Power key, pressed = high.
    pub key: GPIO0<'static>,
    /// Regulator enable latch.
    pub latch: GPIO1<'static>,
}

/// DRV10975 direction and supply enable.
pub struct MotorPins {
    pub dir: GPIO20<'static>,
    pub enable: GPIO21<'static>,
}

/// Move the board pins out of `esp_hal::init`'s peripherals.
#[macro_export]
macro_rules! board_pins {
    ($p:ident) => {
        $crate::hw::pins::BoardPins {
            i2c: $crate::hw::pins::I2cPins {
                sda: $p.GPIO5,
                scl: $p.GPIO6,
            },
            leds: $crate::hw::pins::LedPins {
                red: $p.GPIO7,
                green: $p.GPIO10,
            },
            buzzer: $p.GPIO4,
            battery: $p.GPIO3,
            power: $crate::hw::pins::PowerPins {
                key: $p.GPIO0,
                latch: $p.GPIO1,
            },
            motor: $crate::hw::pins::MotorPins {
                dir: $p.GPIO20,
                enable: $p.GPIO21,
            },
        }
    };
}
