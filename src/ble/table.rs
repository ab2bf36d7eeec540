// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Characteristic table and read/write dispatch.
//!
//! The host stack owns the attribute database; this module decides what each access means. Reads
//! and writes are validated against [`CHARACTERISTICS`] and applied to [`GattState`].

use heapless::Vec;

use super::services::{BatteryService, DeviceSettings, TimeSync, UserData};
use super::uuid::{self, Uuid};

/// Largest characteristic value.
pub const MAX_VALUE_LEN: usize = 4;

pub type Value = Vec<u8, MAX_VALUE_LEN>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Service {
    Battery,
    DeviceSettings,
    UserData,
    TimeSync,
}

impl Service {
    pub const fn uuid(self) -> Uuid {
        match self {
            Service::Battery => Uuid::Sig(uuid::BATTERY_SERVICE),
            Service::DeviceSettings => Uuid::Vendor(uuid::DEVICE_SETTINGS_SERVICE),
            Service::UserData => Uuid::Vendor(uuid::USER_DATA_SERVICE),
            Service::TimeSync => Uuid::Vendor(uuid::TIME_SYNC_SERVICE),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CharId {
    BatteryLevel,
    Pressure,
    RampTime,
    AlarmHour,
    AlarmMinute,
    OperationHour,
    OperationMinute,
    SleepPosition,
    EpochTime,
}

/// Access flags of a characteristic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Props {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl Props {
    const READ_NOTIFY: Props = Props { read: true, write: false, notify: true };
    const READ: Props = Props { read: true, write: false, notify: false };
    const WRITE: Props = Props { read: false, write: true, notify: false };
}

#[derive(Copy, Clone, Debug)]
pub struct CharDef {
    pub id: CharId,
    pub service: Service,
    pub uuid: Uuid,
    pub props: Props,
    /// Value width in bytes.
    pub len: usize,
}

const fn def(id: CharId, service: Service, uuid: Uuid, props: Props, len: usize) -> CharDef {
    CharDef { id, service, uuid, props, len }
}

pub const CHARACTERISTICS: [CharDef; 9] = [
    def(CharId::BatteryLevel, Service::Battery, Uuid::Sig(uuid::BATTERY_LEVEL), Props::READ_NOTIFY, 1),
    def(CharId::Pressure, Service::DeviceSettings, Uuid::Vendor(uuid::PRESSURE), Props::WRITE, 1),
    def(CharId::RampTime, Service::DeviceSettings, Uuid::Vendor(uuid::RAMP_TIME), Props::WRITE, 1),
    def(CharId::AlarmHour, Service::DeviceSettings, Uuid::Vendor(uuid::ALARM_HOUR), Props::WRITE, 1),
    def(CharId::AlarmMinute, Service::DeviceSettings, Uuid::Vendor(uuid::ALARM_MINUTE), Props::WRITE, 1),
    def(CharId::OperationHour, Service::UserData, Uuid::Vendor(uuid::OPERATION_HOUR), Props::READ, 1),
    def(CharId::OperationMinute, Service::UserData, Uuid::Vendor(uuid::OPERATION_MINUTE), Props::READ, 1),
    def(CharId::SleepPosition, Service::UserData, Uuid::Vendor(uuid::SLEEP_POSITION), Props::READ, 1),
    def(CharId::EpochTime, Service::TimeSync, Uuid::Vendor(uuid::EPOCH_TIME), Props::WRITE, 4),
];

impl CharId {
    pub fn def(self) -> &'static CharDef {
        // Table order matches the enum order.
        &CHARACTERISTICS[self as usize]
    }
}

/// ATT-level failure of an access.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttError {
    ReadNotPermitted,
    WriteNotPermitted,
    InvalidAttributeValueLength,
}

impl AttError {
    /// ATT protocol error code.
    pub const fn code(self) -> u8 {
        match self {
            AttError::ReadNotPermitted => 0x02,
            AttError::WriteNotPermitted => 0x03,
            AttError::InvalidAttributeValueLength => 0x0D,
        }
    }
}

/// What a successful write changed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteEffect {
    SettingsChanged,
    TimeSyncRequested(i32),
}

/// All characteristic values exposed over GATT.
#[derive(Clone, Debug)]
pub struct GattState {
    pub battery: BatteryService,
    pub settings: DeviceSettings,
    pub user: UserData,
    pub time: TimeSync,
}

impl Default for GattState {
    fn default() -> Self {
        Self::new()
    }
}

impl GattState {
    pub const fn new() -> Self {
        Self {
            battery: BatteryService::new(),
            settings: DeviceSettings::new(),
            user: UserData::new(),
            time: TimeSync::new(),
        }
    }

    pub fn read(&self, id: CharId) -> Result<Value, AttError> {
        if !id.def().props.read {
            return Err(AttError::ReadNotPermitted);
        }
        let byte = match id {
            CharId::BatteryLevel => self.battery.level(),
            CharId::OperationHour => self.user.operation_hour,
            CharId::OperationMinute => self.user.operation_minute,
            CharId::SleepPosition => self.user.sleep_position,
            _ => return Err(AttError::ReadNotPermitted),
        };
        let mut value = Value::new();
        value.push(byte).ok();
        Ok(value)
    }

    pub fn write(&mut self, id: CharId, data: &[u8]) -> Result<WriteEffect, AttError> {
        let def = id.def();
        if !def.props.write {
            return Err(AttError::WriteNotPermitted);
        }
        if data.len() != def.len {
            return Err(AttError::InvalidAttributeValueLength);
        }
        let effect = match id {
            CharId::Pressure => {
                self.settings.pressure = data[0];
                WriteEffect::SettingsChanged
            }
            CharId::RampTime => {
                self.settings.ramp_time = data[0];
                WriteEffect::SettingsChanged
            }
            CharId::AlarmHour => {
                self.settings.alarm_hour = data[0];
                WriteEffect::SettingsChanged
            }
            CharId::AlarmMinute => {
                self.settings.alarm_minute = data[0];
                WriteEffect::SettingsChanged
            }
            CharId::EpochTime => {
                let epoch = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                self.time.store(epoch);
                WriteEffect::TimeSyncRequested(epoch)
            }
            _ => return Err(AttError::WriteNotPermitted),
        };
        debug!("gatt: write {}", id);
        Ok(effect)
    }
}
