//! Backing values for each GATT service.

/// Battery Service (0x180F).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BatteryService {
    level: u8,
}

impl BatteryService {
    pub const fn new() -> Self {
        Self { level: 0 }
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Store a new level (clamped to 100). Returns `true` if the value changed and subscribers
    /// should be notified.
    pub fn set_level(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if percent == self.level {
            return false;
        }
        self.level = percent;
        true
    }
}

/// Device Settings Service (0x1234). All fields are written by the app.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSettings {
    /// Therapy pressure in cmH2O.
    pub pressure: u8,
    /// Ramp time in minutes.
    pub ramp_time: u8,
    pub alarm_hour: u8,
    pub alarm_minute: u8,
}

impl DeviceSettings {
    pub const fn new() -> Self {
        Self {
            pressure: 0,
            ramp_time: 0,
            alarm_hour: 0,
            alarm_minute: 0,
        }
    }
}

/// User Data Service (0x2234). Read-only usage statistics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UserData {
    pub operation_hour: u8,
    pub operation_minute: u8,
    pub sleep_position: u8,
}

impl UserData {
    pub const fn new() -> Self {
        Self {
            operation_hour: 100,
            operation_minute: 20,
            sleep_position: 10,
        }
    }
}

impl Default for UserData {
    fn default() -> Self {
        Self::new()
    }
}

/// Time Sync Service (0x3234).
///
/// A write stores the epoch and leaves a pending request for the system loop to apply to the RTC.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TimeSync {
    epoch: i32,
    pending: bool,
}

impl TimeSync {
    pub const fn new() -> Self {
        Self {
            epoch: 0,
            pending: false,
        }
    }

    pub fn store(&mut self, epoch: i32) {
        self.epoch = epoch;
        self.pending = true;
    }

    /// Last epoch written, whether or not it has been applied.
    #[inline]
    pub fn epoch(&self) -> i32 {
        self.epoch
    }

    /// Take the pending sync request, if any.
    pub fn take_pending(&mut self) -> Option<i32> {
        if core::mem::take(&mut self.pending) {
            Some(self.epoch)
        } else {
            None
        }
    }
}
