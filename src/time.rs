// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Calendar conversions between Unix epoch seconds and broken-down UTC time.
//!
//! The RTC stores broken-down time; BLE time sync and logging work in epoch seconds. All
//! conversions are UTC, the board has no timezone setting.

use core::fmt::Write;

use chrono::{DateTime, Datelike, NaiveDate, Timelike};
use heapless::String;

/// "DD/MM/20YY-HH:MM:SS"
pub type Timestamp = String<20>;

/// Broken-down UTC time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HumanTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Convert epoch seconds to broken-down time. `None` if the year does not fit.
pub fn epoch_to_human(epoch: i64) -> Option<HumanTime> {
    let dt = DateTime::from_timestamp(epoch, 0)?;
    Some(HumanTime {
        year: u16::try_from(dt.year()).ok()?,
        month: dt.month() as u8,
        day: dt.day() as u8,
        hour: dt.hour() as u8,
        minute: dt.minute() as u8,
        second: dt.second() as u8,
    })
}

/// Convert broken-down time to epoch seconds. `None` for an impossible date or time.
pub fn human_to_epoch(t: &HumanTime) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(i32::from(t.year), u32::from(t.month), u32::from(t.day))?;
    let dt = date.and_hms_opt(u32::from(t.hour), u32::from(t.minute), u32::from(t.second))?;
    Some(dt.and_utc().timestamp())
}

/// Day of week, 0 = Sunday.
pub fn weekday(epoch: i64) -> Option<u8> {
    let dt = DateTime::from_timestamp(epoch, 0)?;
    Some(dt.weekday().num_days_from_sunday() as u8)
}

/// Format as "DD/MM/20YY-HH:MM:SS". `None` outside 2000..=2099.
pub fn format_timestamp(epoch: i64) -> Option<Timestamp> {
    let t = epoch_to_human(epoch)?;
    if !(2000..=2099).contains(&t.year) {
        return None;
    }
    let mut s = Timestamp::new();
    write!(
        s,
        "{:02}/{:02}/20{:02}-{:02}:{:02}:{:02}",
        t.day,
        t.month,
        t.year % 100,
        t.hour,
        t.minute,
        t.second
    )
    .ok()?;
    Some(s)
}
