//! Battery voltage measurement through a resistor divider on an ADC pin.
//!
//! The ADC itself stays behind the [`AdcRead`] trait so that the averaging and scaling can be
//! exercised without hardware. On the board the reader is a closure over the esp-hal oneshot
//! ADC, see [`make_reader`].

#[allow(unused_imports)]
use micromath::F32Ext;

/// Samples averaged per battery reading.
pub const SAMPLES: u32 = 64;

/// Divider: 49.9 kΩ from the battery to the pin, 100 kΩ from the pin to ground.
pub const DIVIDER_TOP_KOHM: f32 = 49.9;
pub const DIVIDER_BOTTOM_KOHM: f32 = 100.0;

/// Pin voltage corresponding to a full-scale 12-bit reading at 11 dB attenuation.
pub const ADC_FULL_SCALE_MV: u32 = 2600;
const ADC_MAX_RAW: u32 = 4095;

/// Battery voltage reported as 0 % / 100 %.
pub const EMPTY_MV: u16 = 3300;
pub const FULL_MV: u16 = 4200;

/// Trait for reading one calibrated pin-voltage sample in millivolts.
pub trait AdcRead {
    fn read_millivolts(&mut self) -> u16;
}

impl<F: FnMut() -> u16> AdcRead for F {
    #[inline]
    fn read_millivolts(&mut self) -> u16 {
        self()
    }
}

/// Convert a raw 12-bit reading to pin millivolts using a linear transfer curve.
#[inline]
pub fn raw_to_millivolts(raw: u16) -> u16 {
    (u32::from(raw).min(ADC_MAX_RAW) * ADC_FULL_SCALE_MV / ADC_MAX_RAW) as u16
}

/// Create a reader closure from any raw sampling function, applying [`raw_to_millivolts`].
pub fn make_reader<F>(mut read_raw: F) -> impl FnMut() -> u16
where
    F: FnMut() -> u16,
{
    move || raw_to_millivolts(read_raw())
}

/// Map battery millivolts linearly onto 0..=100 %.
pub fn level_percent(battery_mv: u16) -> u8 {
    if battery_mv <= EMPTY_MV {
        return 0;
    }
    if battery_mv >= FULL_MV {
        return 100;
    }
    let span = f32::from(FULL_MV - EMPTY_MV);
    let pct = f32::from(battery_mv - EMPTY_MV) * 100.0 / span;
    pct.round() as u8
}

/// Averaging battery monitor.
pub struct BatteryMonitor<R: AdcRead> {
    reader: R,
    samples: u32,
}

impl<R: AdcRead> BatteryMonitor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            samples: SAMPLES,
        }
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples.max(1);
        self
    }

    /// Average pin voltage in millivolts.
    pub fn pin_millivolts(&mut self) -> u16 {
        let sum: u32 = (0..self.samples)
            .map(|_| u32::from(self.reader.read_millivolts()))
            .sum();
        (sum / self.samples) as u16
    }

    /// Battery voltage in millivolts, undoing the divider.
    pub fn battery_millivolts(&mut self) -> u16 {
        let pin = f32::from(self.pin_millivolts());
        let ratio = (DIVIDER_TOP_KOHM + DIVIDER_BOTTOM_KOHM) / DIVIDER_BOTTOM_KOHM;
        (pin * ratio).round() as u16
    }

    pub fn free(self) -> R {
        self.reader
    }
}
