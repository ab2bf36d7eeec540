//! PWM-dimmed status LEDs.
//!
//! Each LED sits on its own PWM channel ([`PWM_HZ`], 13-bit on the board). Brightness is expressed
//! in percent and clamped to 100.

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;

/// LED PWM timer frequency.
pub const PWM_HZ: u32 = 5_000;

/// Brightness used by [`StatusLeds::on`].
pub const ON_PERCENT: u8 = 80;
/// Pause between lighting one LED and extinguishing the other.
pub const SWITCH_DELAY_MS: u32 = 10;
/// Step length of a software fade.
pub const FADE_STEP_MS: u32 = 10;

/// Whether the LED is driven active-high or active-low on the board wiring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActiveLevel {
    High,
    Low,
}

/// Map a brightness percentage onto a duty value in `0..=max`.
#[inline]
pub fn duty_for_percent(max: u16, percent: u8) -> u16 {
    (u32::from(max) * u32::from(percent.min(100)) / 100) as u16
}

/// LED abstraction that remembers its active level and last brightness.
pub struct Led<P: SetDutyCycle> {
    pwm: P,
    active: ActiveLevel,
    percent: u8,
}

impl<P: SetDutyCycle> Led<P> {
    /// Create an LED wrapper, initializing it to OFF.
    pub fn new(pwm: P, active: ActiveLevel) -> Self {
        let mut led = Self {
            pwm,
            active,
            percent: 0,
        };
        led.set_percent(0);
        led
    }

    pub fn active_high(pwm: P) -> Self {
        Self::new(pwm, ActiveLevel::High)
    }

    pub fn active_low(pwm: P) -> Self {
        Self::new(pwm, ActiveLevel::Low)
    }

    /// Set brightness in percent (clamped to 100).
    pub fn set_percent(&mut self, percent: u8) {
        let percent = percent.min(100);
        let max = self.pwm.max_duty_cycle();
        let duty = match self.active {
            ActiveLevel::High => duty_for_percent(max, percent),
            ActiveLevel::Low => max - duty_for_percent(max, percent),
        };
        self.pwm.set_duty_cycle(duty).ok();
        self.percent = percent;
    }

    #[inline]
    pub fn off(&mut self) {
        self.set_percent(0);
    }

    #[inline]
    pub fn percent(&self) -> u8 {
        self.percent
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.percent > 0
    }

    pub fn free(self) -> P {
        self.pwm
    }
}

/// LED selector.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Color {
    Red,
    Green,
}

/// Brightness at step `i` of `steps` on a linear fade.
fn fade_level(from: u8, to: u8, i: u32, steps: u32) -> u8 {
    let (from, to) = (i64::from(from), i64::from(to));
    (from + (to - from) * i64::from(i) / i64::from(steps)) as u8
}

/// The board's red/green indicator pair.
pub struct StatusLeds<R: SetDutyCycle, G: SetDutyCycle> {
    red: Led<R>,
    green: Led<G>,
}

impl<R: SetDutyCycle, G: SetDutyCycle> StatusLeds<R, G> {
    pub fn new(red: Led<R>, green: Led<G>) -> Self {
        Self { red, green }
    }

    pub fn set_duty(&mut self, color: Color, percent: u8) {
        match color {
            Color::Red => self.red.set_percent(percent),
            Color::Green => self.green.set_percent(percent),
        }
    }

    pub fn percent(&self, color: Color) -> u8 {
        match color {
            Color::Red => self.red.percent(),
            Color::Green => self.green.percent(),
        }
    }

    /// Light one LED and turn the other off, so only one color shows.
    pub fn on<D: DelayNs>(&mut self, color: Color, delay: &mut D) {
        self.set_duty(color, ON_PERCENT);
        delay.delay_ms(SWITCH_DELAY_MS);
        match color {
            Color::Red => self.green.off(),
            Color::Green => self.red.off(),
        }
    }

    pub fn off(&mut self) {
        self.red.off();
        self.green.off();
    }

    /// Jump to `from`, then fade linearly to `to` over `time_ms`.
    pub fn dim<D: DelayNs>(&mut self, color: Color, from: u8, to: u8, time_ms: u32, delay: &mut D) {
        let from = from.min(100);
        let to = to.min(100);
        self.set_duty(color, from);
        delay.delay_ms(SWITCH_DELAY_MS);

        let steps = (time_ms / FADE_STEP_MS).max(1);
        for i in 1..=steps {
            self.set_duty(color, fade_level(from, to, i, steps));
            delay.delay_ms(FADE_STEP_MS);
        }
    }

    pub fn free(self) -> (Led<R>, Led<G>) {
        (self.red, self.green)
    }
}
