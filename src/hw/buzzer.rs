//! Piezo buzzer on a PWM channel.
//!
//! The tone is fixed by the PWM timer frequency; the duty only gates it. A 50 % square wave gives
//! the loudest output from a piezo element.

use embedded_hal::pwm::SetDutyCycle;

use super::led::duty_for_percent;

/// Resonant frequency of the board's buzzer, used to configure its PWM timer.
pub const TONE_HZ: u32 = 2730;

/// Duty used by [`Buzzer::on`].
pub const ON_PERCENT: u8 = 50;

pub struct Buzzer<P: SetDutyCycle> {
    pwm: P,
    percent: u8,
}

impl<P: SetDutyCycle> Buzzer<P> {
    /// Wrap a PWM channel, starting silent.
    pub fn new(pwm: P) -> Self {
        let mut buzzer = Self { pwm, percent: 0 };
        buzzer.set_duty(0);
        buzzer
    }

    /// Set duty in percent (clamped to 100).
    pub fn set_duty(&mut self, percent: u8) {
        let percent = percent.min(100);
        let duty = duty_for_percent(self.pwm.max_duty_cycle(), percent);
        self.pwm.set_duty_cycle(duty).ok();
        self.percent = percent;
    }

    #[inline]
    pub fn on(&mut self) {
        self.set_duty(ON_PERCENT);
    }

    #[inline]
    pub fn off(&mut self) {
        self.set_duty(0);
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.percent > 0
    }

    pub fn free(self) -> P {
        self.pwm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePwm;

    #[test]
    fn on_and_off_gate_a_square_wave() {
        let pwm = FakePwm::default();
        let mut buzzer = Buzzer::new(pwm.clone());
        assert!(!buzzer.is_on());

        buzzer.on();
        assert_eq!(pwm.duty(), FakePwm::MAX / 2);
        assert!(buzzer.is_on());

        buzzer.off();
        assert_eq!(pwm.duty(), 0);
    }

    #[test]
    fn duty_is_clamped() {
        let pwm = FakePwm::default();
        let mut buzzer = Buzzer::new(pwm.clone());
        buzzer.set_duty(255);
        assert_eq!(pwm.duty(), FakePwm::MAX);
    }
}
