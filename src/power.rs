// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Soft power: power-key hold to start, power latch, and hold-to-shutdown.
//!
//! The board's regulator is kept enabled by the latch output once firmware is running. Startup
//! requires the key to be held for [`HOLD_TO_START_MS`]; afterwards each release arms a countdown
//! that shuts the board down once the key is held for [`SHUTDOWN_TICKS`] polls.

use core::sync::atomic::{AtomicU16, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;

use crate::hw::{Buzzer, Color, StatusLeds};

/// Key poll interval.
pub const POLL_MS: u32 = 100;
/// Hold time required to power on.
pub const HOLD_TO_START_MS: u32 = 2000;
/// Polls the key must stay pressed after arming before shutdown (3 s).
pub const SHUTDOWN_TICKS: u16 = 30;
/// Length of the startup/shutdown indication.
pub const INDICATE_MS: u32 = 2000;

/// Outcome of one startup poll.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Startup {
    /// Key still held, not long enough yet.
    Waiting,
    /// Held long enough; latch power.
    PowerOn,
    /// Released early; the board should switch itself off.
    Abort,
}

/// Startup hold detector.
#[derive(Default)]
pub struct PowerOnGate {
    held_ms: u32,
}

impl PowerOnGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one key sample. The first sample is taken at power-up; each later one
    /// [`POLL_MS`] after the previous.
    pub fn poll(&mut self, pressed: bool) -> Startup {
        if !pressed {
            return Startup::Abort;
        }
        if self.held_ms >= HOLD_TO_START_MS {
            return Startup::PowerOn;
        }
        self.held_ms = self.held_ms.saturating_add(POLL_MS);
        Startup::Waiting
    }
}

/// Outcome of one shutdown tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Shutdown {
    Idle,
    Counting(u16),
    Now,
}

/// Hold-to-shutdown countdown.
///
/// [`arm`](Self::arm) is called on every key release (falling edge), [`tick`](Self::tick) from
/// the polling loop. Only atomic loads and stores are used so the monitor can live in a
/// `static` on cores without compare-and-swap.
pub struct ShutdownMonitor {
    remaining: AtomicU16,
}

impl Default for ShutdownMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownMonitor {
    pub const fn new() -> Self {
        Self {
            remaining: AtomicU16::new(0),
        }
    }

    /// Start (or restart) the countdown.
    pub fn arm(&self) {
        self.remaining.store(SHUTDOWN_TICKS, Ordering::Release);
    }

    #[inline]
    pub fn remaining(&self) -> u16 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Advance the countdown by one poll. It only moves while the key is held; the release edge
    /// re-arms it, so shutdown needs one continuous hold.
    pub fn tick(&self, pressed: bool) -> Shutdown {
        let n = self.remaining.load(Ordering::Acquire);
        if n == 0 || !pressed {
            return Shutdown::Idle;
        }
        let n = n - 1;
        self.remaining.store(n, Ordering::Release);
        if n == 0 {
            Shutdown::Now
        } else {
            Shutdown::Counting(n)
        }
    }
}

/// Which indication to play.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Indication {
    Startup,
    Shutdown,
}

impl Indication {
    #[inline]
    pub fn color(self) -> Color {
        match self {
            Indication::Startup => Color::Green,
            Indication::Shutdown => Color::Red,
        }
    }
}

/// Beep and show the indication color for [`INDICATE_MS`].
pub fn indicate<R, G, B, D>(
    leds: &mut StatusLeds<R, G>,
    buzzer: &mut Buzzer<B>,
    delay: &mut D,
    what: Indication,
) where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
    D: DelayNs,
{
    leds.off();
    buzzer.on();
    leds.on(what.color(), delay);
    delay.delay_ms(INDICATE_MS);
    buzzer.off();
    leds.off();
}

/// Power key (pressed = high) and regulator latch.
pub struct PowerControl<KEY: InputPin, LATCH: OutputPin> {
    key: KEY,
    latch: LATCH,
}

impl<KEY: InputPin, LATCH: OutputPin> PowerControl<KEY, LATCH> {
    pub fn new(key: KEY, latch: LATCH) -> Self {
        Self { key, latch }
    }

    #[inline]
    pub fn key_pressed(&mut self) -> bool {
        self.key.is_high().unwrap_or(false)
    }

    /// Block until the key has been held long enough or was released.
    ///
    /// Latches power on success. On [`Startup::Abort`] the latch is released and the caller
    /// should park the CPU until power drops.
    pub fn startup<D: DelayNs>(&mut self, delay: &mut D) -> Startup {
        let mut gate = PowerOnGate::new();
        loop {
            match gate.poll(self.key_pressed()) {
                Startup::Waiting => delay.delay_ms(POLL_MS),
                Startup::PowerOn => {
                    info!("power: key held, latching");
                    self.latch.set_high().ok();
                    return Startup::PowerOn;
                }
                Startup::Abort => {
                    warn!("power: key released early");
                    self.shut_down();
                    return Startup::Abort;
                }
            }
        }
    }

    /// Release the regulator latch.
    pub fn shut_down(&mut self) {
        info!("power: shutting down");
        self.latch.set_low().ok();
    }

    pub fn free(self) -> (KEY, LATCH) {
        (self.key, self.latch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::Led;
    use crate::testing::{FakeDelay, FakeKey, FakePin, FakePwm};

    #[test]
    fn gate_requires_full_hold() {
        let mut gate = PowerOnGate::new();
        for _ in 0..HOLD_TO_START_MS / POLL_MS {
            assert_eq!(gate.poll(true), Startup::Waiting);
        }
        assert_eq!(gate.poll(true), Startup::PowerOn);
        assert_eq!(PowerOnGate::new().poll(false), Startup::Abort);
    }

    #[test]
    fn startup_latches_after_two_seconds() {
        let key = FakeKey::default();
        let latch = FakePin::default();
        key.press(true);
        let mut power = PowerControl::new(key, latch.clone());
        let mut delay = FakeDelay::default();

        assert_eq!(power.startup(&mut delay), Startup::PowerOn);
        assert!(latch.is_set_high());
        assert_eq!(delay.total_ms(), u64::from(HOLD_TO_START_MS));
    }

    #[test]
    fn release_just_before_two_seconds_aborts() {
        let mut gate = PowerOnGate::new();
        for _ in 0..HOLD_TO_START_MS / POLL_MS {
            assert_eq!(gate.poll(true), Startup::Waiting);
        }
        // 2000 ms after the first sample the key is already up
        assert_eq!(gate.poll(false), Startup::Abort);
    }

    #[test]
    fn startup_abort_releases_latch() {
        let key = FakeKey::default();
        let latch = FakePin::default();
        let mut power = PowerControl::new(key, latch.clone());
        let mut delay = FakeDelay::default();
        assert_eq!(power.startup(&mut delay), Startup::Abort);
        assert!(!latch.is_set_high());
    }

    #[test]
    fn shutdown_counts_down_while_held() {
        let mon = ShutdownMonitor::new();
        assert_eq!(mon.tick(true), Shutdown::Idle);

        mon.arm();
        for i in 1..SHUTDOWN_TICKS {
            assert_eq!(mon.tick(true), Shutdown::Counting(SHUTDOWN_TICKS - i));
        }
        assert_eq!(mon.tick(true), Shutdown::Now);
        assert_eq!(mon.tick(true), Shutdown::Idle);
    }

    #[test]
    fn release_rearms_full_countdown() {
        let mon = ShutdownMonitor::new();
        mon.arm();
        assert_eq!(mon.tick(true), Shutdown::Counting(SHUTDOWN_TICKS - 1));
        assert_eq!(mon.tick(true), Shutdown::Counting(SHUTDOWN_TICKS - 2));

        // key released: no progress, and the edge restores the full count
        assert_eq!(mon.tick(false), Shutdown::Idle);
        assert_eq!(mon.remaining(), SHUTDOWN_TICKS - 2);
        mon.arm();
        assert_eq!(mon.tick(true), Shutdown::Counting(SHUTDOWN_TICKS - 1));
    }

    #[test]
    fn never_armed_ignores_presses() {
        let mon = ShutdownMonitor::new();
        for _ in 0..100 {
            assert_eq!(mon.tick(true), Shutdown::Idle);
        }
    }

    #[test]
    fn indication_beeps_with_color_then_clears() {
        let red = FakePwm::default();
        let green = FakePwm::default();
        let buzz = FakePwm::default();
        let mut leds = StatusLeds::new(Led::active_high(red.clone()), Led::active_high(green.clone()));
        let mut buzzer = Buzzer::new(buzz.clone());
        let mut delay = FakeDelay::default();

        indicate(&mut leds, &mut buzzer, &mut delay, Indication::Shutdown);

        assert!(red.history.borrow().iter().any(|&d| d > 0));
        assert!(green.history.borrow().iter().all(|&d| d == 0));
        assert!(buzz.history.borrow().contains(&(FakePwm::MAX / 2)));
        assert_eq!(buzz.duty(), 0);
        assert_eq!(red.duty(), 0);
        assert_eq!(delay.total_ms(), u64::from(INDICATE_MS + 10));
    }
}
