#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, Ordering};

use bt_hci::controller::ExternalController;
use defmt::{debug, error, info, warn};
use embassy_executor::Spawner;
use embassy_time::{Duration, Ticker, Timer};
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::ble::controller::BleConnector;
use static_cell::StaticCell;
use {esp_println as _, panic_halt as _};

use cpap_fw::ble::server;
use cpap_fw::board_pins;
use cpap_fw::drivers::{iam20380, pac1934, Drv10975, Iam20380, Pac1934, Pcf85063};
use cpap_fw::hw::{adc, buzzer, i2c, led, BatteryMonitor, Buzzer, Led, RetryI2c, StatusLeds};
use cpap_fw::motors::Blower;
use cpap_fw::power::{self, Indication, PowerControl, Shutdown, ShutdownMonitor, Startup};
use cpap_fw::system::Board;

esp_bootloader_esp_idf::esp_app_desc!();

static SHUTDOWN: ShutdownMonitor = ShutdownMonitor::new();
static KEY_PRESSED: AtomicBool = AtomicBool::new(true);

static LEDC: StaticCell<Ledc<'static>> = StaticCell::new();
static LED_TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();
static BUZZER_TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();
static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 66320);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt =
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    let pins = board_pins!(peripherals);
    let mut delay = Delay::new();

    // LEDC: LEDs and buzzer on separate timers, both 13-bit
    let ledc = LEDC.init(Ledc::new(peripherals.LEDC));
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

    let led_timer = LED_TIMER.init(ledc.timer::<LowSpeed>(timer::Number::Timer0));
    led_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty13Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_hz(led::PWM_HZ),
        })
        .expect("LED timer config");
    let led_timer: &'static timer::Timer<'static, LowSpeed> = led_timer;

    let buzzer_timer = BUZZER_TIMER.init(ledc.timer::<LowSpeed>(timer::Number::Timer1));
    buzzer_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty13Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_hz(buzzer::TONE_HZ),
        })
        .expect("buzzer timer config");
    let buzzer_timer: &'static timer::Timer<'static, LowSpeed> = buzzer_timer;

    let mut red = ledc.channel(channel::Number::Channel0, pins.leds.red);
    let mut green = ledc.channel(channel::Number::Channel1, pins.leds.green);
    let mut tone = ledc.channel(channel::Number::Channel2, pins.buzzer);
    for (ch, t) in [(&mut red, led_timer), (&mut green, led_timer), (&mut tone, buzzer_timer)] {
        ch.configure(channel::config::Config {
            timer: t,
            duty_pct: 0,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .expect("LEDC channel config");
    }
    let mut leds = StatusLeds::new(Led::active_high(red), Led::active_high(green));
    let mut buzzer = Buzzer::new(tone);

    // Power key and latch
    let key = Input::new(pins.power.key, InputConfig::default().with_pull(Pull::None));
    let latch = Output::new(pins.power.latch, Level::Low, OutputConfig::default());
    let mut power = PowerControl::new(key, latch);
    if power.startup(&mut delay) == Startup::Abort {
        loop {
            delay.delay_millis(power::POLL_MS);
        }
    }
    power::indicate(&mut leds, &mut buzzer, &mut delay, Indication::Startup);
    let pressed = power.key_pressed();
    KEY_PRESSED.store(pressed, Ordering::Release);
    if !pressed {
        // released during the indication, before the key task was listening
        SHUTDOWN.arm();
    }
    let (key, mut latch) = power.free();
    spawner.spawn(power_key_task(key)).ok();

    // Shared I2C bus
    let bus = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_hz(i2c::BUS_FREQUENCY_HZ)),
    )
    .expect("I2C config")
    .with_sda(pins.i2c.sda)
    .with_scl(pins.i2c.scl);

    // Battery ADC
    let mut adc_config = AdcConfig::new();
    let mut battery_pin = adc_config.enable_pin(pins.battery, Attenuation::_11dB);
    let mut adc1 = Adc::new(peripherals.ADC1, adc_config);
    let reader = adc::make_reader(move || nb::block!(adc1.read_oneshot(&mut battery_pin)).unwrap_or(0));

    let blower = Blower::new(
        Drv10975::new(),
        Output::new(pins.motor.dir, Level::Low, OutputConfig::default()),
        Output::new(pins.motor.enable, Level::Low, OutputConfig::default()),
    );

    let mut board = Board::new(
        RetryI2c::new(bus),
        Delay::new(),
        Pac1934::new(pac1934::Config::default()),
        Iam20380::new(iam20380::Config::default()),
        Pcf85063::new(),
        blower,
        BatteryMonitor::new(reader),
    );
    let report = board.boot();
    if !report.all_ok() {
        warn!("boot: running with missing devices {}", report);
    }

    // BLE
    let radio = RADIO.init(esp_radio::init().expect("radio init"));
    let transport =
        BleConnector::new(radio, peripherals.BT, Default::default()).expect("BLE transport init");
    let controller: ExternalController<_, 20> = ExternalController::new(transport);
    spawner.spawn(ble_task(controller)).ok();

    info!("system: running");
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(power::POLL_MS)));
    loop {
        let telemetry = board.sample();
        debug!(
            "battery={=u16}mV ({=u8}%) epoch={}",
            telemetry.battery_mv,
            telemetry.battery_percent,
            telemetry.epoch
        );
        server::update_battery(telemetry.battery_percent);

        if let Some(epoch) = server::take_time_sync() {
            if board.sync_time(i64::from(epoch)).is_err() {
                error!("rtc: time sync failed");
            }
        }

        if board.apply_settings(&server::settings()).is_err() {
            debug!("blower: speed update failed");
        }

        if SHUTDOWN.tick(KEY_PRESSED.load(Ordering::Acquire)) == Shutdown::Now {
            info!("power: shutdown requested");
            board.blower().power_off();
            power::indicate(&mut leds, &mut buzzer, board.delay(), Indication::Shutdown);
            latch.set_low();
            loop {
                Timer::after(Duration::from_millis(u64::from(power::POLL_MS))).await;
            }
        }

        ticker.next().await;
    }
}

/// Track the power key level; every release arms the shutdown countdown.
#[embassy_executor::task]
async fn power_key_task(mut key: Input<'static>) {
    loop {
        key.wait_for_any_edge().await;
        let pressed = key.is_high();
        KEY_PRESSED.store(pressed, Ordering::Release);
        if !pressed {
            SHUTDOWN.arm();
        }
    }
}

#[embassy_executor::task]
async fn ble_task(controller: ExternalController<BleConnector<'static>, 20>) {
    server::run(controller).await
}
