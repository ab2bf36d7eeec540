//! `trouble-host` binding of the GATT table.
//!
//! Characteristic values shared with the system loop live in [`STATE`]. The host task validates
//! every read and write against [`GattState`] before accepting it, and re-advertises whenever a
//! central disconnects.

use core::cell::RefCell;

use embassy_futures::join::join;
use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use trouble_host::prelude::*;

use super::services::DeviceSettings;
use super::table::{AttError, CharId, GattState, WriteEffect};
use super::uuid;
use super::DEVICE_NAME;

const CONNECTIONS_MAX: usize = 1;
const L2CAP_CHANNELS_MAX: usize = 2; // signal + att

/// Static random address (top two bits set).
const ADDRESS: [u8; 6] = [0x3A, 0x68, 0xEE, 0x41, 0x35, 0xC2];

/// Values exposed over GATT.
pub static STATE: Mutex<CriticalSectionRawMutex, RefCell<GattState>> =
    Mutex::new(RefCell::new(GattState::new()));

static BATTERY_LEVEL: Signal<CriticalSectionRawMutex, u8> = Signal::new();

/// Publish a battery level; connected centrals are notified when it changes.
pub fn update_battery(percent: u8) {
    let changed = STATE.lock(|s| s.borrow_mut().battery.set_level(percent));
    if changed {
        BATTERY_LEVEL.signal(percent.min(100));
    }
}

pub fn settings() -> DeviceSettings {
    STATE.lock(|s| s.borrow().settings)
}

/// Epoch written by the app and not yet applied to the RTC.
pub fn take_time_sync() -> Option<i32> {
    STATE.lock(|s| s.borrow_mut().time.take_pending())
}

#[gatt_server]
pub struct Server {
    battery: BatteryGatt,
    device_settings: DeviceSettingsGatt,
    user_data: UserDataGatt,
    time_sync: TimeSyncGatt,
}

#[gatt_service(uuid = service::BATTERY)]
pub struct BatteryGatt {
    #[descriptor(uuid = descriptors::VALID_RANGE, read, value = [0, 100])]
    #[characteristic(uuid = characteristic::BATTERY_LEVEL, read, notify, value = 0)]
    level: u8,
}

#[gatt_service(uuid = "00001234-b38d-4985-720e-0f993a68ee41")]
pub struct DeviceSettingsGatt {
    #[characteristic(uuid = "00001235-b38d-4985-720e-0f993a68ee41", write)]
    pressure: u8,
    #[characteristic(uuid = "00001236-b38d-4985-720e-0f993a68ee41", write)]
    ramp_time: u8,
    #[characteristic(uuid = "00001237-b38d-4985-720e-0f993a68ee41", write)]
    alarm_hour: u8,
    #[characteristic(uuid = "00001238-b38d-4985-720e-0f993a68ee41", write)]
    alarm_minute: u8,
}

#[gatt_service(uuid = "00002234-b38d-4985-720e-0f993a68ee41")]
pub struct UserDataGatt {
    #[characteristic(uuid = "00002235-b38d-4985-720e-0f993a68ee41", read, value = 100)]
    operation_hour: u8,
    #[characteristic(uuid = "00002236-b38d-4985-720e-0f993a68ee41", read, value = 20)]
    operation_minute: u8,
    #[characteristic(uuid = "00002237-b38d-4985-720e-0f993a68ee41", read, value = 10)]
    sleep_position: u8,
}

#[gatt_service(uuid = "00003234-b38d-4985-720e-0f993a68ee41")]
pub struct TimeSyncGatt {
    #[characteristic(uuid = "00003235-b38d-4985-720e-0f993a68ee41", write)]
    epoch_time: i32,
}

fn char_id(server: &Server<'_>, handle: u16) -> Option<CharId> {
    let handles = [
        (server.battery.level.handle, CharId::BatteryLevel),
        (server.device_settings.pressure.handle, CharId::Pressure),
        (server.device_settings.ramp_time.handle, CharId::RampTime),
        (server.device_settings.alarm_hour.handle, CharId::AlarmHour),
        (server.device_settings.alarm_minute.handle, CharId::AlarmMinute),
        (server.user_data.operation_hour.handle, CharId::OperationHour),
        (server.user_data.operation_minute.handle, CharId::OperationMinute),
        (server.user_data.sleep_position.handle, CharId::SleepPosition),
        (server.time_sync.epoch_time.handle, CharId::EpochTime),
    ];
    handles
        .iter()
        .find(|(h, _)| *h == handle)
        .map(|(_, id)| *id)
}

fn att_code(e: AttError) -> AttErrorCode {
    match e {
        AttError::ReadNotPermitted => AttErrorCode::READ_NOT_PERMITTED,
        AttError::WriteNotPermitted => AttErrorCode::WRITE_NOT_PERMITTED,
        AttError::InvalidAttributeValueLength => AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH,
    }
}

/// Run the BLE host: build the GATT server and serve one central at a time, forever.
pub async fn run<C: Controller>(controller: C) {
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources).set_random_address(Address::random(ADDRESS));
    let Host {
        mut peripheral,
        runner,
        ..
    } = stack.build();

    let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: DEVICE_NAME,
        appearance: &appearance::power_device::GENERIC_POWER_DEVICE,
    })) {
        Ok(server) => server,
        Err(_) => {
            error!("ble: failed to build attribute table");
            return;
        }
    };

    let _ = join(host_task(runner), async {
        loop {
            match advertise(&mut peripheral, &server).await {
                Ok(conn) => {
                    let level = STATE.lock(|s| s.borrow().battery.level());
                    server.set(&server.battery.level, &level).ok();
                    select(gatt_events_task(&server, &conn), notify_task(&server, &conn)).await;
                }
                Err(_) => {
                    warn!("ble: advertising failed, retrying");
                    Timer::after(Duration::from_secs(1)).await;
                }
            }
        }
    })
    .await;
}

async fn host_task<C: Controller, P: PacketPool>(mut runner: Runner<'_, C, P>) {
    loop {
        if runner.run().await.is_err() {
            error!("ble: host runner stopped");
        }
    }
}

async fn advertise<'values, 'server, C: Controller>(
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    server: &'server Server<'values>,
) -> Result<GattConnection<'values, 'server, DefaultPacketPool>, BleHostError<C::Error>> {
    let mut adv_data = [0; 31];
    let len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::ServiceUuids16(&[uuid::BATTERY_SERVICE.to_le_bytes()]),
            AdStructure::CompleteLocalName(DEVICE_NAME.as_bytes()),
        ],
        &mut adv_data[..],
    )?;

    let mut scan_data = [0; 31];
    let scan_len = AdStructure::encode_slice(
        &[AdStructure::ServiceUuids128(&[uuid::vendor(uuid::DEVICE_SETTINGS_SERVICE)])],
        &mut scan_data[..],
    )?;

    let advertiser = peripheral
        .advertise(
            &AdvertisementParameters::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data: &adv_data[..len],
                scan_data: &scan_data[..scan_len],
            },
        )
        .await?;
    info!("ble: advertising as {=str}", DEVICE_NAME);
    let conn = advertiser.accept().await?.with_attribute_server(server)?;
    info!("ble: connected");
    Ok(conn)
}

/// Serve reads and writes until the connection closes.
async fn gatt_events_task<P: PacketPool>(server: &Server<'_>, conn: &GattConnection<'_, '_, P>) {
    loop {
        match conn.next().await {
            GattConnectionEvent::Disconnected { .. } => {
                info!("ble: disconnected");
                break;
            }
            GattConnectionEvent::Gatt { event } => {
                let result = match &event {
                    GattEvent::Read(read) => match char_id(server, read.handle()) {
                        Some(id) => STATE.lock(|s| s.borrow().read(id)).err().map(att_code),
                        None => None,
                    },
                    GattEvent::Write(write) => match char_id(server, write.handle()) {
                        Some(id) => match STATE.lock(|s| s.borrow_mut().write(id, write.data())) {
                            Ok(WriteEffect::TimeSyncRequested(epoch)) => {
                                info!("ble: time sync requested, epoch={=i32}", epoch);
                                None
                            }
                            Ok(WriteEffect::SettingsChanged) => None,
                            Err(e) => {
                                warn!("ble: rejected write to {}: {}", id, e);
                                Some(att_code(e))
                            }
                        },
                        None => None,
                    },
                    _ => None,
                };

                let reply = match result {
                    Some(code) => event.reject(code),
                    None => event.accept(),
                };
                match reply {
                    Ok(reply) => reply.send().await,
                    Err(_) => warn!("ble: failed to build reply"),
                }
            }
            _ => {}
        }
    }
}

/// Notify battery level changes to the connected central.
async fn notify_task<P: PacketPool>(server: &Server<'_>, conn: &GattConnection<'_, '_, P>) {
    let level = server.battery.level;
    loop {
        let percent = BATTERY_LEVEL.wait().await;
        if level.notify(conn, &percent).await.is_err() {
            debug!("ble: notify failed, dropping connection tasks");
            break;
        }
    }
}
