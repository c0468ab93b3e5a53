#![no_std]
#![no_main]

use core::cell::RefCell;
use core::mem;

use defmt::*;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::{config::Config, interrupt};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::{raw, Config as SdConfig, Softdevice};
use panic_probe as _;
use static_cell::StaticCell;

use imu_ble_peripheral::ble::dispatcher::LogWrites;
use imu_ble_peripheral::ble::services::Characteristic;
use imu_ble_peripheral::config::{ATT_MTU, DEVICE_NAME, MAX_CONNECTIONS};
use imu_ble_peripheral::softdevice::{self, GattServer, SharedPeripheral, SoftdeviceStack};
use imu_ble_peripheral::Peripheral;

type App = LogWrites;

static PERIPHERAL: StaticCell<SharedPeripheral<App>> = StaticCell::new();
static SERVER: StaticCell<GattServer<App>> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting IMU BLE peripheral");

    // Configure nRF peripherals
    let mut nrf_config = Config::default();
    // Configure interrupt priorities to avoid SoftDevice reserved levels (0, 1, 4)
    nrf_config.gpiote_interrupt_priority = interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = interrupt::Priority::P2;

    let _peripherals = embassy_nrf::init(nrf_config);

    let sd_config = SdConfig {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: MAX_CONNECTIONS as u8,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: 1408,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: MAX_CONNECTIONS as u8,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: Default::default(),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(raw::BLE_GATTS_VLOC_STACK as u8),
        }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&sd_config);
    info!("SoftDevice enabled");

    let peripheral = match Peripheral::start(SoftdeviceStack::new(sd), LogWrites) {
        Ok(peripheral) => peripheral,
        Err(e) => defmt::panic!("Peripheral startup failed: {:?}", e),
    };
    let sd = unwrap!(peripheral.stack().softdevice());

    let peripheral: &'static SharedPeripheral<App> = PERIPHERAL.init(Mutex::new(RefCell::new(peripheral)));
    let server: &'static GattServer<App> = SERVER.init(GattServer::new(peripheral));

    // Spawn SoftDevice task (CRITICAL!)
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(advertising_task(spawner, sd, peripheral, server)));
    unwrap!(spawner.spawn(producer_task(peripheral)));

    info!("System initialized, entering main loop");

    loop {
        Timer::after(Duration::from_secs(10)).await;
        let connected = peripheral.lock(|p| p.borrow().registry().len());
        info!("Heartbeat - {} central(s) connected", connected);
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn advertising_task(
    spawner: Spawner,
    sd: &'static Softdevice,
    peripheral: &'static SharedPeripheral<App>,
    server: &'static GattServer<App>,
) -> ! {
    softdevice::run_advertising(sd, |conn| {
        let handle = conn.handle();
        let peer = softdevice::peer_address(&conn);
        softdevice::on_connected(peripheral, &conn);

        if spawner.spawn(connection_task(conn, server)).is_err() {
            // The dropped connection is closed without a disconnect event
            warn!("CONNECTION: No free connection task");
            if let Some(handle) = handle {
                softdevice::on_disconnected(peripheral, handle, peer);
            }
        }
    })
    .await
}

#[embassy_executor::task(pool_size = MAX_CONNECTIONS)]
async fn connection_task(conn: Connection, server: &'static GattServer<App>) {
    softdevice::serve_connection(conn, server).await;
}

/// Periodically pushes a heart rate measurement and a UART line to every
/// connected central
#[embassy_executor::task]
async fn producer_task(peripheral: &'static SharedPeripheral<App>) {
    let mut bpm: u8 = 60;

    loop {
        Timer::after(Duration::from_secs(1)).await;

        // Flags 0x00: 8-bit heart rate value, no sensor contact
        let measurement = [0x00, bpm];
        let line = [b'H', b'R', b' ', b'0' + bpm / 100, b'0' + (bpm / 10) % 10, b'0' + bpm % 10, b'\n'];

        peripheral.lock(|p| {
            let p = p.borrow();
            if let Err(e) = p.broadcast_to(Characteristic::HeartRateMeasurement, &measurement) {
                warn!("PRODUCER: Heart rate broadcast failed: {:?}", e);
            }
            if let Err(e) = p.broadcast(&line) {
                warn!("PRODUCER: UART broadcast failed: {:?}", e);
            }
        });

        bpm = if bpm >= 100 { 60 } else { bpm + 1 };
    }
}
