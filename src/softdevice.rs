//! S140 SoftDevice Binding
//!
//! Implements [`RadioStack`] on top of `nrf-softdevice` and bridges the
//! SoftDevice's async connection model back into the peripheral's event
//! dispatch:
//!
//! - services are registered with `ServiceBuilder` while the SoftDevice is
//!   still exclusively borrowed; after that it is shared with the runner
//! - advertising requests are posted to [`ADVERTISING`] and executed by
//!   [`run_advertising`], which reports each accepted connection back
//! - [`GattServer`] turns SoftDevice writes into
//!   [`BleEvent::AttributeWrite`]
//!
//! The SoftDevice answers reads from its own attribute table, so this
//! binding never produces [`BleEvent::AttributeReadRequest`].

use core::cell::RefCell;
use core::mem;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::Vec;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, GetValueError, NotifyValueError, RegisterError, WriteOp};
use nrf_softdevice::ble::peripheral::{self, AdvertiseError, ConnectableAdvertisement};
use nrf_softdevice::ble::{Connection, Uuid};
use nrf_softdevice::Softdevice;

use crate::ble::advertising::{interval_units, AdvertisingPayload};
use crate::ble::connection::ConnectionHandle;
use crate::ble::dispatcher::GattHandler;
use crate::ble::events::{AddressKind, BleEvent, PeerAddress};
use crate::ble::peripheral::Peripheral;
use crate::ble::services::{CharacteristicFlags, CharacteristicHandle, RegisteredHandles, ServiceDescriptor};
use crate::ble::stack::{RadioStack, StackError};
use crate::ble::uuid::BleUuid;
use crate::config::MAX_VALUE_LEN;

/// Initial value of every characteristic; values are variable length
const EMPTY_VALUE: &[u8] = &[];

/// Peripheral shared between the SoftDevice tasks
pub type SharedPeripheral<H> = Mutex<CriticalSectionRawMutex, RefCell<Peripheral<SoftdeviceStack, H>>>;

/// Work for the advertising task
pub enum AdvertisingCommand {
    Start {
        interval: u32,
        adv_data: AdvertisingPayload,
        scan_data: AdvertisingPayload,
    },
    Stop,
}

/// Latest advertising command; a newer one replaces an unconsumed one
pub static ADVERTISING: Signal<CriticalSectionRawMutex, AdvertisingCommand> = Signal::new();

enum State {
    /// Enabled but not yet handed to the runner; services can still be added
    Configuring(&'static mut Softdevice),
    /// Shared with the runner and the connection tasks
    Serving(&'static Softdevice),
    /// Only observed while switching between the two above
    Switching,
}

/// [`RadioStack`] backed by the S140 SoftDevice
pub struct SoftdeviceStack {
    state: State,
    active: bool,
}

impl SoftdeviceStack {
    /// Wrap an enabled SoftDevice that has not started running yet
    pub fn new(sd: &'static mut Softdevice) -> Self {
        Self {
            state: State::Configuring(sd),
            active: false,
        }
    }

    /// The shared SoftDevice, available once services are registered
    pub fn softdevice(&self) -> Option<&'static Softdevice> {
        match self.state {
            State::Serving(sd) => Some(sd),
            _ => None,
        }
    }

    fn sd(&self) -> Result<&Softdevice, StackError> {
        match &self.state {
            State::Configuring(sd) => Ok(&**sd),
            State::Serving(sd) => Ok(*sd),
            State::Switching => Err(StackError::NotActive),
        }
    }
}

impl RadioStack for SoftdeviceStack {
    fn activate(&mut self, enable: bool) -> Result<(), StackError> {
        // The SoftDevice stays enabled for the life of the firmware; turning
        // the radio "off" means no advertising and no outbound traffic.
        if !enable {
            ADVERTISING.signal(AdvertisingCommand::Stop);
        }
        self.active = enable;
        Ok(())
    }

    fn register_services(&mut self, services: &[ServiceDescriptor]) -> Result<RegisteredHandles, StackError> {
        let sd = match mem::replace(&mut self.state, State::Switching) {
            State::Configuring(sd) => sd,
            other => {
                // Already serving: the attribute table is frozen
                self.state = other;
                return Err(StackError::Unsupported);
            }
        };

        let result = register_all(&mut *sd, services);
        self.state = if result.is_ok() {
            State::Serving(sd)
        } else {
            State::Configuring(sd)
        };
        result
    }

    fn read_attribute(&self, handle: CharacteristicHandle, buf: &mut [u8]) -> Result<usize, StackError> {
        gatt_server::get_value(self.sd()?, handle.0, buf).map_err(|e| match e {
            GetValueError::Truncated => StackError::InvalidLength,
            GetValueError::Raw(raw) => StackError::Raw(raw as u32),
        })
    }

    fn notify(
        &self,
        conn: ConnectionHandle,
        characteristic: CharacteristicHandle,
        payload: &[u8],
    ) -> Result<(), StackError> {
        if !self.active {
            return Err(StackError::NotActive);
        }

        let connection = Connection::from_handle(conn.0).ok_or(StackError::Disconnected)?;
        gatt_server::notify_value(&connection, characteristic.0, payload).map_err(|e| match e {
            NotifyValueError::Disconnected => StackError::Disconnected,
            NotifyValueError::Raw(raw) => StackError::Raw(raw as u32),
        })
    }

    fn advertise(&mut self, interval_us: u32, adv_data: &[u8], scan_data: &[u8]) -> Result<(), StackError> {
        if !self.active {
            return Err(StackError::NotActive);
        }

        let adv_data = Vec::from_slice(adv_data).map_err(|_| StackError::InvalidLength)?;
        let scan_data = Vec::from_slice(scan_data).map_err(|_| StackError::InvalidLength)?;

        ADVERTISING.signal(AdvertisingCommand::Start {
            interval: interval_units(interval_us),
            adv_data,
            scan_data,
        });
        Ok(())
    }
}

fn to_uuid(uuid: BleUuid) -> Uuid {
    match uuid {
        BleUuid::Uuid16(short) => Uuid::new_16(short),
        BleUuid::Uuid128(_) => Uuid::new_128(&uuid.to_le_bytes()),
    }
}

fn to_properties(flags: CharacteristicFlags) -> Properties {
    let mut props = Properties::new();

    if flags.contains(CharacteristicFlags::BROADCAST) {
        props = props.broadcast();
    }
    if flags.contains(CharacteristicFlags::READ) {
        props = props.read();
    }
    if flags.contains(CharacteristicFlags::WRITE_WITHOUT_RESPONSE) {
        props = props.write_without_response();
    }
    if flags.contains(CharacteristicFlags::WRITE) {
        props = props.write();
    }
    if flags.contains(CharacteristicFlags::NOTIFY) {
        props = props.notify();
    }
    if flags.contains(CharacteristicFlags::INDICATE) {
        props = props.indicate();
    }

    props
}

fn register_all(sd: &mut Softdevice, services: &[ServiceDescriptor]) -> Result<RegisteredHandles, StackError> {
    let mut registered = RegisteredHandles::new();

    for service in services {
        let mut sb = ServiceBuilder::new(sd, to_uuid(service.uuid)).map_err(register_error)?;
        let mut handles = Vec::new();

        for characteristic in service.characteristics {
            let attr = Attribute::new(EMPTY_VALUE).variable_len(MAX_VALUE_LEN as u16);
            let metadata = Metadata::new(to_properties(characteristic.flags));
            let built = sb
                .add_characteristic(to_uuid(characteristic.uuid), attr, metadata)
                .map_err(register_error)?
                .build();

            debug!(
                "GATT: Characteristic value={} cccd={}",
                built.value_handle, built.cccd_handle
            );
            handles
                .push(CharacteristicHandle(built.value_handle))
                .map_err(|_| StackError::InvalidLength)?;
        }

        sb.build();
        registered.push(handles).map_err(|_| StackError::InvalidLength)?;
    }

    Ok(registered)
}

fn register_error(e: RegisterError) -> StackError {
    match e {
        RegisterError::Raw(raw) => StackError::Raw(raw as u32),
    }
}

/// Address of the central on the other end of `conn`
pub fn peer_address(conn: &Connection) -> PeerAddress {
    let address = conn.peer_address();
    PeerAddress {
        kind: AddressKind::from(address.address_type() as u8),
        bytes: address.bytes(),
    }
}

/// SoftDevice GATT server feeding writes into a shared peripheral
pub struct GattServer<H: GattHandler + 'static> {
    peripheral: &'static SharedPeripheral<H>,
}

impl<H: GattHandler + 'static> GattServer<H> {
    pub fn new(peripheral: &'static SharedPeripheral<H>) -> Self {
        Self { peripheral }
    }
}

impl<H: GattHandler + 'static> gatt_server::Server for GattServer<H> {
    type Event = ();

    fn on_write(
        &self,
        conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        _data: &[u8],
    ) -> Option<Self::Event> {
        // The dispatcher reads the stored value back itself
        let conn = conn.handle()?;

        self.peripheral.lock(|p| {
            p.borrow_mut().handle_event(BleEvent::AttributeWrite {
                conn: ConnectionHandle(conn),
                attr: CharacteristicHandle(handle),
            })
        });
        None
    }
}

/// Record a new connection and keep advertising while there is room for
/// more centrals
pub fn on_connected<H: GattHandler>(peripheral: &SharedPeripheral<H>, conn: &Connection) {
    let Some(handle) = conn.handle() else {
        return;
    };

    peripheral.lock(|p| {
        let mut p = p.borrow_mut();
        p.handle_event(BleEvent::CentralConnect {
            conn: ConnectionHandle(handle),
            peer: peer_address(conn),
        });

        if p.registry().len() < crate::config::MAX_CONNECTIONS {
            if let Err(e) = p.advertise() {
                warn!("ADV: Cannot keep advertising: {:?}", e);
            }
        }
    });
}

/// Forget a closed connection and advertise again
pub fn on_disconnected<H: GattHandler>(peripheral: &SharedPeripheral<H>, handle: u16, peer: PeerAddress) {
    peripheral.lock(|p| {
        let mut p = p.borrow_mut();
        p.handle_event(BleEvent::CentralDisconnect {
            conn: ConnectionHandle(handle),
            peer,
        });

        if let Err(e) = p.advertise() {
            warn!("ADV: Cannot restart advertising: {:?}", e);
        }
    });
}

/// Serve one connection until the central drops it
pub async fn serve_connection<H: GattHandler + 'static>(conn: Connection, server: &GattServer<H>) {
    let Some(handle) = conn.handle() else {
        return;
    };
    let peer = peer_address(&conn);

    // Returns once the central is gone
    let _ = gatt_server::run(&conn, server, |_| {}).await;
    info!("CONNECTION: {} closed", handle);

    on_disconnected(server.peripheral, handle, peer);
}

/// Execute advertising commands forever.
///
/// Each accepted connection is passed to `connected`; a newer command
/// cancels advertising that is still in progress.
pub async fn run_advertising<F>(sd: &'static Softdevice, mut connected: F) -> !
where
    F: FnMut(Connection),
{
    let mut command = ADVERTISING.wait().await;

    loop {
        let (interval, adv_data, scan_data) = match command {
            AdvertisingCommand::Stop => {
                debug!("ADV: Stopped");
                command = ADVERTISING.wait().await;
                continue;
            }
            AdvertisingCommand::Start {
                interval,
                adv_data,
                scan_data,
            } => (interval, adv_data, scan_data),
        };

        let config = peripheral::Config {
            interval,
            ..Default::default()
        };
        let adv = ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &scan_data,
        };

        let outcome = select(peripheral::advertise_connectable(sd, adv, &config), ADVERTISING.wait()).await;

        command = match outcome {
            Either::First(Ok(conn)) => {
                connected(conn);
                ADVERTISING.wait().await
            }
            Either::First(Err(e)) => {
                let e = match e {
                    AdvertiseError::Timeout => StackError::Busy,
                    AdvertiseError::NoFreeConn => StackError::Busy,
                    AdvertiseError::Raw(raw) => StackError::Raw(raw as u32),
                };
                error!("ADV: Advertising failed: {:?}", e);
                ADVERTISING.wait().await
            }
            Either::Second(next) => next,
        };
    }
}
