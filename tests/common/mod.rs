//! Common test utilities for the host integration tests
//!
//! - [`FakeStack`]: a [`RadioStack`] that records every call and can be told
//!   to fail registration or notifications
//! - [`Recorder`]: a [`GattHandler`] that keeps every write it sees
//! - raw event payload builders matching the stack's callback layout

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use imu_ble_peripheral::ble::connection::ConnectionHandle;
use imu_ble_peripheral::ble::dispatcher::{GattHandler, ReadResponse};
use imu_ble_peripheral::ble::services::{
    Characteristic, CharacteristicHandle, RegisteredHandles, ServiceDescriptor,
};
use imu_ble_peripheral::ble::stack::{RadioStack, StackError};

/// First value handle the fake stack hands out
pub const FIRST_HANDLE: u16 = 0x0010;

/// How registration should go wrong, if at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Registration {
    #[default]
    Normal,
    /// The stack refuses the request
    Rejected,
    /// The stack returns one characteristic handle too few
    Short,
}

#[derive(Debug, Default)]
pub struct FakeStack {
    pub active: bool,
    pub registration: Registration,
    pub registered_services: usize,
    /// Stored attribute values, by handle
    pub attributes: HashMap<u16, Vec<u8>>,
    /// Connections whose notifications fail
    pub failing: Vec<u16>,
    /// Every accepted notification: (connection, characteristic, payload)
    pub notifies: RefCell<Vec<(u16, u16, Vec<u8>)>>,
    /// Every advertising request: (interval, adv data, scan data)
    pub advertised: Vec<(u32, Vec<u8>, Vec<u8>)>,
}

impl FakeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registration(registration: Registration) -> Self {
        Self {
            registration,
            ..Self::default()
        }
    }

    /// Notifications delivered to one connection
    pub fn notifies_to(&self, conn: u16) -> Vec<Vec<u8>> {
        self.notifies
            .borrow()
            .iter()
            .filter(|(c, _, _)| *c == conn)
            .map(|(_, _, payload)| payload.clone())
            .collect()
    }

    pub fn notify_count(&self) -> usize {
        self.notifies.borrow().len()
    }
}

impl RadioStack for FakeStack {
    fn activate(&mut self, enable: bool) -> Result<(), StackError> {
        self.active = enable;
        Ok(())
    }

    fn register_services(&mut self, services: &[ServiceDescriptor]) -> Result<RegisteredHandles, StackError> {
        if self.registration == Registration::Rejected {
            return Err(StackError::Raw(0x0007));
        }

        // Service declaration, then declaration + value (+ CCCD) per characteristic
        let mut next = FIRST_HANDLE;
        let mut registered = RegisteredHandles::new();
        for service in services {
            next += 1;
            let mut handles = heapless::Vec::new();
            for _ in service.characteristics {
                handles.push(CharacteristicHandle(next + 1)).unwrap();
                next += 3;
            }
            registered.push(handles).unwrap();
        }

        if self.registration == Registration::Short {
            registered.last_mut().unwrap().pop();
        }

        self.registered_services = services.len();
        Ok(registered)
    }

    fn read_attribute(&self, handle: CharacteristicHandle, buf: &mut [u8]) -> Result<usize, StackError> {
        let value = self.attributes.get(&handle.0).ok_or(StackError::InvalidHandle)?;
        if value.len() > buf.len() {
            return Err(StackError::InvalidLength);
        }
        buf[..value.len()].copy_from_slice(value);
        Ok(value.len())
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
        if self.failing.contains(&conn.0) {
            return Err(StackError::Disconnected);
        }
        self.notifies
            .borrow_mut()
            .push((conn.0, characteristic.0, payload.to_vec()));
        Ok(())
    }

    fn advertise(&mut self, interval_us: u32, adv_data: &[u8], scan_data: &[u8]) -> Result<(), StackError> {
        self.advertised
            .push((interval_us, adv_data.to_vec(), scan_data.to_vec()));
        Ok(())
    }
}

/// Handler that keeps every write: (connection, characteristic, value)
#[derive(Debug, Default)]
pub struct Recorder {
    pub writes: Vec<(u16, Option<Characteristic>, Vec<u8>)>,
    pub reads: usize,
}

impl GattHandler for Recorder {
    fn on_write(
        &mut self,
        conn: ConnectionHandle,
        _attr: CharacteristicHandle,
        characteristic: Option<Characteristic>,
        value: &[u8],
    ) {
        self.writes.push((conn.0, characteristic, value.to_vec()));
    }

    fn on_read(
        &mut self,
        _conn: ConnectionHandle,
        _attr: CharacteristicHandle,
        _characteristic: Option<Characteristic>,
    ) -> ReadResponse {
        self.reads += 1;
        ReadResponse::Accept
    }
}

/// Central connect / disconnect payload: conn, public address
pub fn connection_payload(conn: u16) -> [u8; 9] {
    let [lo, hi] = conn.to_le_bytes();
    [lo, hi, 0x00, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6]
}

/// GATTS write / read request payload: conn, attribute
pub fn attribute_payload(conn: u16, attr: u16) -> [u8; 4] {
    let [c_lo, c_hi] = conn.to_le_bytes();
    let [a_lo, a_hi] = attr.to_le_bytes();
    [c_lo, c_hi, a_lo, a_hi]
}
