//! GATT Service Descriptor Table
//!
//! Static declaration of the services registered at startup and the named
//! handle record built from the stack's registration result.
//!
//! The stack returns value handles positionally, one inner list per service
//! in table order. [`ServiceHandles::from_registration`] is the only place
//! that interprets those positions; everything after startup refers to
//! handles by name.

use core::ops::BitOr;

use heapless::Vec;

use crate::ble::uuid::BleUuid;

/// Maximum number of services in a registration request
pub const MAX_SERVICES: usize = 2;

/// Maximum number of characteristics per service
pub const MAX_CHARACTERISTICS: usize = 2;

/// Heart Rate service (SIG assigned)
pub const HEART_RATE_SERVICE_UUID: BleUuid = BleUuid::from_u16(0x180D);

/// Heart Rate Measurement characteristic (SIG assigned)
pub const HEART_RATE_MEASUREMENT_UUID: BleUuid = BleUuid::from_u16(0x2A37);

/// UART-like custom service
pub const UART_SERVICE_UUID: BleUuid = BleUuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);

/// Peripheral-to-central data (read | notify)
pub const UART_TX_UUID: BleUuid = BleUuid::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E);

/// Central-to-peripheral data (write)
pub const UART_RX_UUID: BleUuid = BleUuid::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic properties (matches BLE specification)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicFlags(u8);

impl CharacteristicFlags {
    pub const BROADCAST: Self = Self(0x01);
    pub const READ: Self = Self(0x02);
    pub const WRITE_WITHOUT_RESPONSE: Self = Self(0x04);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);
    pub const INDICATE: Self = Self(0x20);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CharacteristicFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// One characteristic of a service declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicDescriptor {
    pub uuid: BleUuid,
    pub flags: CharacteristicFlags,
}

/// A primary service and its characteristics, in registration order
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    pub uuid: BleUuid,
    pub characteristics: &'static [CharacteristicDescriptor],
}

/// Attribute value handle assigned by the GATT stack at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicHandle(pub u16);

/// Positional registration result: one inner list per service, one handle
/// per characteristic, both in table order.
pub type RegisteredHandles = Vec<Vec<CharacteristicHandle, MAX_CHARACTERISTICS>, MAX_SERVICES>;

static HEART_RATE_CHARACTERISTICS: [CharacteristicDescriptor; 1] = [CharacteristicDescriptor {
    uuid: HEART_RATE_MEASUREMENT_UUID,
    flags: CharacteristicFlags::READ.union(CharacteristicFlags::NOTIFY),
}];

static UART_CHARACTERISTICS: [CharacteristicDescriptor; 2] = [
    CharacteristicDescriptor {
        uuid: UART_TX_UUID,
        flags: CharacteristicFlags::READ.union(CharacteristicFlags::NOTIFY),
    },
    CharacteristicDescriptor {
        uuid: UART_RX_UUID,
        flags: CharacteristicFlags::WRITE,
    },
];

/// Every service this peripheral registers, in registration order
pub static SERVICES: [ServiceDescriptor; MAX_SERVICES] = [
    ServiceDescriptor {
        uuid: HEART_RATE_SERVICE_UUID,
        characteristics: &HEART_RATE_CHARACTERISTICS,
    },
    ServiceDescriptor {
        uuid: UART_SERVICE_UUID,
        characteristics: &UART_CHARACTERISTICS,
    },
];

/// The characteristics this peripheral declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Characteristic {
    HeartRateMeasurement,
    UartTx,
    UartRx,
}

/// Registration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationError {
    /// The stack returned a different number of services or characteristics
    /// than the descriptor table declares
    ShapeMismatch,
    /// The stack rejected the registration request
    Rejected,
}

/// Value handles of every declared characteristic, by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceHandles {
    pub heart_rate_measurement: CharacteristicHandle,
    pub uart_tx: CharacteristicHandle,
    pub uart_rx: CharacteristicHandle,
}

impl ServiceHandles {
    /// Interpret a registration result for [`SERVICES`].
    ///
    /// The result must have exactly the table's nesting; anything else means
    /// the stack and the table disagree and no handle can be trusted.
    pub fn from_registration(registered: &RegisteredHandles) -> Result<Self, RegistrationError> {
        let shape_matches = registered.len() == SERVICES.len()
            && registered
                .iter()
                .zip(SERVICES.iter())
                .all(|(handles, service)| handles.len() == service.characteristics.len());

        if !shape_matches {
            return Err(RegistrationError::ShapeMismatch);
        }

        let heart_rate = &registered[0];
        let uart = &registered[1];

        Ok(Self {
            heart_rate_measurement: heart_rate[0],
            uart_tx: uart[0],
            uart_rx: uart[1],
        })
    }

    /// Value handle of a declared characteristic
    pub fn handle(&self, characteristic: Characteristic) -> CharacteristicHandle {
        match characteristic {
            Characteristic::HeartRateMeasurement => self.heart_rate_measurement,
            Characteristic::UartTx => self.uart_tx,
            Characteristic::UartRx => self.uart_rx,
        }
    }

    /// Resolve an attribute handle from a GATT event back to its role
    pub fn characteristic(&self, handle: CharacteristicHandle) -> Option<Characteristic> {
        [
            Characteristic::HeartRateMeasurement,
            Characteristic::UartTx,
            Characteristic::UartRx,
        ]
        .into_iter()
        .find(|c| self.handle(*c) == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(shape: &[&[u16]]) -> RegisteredHandles {
        let mut registered = RegisteredHandles::new();
        for service in shape {
            let mut handles = Vec::new();
            for &h in service.iter() {
                handles.push(CharacteristicHandle(h)).unwrap();
            }
            registered.push(handles).unwrap();
        }
        registered
    }

    #[test]
    fn table_declares_heart_rate_then_uart() {
        assert_eq!(SERVICES[0].uuid, HEART_RATE_SERVICE_UUID);
        assert_eq!(SERVICES[0].characteristics.len(), 1);
        assert_eq!(SERVICES[1].uuid, UART_SERVICE_UUID);
        assert_eq!(SERVICES[1].characteristics[0].uuid, UART_TX_UUID);
        assert_eq!(SERVICES[1].characteristics[1].uuid, UART_RX_UUID);
    }

    #[test]
    fn table_access_flags() {
        let hr = SERVICES[0].characteristics[0].flags;
        let tx = SERVICES[1].characteristics[0].flags;
        let rx = SERVICES[1].characteristics[1].flags;

        assert!(hr.contains(CharacteristicFlags::READ | CharacteristicFlags::NOTIFY));
        assert!(tx.contains(CharacteristicFlags::READ | CharacteristicFlags::NOTIFY));
        assert_eq!(rx, CharacteristicFlags::WRITE);
        assert!(!rx.contains(CharacteristicFlags::NOTIFY));
        assert_eq!(tx, CharacteristicFlags::READ | CharacteristicFlags::NOTIFY);
    }

    #[test]
    fn registration_maps_positions_to_names() {
        let handles = ServiceHandles::from_registration(&registration(&[&[11], &[14, 16]])).unwrap();

        assert_eq!(handles.heart_rate_measurement, CharacteristicHandle(11));
        assert_eq!(handles.uart_tx, CharacteristicHandle(14));
        assert_eq!(handles.uart_rx, CharacteristicHandle(16));
        assert_eq!(handles.handle(Characteristic::UartTx), CharacteristicHandle(14));
    }

    #[test]
    fn registration_rejects_wrong_shape() {
        for shape in [
            &[][..],
            &[&[11u16][..]][..],
            &[&[11u16][..], &[14u16][..]][..],
            &[&[11u16, 12][..], &[14u16][..]][..],
        ] {
            assert_eq!(
                ServiceHandles::from_registration(&registration(shape)),
                Err(RegistrationError::ShapeMismatch)
            );
        }
    }

    #[test]
    fn attribute_handle_resolves_to_role() {
        let handles = ServiceHandles::from_registration(&registration(&[&[11], &[14, 16]])).unwrap();

        assert_eq!(
            handles.characteristic(CharacteristicHandle(11)),
            Some(Characteristic::HeartRateMeasurement)
        );
        assert_eq!(handles.characteristic(CharacteristicHandle(16)), Some(Characteristic::UartRx));
        assert_eq!(handles.characteristic(CharacteristicHandle(12)), None);
    }
}
