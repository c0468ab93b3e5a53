//! BLE Events
//!
//! The closed set of events the radio stack delivers to the peripheral and
//! the decoder for the stack's raw `(kind, data)` callback form.
//!
//! Raw payload layouts (little-endian):
//!
//! | Kind | Payload |
//! |---|---|
//! | central connect / disconnect | `conn u16, addr_type u8, addr [u8; 6]` |
//! | GATTS write / read request | `conn u16, attr u16` |
//! | GATTC read result | `conn u16, value_handle u16, value...` |
//! | GATTC write status | `conn u16, value_handle u16, status u16` |
//!
//! Every other kind decodes to [`BleEvent::Other`] without looking at the
//! payload. A payload too short for its kind is malformed and dropped.

use crate::ble::connection::ConnectionHandle;
use crate::ble::services::CharacteristicHandle;

/// Event kind codes used by the radio stack's callback
pub mod kind {
    pub const CENTRAL_CONNECT: u32 = 1 << 0;
    pub const CENTRAL_DISCONNECT: u32 = 1 << 1;
    pub const GATTS_WRITE: u32 = 1 << 2;
    pub const GATTS_READ_REQUEST: u32 = 1 << 3;
    pub const SCAN_RESULT: u32 = 1 << 4;
    pub const SCAN_COMPLETE: u32 = 1 << 5;
    pub const PERIPHERAL_CONNECT: u32 = 1 << 6;
    pub const PERIPHERAL_DISCONNECT: u32 = 1 << 7;
    pub const GATTC_SERVICE_RESULT: u32 = 1 << 8;
    pub const GATTC_CHARACTERISTIC_RESULT: u32 = 1 << 9;
    pub const GATTC_DESCRIPTOR_RESULT: u32 = 1 << 10;
    pub const GATTC_READ_RESULT: u32 = 1 << 11;
    pub const GATTC_WRITE_STATUS: u32 = 1 << 12;
    pub const GATTC_NOTIFY: u32 = 1 << 13;
    pub const GATTC_INDICATE: u32 = 1 << 14;
}

/// Every event kind the stack can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    CentralConnect,
    CentralDisconnect,
    GattsWrite,
    GattsReadRequest,
    ScanResult,
    ScanComplete,
    PeripheralConnect,
    PeripheralDisconnect,
    GattcServiceResult,
    GattcCharacteristicResult,
    GattcDescriptorResult,
    GattcReadResult,
    GattcWriteStatus,
    GattcNotify,
    GattcIndicate,
    Unknown(u32),
}

impl From<u32> for EventKind {
    fn from(code: u32) -> Self {
        match code {
            kind::CENTRAL_CONNECT => EventKind::CentralConnect,
            kind::CENTRAL_DISCONNECT => EventKind::CentralDisconnect,
            kind::GATTS_WRITE => EventKind::GattsWrite,
            kind::GATTS_READ_REQUEST => EventKind::GattsReadRequest,
            kind::SCAN_RESULT => EventKind::ScanResult,
            kind::SCAN_COMPLETE => EventKind::ScanComplete,
            kind::PERIPHERAL_CONNECT => EventKind::PeripheralConnect,
            kind::PERIPHERAL_DISCONNECT => EventKind::PeripheralDisconnect,
            kind::GATTC_SERVICE_RESULT => EventKind::GattcServiceResult,
            kind::GATTC_CHARACTERISTIC_RESULT => EventKind::GattcCharacteristicResult,
            kind::GATTC_DESCRIPTOR_RESULT => EventKind::GattcDescriptorResult,
            kind::GATTC_READ_RESULT => EventKind::GattcReadResult,
            kind::GATTC_WRITE_STATUS => EventKind::GattcWriteStatus,
            kind::GATTC_NOTIFY => EventKind::GattcNotify,
            kind::GATTC_INDICATE => EventKind::GattcIndicate,
            other => EventKind::Unknown(other),
        }
    }
}

/// Peer address type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKind {
    Public,
    Random,
    Other(u8),
}

impl From<u8> for AddressKind {
    fn from(raw: u8) -> Self {
        match raw {
            0 => AddressKind::Public,
            1 => AddressKind::Random,
            other => AddressKind::Other(other),
        }
    }
}

/// Bluetooth device address of a central
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress {
    pub kind: AddressKind,
    /// Address bytes, least significant first
    pub bytes: [u8; 6],
}

/// An event from the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleEvent {
    CentralConnect {
        conn: ConnectionHandle,
        peer: PeerAddress,
    },
    CentralDisconnect {
        conn: ConnectionHandle,
        peer: PeerAddress,
    },
    /// A central wrote an attribute; the new value is already stored by the stack
    AttributeWrite {
        conn: ConnectionHandle,
        attr: CharacteristicHandle,
    },
    /// A central is reading an attribute that requires authorization
    AttributeReadRequest {
        conn: ConnectionHandle,
        attr: CharacteristicHandle,
    },
    GattcReadResult {
        conn: ConnectionHandle,
        attr: CharacteristicHandle,
    },
    GattcWriteStatus {
        conn: ConnectionHandle,
        attr: CharacteristicHandle,
        status: u16,
    },
    /// Any kind the peripheral does not act on
    Other(EventKind),
}

impl BleEvent {
    /// Decode the stack's raw callback arguments.
    ///
    /// Returns `None` for a malformed payload; never panics.
    pub fn decode(code: u32, data: &[u8]) -> Option<Self> {
        let kind = EventKind::from(code);

        let event = match kind {
            EventKind::CentralConnect => {
                let (conn, peer) = connection_fields(data)?;
                BleEvent::CentralConnect { conn, peer }
            }
            EventKind::CentralDisconnect => {
                let (conn, peer) = connection_fields(data)?;
                BleEvent::CentralDisconnect { conn, peer }
            }
            EventKind::GattsWrite => {
                let (conn, attr) = attribute_fields(data)?;
                BleEvent::AttributeWrite { conn, attr }
            }
            EventKind::GattsReadRequest => {
                let (conn, attr) = attribute_fields(data)?;
                BleEvent::AttributeReadRequest { conn, attr }
            }
            EventKind::GattcReadResult => {
                let (conn, attr) = attribute_fields(data)?;
                BleEvent::GattcReadResult { conn, attr }
            }
            EventKind::GattcWriteStatus => {
                let (conn, attr) = attribute_fields(data)?;
                let status = read_u16(data, 4)?;
                BleEvent::GattcWriteStatus { conn, attr, status }
            }
            other => BleEvent::Other(other),
        };

        Some(event)
    }

    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            BleEvent::CentralConnect { .. } => EventKind::CentralConnect,
            BleEvent::CentralDisconnect { .. } => EventKind::CentralDisconnect,
            BleEvent::AttributeWrite { .. } => EventKind::GattsWrite,
            BleEvent::AttributeReadRequest { .. } => EventKind::GattsReadRequest,
            BleEvent::GattcReadResult { .. } => EventKind::GattcReadResult,
            BleEvent::GattcWriteStatus { .. } => EventKind::GattcWriteStatus,
            BleEvent::Other(kind) => *kind,
        }
    }
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn connection_fields(data: &[u8]) -> Option<(ConnectionHandle, PeerAddress)> {
    let conn = ConnectionHandle(read_u16(data, 0)?);
    let addr_type = *data.get(2)?;
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(data.get(3..9)?);

    Some((
        conn,
        PeerAddress {
            kind: AddressKind::from(addr_type),
            bytes,
        },
    ))
}

fn attribute_fields(data: &[u8]) -> Option<(ConnectionHandle, CharacteristicHandle)> {
    Some((ConnectionHandle(read_u16(data, 0)?), CharacteristicHandle(read_u16(data, 2)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_central_connect() {
        let data = [0x01, 0x00, 0x01, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        let event = BleEvent::decode(kind::CENTRAL_CONNECT, &data).unwrap();

        assert_eq!(
            event,
            BleEvent::CentralConnect {
                conn: ConnectionHandle(1),
                peer: PeerAddress {
                    kind: AddressKind::Random,
                    bytes: [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
                },
            }
        );
        assert_eq!(event.kind(), EventKind::CentralConnect);
    }

    #[test]
    fn decode_gatts_write() {
        let event = BleEvent::decode(kind::GATTS_WRITE, &[0x02, 0x00, 0x10, 0x00]).unwrap();

        assert_eq!(
            event,
            BleEvent::AttributeWrite {
                conn: ConnectionHandle(2),
                attr: CharacteristicHandle(0x10),
            }
        );
    }

    #[test]
    fn decode_gattc_write_status() {
        let event = BleEvent::decode(kind::GATTC_WRITE_STATUS, &[0x01, 0x00, 0x20, 0x00, 0x05, 0x01]).unwrap();

        assert_eq!(
            event,
            BleEvent::GattcWriteStatus {
                conn: ConnectionHandle(1),
                attr: CharacteristicHandle(0x20),
                status: 0x0105,
            }
        );
    }

    #[test]
    fn truncated_payloads_are_malformed() {
        assert_eq!(BleEvent::decode(kind::CENTRAL_CONNECT, &[0x01, 0x00, 0x00]), None);
        assert_eq!(BleEvent::decode(kind::CENTRAL_DISCONNECT, &[]), None);
        assert_eq!(BleEvent::decode(kind::GATTS_WRITE, &[0x01, 0x00, 0x10]), None);
        assert_eq!(BleEvent::decode(kind::GATTC_WRITE_STATUS, &[0x01, 0x00, 0x20, 0x00]), None);
    }

    #[test]
    fn unhandled_kinds_decode_to_other() {
        assert_eq!(
            BleEvent::decode(kind::SCAN_RESULT, &[]),
            Some(BleEvent::Other(EventKind::ScanResult))
        );
        assert_eq!(
            BleEvent::decode(kind::GATTC_NOTIFY, &[0xFF; 3]),
            Some(BleEvent::Other(EventKind::GattcNotify))
        );
        assert_eq!(
            BleEvent::decode(0x8000_0000, &[]),
            Some(BleEvent::Other(EventKind::Unknown(0x8000_0000)))
        );
        assert_eq!(BleEvent::decode(0, &[]), Some(BleEvent::Other(EventKind::Unknown(0))));
    }

    #[test]
    fn every_defined_code_is_known() {
        for shift in 0..15 {
            assert_ne!(EventKind::from(1u32 << shift), EventKind::Unknown(1 << shift));
        }
        assert_eq!(EventKind::from(1u32 << 15), EventKind::Unknown(1 << 15));
    }
}
