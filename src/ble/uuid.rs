//! BLE UUIDs
//!
//! 16-bit SIG-assigned UUIDs and full 128-bit UUIDs. 128-bit values are
//! kept in over-the-air (little-endian) byte order, which is what the
//! SoftDevice expects.

/// Bluetooth base UUID `00000000-0000-1000-8000-00805F9B34FB`.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// BLE UUID representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleUuid {
    Uuid16(u16),
    Uuid128([u8; 16]),
}

impl BleUuid {
    /// 16-bit UUID relative to the Bluetooth base UUID.
    pub const fn from_u16(uuid: u16) -> Self {
        BleUuid::Uuid16(uuid)
    }

    /// 128-bit UUID written the way it reads in text form, e.g.
    /// `0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E`.
    pub const fn from_u128(uuid: u128) -> Self {
        BleUuid::Uuid128(uuid.to_le_bytes())
    }

    /// Full 128-bit value in over-the-air byte order.
    pub const fn to_le_bytes(&self) -> [u8; 16] {
        match self {
            BleUuid::Uuid16(uuid) => (BASE_UUID | ((*uuid as u128) << 96)).to_le_bytes(),
            BleUuid::Uuid128(bytes) => *bytes,
        }
    }
}
