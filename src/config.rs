//! Compile-time configuration
//!
//! Every tunable of the peripheral lives here; there is no runtime
//! configuration, no CLI and no persisted state.

// Advertising

/// Advertising interval handed to the radio stack, in microseconds.
///
/// The stack rounds this up to the smallest interval it supports
/// (20 ms for connectable legacy advertising).
pub const ADV_INTERVAL_US: u32 = 100;

/// AD flags: LE General Discoverable (0x02) with the simultaneous LE and
/// BR/EDR controller and host bits (0x08 | 0x10).
pub const ADV_FLAGS: u8 = 0x1A;

/// 16-bit service UUID carried in the advertising payload.
pub const ADV_SERVICE_UUID16: u16 = 0x1010;

/// Bluetooth SIG company identifier for the manufacturer-specific block.
pub const COMPANY_ID: u16 = 0x004C;

/// Manufacturer-specific data following the company identifier.
pub const MANUFACTURER_DATA: [u8; 8] = [0x10, 0x06, 0x13, 0x1A, 0x3A, 0xE1, 0x75, 0x0C];

/// Complete local name, sent in the scan response.
pub const DEVICE_NAME: &str = "NYUIMA IMU";

// Connections

/// Maximum number of simultaneously connected centrals.
pub const MAX_CONNECTIONS: usize = 4;

/// ATT MTU requested from the stack.
pub const ATT_MTU: u16 = 247;

/// Largest attribute value read back or notified (ATT MTU minus the 3-byte
/// notification header).
pub const MAX_VALUE_LEN: usize = ATT_MTU as usize - 3;
