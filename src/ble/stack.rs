//! Radio Stack Boundary
//!
//! Everything the peripheral needs from the underlying BLE stack. The
//! SoftDevice binding implements this on target; tests implement it with
//! recording fakes.
//!
//! Events flow the other way: whatever owns the stack's event source calls
//! [`Peripheral::handle_event`](crate::ble::peripheral::Peripheral::handle_event)
//! once per event, serially.

use crate::ble::connection::ConnectionHandle;
use crate::ble::services::{CharacteristicHandle, RegisteredHandles, ServiceDescriptor};

/// Errors reported by the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackError {
    /// The stack is not enabled
    NotActive,
    /// The connection handle does not refer to an open connection
    Disconnected,
    /// The attribute handle is unknown to the stack
    InvalidHandle,
    /// Notifications are not enabled by the peer or its TX queue is full
    Busy,
    /// Data does not fit the attribute or the advertising PDU
    InvalidLength,
    /// The operation is not supported by this stack
    Unsupported,
    /// Raw error code from the stack
    Raw(u32),
}

/// Operations consumed from the BLE stack
pub trait RadioStack {
    /// Enable or disable the radio
    fn activate(&mut self, enable: bool) -> Result<(), StackError>;

    /// Register all services in one call.
    ///
    /// Returns the value handle of every characteristic, nested and ordered
    /// exactly like `services`.
    fn register_services(&mut self, services: &[ServiceDescriptor]) -> Result<RegisteredHandles, StackError>;

    /// Copy the stored value of an attribute into `buf`, returning its length
    fn read_attribute(&self, handle: CharacteristicHandle, buf: &mut [u8]) -> Result<usize, StackError>;

    /// Send a notification of `payload` on `characteristic` to one central
    fn notify(
        &self,
        conn: ConnectionHandle,
        characteristic: CharacteristicHandle,
        payload: &[u8],
    ) -> Result<(), StackError>;

    /// Start connectable advertising with the given payloads
    fn advertise(&mut self, interval_us: u32, adv_data: &[u8], scan_data: &[u8]) -> Result<(), StackError>;
}
