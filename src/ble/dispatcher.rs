//! Event Dispatcher
//!
//! Single entry point for every event the radio stack reports. Runs in the
//! stack's callback context: it never blocks, never retries and never
//! panics, whatever the event.
//!
//! - connect / disconnect update the [`ConnectionRegistry`]
//! - attribute writes are read back from the stack and handed to the
//!   application's [`GattHandler`] unchanged
//! - read requests are answered by the handler (default: let the stack
//!   return its stored value)
//! - everything else is logged and dropped

use crate::ble::connection::{ConnectionHandle, ConnectionRegistry};
use crate::ble::events::BleEvent;
use crate::ble::services::{Characteristic, CharacteristicHandle, ServiceHandles};
use crate::ble::stack::RadioStack;
use crate::config::MAX_VALUE_LEN;

/// Answer to an attribute read request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadResponse {
    /// Let the stack return the value it currently stores
    Accept,
    /// Refuse the read with an ATT error code
    Reject(u8),
}

/// Application-side handling of GATT server activity
pub trait GattHandler {
    /// A central wrote `value` to `attr`.
    ///
    /// `characteristic` is `None` when the handle is not one of ours (e.g. a
    /// CCCD or a stack-owned attribute).
    fn on_write(
        &mut self,
        conn: ConnectionHandle,
        attr: CharacteristicHandle,
        characteristic: Option<Characteristic>,
        value: &[u8],
    );

    /// A central wants to read `attr`
    fn on_read(
        &mut self,
        _conn: ConnectionHandle,
        _attr: CharacteristicHandle,
        _characteristic: Option<Characteristic>,
    ) -> ReadResponse {
        ReadResponse::Accept
    }
}

/// Handler that only logs what centrals write
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWrites;

impl GattHandler for LogWrites {
    fn on_write(
        &mut self,
        conn: ConnectionHandle,
        attr: CharacteristicHandle,
        characteristic: Option<Characteristic>,
        value: &[u8],
    ) {
        info!(
            "GATT: Write from {} on {} ({:?}): {:?}",
            conn.0, attr.0, characteristic, value
        );
    }
}

/// Borrowed view of the peripheral state an event may touch
pub struct Dispatcher<'a, S, H> {
    pub registry: &'a mut ConnectionRegistry,
    pub handles: &'a ServiceHandles,
    pub stack: &'a S,
    pub handler: &'a mut H,
}

impl<'a, S, H> Dispatcher<'a, S, H>
where
    S: RadioStack,
    H: GattHandler,
{
    /// Act on one event.
    ///
    /// The return value only matters for [`BleEvent::AttributeReadRequest`];
    /// every other event yields [`ReadResponse::Accept`].
    pub fn dispatch(&mut self, event: BleEvent) -> ReadResponse {
        match event {
            BleEvent::CentralConnect { conn, peer } => {
                info!("DISPATCH: Connected {} ({:?})", conn.0, peer.kind);
                // Registry already logged the violation; the stack keeps going
                let _ = self.registry.add(conn);
            }
            BleEvent::CentralDisconnect { conn, .. } => {
                info!("DISPATCH: Disconnected {}", conn.0);
                let _ = self.registry.remove(conn);
            }
            BleEvent::AttributeWrite { conn, attr } => self.forward_write(conn, attr),
            BleEvent::AttributeReadRequest { conn, attr } => {
                let characteristic = self.handles.characteristic(attr);
                let response = self.handler.on_read(conn, attr, characteristic);
                debug!("DISPATCH: Read request {} on {} -> {:?}", conn.0, attr.0, response);
                return response;
            }
            BleEvent::GattcReadResult { conn, attr } => {
                debug!("DISPATCH: Read result {} on {}", conn.0, attr.0);
            }
            BleEvent::GattcWriteStatus { conn, attr, status } => {
                debug!("DISPATCH: Write status {} on {}: {}", conn.0, attr.0, status);
            }
            BleEvent::Other(kind) => {
                trace!("DISPATCH: Ignoring {:?}", kind);
            }
        }

        ReadResponse::Accept
    }

    fn forward_write(&mut self, conn: ConnectionHandle, attr: CharacteristicHandle) {
        let mut buf = [0u8; MAX_VALUE_LEN];
        let len = match self.stack.read_attribute(attr, &mut buf) {
            Ok(len) => len.min(buf.len()),
            Err(e) => {
                warn!("DISPATCH: Cannot read back write on {}: {:?}", attr.0, e);
                return;
            }
        };

        let characteristic = self.handles.characteristic(attr);
        debug!("DISPATCH: Write {} on {} ({} bytes)", conn.0, attr.0, len);
        self.handler.on_write(conn, attr, characteristic, &buf[..len]);
    }
}
