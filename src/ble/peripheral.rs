//! Peripheral Service
//!
//! Owns everything the peripheral keeps between events: the radio stack,
//! the connection registry, the registered characteristic handles, the
//! advertising payloads and the application's GATT handler. Its lifetime is
//! the service's lifetime; nothing lives in process-wide statics.
//!
//! The stack's event source calls [`Peripheral::handle_event`] (or
//! [`Peripheral::handle_raw`]) for each event, and upstream producers call
//! [`Peripheral::broadcast`]. All calls take `&self`/`&mut self`, which is
//! the only serialization the single-threaded event model needs.

use crate::ble::advertising::Advertiser;
use crate::ble::connection::ConnectionRegistry;
use crate::ble::dispatcher::{Dispatcher, GattHandler, ReadResponse};
use crate::ble::events::BleEvent;
use crate::ble::notifications::{self, BroadcastReport};
use crate::ble::services::{Characteristic, RegistrationError, ServiceHandles, SERVICES};
use crate::ble::stack::RadioStack;
use crate::error::{Error, Result};

/// A started BLE peripheral
pub struct Peripheral<S, H> {
    stack: S,
    handler: H,
    registry: ConnectionRegistry,
    handles: ServiceHandles,
    advertiser: Advertiser,
    running: bool,
}

impl<S, H> Peripheral<S, H>
where
    S: RadioStack,
    H: GattHandler,
{
    /// Bring the peripheral up: activate the radio, register the services,
    /// build the advertising payloads and start advertising.
    ///
    /// Any failure is fatal; GATT tables cannot be changed once the stack is
    /// serving them, so there is nothing to retry.
    pub fn start(mut stack: S, handler: H) -> Result<Self> {
        info!("PERIPHERAL: Activating radio");
        stack.activate(true)?;

        let registered = stack.register_services(&SERVICES).map_err(|e| {
            error!("PERIPHERAL: Service registration rejected: {:?}", e);
            RegistrationError::Rejected
        })?;

        let handles = ServiceHandles::from_registration(&registered)
            .inspect_err(|_| error!("PERIPHERAL: Registration result does not match service table"))?;
        info!(
            "PERIPHERAL: Registered HR={} TX={} RX={}",
            handles.heart_rate_measurement.0,
            handles.uart_tx.0,
            handles.uart_rx.0
        );

        let advertiser = Advertiser::new()?;
        advertiser.start(&mut stack)?;

        Ok(Self {
            stack,
            handler,
            registry: ConnectionRegistry::new(),
            handles,
            advertiser,
            running: true,
        })
    }

    /// Handle one event from the radio stack.
    ///
    /// The returned [`ReadResponse`] answers read requests; callers can
    /// ignore it for every other event.
    pub fn handle_event(&mut self, event: BleEvent) -> ReadResponse {
        if !self.is_running() {
            debug!("PERIPHERAL: Stopped, dropping {:?}", event.kind());
            return ReadResponse::Accept;
        }

        Dispatcher {
            registry: &mut self.registry,
            handles: &self.handles,
            stack: &self.stack,
            handler: &mut self.handler,
        }
        .dispatch(event)
    }

    /// Decode and handle the stack's raw `(kind, data)` callback arguments.
    /// Malformed payloads are logged and ignored.
    pub fn handle_raw(&mut self, kind: u32, data: &[u8]) -> ReadResponse {
        match BleEvent::decode(kind, data) {
            Some(event) => self.handle_event(event),
            None => {
                warn!("PERIPHERAL: Malformed event kind {} ({} bytes)", kind, data.len());
                ReadResponse::Accept
            }
        }
    }

    /// Notify `payload` on the UART TX characteristic to every connected central
    pub fn broadcast(&self, payload: &[u8]) -> Result<BroadcastReport> {
        self.broadcast_to(Characteristic::UartTx, payload)
    }

    /// Notify `payload` on any declared characteristic to every connected central
    pub fn broadcast_to(&self, characteristic: Characteristic, payload: &[u8]) -> Result<BroadcastReport> {
        if !self.is_running() {
            return Err(Error::Stopped);
        }

        let handle = self.handles.handle(characteristic);
        Ok(notifications::broadcast(&self.stack, &self.registry, handle, payload)?)
    }

    /// Submit the advertising payloads again (e.g. after a central dropped)
    pub fn advertise(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(Error::Stopped);
        }

        self.advertiser.start(&mut self.stack)?;
        Ok(())
    }

    /// Forget every connection and switch the radio off.
    ///
    /// Events and broadcasts after this are refused.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        info!("PERIPHERAL: Stopping with {} connected", self.registry.len());
        self.running = false;
        self.registry.clear();
        self.stack.activate(false)?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn handles(&self) -> &ServiceHandles {
        &self.handles
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}
