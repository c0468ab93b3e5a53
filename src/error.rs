//! Unified error type for the peripheral.
//!
//! No `alloc`: every variant carries only fixed-size data, so the whole
//! enum stays `Copy` and can be logged with `defmt` on target.

use crate::ble::advertising::AdvertisingError;
use crate::ble::connection::ConnectionError;
use crate::ble::notifications::BroadcastError;
use crate::ble::services::RegistrationError;
use crate::ble::stack::StackError;

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The radio stack reported an error.
    Stack(StackError),

    /// Service registration failed. Fatal at startup.
    Registration(RegistrationError),

    /// Advertising payload could not be built or submitted.
    Advertising(AdvertisingError),

    /// Connection registry and radio stack disagree.
    Connection(ConnectionError),

    /// Outbound payload was refused.
    Broadcast(BroadcastError),

    /// The peripheral has been stopped.
    Stopped,
}

// Convenience conversions

impl From<StackError> for Error {
    fn from(e: StackError) -> Self {
        Error::Stack(e)
    }
}

impl From<RegistrationError> for Error {
    fn from(e: RegistrationError) -> Self {
        Error::Registration(e)
    }
}

impl From<AdvertisingError> for Error {
    fn from(e: AdvertisingError) -> Self {
        Error::Advertising(e)
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}

impl From<BroadcastError> for Error {
    fn from(e: BroadcastError) -> Self {
        Error::Broadcast(e)
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;
