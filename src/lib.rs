#![cfg_attr(not(test), no_std)]

//! IMU BLE Peripheral Library
//!
//! A minimal BLE peripheral that exposes a Heart Rate service and a
//! UART-style service, tracks connected centrals and broadcasts
//! notifications to all of them.
//!
//! - `ble`: service table, connection registry, event dispatch,
//!   notifications and advertising, all behind a radio stack trait
//! - `config`: compile-time constants (advertising payload, limits)
//! - `softdevice`: the nRF S140 SoftDevice binding (feature `embedded`)

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod error;

#[cfg(feature = "embedded")]
pub mod softdevice;

pub use ble::peripheral::Peripheral;
pub use error::{Error, Result};
