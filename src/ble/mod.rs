//! BLE Peripheral Implementation
//!
//! Everything between the radio stack and the application: the fixed GATT
//! service table, the connection registry, event dispatch, notification
//! fan-out and advertising. The [`peripheral::Peripheral`] service ties the
//! pieces together behind the [`stack::RadioStack`] boundary.

pub mod advertising;
pub mod connection;
pub mod dispatcher;
pub mod events;
pub mod notifications;
pub mod peripheral;
pub mod services;
pub mod stack;
pub mod uuid;
