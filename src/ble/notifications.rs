//! Notification Broadcaster
//!
//! Fans one payload out to every connected central. Delivery is best
//! effort: a central that cannot be notified is skipped, the rest still get
//! the payload, and nothing is queued for a later retry.

use crate::ble::connection::ConnectionRegistry;
use crate::ble::services::CharacteristicHandle;
use crate::ble::stack::RadioStack;
use crate::config::MAX_VALUE_LEN;

/// Broadcast errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BroadcastError {
    /// Payload exceeds `MAX_VALUE_LEN`; no central was notified
    PayloadTooLarge,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BroadcastReport {
    /// Centrals the stack accepted the notification for
    pub delivered: usize,
    /// Centrals skipped because the stack refused the notification
    pub failed: usize,
}

impl BroadcastReport {
    /// Total notify attempts
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Notify `payload` on `characteristic` to every registered central.
///
/// Iterates over a snapshot of the registry taken before the first notify,
/// so a disconnect the stack surfaces mid-broadcast cannot disturb the
/// iteration. An empty registry is a no-op.
pub fn broadcast<S: RadioStack>(
    stack: &S,
    registry: &ConnectionRegistry,
    characteristic: CharacteristicHandle,
    payload: &[u8],
) -> Result<BroadcastReport, BroadcastError> {
    if payload.len() > MAX_VALUE_LEN {
        warn!(
            "BROADCAST: Payload of {} bytes exceeds {} - dropped",
            payload.len(),
            MAX_VALUE_LEN
        );
        return Err(BroadcastError::PayloadTooLarge);
    }

    let mut report = BroadcastReport::default();

    registry.for_each(|conn| match stack.notify(conn, characteristic, payload) {
        Ok(()) => report.delivered += 1,
        Err(e) => {
            warn!("BROADCAST: Notify to {} failed: {:?} - skipped", conn.0, e);
            report.failed += 1;
        }
    });

    trace!(
        "BROADCAST: {} bytes on {}: {} of {} delivered",
        payload.len(),
        characteristic.0,
        report.delivered,
        report.attempted()
    );

    Ok(report)
}
