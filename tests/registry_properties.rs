//! Property tests for the connection registry and broadcast fan-out

mod common;

use std::collections::BTreeSet;

use common::*;
use imu_ble_peripheral::ble::connection::{ConnectionError, ConnectionHandle, ConnectionRegistry};
use imu_ble_peripheral::ble::events::kind;
use imu_ble_peripheral::config::MAX_CONNECTIONS;
use imu_ble_peripheral::Peripheral;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Connect(u16),
    Disconnect(u16),
}

fn op() -> impl Strategy<Value = Op> {
    // Few distinct handles so duplicates and unknown removals are common
    prop_oneof![(0u16..8).prop_map(Op::Connect), (0u16..8).prop_map(Op::Disconnect)]
}

proptest! {
    #[test]
    fn registry_matches_a_set_model(ops in prop::collection::vec(op(), 0..64)) {
        let mut registry = ConnectionRegistry::new();
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                Op::Connect(h) => {
                    let expected = if model.contains(&h) {
                        Err(ConnectionError::AlreadyConnected)
                    } else if model.len() == MAX_CONNECTIONS {
                        Err(ConnectionError::RegistryFull)
                    } else {
                        model.insert(h);
                        Ok(())
                    };
                    prop_assert_eq!(registry.add(ConnectionHandle(h)), expected);
                }
                Op::Disconnect(h) => {
                    let expected = if model.remove(&h) {
                        Ok(())
                    } else {
                        Err(ConnectionError::NotConnected)
                    };
                    prop_assert_eq!(registry.remove(ConnectionHandle(h)), expected);
                }
            }

            prop_assert_eq!(registry.len(), model.len());
            let snapshot: BTreeSet<u16> = registry.snapshot().iter().map(|h| h.0).collect();
            prop_assert_eq!(&snapshot, &model);
        }
    }

    #[test]
    fn broadcast_notifies_each_connected_central_once(
        ops in prop::collection::vec(op(), 0..48),
        payload in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let mut peripheral = Peripheral::start(FakeStack::new(), Recorder::default()).unwrap();

        for op in ops {
            match op {
                Op::Connect(h) => peripheral.handle_raw(kind::CENTRAL_CONNECT, &connection_payload(h)),
                Op::Disconnect(h) => peripheral.handle_raw(kind::CENTRAL_DISCONNECT, &connection_payload(h)),
            };
        }

        let connected: BTreeSet<u16> = peripheral.registry().snapshot().iter().map(|h| h.0).collect();
        let report = peripheral.broadcast(&payload).unwrap();

        prop_assert_eq!(report.delivered, connected.len());
        prop_assert_eq!(peripheral.stack().notify_count(), connected.len());
        for conn in connected {
            prop_assert_eq!(peripheral.stack().notifies_to(conn), vec![payload.clone()]);
        }
    }
}
