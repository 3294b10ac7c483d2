//! # Evacuation Relay Port
//!
//! Boundary to the cross-chain message layer used when no local venue is safe
//! enough. The engine quotes and prepays a fee in a separate settlement asset,
//! hands funds over, and keeps only the relay's tracking id; confirmation and
//! retry are the relay's problem.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, VaultResult};
use crate::types::Address;

/// Relay-assigned identifier for one dispatched evacuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingId(pub u64);

impl std::fmt::Display for TrackingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interface to the cross-chain evacuation relay
pub trait EvacuationRelay {
    /// Quote the dispatch fee in settlement-asset units
    fn quote_fee(&self, dest_id: u64, amount: u64) -> VaultResult<u64>;

    /// Hand `amount` to the relay for delivery to the remote receiver/haven
    /// pair, paying exactly the quoted fee
    fn dispatch(
        &mut self,
        dest_id: u64,
        receiver: Address,
        safe_haven: Address,
        amount: u64,
        fee: u64,
    ) -> VaultResult<TrackingId>;
}

// ============================================================================
// Simulated Relay
// ============================================================================

/// One handed-off evacuation as the simulator saw it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub dest_id: u64,
    pub receiver: Address,
    pub safe_haven: Address,
    pub amount: u64,
    pub fee: u64,
    pub tracking_id: TrackingId,
}

#[derive(Debug, Default)]
struct SimRelayState {
    base_fee: u64,
    next_id: u64,
    fail: bool,
    dispatched: Vec<DispatchRecord>,
}

/// In-memory relay used by rehearsals and tests. Clones share state, same as
/// [`crate::venue::SimVenue`].
#[derive(Debug, Clone)]
pub struct SimRelay {
    state: Arc<Mutex<SimRelayState>>,
}

impl SimRelay {
    pub fn new(base_fee: u64) -> Self {
        SimRelay {
            state: Arc::new(Mutex::new(SimRelayState {
                base_fee,
                next_id: 1,
                fail: false,
                dispatched: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimRelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    pub fn dispatched(&self) -> Vec<DispatchRecord> {
        self.lock().dispatched.clone()
    }
}

impl EvacuationRelay for SimRelay {
    fn quote_fee(&self, _dest_id: u64, _amount: u64) -> VaultResult<u64> {
        let state = self.lock();
        if state.fail {
            return Err(VaultError::relay_failure("quote fault injected"));
        }
        Ok(state.base_fee)
    }

    fn dispatch(
        &mut self,
        dest_id: u64,
        receiver: Address,
        safe_haven: Address,
        amount: u64,
        fee: u64,
    ) -> VaultResult<TrackingId> {
        let mut state = self.lock();
        if state.fail {
            return Err(VaultError::relay_failure("dispatch fault injected"));
        }
        if fee < state.base_fee {
            return Err(VaultError::relay_failure("fee below quote"));
        }
        let tracking_id = TrackingId(state.next_id);
        state.next_id += 1;
        state.dispatched.push(DispatchRecord {
            dest_id,
            receiver,
            safe_haven,
            amount,
            fee,
            tracking_id,
        });
        Ok(tracking_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_relay_tracks_dispatches() {
        let relay = SimRelay::new(25);
        let mut port = relay.clone();

        let fee = port.quote_fee(7, 1_000).unwrap();
        assert_eq!(fee, 25);

        let receiver = Address::from_label("remote-receiver");
        let haven = Address::from_label("remote-haven");
        let first = port.dispatch(7, receiver, haven, 1_000, fee).unwrap();
        let second = port.dispatch(7, receiver, haven, 500, fee).unwrap();
        assert_ne!(first, second);

        let records = relay.dispatched();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].amount, 1_000);
        assert_eq!(records[0].tracking_id, first);
    }

    #[test]
    fn test_sim_relay_rejects_underpaid_fee() {
        let relay = SimRelay::new(25);
        let mut port = relay.clone();
        let receiver = Address::from_label("remote-receiver");
        let haven = Address::from_label("remote-haven");
        assert!(port.dispatch(7, receiver, haven, 1_000, 10).is_err());
    }

    #[test]
    fn test_sim_relay_fault_injection() {
        let relay = SimRelay::new(0);
        relay.set_fail(true);
        assert!(relay.quote_fee(1, 1).is_err());
    }
}
