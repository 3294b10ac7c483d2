//! # Venue Connector Port
//!
//! The engine talks to every yield venue through one polymorphic interface and
//! holds only the boxed handle; venue-specific mechanics live behind it. A
//! shared-state simulator backs rehearsals and tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{VaultError, VaultResult};
use crate::types::Address;

/// Interface every yield venue integration implements.
///
/// `withdraw` and `emergency_withdraw` return the amount actually moved, which
/// the engine trusts over its own bookkeeping: a venue may fulfill partially,
/// or return more than tracked when venue-side yield has accrued.
pub trait VenueConnector {
    /// Push funds into the venue; all-or-nothing
    fn deposit(&mut self, amount: u64) -> VaultResult<()>;

    /// Pull up to `amount` from the venue, returning the amount actually moved
    fn withdraw(&mut self, amount: u64) -> VaultResult<u64>;

    /// Pull the venue's entire true balance, returning the amount moved
    fn emergency_withdraw(&mut self) -> VaultResult<u64>;

    /// The venue's true balance, including venue-side yield
    fn balance(&self) -> VaultResult<u64>;

    /// Current advertised yield rate in basis points
    fn yield_rate_bps(&self) -> VaultResult<u32>;

    /// Liveness/health probe
    fn is_healthy(&self) -> bool;

    /// Grant the venue standing authorization to pull up to `limit` from the
    /// engine's idle balance. Venues without an allowance concept ignore it.
    fn approve(&mut self, _limit: u64) -> VaultResult<()> {
        Ok(())
    }
}

// ============================================================================
// Simulated Venue
// ============================================================================

#[derive(Debug, Default)]
struct SimVenueState {
    balance: u64,
    yield_rate_bps: u32,
    healthy: bool,
    approved_limit: u64,
    fail_deposits: bool,
    fail_withdrawals: bool,
}

/// In-memory venue used by rehearsals and tests.
///
/// Clones share one underlying state, so a harness can keep a handle while the
/// vault owns the boxed connector, and steer balances, yield, and injected
/// faults from outside.
#[derive(Debug, Clone)]
pub struct SimVenue {
    venue: Address,
    state: Arc<Mutex<SimVenueState>>,
}

impl SimVenue {
    pub fn new(label: &str, yield_rate_bps: u32) -> Self {
        SimVenue {
            venue: Address::from_label(label),
            state: Arc::new(Mutex::new(SimVenueState {
                balance: 0,
                yield_rate_bps,
                healthy: true,
                approved_limit: 0,
                fail_deposits: false,
                fail_withdrawals: false,
            })),
        }
    }

    pub fn address(&self) -> Address {
        self.venue
    }

    fn lock(&self) -> MutexGuard<'_, SimVenueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the venue's own yield rate to its balance once
    pub fn accrue(&self) -> u64 {
        let mut state = self.lock();
        let gain = ((state.balance as u128 * state.yield_rate_bps as u128) / 10_000) as u64;
        state.balance = state.balance.saturating_add(gain);
        gain
    }

    /// Mint venue-side yield directly, bypassing the rate
    pub fn credit_yield(&self, amount: u64) {
        let mut state = self.lock();
        state.balance = state.balance.saturating_add(amount);
    }

    pub fn sim_balance(&self) -> u64 {
        self.lock().balance
    }

    pub fn set_yield_rate(&self, bps: u32) {
        self.lock().yield_rate_bps = bps;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    pub fn set_fail_deposits(&self, fail: bool) {
        self.lock().fail_deposits = fail;
    }

    pub fn set_fail_withdrawals(&self, fail: bool) {
        self.lock().fail_withdrawals = fail;
    }
}

impl VenueConnector for SimVenue {
    fn deposit(&mut self, amount: u64) -> VaultResult<()> {
        let mut state = self.lock();
        if state.fail_deposits {
            return Err(VaultError::venue_failure(self.venue, "deposit fault injected"));
        }
        if amount > state.approved_limit {
            return Err(VaultError::venue_failure(self.venue, "allowance exceeded"));
        }
        state.balance = state
            .balance
            .checked_add(amount)
            .ok_or(VaultError::MathOverflow)?;
        Ok(())
    }

    fn withdraw(&mut self, amount: u64) -> VaultResult<u64> {
        let mut state = self.lock();
        if state.fail_withdrawals {
            return Err(VaultError::venue_failure(self.venue, "withdraw fault injected"));
        }
        let actual = amount.min(state.balance);
        state.balance -= actual;
        Ok(actual)
    }

    fn emergency_withdraw(&mut self) -> VaultResult<u64> {
        let mut state = self.lock();
        if state.fail_withdrawals {
            return Err(VaultError::venue_failure(self.venue, "withdraw fault injected"));
        }
        let all = state.balance;
        state.balance = 0;
        Ok(all)
    }

    fn balance(&self) -> VaultResult<u64> {
        Ok(self.lock().balance)
    }

    fn yield_rate_bps(&self) -> VaultResult<u32> {
        Ok(self.lock().yield_rate_bps)
    }

    fn is_healthy(&self) -> bool {
        self.lock().healthy
    }

    fn approve(&mut self, limit: u64) -> VaultResult<()> {
        self.lock().approved_limit = limit;
        Ok(())
    }
}
