//! # Pool Registry
//!
//! Tracks every venue the vault allocates into, each entry owning its boxed
//! connector handle. A venue-to-index map gives O(1) lookup; removal drops the
//! index key but keeps the vec entry (marked inactive) as an audit trail, so a
//! re-added venue gets a fresh entry.

use std::collections::HashMap;

use crate::constants::{is_valid_bps, MAX_ACTIVE_VENUES};
use crate::errors::{VaultError, VaultResult};
use crate::math::safe_add_u64;
use crate::types::{Address, AllocationView, RiskTranche};
use crate::venue::VenueConnector;

/// One venue's allocation state plus its connector handle
pub struct PoolAllocation {
    pub venue: Address,
    pub tranche: RiskTranche,
    pub target_weight_bps: u16,
    /// Engine bookkeeping of capital deployed into the venue. The venue's
    /// true balance may drift above this as venue-side yield accrues.
    pub current_amount: u64,
    pub active: bool,
    pub connector: Box<dyn VenueConnector>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PoolAllocation {
    pub fn new(
        venue: Address,
        tranche: RiskTranche,
        target_weight_bps: u16,
        connector: Box<dyn VenueConnector>,
        now: i64,
    ) -> Self {
        PoolAllocation {
            venue,
            tranche,
            target_weight_bps,
            current_amount: 0,
            active: true,
            connector,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> AllocationView {
        AllocationView {
            venue: self.venue,
            tranche: self.tranche,
            target_weight_bps: self.target_weight_bps,
            current_amount: self.current_amount,
            active: self.active,
        }
    }
}

impl std::fmt::Debug for PoolAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolAllocation")
            .field("venue", &self.venue)
            .field("tranche", &self.tranche)
            .field("target_weight_bps", &self.target_weight_bps)
            .field("current_amount", &self.current_amount)
            .field("active", &self.active)
            .finish()
    }
}

/// Venue allocation table
#[derive(Debug, Default)]
pub struct PoolRegistry {
    allocations: Vec<PoolAllocation>,
    index: HashMap<Address, usize>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        PoolRegistry::default()
    }

    /// Register a venue. Rejects duplicates, over-100% weights, and a full
    /// registry; the caller handles connector authorization first.
    pub fn add(&mut self, allocation: PoolAllocation) -> VaultResult<()> {
        if !is_valid_bps(allocation.target_weight_bps) {
            return Err(VaultError::WeightTooLarge {
                bps: allocation.target_weight_bps,
            });
        }
        if self.index.contains_key(&allocation.venue) {
            return Err(VaultError::PoolAlreadyExists {
                venue: allocation.venue,
            });
        }
        if self.active_count() >= MAX_ACTIVE_VENUES {
            return Err(VaultError::RegistryFull {
                max: MAX_ACTIVE_VENUES,
            });
        }

        let venue = allocation.venue;
        self.allocations.push(allocation);
        self.index.insert(venue, self.allocations.len() - 1);
        Ok(())
    }

    /// Mark a venue inactive and drop its index entry. The vec entry stays
    /// for audit; re-adding the venue creates a new entry.
    pub fn deactivate(&mut self, venue: Address, now: i64) -> VaultResult<()> {
        let idx = self
            .index
            .remove(&venue)
            .ok_or(VaultError::PoolNotFound { venue })?;
        let allocation = &mut self.allocations[idx];
        allocation.active = false;
        allocation.updated_at = now;
        Ok(())
    }

    /// Change a venue's target weight; takes effect at the next rebalance
    pub fn update_weight(&mut self, venue: Address, new_bps: u16, now: i64) -> VaultResult<u16> {
        if !is_valid_bps(new_bps) {
            return Err(VaultError::WeightTooLarge { bps: new_bps });
        }
        let allocation = self.require_mut(venue)?;
        let old = allocation.target_weight_bps;
        allocation.target_weight_bps = new_bps;
        allocation.updated_at = now;
        Ok(old)
    }

    pub fn get(&self, venue: Address) -> Option<&PoolAllocation> {
        self.index.get(&venue).map(|&idx| &self.allocations[idx])
    }

    pub fn get_mut(&mut self, venue: Address) -> Option<&mut PoolAllocation> {
        let idx = *self.index.get(&venue)?;
        Some(&mut self.allocations[idx])
    }

    pub fn require(&self, venue: Address) -> VaultResult<&PoolAllocation> {
        self.get(venue).ok_or(VaultError::PoolNotFound { venue })
    }

    pub fn require_mut(&mut self, venue: Address) -> VaultResult<&mut PoolAllocation> {
        self.get_mut(venue).ok_or(VaultError::PoolNotFound { venue })
    }

    pub fn is_active(&self, venue: Address) -> bool {
        self.index.contains_key(&venue)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoolAllocation> {
        self.allocations.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PoolAllocation> {
        self.allocations.iter_mut()
    }

    pub fn active_count(&self) -> usize {
        self.index.len()
    }

    /// Snapshot of every entry, inactive history included
    pub fn views(&self) -> Vec<AllocationView> {
        self.allocations.iter().map(PoolAllocation::view).collect()
    }

    /// Sum of active target weights. Distribution math normalizes against
    /// this, not against 10000, so weights need not sum to 100%.
    pub fn total_active_weight(&self) -> u64 {
        self.allocations
            .iter()
            .filter(|a| a.active)
            .map(|a| a.target_weight_bps as u64)
            .sum()
    }

    /// Sum of active tracked amounts
    pub fn total_tracked(&self) -> VaultResult<u64> {
        let mut total = 0u64;
        for allocation in self.allocations.iter().filter(|a| a.active) {
            total = safe_add_u64(total, allocation.current_amount)?;
        }
        Ok(total)
    }
}
