//! # Allocation Planning
//!
//! Pure planning for the three capital movements the vault performs:
//! proportional spread of fresh deposits, proportional sourcing of
//! withdrawals, and the two-phase rebalance toward target weights.
//!
//! Planning is separated from execution so the math can be tested (and
//! property-tested) without connectors. Plans operate on registry snapshots;
//! the vault applies them against live connectors and reconciles with what
//! each venue actually moved.

use crate::errors::VaultResult;
use crate::math::safe_mul_div_u64;
use crate::types::{Address, AllocationView};

/// One planned movement between idle balance and a venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub venue: Address,
    pub amount: u64,
}

/// Two-phase rebalance plan: withdrawals first, deposits second, so every
/// excess is back in idle balance before deficits are funded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalancePlan {
    pub withdrawals: Vec<Transfer>,
    pub deposits: Vec<Transfer>,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        self.withdrawals.is_empty() && self.deposits.is_empty()
    }
}

/// Split `amount` across active venues proportionally to target weights.
///
/// Each share is computed independently against the total active weight and
/// floored; the last venue absorbs the rounding remainder, so the plan sums
/// to `amount` exactly whenever any active venue carries weight. With no
/// weighted venue the plan is empty and the caller keeps the funds idle.
pub fn plan_spread(allocations: &[AllocationView], amount: u64) -> VaultResult<Vec<Transfer>> {
    let eligible: Vec<&AllocationView> = allocations
        .iter()
        .filter(|a| a.active && a.target_weight_bps > 0)
        .collect();
    let total_weight: u64 = eligible.iter().map(|a| a.target_weight_bps as u64).sum();
    if amount == 0 || total_weight == 0 {
        return Ok(Vec::new());
    }

    let mut transfers = Vec::with_capacity(eligible.len());
    let mut remaining = amount;
    for (i, allocation) in eligible.iter().enumerate() {
        let is_last = i + 1 == eligible.len();
        let share = if is_last {
            remaining
        } else {
            safe_mul_div_u64(amount, allocation.target_weight_bps as u64, total_weight)?
                .min(remaining)
        };
        if share > 0 {
            transfers.push(Transfer {
                venue: allocation.venue,
                amount: share,
            });
        }
        remaining -= share;
    }

    Ok(transfers)
}

/// Source `amount` from venues proportionally to their tracked amounts.
///
/// Every contribution is capped at the venue's own tracked amount and at what
/// is still needed; the last contributing venue tops up toward the target
/// within its cap. Floor rounding and thin venues can leave the plan short of
/// `amount` — the vault covers that shortfall from idle balance, to the
/// extent idle holds anything.
pub fn plan_withdrawal(allocations: &[AllocationView], amount: u64) -> VaultResult<Vec<Transfer>> {
    let eligible: Vec<&AllocationView> = allocations
        .iter()
        .filter(|a| a.active && a.current_amount > 0)
        .collect();
    let mut total_tracked = 0u64;
    for allocation in &eligible {
        total_tracked = crate::math::safe_add_u64(total_tracked, allocation.current_amount)?;
    }
    if amount == 0 || total_tracked == 0 {
        return Ok(Vec::new());
    }

    let mut transfers = Vec::with_capacity(eligible.len());
    let mut remaining = amount;
    for (i, allocation) in eligible.iter().enumerate() {
        let is_last = i + 1 == eligible.len();
        let take = if is_last {
            remaining.min(allocation.current_amount)
        } else {
            safe_mul_div_u64(amount, allocation.current_amount, total_tracked)?
                .min(allocation.current_amount)
                .min(remaining)
        };
        if take > 0 {
            transfers.push(Transfer {
                venue: allocation.venue,
                amount: take,
            });
        }
        remaining -= take;
    }

    Ok(transfers)
}

/// Compute per-venue deltas toward `total_assets * weight / total_weight`.
///
/// Targets floor, so the sum of targets can sit under `total_assets`; the
/// difference simply stays idle. Active venues whose weight was cut to zero
/// get a full drain. With no active weight at all, every active venue drains.
pub fn plan_rebalance(
    allocations: &[AllocationView],
    total_assets: u64,
) -> VaultResult<RebalancePlan> {
    let total_weight: u64 = allocations
        .iter()
        .filter(|a| a.active)
        .map(|a| a.target_weight_bps as u64)
        .sum();

    let mut plan = RebalancePlan::default();
    for allocation in allocations.iter().filter(|a| a.active) {
        let target = if total_weight == 0 {
            0
        } else {
            safe_mul_div_u64(
                total_assets,
                allocation.target_weight_bps as u64,
                total_weight,
            )?
        };

        if allocation.current_amount > target {
            plan.withdrawals.push(Transfer {
                venue: allocation.venue,
                amount: allocation.current_amount - target,
            });
        } else if allocation.current_amount < target {
            plan.deposits.push(Transfer {
                venue: allocation.venue,
                amount: target - allocation.current_amount,
            });
        }
    }

    Ok(plan)
}
