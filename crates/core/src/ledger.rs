//! # Share Ledger
//!
//! Proportional claim accounting. Shares are the unit of ownership: a user's
//! redeemable value is `share_balance * total_assets / total_shares` at
//! whatever `total_assets` happens to be when they exit, so venue yield and
//! venue losses both flow through to holders without per-user adjustments.
//!
//! Both conversions floor. Rounding dust therefore always favors the pool,
//! never the individual mint or burn.

use std::collections::HashMap;

use crate::errors::{VaultError, VaultResult};
use crate::math::{safe_add_u64, safe_mul_div_u64, safe_sub_u64};
use crate::types::{Address, UserPosition};

/// Share issuance state for every user with a position
#[derive(Debug, Default)]
pub struct ShareLedger {
    positions: HashMap<Address, UserPosition>,
    total_shares: u64,
}

impl ShareLedger {
    pub fn new() -> Self {
        ShareLedger::default()
    }

    pub fn total_shares(&self) -> u64 {
        self.total_shares
    }

    pub fn position(&self, user: Address) -> Option<&UserPosition> {
        self.positions.get(&user)
    }

    pub fn share_balance(&self, user: Address) -> u64 {
        self.positions
            .get(&user)
            .map(|p| p.share_balance)
            .unwrap_or(0)
    }

    /// Shares a deposit of `amount` would mint against `total_assets`.
    ///
    /// The first deposit (or a deposit into a vault whose assets were wiped)
    /// mints 1:1.
    pub fn preview_deposit(&self, amount: u64, total_assets: u64) -> VaultResult<u64> {
        if self.total_shares == 0 || total_assets == 0 {
            return Ok(amount);
        }
        safe_mul_div_u64(amount, self.total_shares, total_assets)
    }

    /// Value `shares` would redeem against `total_assets`
    pub fn preview_withdraw(&self, shares: u64, total_assets: u64) -> VaultResult<u64> {
        if self.total_shares == 0 {
            return Ok(0);
        }
        safe_mul_div_u64(shares, total_assets, self.total_shares)
    }

    /// Mint shares for a deposit. `total_assets` must be measured BEFORE the
    /// deposited funds are credited anywhere, or the depositor prices their
    /// own money into the share they buy.
    pub fn mint(
        &mut self,
        user: Address,
        amount: u64,
        total_assets: u64,
        now: i64,
    ) -> VaultResult<u64> {
        let shares = self.preview_deposit(amount, total_assets)?;
        if shares == 0 {
            return Err(VaultError::DustDeposit);
        }

        // Validate every sum before committing any of them
        let (prev_deposited, prev_balance) = self
            .positions
            .get(&user)
            .map(|p| (p.total_deposited, p.share_balance))
            .unwrap_or((0, 0));
        let new_total = safe_add_u64(self.total_shares, shares)?;
        let new_deposited = safe_add_u64(prev_deposited, amount)?;
        let new_balance = safe_add_u64(prev_balance, shares)?;

        let position = self.positions.entry(user).or_insert(UserPosition {
            owner: user,
            total_deposited: 0,
            share_balance: 0,
            last_activity: now,
        });
        position.total_deposited = new_deposited;
        position.share_balance = new_balance;
        position.last_activity = now;
        self.total_shares = new_total;

        Ok(shares)
    }

    /// Burn shares and return the value they redeem. Burning happens before
    /// the vault sources any funds, so a re-stated balance can never redeem
    /// twice.
    pub fn burn(
        &mut self,
        user: Address,
        shares: u64,
        total_assets: u64,
        now: i64,
    ) -> VaultResult<u64> {
        if shares == 0 {
            return Err(VaultError::ZeroShares);
        }
        let available = self.share_balance(user);
        if shares > available {
            return Err(VaultError::InsufficientShares {
                requested: shares,
                available,
            });
        }

        // available >= shares > 0 implies total_shares > 0
        let amount = safe_mul_div_u64(shares, total_assets, self.total_shares)?;

        let position = self
            .positions
            .get_mut(&user)
            .ok_or(VaultError::InsufficientShares {
                requested: shares,
                available: 0,
            })?;
        position.share_balance = safe_sub_u64(position.share_balance, shares)?;
        position.last_activity = now;
        self.total_shares = safe_sub_u64(self.total_shares, shares)?;

        Ok(amount)
    }
}
