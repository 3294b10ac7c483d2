//! Event definitions
//!
//! Every successful state mutation appends exactly one audit record per
//! triggering operation. Records are serde-serializable so dashboards and
//! operational tooling can consume them as JSON.

use serde::{Deserialize, Serialize};

use crate::relay::TrackingId;
use crate::types::{Address, RiskTranche, ShieldScope, ThreatLevel};

/// One audit record with the engine-clock timestamp of the mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEvent {
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: VaultEventKind,
}

/// Event payloads, tagged for JSON consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultEventKind {
    /// Emitted when a user deposit is accepted and shares are minted
    Deposited {
        user: Address,
        amount: u64,
        shares: u64,
    },
    /// Emitted when shares are burned; `amount_paid` may be below
    /// `amount_requested` under partial fulfillment
    Withdrawn {
        user: Address,
        shares: u64,
        amount_requested: u64,
        amount_paid: u64,
    },
    /// Emitted when a venue is registered
    PoolAdded {
        venue: Address,
        tranche: RiskTranche,
        target_weight_bps: u16,
    },
    /// Emitted when a venue is retired after its funds were recovered
    PoolRemoved { venue: Address, recovered: u64 },
    /// Emitted when a venue's target weight changes
    PoolWeightUpdated {
        venue: Address,
        old_weight_bps: u16,
        new_weight_bps: u16,
    },
    /// Emitted after a two-phase rebalance pass
    Rebalanced { withdrawn: u64, deposited: u64 },
    /// Emitted on every oracle score write
    RiskScoreUpdated {
        venue: Address,
        score: u8,
        threat_level: ThreatLevel,
        previous_level: ThreatLevel,
    },
    /// Emitted when capital is pulled from a venue in response to a threat
    ShieldActionTaken {
        venue: Address,
        threat_level: ThreatLevel,
        amount_moved: u64,
        scope: ShieldScope,
        reason: String,
    },
    /// Emitted when evacuated idle funds are pushed into the safe haven
    SafeHavenSwept { venue: Address, amount: u64 },
    /// Emitted when the safe-haven venue designation changes
    SafeHavenUpdated { venue: Address },
    /// Emitted when the cross-chain destination pair changes
    RemoteHavenUpdated {
        dest_id: u64,
        receiver: Address,
        safe_haven: Address,
    },
    /// Emitted when the risk-oracle role is rotated
    RiskOracleUpdated { old: Address, new: Address },
    /// Emitted when user deposits/withdrawals are suspended
    Paused {},
    /// Emitted when user deposits/withdrawals resume
    Unpaused {},
    /// Emitted when idle funds are handed to the cross-chain relay
    CrossChainDispatched {
        dest_id: u64,
        amount: u64,
        fee_paid: u64,
        refund: u64,
        tracking_id: TrackingId,
    },
    /// Emitted when the relay reports an inbound delivery credited to idle
    RelayDeliveryRecorded { amount: u64 },
}

impl VaultEvent {
    pub fn new(timestamp: i64, kind: VaultEventKind) -> Self {
        VaultEvent { timestamp, kind }
    }
}
