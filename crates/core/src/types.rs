//! # Engine Value Types
//!
//! Identities, positions, allocation snapshots, and the risk/threat model
//! shared across the ledger, registry, and response paths.

use serde::{Deserialize, Serialize};

use crate::constants::{SAFE_MAX_SCORE, WARNING_MAX_SCORE, WATCH_MAX_SCORE};

// ============================================================================
// Identities
// ============================================================================

/// Opaque 32-byte identity for users, venues, and roles.
///
/// The engine never interprets the bytes; the identity substrate that calls
/// into the vault decides what they mean.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// System-level placeholder identity used to attribute pool-wide actions
    pub const SYSTEM: Address = Address([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }

    /// Derive a deterministic address from a human-readable label.
    ///
    /// The first 8 bytes are an FNV-1a hash of the label (so no label collides
    /// with [`Address::SYSTEM`]), the rest carry the label prefix for log
    /// readability. Intended for simulations and fixtures; production callers
    /// supply real identities.
    pub fn from_label(label: &str) -> Self {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = FNV_OFFSET;
        for byte in label.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }

        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&hash.to_be_bytes());
        let prefix = label.as_bytes();
        let len = prefix.len().min(24);
        bytes[8..8 + len].copy_from_slice(&prefix[..len]);
        Address(bytes)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }
}

// ============================================================================
// Risk Model
// ============================================================================

/// Descriptive risk class assigned to a venue at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTranche {
    Low,
    Medium,
    High,
}

/// Graduated threat bands derived from the 0-100 risk score.
///
/// Variant order is the escalation order, so `Ord` answers "did the level
/// rise" directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Safe,
    Watch,
    Warning,
    Critical,
}

impl ThreatLevel {
    /// Classify a risk score. Band edges are inclusive upper bounds: a score
    /// sitting exactly on an edge belongs to the lower band.
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s <= SAFE_MAX_SCORE => ThreatLevel::Safe,
            s if s <= WATCH_MAX_SCORE => ThreatLevel::Watch,
            s if s <= WARNING_MAX_SCORE => ThreatLevel::Warning,
            _ => ThreatLevel::Critical,
        }
    }

    /// Whether the venue is considered safe to keep capital in
    pub fn is_safe_for_deposits(&self) -> bool {
        matches!(self, ThreatLevel::Safe | ThreatLevel::Watch)
    }
}

/// Latest oracle-reported risk state for one venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRisk {
    pub venue: Address,
    pub risk_score: u8,
    pub threat_level: ThreatLevel,
    pub last_updated: i64,
    /// True once the oracle has reported at least one score
    pub active: bool,
}

/// Append-only audit record of one protective capital movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldAction {
    pub venue: Address,
    /// Threat level at the moment the action was taken
    pub threat_level: ThreatLevel,
    pub amount_moved: u64,
    pub reason: String,
    pub timestamp: i64,
}

/// Whether a shield action drained part of a venue or all of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShieldScope {
    Partial,
    Full,
}

// ============================================================================
// Positions and Views
// ============================================================================

/// One user's claim against the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPosition {
    pub owner: Address,
    /// Lifetime sum of deposits, never decremented; informational only
    pub total_deposited: u64,
    /// Live share balance; the only field share math depends on
    pub share_balance: u64,
    pub last_activity: i64,
}

/// Read-only snapshot of one registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationView {
    pub venue: Address,
    pub tranche: RiskTranche,
    pub target_weight_bps: u16,
    pub current_amount: u64,
    pub active: bool,
}

/// Live probe of a venue connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueStatus {
    pub venue: Address,
    pub balance: u64,
    pub yield_rate_bps: u32,
    pub healthy: bool,
}

/// Destination addressing for cross-chain evacuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHaven {
    pub dest_id: u64,
    pub receiver: Address,
    pub safe_haven: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_band_edges() {
        assert_eq!(ThreatLevel::from_score(0), ThreatLevel::Safe);
        assert_eq!(ThreatLevel::from_score(25), ThreatLevel::Safe);
        assert_eq!(ThreatLevel::from_score(26), ThreatLevel::Watch);
        assert_eq!(ThreatLevel::from_score(50), ThreatLevel::Watch);
        assert_eq!(ThreatLevel::from_score(51), ThreatLevel::Warning);
        assert_eq!(ThreatLevel::from_score(75), ThreatLevel::Warning);
        assert_eq!(ThreatLevel::from_score(76), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_score(100), ThreatLevel::Critical);
    }

    #[test]
    fn test_escalation_ordering() {
        assert!(ThreatLevel::Safe < ThreatLevel::Watch);
        assert!(ThreatLevel::Watch < ThreatLevel::Warning);
        assert!(ThreatLevel::Warning < ThreatLevel::Critical);
    }

    #[test]
    fn test_safe_for_deposits() {
        assert!(ThreatLevel::Safe.is_safe_for_deposits());
        assert!(ThreatLevel::Watch.is_safe_for_deposits());
        assert!(!ThreatLevel::Warning.is_safe_for_deposits());
        assert!(!ThreatLevel::Critical.is_safe_for_deposits());
    }

    #[test]
    fn test_address_labels() {
        let a = Address::from_label("venue-alpha");
        let b = Address::from_label("venue-beta");
        assert_ne!(a, b);
        assert_eq!(a, Address::from_label("venue-alpha"));
        assert_ne!(a, Address::SYSTEM);
        assert_ne!(Address::from_label(""), Address::SYSTEM);
        assert_eq!(format!("{}", a).len(), 64);
    }
}
