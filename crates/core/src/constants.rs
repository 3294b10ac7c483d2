//! # Protocol Constants
//!
//! Fundamental constants for the allocation engine including:
//! - Basis-point arithmetic parameters
//! - Risk scoring bounds and threat band edges
//! - Deposit and registry limits
//! - Default response parameters

// ============================================================================
// Basis Points
// ============================================================================

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Maximum percentage in basis points (100%)
pub const MAX_BPS: u16 = 10_000;

// ============================================================================
// Risk Scoring
// ============================================================================

/// Maximum accepted risk score
pub const MAX_RISK_SCORE: u8 = 100;

/// Upper bound of the SAFE band (inclusive)
pub const SAFE_MAX_SCORE: u8 = 25;

/// Upper bound of the WATCH band (inclusive)
pub const WATCH_MAX_SCORE: u8 = 50;

/// Upper bound of the WARNING band (inclusive); everything above is CRITICAL
pub const WARNING_MAX_SCORE: u8 = 75;

// ============================================================================
// Deposits and Registry Limits
// ============================================================================

/// Default minimum deposit in base units
pub const DEFAULT_MIN_DEPOSIT: u64 = 1_000;

/// Maximum number of simultaneously active venues
pub const MAX_ACTIVE_VENUES: usize = 32;

// ============================================================================
// Threat Response Defaults
// ============================================================================

/// Default share of a venue's tracked amount pulled on a WARNING escalation (50%)
pub const DEFAULT_AUTO_PARTIAL_BPS: u16 = 5_000;

// ============================================================================
// Helper Functions
// ============================================================================

/// Check that a basis-point value does not exceed 100%
pub const fn is_valid_bps(bps: u16) -> bool {
    bps <= MAX_BPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_validity() {
        assert!(SAFE_MAX_SCORE < WATCH_MAX_SCORE);
        assert!(WATCH_MAX_SCORE < WARNING_MAX_SCORE);
        assert!(WARNING_MAX_SCORE < MAX_RISK_SCORE);
        assert_eq!(BPS_DENOMINATOR, 10_000);
        assert_eq!(MAX_BPS as u64, BPS_DENOMINATOR);
    }

    #[test]
    fn test_bps_helper() {
        assert!(is_valid_bps(0));
        assert!(is_valid_bps(10_000));
        assert!(!is_valid_bps(10_001));
    }
}
