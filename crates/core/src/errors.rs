//! # Vault Error Types
//!
//! Every fallible operation in the engine returns [`VaultResult`]. Variants are
//! grouped by the failure taxonomy callers react to: validation and
//! authorization failures reject before any state changes, state-consistency
//! failures report an impossible request against current bookkeeping, and
//! external-collaborator failures carry the venue or relay context needed to
//! retry. Partial fulfillment is deliberately NOT an error; it is surfaced in
//! operation results instead.

use thiserror::Error;

use crate::types::Address;

/// Engine errors surfaced by every vault operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    // ========================================================================
    // Math Errors
    // ========================================================================
    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Deposit of {amount} is below the minimum of {min}")]
    AmountBelowMinimum { amount: u64, min: u64 },

    #[error("Deposit too small to mint any shares")]
    DustDeposit,

    #[error("Share amount must be greater than zero")]
    ZeroShares,

    #[error("Risk score {score} exceeds the maximum of 100")]
    ScoreOutOfRange { score: u8 },

    #[error("Percentage {bps} bps is outside the valid range 1..=10000")]
    PercentageOutOfRange { bps: u16 },

    #[error("Target weight {bps} bps exceeds 10000")]
    WeightTooLarge { bps: u16 },

    #[error("Batch length mismatch: {venues} venues but {scores} scores")]
    LengthMismatch { venues: usize, scores: usize },

    // ========================================================================
    // Authorization Errors
    // ========================================================================
    #[error("Unauthorized: requires the {required} role")]
    Unauthorized { required: &'static str },

    // ========================================================================
    // State Consistency Errors
    // ========================================================================
    #[error("No allocation registered for venue {venue}")]
    PoolNotFound { venue: Address },

    #[error("Venue {venue} is already registered")]
    PoolAlreadyExists { venue: Address },

    #[error("Registry is full ({max} active venues)")]
    RegistryFull { max: usize },

    #[error("Venue {venue} holds nothing to evacuate")]
    NothingToEvacuate { venue: Address },

    #[error("Safe haven {venue} is not a registered venue")]
    SafeHavenNotRegistered { venue: Address },

    #[error("Insufficient shares: requested {requested}, available {available}")]
    InsufficientShares { requested: u64, available: u64 },

    #[error("Insufficient idle balance: requested {requested}, available {available}")]
    InsufficientIdle { requested: u64, available: u64 },

    #[error("Vault is paused")]
    VaultPaused,

    #[error("Vault is not paused")]
    NotPaused,

    #[error("Reentrant call rejected")]
    ReentrantCall,

    #[error("No evacuation relay configured")]
    RelayNotConfigured,

    #[error("No remote haven configured for cross-chain dispatch")]
    RemoteHavenNotConfigured,

    #[error("Relay fee too low: quoted {required}, provided {provided}")]
    FeeTooLow { required: u64, provided: u64 },

    // ========================================================================
    // External Collaborator Errors
    // ========================================================================
    #[error("Venue {venue} connector failure: {reason}")]
    VenueFailure { venue: Address, reason: String },

    #[error("Evacuation relay failure: {reason}")]
    RelayFailure { reason: String },
}

/// Result type using vault errors
pub type VaultResult<T> = Result<T, VaultError>;

// Helper constructors for errors built from external collaborator context
impl VaultError {
    /// Create a venue connector failure with a display-able cause
    pub fn venue_failure(venue: Address, reason: impl std::fmt::Display) -> Self {
        Self::VenueFailure {
            venue,
            reason: reason.to_string(),
        }
    }

    /// Create a relay failure with a display-able cause
    pub fn relay_failure(reason: impl std::fmt::Display) -> Self {
        Self::RelayFailure {
            reason: reason.to_string(),
        }
    }
}
