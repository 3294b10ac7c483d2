//! # Aegis Core - Capital Allocation Engine
//!
//! This crate contains the custodial capital-allocation engine: a share-based
//! vault ledger over a registry of weighted yield venues, with a graduated
//! threat-response layer. It provides:
//!
//! - Share accounting (proportional mint/burn with floor rounding)
//! - Weight-driven distribution, withdrawal sourcing, and rebalance planning
//! - Oracle-driven threat levels with automatic partial/full evacuation
//! - A cross-chain relay boundary for evacuating to a remote safe haven
//! - In-memory venue/relay simulators for rehearsals and tests
//!
//! The [`vault::AegisVault`] aggregate ties these together; everything under
//! it is a pure component usable on its own.

// Re-export all modules
pub mod allocator;
pub mod clock;
pub mod constants;
pub mod errors;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod math;
pub mod registry;
pub mod relay;
pub mod risk;
pub mod types;
pub mod vault;
pub mod venue;

// Re-export commonly used items
pub use constants::*;
pub use errors::{VaultError, VaultResult};
pub use events::{VaultEvent, VaultEventKind};
pub use relay::{DispatchRecord, EvacuationRelay, SimRelay, TrackingId};
pub use types::*;
pub use vault::{
    AegisVault, RebalanceReport, RelayDispatch, ResponseOutcome, ThreatUpdate, VaultConfig,
    VenueFault, Withdrawal,
};
pub use venue::{SimVenue, VenueConnector};
