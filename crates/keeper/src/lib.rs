pub mod config;
pub mod error;
pub mod rehearsal;

pub use config::{DepositorConfig, FeedStep, KeeperConfig, RemoteConfig, VenueConfig};
pub use error::{KeeperError, KeeperResult};
pub use rehearsal::{Rehearsal, RunStats, RunSummary, VenueSummary};
