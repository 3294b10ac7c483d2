use std::collections::HashSet;
use std::fs;

use serde::{Deserialize, Serialize};

use aegis_core::{RiskTranche, MAX_BPS, MAX_RISK_SCORE};

use crate::error::{KeeperError, KeeperResult};

/// Rehearsal configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Engine-clock seconds advanced per tick
    pub tick_seconds: u64,

    /// Run a rebalance pass every N ticks
    pub rebalance_every: u64,

    /// Smallest accepted deposit in base units
    pub min_deposit: u64,

    /// Exposure share pulled automatically on a WARNING escalation
    pub auto_partial_bps: u16,

    /// Venue designated as the evacuation safe haven, by name
    pub safe_haven: Option<String>,

    /// Cross-chain destination; omit to run without a relay
    pub remote: Option<RemoteConfig>,

    /// Venues to register and steer
    pub venues: Vec<VenueConfig>,

    /// Scripted user activity
    pub depositors: Vec<DepositorConfig>,

    /// Scripted oracle feed
    pub feed: Vec<FeedStep>,
}

/// Configuration for one simulated venue
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VenueConfig {
    /// Venue name; doubles as its address label
    pub name: String,

    /// Risk tranche: "low", "medium", or "high"
    pub tranche: String,

    /// Target share of total assets in basis points
    pub weight_bps: u16,

    /// Simulated per-tick yield in basis points
    pub yield_rate_bps: u32,

    /// Venue-side funds present before the vault deploys anything
    pub sim_balance: u64,

    /// Whether this venue is registered at startup
    pub enabled: bool,
}

/// One scripted depositor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DepositorConfig {
    /// Depositor name; doubles as their address label
    pub name: String,

    /// Deposit amount in base units
    pub amount: u64,

    /// Tick at which the deposit lands
    pub deposit_at_tick: u64,

    /// Tick at which the depositor exits; omit to hold to the end
    pub withdraw_at_tick: Option<u64>,

    /// Shares to burn at exit; omit to burn the full balance
    pub withdraw_shares: Option<u64>,
}

/// One scripted oracle score write
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedStep {
    /// Tick at which the score is posted
    pub tick: u64,

    /// Target venue, by name
    pub venue: String,

    /// Risk score 0..=100
    pub score: u8,

    /// Free-form reason recorded with any protective action
    pub reason: String,
}

/// Cross-chain destination configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Destination chain identifier
    pub dest_id: u64,

    /// Receiving contract label on the destination chain
    pub receiver: String,

    /// Safe-haven venue label on the destination chain
    pub safe_haven: String,

    /// Simulated relay base fee in settlement-asset units
    pub base_fee: u64,
}

impl KeeperConfig {
    /// Load configuration from TOML file
    pub fn load(path: &str) -> KeeperResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| KeeperError::IoError(format!("failed to read {}: {}", path, e)))?;

        let config: KeeperConfig = toml::from_str(&content).map_err(|e| {
            KeeperError::SerializationError(format!("failed to parse {}: {}", path, e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &str) -> KeeperResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| KeeperError::IoError(format!("failed to write {}: {}", path, e)))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> KeeperResult<()> {
        if self.venues.is_empty() {
            return Err(KeeperError::InvalidConfig(
                "at least one venue is required".to_string(),
            ));
        }

        if self.tick_seconds == 0 {
            return Err(KeeperError::InvalidConfig(
                "tick_seconds must be greater than 0".to_string(),
            ));
        }

        if self.rebalance_every == 0 {
            return Err(KeeperError::InvalidConfig(
                "rebalance_every must be greater than 0".to_string(),
            ));
        }

        if self.auto_partial_bps == 0 || self.auto_partial_bps > MAX_BPS {
            return Err(KeeperError::InvalidConfig(format!(
                "auto_partial_bps {} is outside 1..=10000",
                self.auto_partial_bps
            )));
        }

        let mut names = HashSet::new();
        for venue in &self.venues {
            venue.validate()?;
            if !names.insert(venue.name.as_str()) {
                return Err(KeeperError::InvalidConfig(format!(
                    "duplicate venue name '{}'",
                    venue.name
                )));
            }
        }

        if let Some(haven) = &self.safe_haven {
            if !names.contains(haven.as_str()) {
                return Err(KeeperError::InvalidConfig(format!(
                    "safe_haven '{}' is not a configured venue",
                    haven
                )));
            }
        }

        for depositor in &self.depositors {
            depositor.validate(self.min_deposit)?;
        }

        for step in &self.feed {
            if step.score > MAX_RISK_SCORE {
                return Err(KeeperError::InvalidConfig(format!(
                    "feed score {} for '{}' exceeds {}",
                    step.score, step.venue, MAX_RISK_SCORE
                )));
            }
            if !names.contains(step.venue.as_str()) {
                return Err(KeeperError::InvalidConfig(format!(
                    "feed step targets unknown venue '{}'",
                    step.venue
                )));
            }
        }

        Ok(())
    }

    /// Get the venues registered at startup
    pub fn enabled_venues(&self) -> Vec<&VenueConfig> {
        self.venues.iter().filter(|v| v.enabled).collect()
    }
}

impl VenueConfig {
    /// Validate venue configuration
    fn validate(&self) -> KeeperResult<()> {
        if self.name.is_empty() {
            return Err(KeeperError::InvalidConfig(
                "venue name must be non-empty".to_string(),
            ));
        }

        if self.weight_bps > MAX_BPS {
            return Err(KeeperError::InvalidConfig(format!(
                "venue '{}' weight {} exceeds {}",
                self.name, self.weight_bps, MAX_BPS
            )));
        }

        self.parsed_tranche()?;

        Ok(())
    }

    /// Parse the tranche tag
    pub fn parsed_tranche(&self) -> KeeperResult<RiskTranche> {
        match self.tranche.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskTranche::Low),
            "medium" => Ok(RiskTranche::Medium),
            "high" => Ok(RiskTranche::High),
            other => Err(KeeperError::InvalidConfig(format!(
                "venue '{}' has unknown tranche '{}' (expected low/medium/high)",
                self.name, other
            ))),
        }
    }
}

impl DepositorConfig {
    /// Validate depositor configuration
    fn validate(&self, min_deposit: u64) -> KeeperResult<()> {
        if self.name.is_empty() {
            return Err(KeeperError::InvalidConfig(
                "depositor name must be non-empty".to_string(),
            ));
        }

        if self.amount < min_deposit {
            return Err(KeeperError::InvalidConfig(format!(
                "depositor '{}' amount {} is below the minimum deposit {}",
                self.name, self.amount, min_deposit
            )));
        }

        if let Some(exit) = self.withdraw_at_tick {
            if exit <= self.deposit_at_tick {
                return Err(KeeperError::InvalidConfig(format!(
                    "depositor '{}' exits at tick {} before depositing at tick {}",
                    self.name, exit, self.deposit_at_tick
                )));
            }
        }

        Ok(())
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 3_600,
            rebalance_every: 6,
            min_deposit: 1_000,
            auto_partial_bps: 5_000,
            safe_haven: None,
            remote: None,
            venues: vec![],
            depositors: vec![],
            feed: vec![],
        }
    }
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            name: "venue".to_string(),
            tranche: "medium".to_string(),
            weight_bps: 5_000,
            yield_rate_bps: 5,
            sim_balance: 0,
            enabled: true,
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: &str) -> KeeperResult<()> {
    let example_config = KeeperConfig {
        tick_seconds: 3_600,
        rebalance_every: 6,
        min_deposit: 1_000,
        auto_partial_bps: 5_000,
        safe_haven: Some("haven".to_string()),
        remote: Some(RemoteConfig {
            dest_id: 101,
            receiver: "remote-receiver".to_string(),
            safe_haven: "remote-haven".to_string(),
            base_fee: 25,
        }),
        venues: vec![
            VenueConfig {
                name: "alpha".to_string(),
                tranche: "high".to_string(),
                weight_bps: 5_000,
                yield_rate_bps: 8,
                sim_balance: 0,
                enabled: true,
            },
            VenueConfig {
                name: "beta".to_string(),
                tranche: "medium".to_string(),
                weight_bps: 3_000,
                yield_rate_bps: 4,
                sim_balance: 2_500,
                enabled: true,
            },
            VenueConfig {
                name: "haven".to_string(),
                tranche: "low".to_string(),
                weight_bps: 2_000,
                yield_rate_bps: 1,
                sim_balance: 0,
                enabled: true,
            },
        ],
        depositors: vec![
            DepositorConfig {
                name: "alice".to_string(),
                amount: 250_000,
                deposit_at_tick: 1,
                withdraw_at_tick: Some(20),
                withdraw_shares: None,
            },
            DepositorConfig {
                name: "bob".to_string(),
                amount: 100_000,
                deposit_at_tick: 3,
                withdraw_at_tick: None,
                withdraw_shares: None,
            },
        ],
        feed: vec![
            FeedStep {
                tick: 8,
                venue: "alpha".to_string(),
                score: 40,
                reason: "elevated governance activity".to_string(),
            },
            FeedStep {
                tick: 10,
                venue: "alpha".to_string(),
                score: 65,
                reason: "suspicious outflows".to_string(),
            },
            FeedStep {
                tick: 12,
                venue: "alpha".to_string(),
                score: 85,
                reason: "exploit confirmed".to_string(),
            },
        ],
    };

    example_config.save(path)?;
    Ok(())
}
