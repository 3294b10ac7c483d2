//! # Rehearsal Runner
//!
//! Drives an in-memory [`AegisVault`] through a scripted run: simulated
//! venues accrue yield, depositors enter and exit on schedule, the oracle
//! feed (or a random score walk) posts risk scores, and a rebalance pass runs
//! on a configured cadence. Engine events drain to stdout as JSON lines for
//! dashboards; progress and warnings go to the log on stderr.

use rand::Rng;
use serde::Serialize;

use aegis_core::clock::{Clock, ManualClock};
use aegis_core::{
    AegisVault, Address, RemoteHaven, ResponseOutcome, ShieldAction, SimRelay, SimVenue,
    ThreatLevel, VaultConfig, MAX_BPS, MAX_RISK_SCORE,
};

use crate::config::{DepositorConfig, FeedStep, KeeperConfig};
use crate::error::{KeeperError, KeeperResult};

/// Counters accumulated across a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub ticks: u64,
    pub deposits: u64,
    pub deposited_total: u64,
    pub withdrawals: u64,
    pub withdrawn_total: u64,
    pub scores_posted: u64,
    pub auto_responses: u64,
    pub rebalances: u64,
    pub faults: u64,
}

/// One venue's closing state in the exit report
#[derive(Debug, Clone, Serialize)]
pub struct VenueSummary {
    pub name: String,
    pub target_weight_bps: u16,
    pub actual_weight_bps: u16,
    /// Amount the engine believes it deployed
    pub tracked: u64,
    /// The simulator's true balance, venue-side yield included
    pub true_balance: u64,
    pub threat_level: ThreatLevel,
}

/// Exit report: portfolio totals, allocation against target, shield history
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_assets: u64,
    pub idle: u64,
    pub total_shares: u64,
    pub venues: Vec<VenueSummary>,
    pub shield_actions: Vec<ShieldAction>,
    pub stats: RunStats,
}

/// Main rehearsal service owning the engine and its simulated surroundings
pub struct Rehearsal {
    /// Engine under rehearsal
    vault: AegisVault,

    /// Steering handles onto the simulated venues, in registration order
    venues: Vec<(String, SimVenue)>,

    /// Shared handle onto the engine clock
    clock: ManualClock,

    /// Scripted run configuration
    config: KeeperConfig,

    /// Owner role identity
    owner: Address,

    /// Risk-oracle role identity
    oracle: Address,

    /// Ticks completed
    tick: u64,

    /// Replace the scripted feed with a random score walk
    drift: bool,

    /// Running totals for the exit summary
    stats: RunStats,
}

impl Rehearsal {
    /// Build the engine and its simulated venues/relay from configuration
    pub fn new(config: KeeperConfig, drift: bool) -> KeeperResult<Self> {
        let owner = Address::from_label("keeper-owner");
        let oracle = Address::from_label("keeper-oracle");

        let mut vault_config = VaultConfig::new(owner, oracle);
        vault_config.min_deposit = config.min_deposit;
        vault_config.auto_partial_bps = config.auto_partial_bps;

        let clock = ManualClock::new(chrono::Utc::now().timestamp());
        let mut vault = AegisVault::with_clock(vault_config, Box::new(clock.clone()));

        let mut venues = Vec::new();
        for venue_config in config.enabled_venues() {
            let tranche = venue_config.parsed_tranche()?;
            let sim = SimVenue::new(&venue_config.name, venue_config.yield_rate_bps);
            vault.add_pool(
                owner,
                sim.address(),
                tranche,
                venue_config.weight_bps,
                Box::new(sim.clone()),
            )?;
            if venue_config.sim_balance > 0 {
                // Venue-side funds that predate the vault show up as
                // unrealized gain on the first total-assets read
                sim.credit_yield(venue_config.sim_balance);
            }
            venues.push((venue_config.name.clone(), sim));
        }

        if let Some(haven) = &config.safe_haven {
            let address = venues
                .iter()
                .find(|(name, _)| name == haven)
                .map(|(_, sim)| sim.address())
                .ok_or_else(|| {
                    KeeperError::InvalidConfig(format!(
                        "safe_haven '{}' is not an enabled venue",
                        haven
                    ))
                })?;
            vault.set_safe_haven(owner, address)?;
        }

        if let Some(remote) = &config.remote {
            vault.set_remote_haven(
                owner,
                RemoteHaven {
                    dest_id: remote.dest_id,
                    receiver: Address::from_label(&remote.receiver),
                    safe_haven: Address::from_label(&remote.safe_haven),
                },
            )?;
            vault.set_relay(owner, Box::new(SimRelay::new(remote.base_fee)))?;
        }

        log::info!(
            "rehearsal ready: {} venues, {} depositors, {} feed steps{}",
            venues.len(),
            config.depositors.len(),
            config.feed.len(),
            if drift { " (feed replaced by score drift)" } else { "" }
        );

        Ok(Rehearsal {
            vault,
            venues,
            clock,
            config,
            owner,
            oracle,
            tick: 0,
            drift,
            stats: RunStats::default(),
        })
    }

    /// Advance one tick, returning the number of engine actions performed
    pub fn run_tick(&mut self) -> KeeperResult<usize> {
        self.tick += 1;
        self.stats.ticks = self.tick;
        let tick = self.tick;
        self.clock.advance(self.config.tick_seconds as i64);

        // Venue-side yield lands before any user or oracle activity
        for (name, sim) in &self.venues {
            let gain = sim.accrue();
            if gain > 0 {
                log::debug!("tick {}: {} accrued {}", tick, name, gain);
            }
        }

        let mut actions = 0;
        actions += self.apply_deposits(tick);
        actions += self.apply_withdrawals(tick);
        actions += if self.drift {
            self.apply_score_drift(tick)
        } else {
            self.apply_feed(tick)
        };
        if tick % self.config.rebalance_every == 0 {
            actions += self.run_rebalance(tick);
        }

        self.log_portfolio(tick)?;
        self.drain_events();

        Ok(actions)
    }

    /// Ledger consistency probe: redeeming every outstanding share must value
    /// the whole book exactly
    pub fn health_check(&self) -> KeeperResult<()> {
        let assets = self.vault.total_assets()?;
        let shares = self.vault.total_shares();
        if shares > 0 {
            let redeemable = self.vault.preview_withdraw(shares)?;
            if redeemable != assets {
                return Err(KeeperError::EngineError(format!(
                    "share ledger out of step: {} shares redeem {} of {} assets",
                    shares, redeemable, assets
                )));
            }
        }
        log::debug!("health check passed: {} assets backing {} shares", assets, shares);
        Ok(())
    }

    /// Snapshot the closing portfolio for the exit report
    pub fn summary(&self) -> KeeperResult<RunSummary> {
        let total_assets = self.vault.total_assets()?;
        let allocations = self.vault.pool_allocations();

        let mut venues = Vec::with_capacity(self.venues.len());
        for (name, sim) in &self.venues {
            let address = sim.address();
            let view = allocations.iter().find(|view| view.venue == address);
            let true_balance = sim.sim_balance();
            let actual_weight_bps = if total_assets > 0 {
                (true_balance as u128 * MAX_BPS as u128 / total_assets as u128) as u16
            } else {
                0
            };
            venues.push(VenueSummary {
                name: name.clone(),
                target_weight_bps: view.map(|v| v.target_weight_bps).unwrap_or(0),
                actual_weight_bps,
                tracked: view.map(|v| v.current_amount).unwrap_or(0),
                true_balance,
                threat_level: self.vault.threat_level(address),
            });
        }

        Ok(RunSummary {
            total_assets,
            idle: self.vault.idle_balance(),
            total_shares: self.vault.total_shares(),
            venues,
            shield_actions: self.vault.shield_history(Address::SYSTEM).to_vec(),
            stats: self.stats.clone(),
        })
    }

    // ========================================================================
    // Per-tick phases
    // ========================================================================

    fn apply_deposits(&mut self, tick: u64) -> usize {
        let due: Vec<DepositorConfig> = self
            .config
            .depositors
            .iter()
            .filter(|d| d.deposit_at_tick == tick)
            .cloned()
            .collect();

        let mut actions = 0;
        for depositor in due {
            let user = Address::from_label(&depositor.name);
            match self.vault.deposit(user, depositor.amount) {
                Ok(shares) => {
                    log::info!(
                        "tick {}: {} deposited {} for {} shares",
                        tick,
                        depositor.name,
                        depositor.amount,
                        shares
                    );
                    self.stats.deposits += 1;
                    self.stats.deposited_total += depositor.amount;
                    actions += 1;
                }
                Err(e) => {
                    log::error!("tick {}: deposit from {} failed: {}", tick, depositor.name, e);
                    self.stats.faults += 1;
                }
            }
        }
        actions
    }

    fn apply_withdrawals(&mut self, tick: u64) -> usize {
        let due: Vec<DepositorConfig> = self
            .config
            .depositors
            .iter()
            .filter(|d| d.withdraw_at_tick == Some(tick))
            .cloned()
            .collect();

        let mut actions = 0;
        for depositor in due {
            let user = Address::from_label(&depositor.name);
            let shares = depositor.withdraw_shares.unwrap_or_else(|| {
                self.vault
                    .user_position(user)
                    .map(|p| p.share_balance)
                    .unwrap_or(0)
            });
            if shares == 0 {
                log::warn!("tick {}: {} has no shares to withdraw", tick, depositor.name);
                continue;
            }
            match self.vault.withdraw(user, shares) {
                Ok(paid) => {
                    if paid.amount_paid < paid.amount_requested {
                        log::warn!(
                            "tick {}: {} burned {} shares for {} of {} requested",
                            tick,
                            depositor.name,
                            shares,
                            paid.amount_paid,
                            paid.amount_requested
                        );
                    } else {
                        log::info!(
                            "tick {}: {} burned {} shares for {}",
                            tick,
                            depositor.name,
                            shares,
                            paid.amount_paid
                        );
                    }
                    self.stats.withdrawals += 1;
                    self.stats.withdrawn_total += paid.amount_paid;
                    actions += 1;
                }
                Err(e) => {
                    log::error!(
                        "tick {}: withdrawal from {} failed: {}",
                        tick,
                        depositor.name,
                        e
                    );
                    self.stats.faults += 1;
                }
            }
        }
        actions
    }

    fn apply_feed(&mut self, tick: u64) -> usize {
        let steps: Vec<FeedStep> = self
            .config
            .feed
            .iter()
            .filter(|s| s.tick == tick)
            .cloned()
            .collect();

        let mut actions = 0;
        for step in steps {
            let Some(venue) = self.venue_address(&step.venue) else {
                log::error!(
                    "tick {}: feed step targets unknown venue '{}'",
                    tick,
                    step.venue
                );
                self.stats.faults += 1;
                continue;
            };
            actions += self.post_score(tick, &step.venue, venue, step.score, &step.reason);
        }
        actions
    }

    /// Random-walk every venue's risk score in place of the scripted feed
    fn apply_score_drift(&mut self, tick: u64) -> usize {
        let targets: Vec<(String, Address)> = self
            .venues
            .iter()
            .map(|(name, sim)| (name.clone(), sim.address()))
            .collect();

        let mut rng = rand::thread_rng();
        let mut actions = 0;
        for (name, venue) in targets {
            let current = self
                .vault
                .protocol_risk(venue)
                .map(|r| r.risk_score)
                .unwrap_or(0) as i32;
            let step: i32 = rng.gen_range(-10..=10);
            let score = (current + step).clamp(0, MAX_RISK_SCORE as i32) as u8;
            actions += self.post_score(tick, &name, venue, score, "score drift");
        }
        actions
    }

    fn post_score(&mut self, tick: u64, name: &str, venue: Address, score: u8, reason: &str) -> usize {
        match self.vault.update_risk_score(self.oracle, venue, score, reason) {
            Ok(update) => {
                self.stats.scores_posted += 1;
                match &update.response {
                    ResponseOutcome::None => {
                        log::info!(
                            "tick {}: {} scored {} ({:?} -> {:?})",
                            tick,
                            name,
                            score,
                            update.previous,
                            update.current
                        );
                    }
                    ResponseOutcome::Partial { amount_moved } => {
                        log::warn!(
                            "tick {}: warning escalation at {}; pulled {} back to idle",
                            tick,
                            name,
                            amount_moved
                        );
                        self.stats.auto_responses += 1;
                    }
                    ResponseOutcome::Full { amount_moved } => {
                        log::warn!(
                            "tick {}: critical escalation at {}; evacuated {}",
                            tick,
                            name,
                            amount_moved
                        );
                        // Zero the weight so the next rebalance pass cannot
                        // redeploy into the evacuated venue
                        if let Err(e) = self.vault.update_pool_weight(self.owner, venue, 0) {
                            log::error!("tick {}: failed to zero weight for {}: {}", tick, name, e);
                        }
                        self.stats.auto_responses += 1;
                    }
                    ResponseOutcome::Skipped { reason } => {
                        log::warn!("tick {}: response at {} skipped: {}", tick, name, reason);
                    }
                }
                1
            }
            Err(e) => {
                log::error!("tick {}: score write for {} failed: {}", tick, name, e);
                self.stats.faults += 1;
                0
            }
        }
    }

    fn run_rebalance(&mut self, tick: u64) -> usize {
        match self.vault.rebalance(self.owner) {
            Ok(report) => {
                log::info!(
                    "tick {}: rebalance pulled {} / redeployed {}",
                    tick,
                    report.withdrawn,
                    report.deposited
                );
                for fault in &report.faults {
                    log::warn!(
                        "tick {}: rebalance fault at {}: {}",
                        tick,
                        fault.venue,
                        fault.reason
                    );
                }
                self.stats.rebalances += 1;
                self.stats.faults += report.faults.len() as u64;
                1
            }
            Err(e) => {
                log::error!("tick {}: rebalance failed: {}", tick, e);
                self.stats.faults += 1;
                0
            }
        }
    }

    fn log_portfolio(&self, tick: u64) -> KeeperResult<()> {
        let assets = self.vault.total_assets()?;
        let now = self.clock.unix_now();
        let stamp = chrono::DateTime::from_timestamp(now, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| now.to_string());
        log::info!(
            "tick {} [{}]: {} total assets, {} idle, {} shares",
            tick,
            stamp,
            assets,
            self.vault.idle_balance(),
            self.vault.total_shares()
        );
        Ok(())
    }

    /// Drain engine events to stdout as JSON lines; logging stays on stderr
    fn drain_events(&mut self) {
        for event in self.vault.take_events() {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("failed to serialize event: {}", e),
            }
        }
    }

    fn venue_address(&self, name: &str) -> Option<Address> {
        self.venues
            .iter()
            .find(|(venue_name, _)| venue_name == name)
            .map(|(_, sim)| sim.address())
    }
}
