//! # Risk Ledger
//!
//! Oracle-reported risk scores per venue, the threat levels derived from
//! them, and the append-only history of protective actions taken. Threat
//! levels move only when the oracle pushes a new score; there is no decay and
//! no timeout.

use std::collections::HashMap;

use crate::constants::MAX_RISK_SCORE;
use crate::errors::{VaultError, VaultResult};
use crate::math::safe_add_u64;
use crate::types::{Address, ProtocolRisk, ShieldAction, ThreatLevel};

/// Level movement produced by one score write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreatTransition {
    pub previous: ThreatLevel,
    pub current: ThreatLevel,
}

impl ThreatTransition {
    /// True when this write moved the venue UP into `level` from a lower
    /// band. Re-entering a band from above never counts.
    pub fn escalated_into(&self, level: ThreatLevel) -> bool {
        self.current == level && self.previous < level
    }
}

/// Risk scores and shield audit state
#[derive(Debug, Default)]
pub struct RiskLedger {
    risks: HashMap<Address, ProtocolRisk>,
    history: HashMap<Address, Vec<ShieldAction>>,
    amount_saved: HashMap<Address, u64>,
}

impl RiskLedger {
    pub fn new() -> Self {
        RiskLedger::default()
    }

    /// Record an oracle score for a venue, returning the level movement.
    /// Venues the oracle has never scored read as score 0 / SAFE.
    pub fn record_score(
        &mut self,
        venue: Address,
        score: u8,
        now: i64,
    ) -> VaultResult<ThreatTransition> {
        if score > MAX_RISK_SCORE {
            return Err(VaultError::ScoreOutOfRange { score });
        }

        let previous = self.threat_level(venue);
        let current = ThreatLevel::from_score(score);
        self.risks.insert(
            venue,
            ProtocolRisk {
                venue,
                risk_score: score,
                threat_level: current,
                last_updated: now,
                active: true,
            },
        );

        Ok(ThreatTransition { previous, current })
    }

    pub fn protocol_risk(&self, venue: Address) -> Option<&ProtocolRisk> {
        self.risks.get(&venue)
    }

    pub fn threat_level(&self, venue: Address) -> ThreatLevel {
        self.risks
            .get(&venue)
            .map(|r| r.threat_level)
            .unwrap_or(ThreatLevel::Safe)
    }

    pub fn is_venue_safe(&self, venue: Address) -> bool {
        self.threat_level(venue).is_safe_for_deposits()
    }

    /// Append a protective action to `user`'s history. Pool-wide actions are
    /// attributed to [`Address::SYSTEM`].
    pub fn record_shield_action(&mut self, user: Address, action: ShieldAction) -> VaultResult<()> {
        let saved = self.amount_saved.entry(user).or_insert(0);
        *saved = safe_add_u64(*saved, action.amount_moved)?;
        self.history.entry(user).or_default().push(action);
        Ok(())
    }

    pub fn shield_history(&self, user: Address) -> &[ShieldAction] {
        self.history.get(&user).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_amount_saved(&self, user: Address) -> u64 {
        self.amount_saved.get(&user).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn venue() -> Address {
        Address::from_label("venue-a")
    }

    #[test]
    fn test_unscored_venue_reads_safe() {
        let ledger = RiskLedger::new();
        assert_eq!(ledger.threat_level(venue()), ThreatLevel::Safe);
        assert!(ledger.is_venue_safe(venue()));
        assert!(ledger.protocol_risk(venue()).is_none());
    }

    #[test]
    fn test_score_write_activates_entry() {
        let mut ledger = RiskLedger::new();
        let transition = ledger.record_score(venue(), 60, NOW).unwrap();
        assert_eq!(transition.previous, ThreatLevel::Safe);
        assert_eq!(transition.current, ThreatLevel::Warning);

        let risk = ledger.protocol_risk(venue()).unwrap();
        assert!(risk.active);
        assert_eq!(risk.risk_score, 60);
        assert_eq!(risk.last_updated, NOW);
        assert!(!ledger.is_venue_safe(venue()));
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let mut ledger = RiskLedger::new();
        let err = ledger.record_score(venue(), 101, NOW).unwrap_err();
        assert_eq!(err, VaultError::ScoreOutOfRange { score: 101 });
        assert!(ledger.protocol_risk(venue()).is_none());
    }

    #[test]
    fn test_escalation_detection() {
        let mut ledger = RiskLedger::new();

        let up = ledger.record_score(venue(), 90, NOW).unwrap();
        assert!(up.escalated_into(ThreatLevel::Critical));
        assert!(!up.escalated_into(ThreatLevel::Warning));

        // Dropping back into WARNING from above is not an escalation
        let down = ledger.record_score(venue(), 60, NOW + 1).unwrap();
        assert!(!down.escalated_into(ThreatLevel::Warning));

        // Climbing back up is
        let re_up = ledger.record_score(venue(), 95, NOW + 2).unwrap();
        assert!(re_up.escalated_into(ThreatLevel::Critical));
    }

    #[test]
    fn test_shield_history_appends_and_accumulates() {
        let mut ledger = RiskLedger::new();
        let action = |amount| ShieldAction {
            venue: venue(),
            threat_level: ThreatLevel::Critical,
            amount_moved: amount,
            reason: "drill".to_string(),
            timestamp: NOW,
        };

        ledger
            .record_shield_action(Address::SYSTEM, action(1_000))
            .unwrap();
        ledger
            .record_shield_action(Address::SYSTEM, action(500))
            .unwrap();

        assert_eq!(ledger.shield_history(Address::SYSTEM).len(), 2);
        assert_eq!(ledger.total_amount_saved(Address::SYSTEM), 1_500);
        assert!(ledger.shield_history(venue()).is_empty());
    }
}
