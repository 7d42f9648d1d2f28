//! Periodic healing review
//!
//! Pure queries over a [`HealingLedger`] meant to be run on a schedule owned
//! by the caller (a CI job, a cron task): which locators should be promoted,
//! and how often each one needed healing.

use crate::error::LedgerError;
use crate::ledger::{HealingLedger, PromotionSuggested};
use crate::locator::{LocatorKind, StrategyKind};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Healing statistics for one locator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealingSummary {
    pub locator_id: String,
    pub attempts: usize,
    pub healed: usize,
    pub failed: usize,
    /// `healed / attempts`
    pub success_rate: f64,
    pub last_strategy: Option<StrategyKind>,
    pub last_healed_query: Option<String>,
    pub last_healed_kind: Option<LocatorKind>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Every locator whose recent history qualifies it for promotion
pub fn promotion_candidates(ledger: &HealingLedger, window: usize) -> Result<Vec<PromotionSuggested>, LedgerError> {
    let mut candidates = Vec::new();
    for locator_id in ledger.locator_ids()? {
        if let Some(promotion) = ledger.promotion(&locator_id, window)? {
            candidates.push(promotion);
        }
    }
    Ok(candidates)
}

/// Per-locator statistics, most frequently failing locators first
pub fn summarize(ledger: &HealingLedger) -> Result<Vec<HealingSummary>, LedgerError> {
    let mut summaries = Vec::new();

    for locator_id in ledger.locator_ids()? {
        let mut summary = HealingSummary {
            locator_id: locator_id.clone(),
            attempts: 0,
            healed: 0,
            failed: 0,
            success_rate: 0.0,
            last_strategy: None,
            last_healed_query: None,
            last_healed_kind: None,
            last_seen: None,
        };

        for record in ledger.history(&locator_id).iter() {
            let record = record?;
            summary.attempts += 1;
            if record.succeeded {
                summary.healed += 1;
                summary.last_strategy = record.strategy_used;
                summary.last_healed_query = Some(record.healed_query);
                summary.last_healed_kind = record.healed_kind;
            } else {
                summary.failed += 1;
            }
            summary.last_seen = Some(record.timestamp);
        }

        if summary.attempts > 0 {
            summary.success_rate = summary.healed as f64 / summary.attempts as f64;
        }
        summaries.push(summary);
    }

    // stable sort keeps first-seen order among equals
    summaries.sort_by(|a, b| b.failed.cmp(&a.failed));
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::HealingEntry;

    fn ledger() -> HealingLedger {
        let ledger = HealingLedger::in_memory();
        for _ in 0..3 {
            ledger
                .record(HealingEntry::healed(
                    "login",
                    "#login",
                    "#login-v2",
                    LocatorKind::Css,
                    StrategyKind::AttributeSimilarity,
                    0.9,
                ))
                .unwrap();
        }
        ledger
            .record(HealingEntry::healed("search", "#q", "q", LocatorKind::TestId, StrategyKind::Text, 0.5))
            .unwrap();
        ledger.record(HealingEntry::failed("search", "#q")).unwrap();
        ledger
    }

    #[test]
    fn test_promotion_candidates() {
        let ledger = ledger();

        let candidates = promotion_candidates(&ledger, 3).unwrap();
        assert_eq!(
            candidates,
            vec![PromotionSuggested {
                locator_id: "login".to_string(),
                new_query: "#login-v2".to_string(),
                healed_kind: Some(LocatorKind::Css),
            }]
        );

        assert!(promotion_candidates(&ledger, 4).unwrap().is_empty());
    }

    #[test]
    fn test_summarize() {
        let summaries = summarize(&ledger()).unwrap();
        assert_eq!(summaries.len(), 2);

        let search = &summaries[0];
        assert_eq!(search.locator_id, "search");
        assert_eq!(search.attempts, 2);
        assert_eq!(search.failed, 1);
        assert_eq!(search.success_rate, 0.5);
        assert_eq!(search.last_strategy, Some(StrategyKind::Text));
        assert_eq!(search.last_healed_kind, Some(LocatorKind::TestId));

        let login = &summaries[1];
        assert_eq!(login.healed, 3);
        assert_eq!(login.success_rate, 1.0);
        assert_eq!(login.last_healed_query.as_deref(), Some("#login-v2"));
        assert!(login.last_seen.is_some());
    }

    #[test]
    fn test_empty_ledger() {
        let ledger = HealingLedger::in_memory();
        assert!(summarize(&ledger).unwrap().is_empty());
        assert!(promotion_candidates(&ledger, 3).unwrap().is_empty());
    }
}
