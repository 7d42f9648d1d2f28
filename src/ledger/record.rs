use crate::locator::{LocatorKind, StrategyKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted healing attempt. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingRecord {
    pub locator_id: String,
    pub original_query: String,
    /// Empty unless `succeeded`
    pub healed_query: String,
    /// How `healed_query` is interpreted; `None` unless `succeeded`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healed_kind: Option<LocatorKind>,
    /// `None` when every strategy missed
    pub strategy_used: Option<StrategyKind>,
    /// Always within `[0, 1]`
    pub confidence: f64,
    pub succeeded: bool,
    pub timestamp: DateTime<Utc>,
}

/// A healing outcome before the ledger stamps it
#[derive(Debug, Clone, PartialEq)]
pub struct HealingEntry {
    pub locator_id: String,
    pub original_query: String,
    pub healed_query: String,
    pub healed_kind: Option<LocatorKind>,
    pub strategy_used: Option<StrategyKind>,
    pub confidence: f64,
    pub succeeded: bool,
}

impl HealingEntry {
    /// A successful heal
    pub fn healed(
        locator_id: impl Into<String>,
        original_query: impl Into<String>,
        healed_query: impl Into<String>,
        healed_kind: LocatorKind,
        strategy: StrategyKind,
        confidence: f64,
    ) -> Self {
        Self {
            locator_id: locator_id.into(),
            original_query: original_query.into(),
            healed_query: healed_query.into(),
            healed_kind: Some(healed_kind),
            strategy_used: Some(strategy),
            confidence,
            succeeded: true,
        }
    }

    /// Every strategy missed
    pub fn failed(locator_id: impl Into<String>, original_query: impl Into<String>) -> Self {
        Self {
            locator_id: locator_id.into(),
            original_query: original_query.into(),
            healed_query: String::new(),
            healed_kind: None,
            strategy_used: None,
            confidence: 0.0,
            succeeded: false,
        }
    }

    /// Stamp the entry, normalizing it so record invariants hold for any input
    pub fn into_record(self, timestamp: DateTime<Utc>) -> HealingRecord {
        let confidence = if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        };

        HealingRecord {
            healed_query: if self.succeeded { self.healed_query } else { String::new() },
            healed_kind: self.healed_kind.filter(|_| self.succeeded),
            locator_id: self.locator_id,
            original_query: self.original_query,
            strategy_used: self.strategy_used,
            confidence,
            succeeded: self.succeeded,
            timestamp,
        }
    }
}
