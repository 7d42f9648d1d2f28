//! Healing ledger: append-only history of every healing attempt
//!
//! The ledger answers one question beyond plain history: has a locator healed
//! to the same query often enough in a row that its primary query should be
//! replaced ([`HealingLedger::should_auto_promote`]).

pub mod file;
pub mod record;
pub mod store;

pub use file::JsonlStore;
pub use record::{HealingEntry, HealingRecord};
pub use store::{LedgerStore, MemoryStore};

use crate::error::LedgerError;
use crate::locator::LocatorKind;
use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Records fetched from the store per page while iterating history
const HISTORY_PAGE_SIZE: usize = 64;

/// Advisory event: the locator consistently heals to `new_query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionSuggested {
    pub locator_id: String,
    pub new_query: String,
    /// How `new_query` is to be interpreted
    #[serde(default)]
    pub healed_kind: Option<LocatorKind>,
}

/// Shared handle to a ledger store; clones share the same records
#[derive(Clone)]
pub struct HealingLedger {
    store: Arc<dyn LedgerStore>,
}

impl HealingLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Ledger backed by a [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Ledger backed by a JSON-lines file
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, LedgerError> {
        Ok(Self::new(Arc::new(JsonlStore::open(path)?)))
    }

    /// [`open`](Self::open), degrading to an in-memory ledger when the file
    /// cannot be used
    pub fn open_or_in_memory(path: impl AsRef<std::path::Path>) -> Self {
        let path = path.as_ref();
        Self::open(path).unwrap_or_else(|e| {
            warn!(
                "Ledger {} unavailable, healing will not be persisted: {}",
                path.display(),
                e
            );
            Self::in_memory()
        })
    }

    /// Timestamp and append a healing outcome
    ///
    /// Never rejects on content; only storage failures are errors.
    pub fn record(&self, entry: HealingEntry) -> Result<HealingRecord, LedgerError> {
        let record = self.store.append(entry.into_record(Utc::now()))?;
        debug!(
            "Recorded {} healing for '{}' ({:?})",
            if record.succeeded { "successful" } else { "failed" },
            record.locator_id,
            record.strategy_used
        );
        Ok(record)
    }

    /// True iff the last `n` records all succeeded with the same healed query
    /// of the same kind
    ///
    /// False when fewer than `n` records exist, and always false for `n == 0`.
    pub fn should_auto_promote(&self, locator_id: &str, n: usize) -> Result<bool, LedgerError> {
        Ok(self.promotion(locator_id, n)?.is_some())
    }

    /// The promotion [`should_auto_promote`](Self::should_auto_promote) would allow
    pub fn promotion(&self, locator_id: &str, n: usize) -> Result<Option<PromotionSuggested>, LedgerError> {
        if n == 0 {
            return Ok(None);
        }
        let count = self.store.count(locator_id)?;
        if count < n {
            return Ok(None);
        }

        let recent = self.store.read_range(locator_id, count - n..count)?;
        let Some(first) = recent.first() else {
            return Ok(None);
        };
        let consistent = recent.len() == n
            && recent
                .iter()
                .all(|r| {
                    r.succeeded
                        && !r.healed_query.is_empty()
                        && r.healed_query == first.healed_query
                        && r.healed_kind == first.healed_kind
                });

        Ok(consistent.then(|| PromotionSuggested {
            locator_id: locator_id.to_string(),
            new_query: first.healed_query.clone(),
            healed_kind: first.healed_kind,
        }))
    }

    /// Lazy, restartable view of a locator's records in timestamp order
    pub fn history(&self, locator_id: &str) -> HealingHistory {
        HealingHistory {
            store: Arc::clone(&self.store),
            locator_id: locator_id.to_string(),
        }
    }

    /// Every locator with recorded history
    pub fn locator_ids(&self) -> Result<Vec<String>, LedgerError> {
        self.store.locator_ids()
    }
}

impl Default for HealingLedger {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Restartable sequence of one locator's records; nothing is read until iterated
#[derive(Clone)]
pub struct HealingHistory {
    store: Arc<dyn LedgerStore>,
    locator_id: String,
}

impl HealingHistory {
    pub fn locator_id(&self) -> &str {
        &self.locator_id
    }

    /// Start a fresh pass over the records
    pub fn iter(&self) -> HistoryIter {
        HistoryIter {
            store: Arc::clone(&self.store),
            locator_id: self.locator_id.clone(),
            next: 0,
            end: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Read the whole history eagerly
    pub fn to_vec(&self) -> Result<Vec<HealingRecord>, LedgerError> {
        self.iter().collect()
    }
}

impl IntoIterator for &HealingHistory {
    type Item = Result<HealingRecord, LedgerError>;
    type IntoIter = HistoryIter;

    fn into_iter(self) -> HistoryIter {
        self.iter()
    }
}

/// One pass over a [`HealingHistory`]
///
/// The pass is bounded by the record count seen on the first read, so records
/// appended while iterating show up in the next pass.
pub struct HistoryIter {
    store: Arc<dyn LedgerStore>,
    locator_id: String,
    next: usize,
    end: Option<usize>,
    buffer: VecDeque<HealingRecord>,
    done: bool,
}

impl HistoryIter {
    fn fill(&mut self) -> Result<(), LedgerError> {
        let end = match self.end {
            Some(end) => end,
            None => {
                let end = self.store.count(&self.locator_id)?;
                self.end = Some(end);
                end
            }
        };
        if self.next >= end {
            return Ok(());
        }

        let upper = (self.next + HISTORY_PAGE_SIZE).min(end);
        let page = self.store.read_range(&self.locator_id, self.next..upper)?;
        self.next = upper;
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for HistoryIter {
    type Item = Result<HealingRecord, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.buffer.is_empty() {
            let filled = self.fill();
            if let Err(e) = filled {
                self.done = true;
                return Some(Err(e));
            }
        }
        match self.buffer.pop_front() {
            Some(record) => Some(Ok(record)),
            None => {
                self.done = true;
                None
            }
        }
    }
}
