use crate::error::LedgerError;
use crate::ledger::record::HealingRecord;
use indexmap::IndexMap;
use std::ops::Range;
use std::sync::RwLock;

/// Append-only log of healing records keyed by locator id
///
/// Appends for one locator are totally ordered; readers only ever observe a
/// prefix of that order.
pub trait LedgerStore: Send + Sync {
    /// Append a record and return it as stored
    fn append(&self, record: HealingRecord) -> Result<HealingRecord, LedgerError>;

    /// Number of records for a locator
    fn count(&self, locator_id: &str) -> Result<usize, LedgerError>;

    /// Records `range` (positions in append order) for a locator, clipped to what exists
    fn read_range(&self, locator_id: &str, range: Range<usize>) -> Result<Vec<HealingRecord>, LedgerError>;

    /// Every locator id with at least one record, in first-seen order
    fn locator_ids(&self) -> Result<Vec<String>, LedgerError>;
}

/// Records of all locators, in append order
pub(crate) type RecordIndex = IndexMap<String, Vec<HealingRecord>>;

/// Keep a locator's timestamps non-decreasing even if the wall clock steps back
pub(crate) fn ordered_after(last: Option<&HealingRecord>, mut record: HealingRecord) -> HealingRecord {
    if let Some(last) = last.filter(|last| last.timestamp > record.timestamp) {
        record.timestamp = last.timestamp;
    }
    record
}

pub(crate) fn clip(records: &[HealingRecord], range: Range<usize>) -> Vec<HealingRecord> {
    let end = range.end.min(records.len());
    let start = range.start.min(end);
    records[start..end].to_vec()
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<RecordIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn append(&self, record: HealingRecord) -> Result<HealingRecord, LedgerError> {
        let mut records = self.records.write().map_err(|_| LedgerError::Poisoned)?;
        let entries = records.entry(record.locator_id.clone()).or_default();

        let record = ordered_after(entries.last(), record);
        entries.push(record.clone());
        Ok(record)
    }

    fn count(&self, locator_id: &str) -> Result<usize, LedgerError> {
        let records = self.records.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(records.get(locator_id).map_or(0, Vec::len))
    }

    fn read_range(&self, locator_id: &str, range: Range<usize>) -> Result<Vec<HealingRecord>, LedgerError> {
        let records = self.records.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(records
            .get(locator_id)
            .map(|entries| clip(entries, range))
            .unwrap_or_default())
    }

    fn locator_ids(&self) -> Result<Vec<String>, LedgerError> {
        let records = self.records.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(records.keys().cloned().collect())
    }
}
