use crate::error::LedgerError;
use crate::ledger::record::HealingRecord;
use crate::ledger::store::{LedgerStore, RecordIndex, clip, ordered_after};
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Append-only JSON-lines file, one [`HealingRecord`] per line
///
/// The file is read once on open and kept indexed in memory; appends go to the
/// file first and only become visible to readers once written. A final line
/// without its newline is a write cut short and is discarded on open.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    file: File,
    records: RecordIndex,
}

impl JsonlStore {
    /// Open (or create) a ledger file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let mut records = RecordIndex::new();
        let mut total = 0;
        let mut offset = 0;
        let mut torn_at = None;
        for (i, line) in contents.split_inclusive(|b| *b == b'\n').enumerate() {
            let start = offset;
            offset += line.len();
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let record: HealingRecord = match serde_json::from_slice(line) {
                Ok(record) => record,
                Err(e) if !line.ends_with(b"\n") => {
                    warn!(
                        "Discarding incomplete last line {} of ledger {}: {}",
                        i + 1,
                        path.display(),
                        e
                    );
                    torn_at = Some(start);
                    break;
                }
                Err(e) => {
                    return Err(LedgerError::Corrupt {
                        line: i + 1,
                        reason: e.to_string(),
                    });
                }
            };
            records.entry(record.locator_id.clone()).or_default().push(record);
            total += 1;
        }

        match torn_at {
            Some(len) => file.set_len(len as u64)?,
            None if contents.last().is_some_and(|b| *b != b'\n') => file.write_all(b"\n")?,
            None => {}
        }

        debug!("Opened ledger {} with {} records", path.display(), total);

        Ok(Self {
            path,
            inner: RwLock::new(Inner { file, records }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonlStore {
    fn append(&self, record: HealingRecord) -> Result<HealingRecord, LedgerError> {
        let mut inner = self.inner.write().map_err(|_| LedgerError::Poisoned)?;
        let Inner { file, records } = &mut *inner;

        let record = ordered_after(records.get(&record.locator_id).and_then(|r| r.last()), record);

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()?;

        records
            .entry(record.locator_id.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn count(&self, locator_id: &str) -> Result<usize, LedgerError> {
        let inner = self.inner.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(inner.records.get(locator_id).map_or(0, Vec::len))
    }

    fn read_range(&self, locator_id: &str, range: Range<usize>) -> Result<Vec<HealingRecord>, LedgerError> {
        let inner = self.inner.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(inner
            .records
            .get(locator_id)
            .map(|entries| clip(entries, range))
            .unwrap_or_default())
    }

    fn locator_ids(&self) -> Result<Vec<String>, LedgerError> {
        let inner = self.inner.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(inner.records.keys().cloned().collect())
    }
}
