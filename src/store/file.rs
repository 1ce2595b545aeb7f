//! File-backed rollup store
//!
//! - Append-only `rollups.dat`, one checksummed frame per write
//! - A write is not acknowledged before an fsync covering it returns
//! - Appends are serialized; fsync runs outside the append lock, and one
//!   fsync covers every frame appended before it started (group commit by
//!   concurrent arrival, no timers)
//! - Latest frame per key wins; the key index is rebuilt by scanning on open
//! - A torn final frame (shorter than its header or its length) is cut off
//!   on open with a warning
//! - A checksum or length failure in a complete frame is corruption (fatal)
//! - Re-writing a bit-identical record appends nothing

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::errors::{StoreError, StoreResult};
use super::frame::{Frame, MIN_FRAME_SIZE};
use super::{RollupStore, UpsertOutcome};
use crate::ledger::Period;
use crate::observability::{log_event_with_fields, Event};
use crate::rollup::{RollupKey, RollupRecord};

const STORE_FILE: &str = "rollups.dat";

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    len: u32,
    payload_checksum: u32,
}

struct Inner {
    appender: File,
    reader: File,
    end: u64,
    slots: HashMap<RollupKey, Slot>,
}

/// fsync side of the file, locked separately from appends
struct Durability {
    file: File,
    synced_to: u64,
    syncs: u64,
}

/// Result of scanning the data file on open
struct Scan {
    slots: HashMap<RollupKey, Slot>,
    end: u64,
    size: u64,
}

/// Durable [`RollupStore`] over a single append-only file.
pub struct FileRollupStore {
    path: PathBuf,
    inner: Mutex<Inner>,
    durable: Mutex<Durability>,
}

impl FileRollupStore {
    /// Open or create `<dir>/rollups.dat`, creating `dir` if needed.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                StoreError::io(format!("Failed to create store directory {}", dir.display()), e)
            })?;
        }
        let path = dir.join(STORE_FILE);

        let appender = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(format!("Failed to open {}", path.display()), e))?;
        let reader = File::open(&path)
            .map_err(|e| StoreError::io(format!("Failed to open {}", path.display()), e))?;

        let Scan { slots, end, size } = Self::scan(&path)?;
        if end < size {
            appender
                .set_len(end)
                .and_then(|_| appender.sync_all())
                .map_err(|e| StoreError::io(format!("Failed to cut torn tail of {}", path.display()), e))?;
            log_event_with_fields(
                Event::StoreTailTruncated,
                &[
                    ("path", &path.display().to_string()),
                    ("offset", &end.to_string()),
                    ("dropped_bytes", &(size - end).to_string()),
                ],
            );
        }
        let syncer = appender
            .try_clone()
            .map_err(|e| StoreError::io(format!("Failed to open {}", path.display()), e))?;

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                appender,
                reader,
                end,
                slots,
            }),
            durable: Mutex::new(Durability {
                file: syncer,
                synced_to: end,
                syncs: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rebuild the key index by reading every frame. Stops at a torn final
    /// frame and reports where the good frames end.
    fn scan(path: &Path) -> StoreResult<Scan> {
        let file = File::open(path)
            .map_err(|e| StoreError::io(format!("Failed to open {}", path.display()), e))?;
        let size = file
            .metadata()
            .map_err(|e| StoreError::io("Failed to read store metadata", e))?
            .len();
        let mut reader = BufReader::new(file);
        let mut slots = HashMap::new();
        let mut offset = 0u64;

        while offset < size {
            let remaining = size - offset;
            if remaining < MIN_FRAME_SIZE as u64 {
                break;
            }

            let mut len_buf = [0u8; 4];
            reader
                .read_exact(&mut len_buf)
                .map_err(|e| StoreError::corruption(offset, e.to_string()))?;
            let len = u32::from_le_bytes(len_buf);
            if (len as usize) < MIN_FRAME_SIZE {
                return Err(StoreError::corruption(
                    offset,
                    format!("invalid frame length {}", len),
                ));
            }
            if len as u64 > remaining {
                break;
            }

            let mut bytes = vec![0u8; len as usize];
            bytes[..4].copy_from_slice(&len_buf);
            reader
                .read_exact(&mut bytes[4..])
                .map_err(|e| StoreError::corruption(offset, e.to_string()))?;
            let frame = Frame::deserialize(&bytes)
                .map_err(|e| StoreError::corruption(offset, e.to_string()))?;

            let slot = Slot {
                offset,
                len,
                payload_checksum: frame.payload_checksum(),
            };
            slots.insert(frame.key, slot);
            offset += len as u64;
        }

        Ok(Scan {
            slots,
            end: offset,
            size,
        })
    }

    /// Block until everything up to `target` is on disk. A caller whose
    /// frame was covered by a concurrent fsync returns without its own.
    fn sync_through(&self, target: u64) -> StoreResult<()> {
        let mut durable = self.durable.lock().map_err(|_| StoreError::LockPoisoned)?;
        if durable.synced_to >= target {
            return Ok(());
        }
        let upto = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?.end;
        durable
            .file
            .sync_all()
            .map_err(|e| StoreError::io(format!("Failed to sync {}", self.path.display()), e))?;
        durable.synced_to = upto;
        durable.syncs += 1;
        Ok(())
    }

    fn read_slot(inner: &mut Inner, slot: Slot) -> StoreResult<Vec<u8>> {
        let mut bytes = vec![0u8; slot.len as usize];
        inner
            .reader
            .seek(SeekFrom::Start(slot.offset))
            .and_then(|_| inner.reader.read_exact(&mut bytes))
            .map_err(|e| StoreError::io(format!("Failed to read frame at {}", slot.offset), e))?;
        Ok(bytes)
    }

    fn decode_slot(inner: &mut Inner, slot: Slot) -> StoreResult<RollupRecord> {
        let bytes = Self::read_slot(inner, slot)?;
        let frame = Frame::deserialize(&bytes)
            .map_err(|e| StoreError::corruption(slot.offset, e.to_string()))?;
        RollupRecord::decode(&frame.payload)
            .map_err(|e| StoreError::corruption(slot.offset, format!("bad payload: {}", e)))
    }
}

impl RollupStore for FileRollupStore {
    fn upsert(&self, record: &RollupRecord) -> StoreResult<UpsertOutcome> {
        let key = record.key();
        let payload = record.encode().map_err(|e| StoreError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let frame = Frame::new(key, payload);
        let bytes = frame.serialize();
        let payload_checksum = frame.payload_checksum();

        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;

        let previous = inner.slots.get(&frame.key).copied();
        if let Some(slot) = previous {
            if slot.payload_checksum == payload_checksum && slot.len as usize == bytes.len() {
                let existing = Self::read_slot(&mut inner, slot)?;
                if existing == bytes {
                    drop(inner);
                    self.sync_through(slot.offset + slot.len as u64)?;
                    return Ok(UpsertOutcome::Unchanged);
                }
            }
        }

        let offset = inner.end;
        if let Err(e) = inner.appender.write_all(&bytes) {
            // drop the partial frame so the next append starts at `end`
            let _ = inner.appender.set_len(offset);
            return Err(StoreError::io(format!("Failed to append {}", frame.key), e));
        }

        inner.end += bytes.len() as u64;
        let slot = Slot {
            offset,
            len: bytes.len() as u32,
            payload_checksum,
        };
        inner.slots.insert(frame.key.clone(), slot);
        let target = inner.end;
        drop(inner);

        if let Err(e) = self.sync_through(target) {
            // not durable: stop serving the frame so a retry appends again
            if let Ok(mut inner) = self.inner.lock() {
                if inner.slots.get(&frame.key).map(|s| s.offset) == Some(offset) {
                    match previous {
                        Some(prev) => inner.slots.insert(frame.key, prev),
                        None => inner.slots.remove(&frame.key),
                    };
                }
            }
            return Err(e);
        }

        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }

    fn get(&self, key: &RollupKey) -> StoreResult<Option<RollupRecord>> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        match inner.slots.get(key).copied() {
            Some(slot) => Self::decode_slot(&mut inner, slot).map(Some),
            None => Ok(None),
        }
    }

    fn list_period(&self, period: &Period) -> StoreResult<Vec<RollupRecord>> {
        let period_key = period.key();
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut wanted: Vec<(RollupKey, Slot)> = inner
            .slots
            .iter()
            .filter(|(k, _)| k.period == period_key)
            .map(|(k, s)| (k.clone(), *s))
            .collect();
        wanted.sort_by(|a, b| a.0.cmp(&b.0));

        wanted
            .into_iter()
            .map(|(_, slot)| Self::decode_slot(&mut inner, slot))
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.lock().map(|i| i.slots.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(node: &str, team: &str) -> RollupRecord {
        RollupRecord {
            node_id: node.into(),
            period: Period::month(2026, 9, 0).unwrap(),
            personal: "1.00".parse().unwrap(),
            first_line: "0.00".parse().unwrap(),
            team: team.parse().unwrap(),
            direct_count: 0,
            active_direct_count: 0,
            team_size: 1,
            personal_events: 1,
            team_events: 1,
            snapshot_fingerprint: "crc32:00000001".into(),
        }
    }

    #[test]
    fn test_insert_update_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = FileRollupStore::open(dir.path()).unwrap();

        assert_eq!(store.upsert(&record("a", "1.00")).unwrap(), UpsertOutcome::Inserted);
        let size_after_insert = fs::metadata(store.path()).unwrap().len();

        assert_eq!(store.upsert(&record("a", "1.00")).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(fs::metadata(store.path()).unwrap().len(), size_after_insert);

        assert_eq!(store.upsert(&record("a", "2.00")).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.len(), 1);

        let key = record("a", "2.00").key();
        assert_eq!(store.get(&key).unwrap().unwrap().team.to_string(), "2.00");
    }

    #[test]
    fn test_reopen_latest_wins() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileRollupStore::open(dir.path()).unwrap();
            store.upsert(&record("a", "1.00")).unwrap();
            store.upsert(&record("b", "5.00")).unwrap();
            store.upsert(&record("a", "3.00")).unwrap();
        }
        let store = FileRollupStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        let a = store.get(&record("a", "0").key()).unwrap().unwrap();
        assert_eq!(a.team.to_string(), "3.00");

        let listed = store.list_period(&Period::month(2026, 9, 0).unwrap()).unwrap();
        let ids: Vec<&str> = listed.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_corruption_detected_on_open() {
        let dir = TempDir::new().unwrap();
        let path = {
            let store = FileRollupStore::open(dir.path()).unwrap();
            store.upsert(&record("a", "1.00")).unwrap();
            store.path().to_path_buf()
        };
        let mut bytes = fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = FileRollupStore::open(dir.path()).err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(err.code(), "ROLLUP_STORE_CORRUPTION");
    }

    #[test]
    fn test_torn_tail_cut_on_open() {
        let dir = TempDir::new().unwrap();
        let path = {
            let store = FileRollupStore::open(dir.path()).unwrap();
            store.upsert(&record("a", "1.00")).unwrap();
            store.path().to_path_buf()
        };
        let good_len = fs::metadata(&path).unwrap().len();
        let next = Frame::new(record("b", "2.00").key(), record("b", "2.00").encode().unwrap());
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&next.serialize()[..10]).unwrap();
        drop(file);

        let store = FileRollupStore::open(dir.path()).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
        assert_eq!(store.len(), 1);
        let a = store.get(&record("a", "0").key()).unwrap().unwrap();
        assert_eq!(a.team.to_string(), "1.00");

        assert_eq!(store.upsert(&record("b", "2.00")).unwrap(), UpsertOutcome::Inserted);
        drop(store);
        let reopened = FileRollupStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_frame_running_past_end_is_cut() {
        let dir = TempDir::new().unwrap();
        let path = {
            let store = FileRollupStore::open(dir.path()).unwrap();
            store.upsert(&record("a", "1.00")).unwrap();
            store.upsert(&record("b", "2.00")).unwrap();
            store.path().to_path_buf()
        };
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let store = FileRollupStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(&record("b", "0").key()).unwrap().is_none());
        assert!(fs::metadata(&path).unwrap().len() < bytes.len() as u64 - 3);
    }

    #[test]
    fn test_bad_length_in_body_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = {
            let store = FileRollupStore::open(dir.path()).unwrap();
            store.upsert(&record("a", "1.00")).unwrap();
            store.upsert(&record("b", "2.00")).unwrap();
            store.path().to_path_buf()
        };
        let mut bytes = fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&1u32.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let err = FileRollupStore::open(dir.path()).err().unwrap();
        assert_eq!(err.code(), "ROLLUP_STORE_CORRUPTION");
    }

    #[test]
    fn test_concurrent_upserts_share_syncs() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(FileRollupStore::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let outcome = store.upsert(&record(&format!("t{}-{}", t, i), "1.00")).unwrap();
                        assert_eq!(outcome, UpsertOutcome::Inserted);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let syncs = store.durable.lock().unwrap().syncs;
        assert!((1..=200).contains(&syncs));
        assert_eq!(store.durable.lock().unwrap().synced_to, fs::metadata(store.path()).unwrap().len());
        drop(store);

        let reopened = FileRollupStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 200);
    }

    #[test]
    fn test_unchanged_write_does_not_sync() {
        let dir = TempDir::new().unwrap();
        let store = FileRollupStore::open(dir.path()).unwrap();
        store.upsert(&record("a", "1.00")).unwrap();
        store.upsert(&record("a", "1.00")).unwrap();
        assert_eq!(store.durable.lock().unwrap().syncs, 1);
    }

    #[test]
    fn test_missing_key() {
        let dir = TempDir::new().unwrap();
        let store = FileRollupStore::open(&dir.path().join("nested")).unwrap();
        assert!(store.get(&record("nobody", "0").key()).unwrap().is_none());
        assert!(store.is_empty());
    }
}
