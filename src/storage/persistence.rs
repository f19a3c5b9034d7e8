//! Snapshot persistence for the state store.

use super::codec;
use super::state::StateStore;
use crate::core::{LogError, Payload, Result, Subject};
use crate::replication::MergePolicy;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// ============================================================================
// Stream Snapshots
// ============================================================================

/// Encodes every live entry and every ledger tombstone into `writer`.
///
/// Returns the number of bytes written.
pub fn write_snapshot<K, P, W>(store: &StateStore<K, P>, mut writer: W) -> Result<u64>
where
    K: Subject,
    P: Payload,
    W: Write,
{
    let mut buf = Vec::new();
    let mut written = 0u64;
    for entry in store.iter().map(|(_, e)| e).chain(store.tombstones()) {
        buf.clear();
        written += codec::encode_into(&mut buf, entry)? as u64;
        writer
            .write_all(&buf)
            .map_err(|e| LogError::IoError(format!("Failed to write snapshot: {}", e)))?;
    }
    writer
        .flush()
        .map_err(|e| LogError::IoError(format!("Failed to flush snapshot: {}", e)))?;
    Ok(written)
}

/// Rebuilds a fresh store from a snapshot stream.
///
/// Entries are restored as they were written, expired or not; the next GC
/// pass decides their fate. When a subject appears twice, `policy` picks the
/// survivor exactly as a gossip merge would.
pub fn load_snapshot<K, P, M, R>(reader: R, policy: &M) -> Result<StateStore<K, P>>
where
    K: Subject,
    P: Payload,
    M: MergePolicy,
    R: Read,
{
    let mut store = StateStore::new();
    for entry in codec::decode_all::<K, P, _>(reader)? {
        if entry.is_tombstone() {
            let newer = store
                .tombstone(&entry.subject)
                .is_none_or(|t| t.timestamp < entry.timestamp);
            if newer {
                store.put_tombstone(entry);
            }
        } else {
            let newer = store
                .get(&entry.subject)
                .is_none_or(|held| policy.supersedes(held, &entry));
            if newer {
                store.put(entry);
            }
        }
    }
    Ok(store)
}

// ============================================================================
// Replace-on-write Files
// ============================================================================

/// A snapshot file being written.
///
/// Bytes go to a temporary file next to the destination. `commit` syncs it
/// and renames it over the destination; dropping without committing removes
/// the temporary file, so readers only ever see complete snapshots.
pub struct ReplaceFile {
    writer: BufWriter<NamedTempFile>,
    destination: PathBuf,
}

impl ReplaceFile {
    pub fn create<P: AsRef<Path>>(destination: P) -> Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| LogError::IoError(format!("Failed to create snapshot directory: {}", e)))?;
        let temp = NamedTempFile::new_in(&dir)
            .map_err(|e| LogError::IoError(format!("Failed to create temp file: {}", e)))?;
        Ok(Self {
            writer: BufWriter::new(temp),
            destination,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn commit(self) -> Result<()> {
        let temp = self
            .writer
            .into_inner()
            .map_err(|e| LogError::IoError(format!("Failed to flush snapshot: {}", e.error())))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| LogError::IoError(format!("Failed to sync snapshot: {}", e)))?;
        temp.persist(&self.destination)
            .map_err(|e| LogError::IoError(format!("Failed to rename snapshot: {}", e.error)))?;
        Ok(())
    }
}

impl Write for ReplaceFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn save<K: Subject, P: Payload>(&self, store: &StateStore<K, P>) -> Result<u64> {
        let mut file = ReplaceFile::create(&self.snapshot_path)?;
        let size = write_snapshot(store, &mut file)?;
        file.commit()?;
        Ok(size)
    }

    /// `Ok(None)` when no snapshot has been written yet.
    pub fn load<K: Subject, P: Payload, M: MergePolicy>(&self, policy: &M) -> Result<Option<StateStore<K, P>>> {
        let file = match File::open(&self.snapshot_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LogError::IoError(format!("Failed to open snapshot: {}", e)));
            }
        };
        load_snapshot(BufReader::new(file), policy).map(Some)
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Entry;
    use crate::replication::{AppendOnly, Tombstoning};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn populated() -> StateStore<String, Vec<u64>> {
        let mut store = StateStore::new();
        store.put(Entry::new("a".to_string(), vec![1, 2], t0(), t0() + Duration::hours(1)));
        store.put(Entry::new("b".to_string(), vec![], t0(), t0() + Duration::minutes(1)));
        store.put_tombstone(Entry::tombstone("c".to_string(), vec![], t0()));
        store
    }

    #[test]
    fn test_stream_snapshot_round_trip() {
        let store = populated();
        let mut buf = Vec::new();
        let written = write_snapshot(&store, &mut buf).unwrap();
        assert_eq!(written as usize, buf.len());

        let loaded: StateStore<String, Vec<u64>> = load_snapshot(buf.as_slice(), &AppendOnly).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_snapshot_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path().join("state.snap"));
        assert!(!manager.exists());

        let size = manager.save(&populated()).unwrap();
        assert!(size > 0);
        assert!(manager.exists());

        let loaded = manager.load::<String, Vec<u64>, _>(&AppendOnly).unwrap().unwrap();
        assert_eq!(loaded, populated());
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path().join("absent.snap"));
        assert!(manager.load::<String, (), _>(&AppendOnly).unwrap().is_none());
    }

    #[test]
    fn test_uncommitted_replace_file_leaves_nothing_behind() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("state.snap");
        {
            let mut file = ReplaceFile::create(&destination).unwrap();
            file.write_all(b"partial").unwrap();
        }
        assert!(!destination.exists());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_commit_replaces_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("state.snap");
        fs::write(&destination, b"old contents").unwrap();

        let mut file = ReplaceFile::create(&destination).unwrap();
        file.write_all(b"new").unwrap();
        file.commit().unwrap();

        assert_eq!(fs::read(&destination).unwrap(), b"new");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_duplicate_subjects_resolved_by_policy() {
        let short = Entry::new("a".to_string(), vec![1u64], t0(), t0() + Duration::minutes(1));
        let refreshed = Entry::new("a".to_string(), vec![1u64], t0(), t0() + Duration::minutes(5));
        let mut buf = Vec::new();
        codec::encode_into(&mut buf, &short).unwrap();
        codec::encode_into(&mut buf, &refreshed).unwrap();

        let append_only: StateStore<String, Vec<u64>> = load_snapshot(buf.as_slice(), &AppendOnly).unwrap();
        assert_eq!(append_only.get(&"a".to_string()), Some(&short));

        let tombstoning: StateStore<String, Vec<u64>> =
            load_snapshot(buf.as_slice(), &Tombstoning::new()).unwrap();
        assert_eq!(tombstoning.get(&"a".to_string()), Some(&refreshed));
    }
}
