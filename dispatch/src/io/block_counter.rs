//! Block counters kept outside the State Store, one file per (run, session).

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::BlockCounterRecord;
use crate::io::atomic::write_json_atomic;

#[derive(Debug, Clone)]
pub struct BlockCounterStore {
    dir: PathBuf,
}

impl BlockCounterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, run: &str, session: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}.json", sanitize(run), sanitize(session)))
    }

    /// Missing or unreadable counters read as `None` (count 0).
    pub fn load(&self, run: &str, session: &str) -> Option<BlockCounterRecord> {
        let path = self.path(run, session);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(path = %path.display(), err = %err, "ignoring corrupt block counter");
                None
            }
        }
    }

    pub fn save(&self, run: &str, session: &str, record: &BlockCounterRecord) -> Result<()> {
        write_json_atomic(&self.path(run, session), record)
    }

    pub fn clear(&self, run: &str, session: &str) -> Result<()> {
        let path = self.path(run, session);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
        }
    }
}

/// Injective file-name component: `[A-Za-z0-9-]` pass through, every other
/// byte becomes `_xx`. The `.` joining run and session never appears inside.
fn sanitize(part: &str) -> String {
    if part.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DispatchState;

    #[test]
    fn save_load_clear() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = BlockCounterStore::new(temp.path());
        let state = DispatchState::dispatched("t0");
        let record = BlockCounterRecord::next(2, &state);

        assert!(store.load("demo", "S1").is_none());
        store.save("demo", "S1", &record).expect("save");
        assert_eq!(store.load("demo", "S1"), Some(record));

        store.clear("demo", "S1").expect("clear");
        store.clear("demo", "S1").expect("clear twice");
        assert!(store.load("demo", "S1").is_none());
    }

    #[test]
    fn names_are_single_path_components() {
        let store = BlockCounterStore::new("/c");
        assert_eq!(
            store.path("demo", "../../etc"),
            PathBuf::from("/c/demo._2e_2e_2f_2e_2e_2fetc.json")
        );
        assert_eq!(store.path("demo", ""), PathBuf::from("/c/demo._.json"));
    }

    #[test]
    fn distinct_names_never_share_a_file() {
        let store = BlockCounterStore::new("/c");
        assert_ne!(store.path("a.b", "S1"), store.path("a_b", "S1"));
        assert_ne!(store.path("a", "b.c"), store.path("a.b", "c"));
        assert_eq!(store.path("run-1", "S1"), PathBuf::from("/c/run-1.S1.json"));
    }
}
