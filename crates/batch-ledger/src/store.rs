use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use alloy_primitives::Address;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{AccountPatch, BatchError, BatchResult, Ledger};

/// Read the ledger at `path`. A missing file yields an empty ledger.
pub fn load(path: &Path) -> BatchResult<Ledger> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No ledger file yet, starting from an empty one");
            return Ok(Ledger::default());
        }
        Err(source) => {
            return Err(BatchError::Persistence {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let ledger: Ledger =
        serde_json::from_str(&content).map_err(|e| BatchError::CorruptLedger {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    for drift in ledger.drifted_totals()? {
        warn!(
            total = %drift.name,
            stored = %drift.stored,
            derived = %drift.derived,
            "Stored total differs from the sum over accounts"
        );
    }
    info!(path = %path.display(), accounts = ledger.len(), "Loaded ledger");
    Ok(ledger)
}

/// Write `ledger` to `path` so that a crash leaves either the old or the new file, never a torn
/// one: the document goes to a temporary file in the same directory, is synced, then renamed.
pub fn save(ledger: &Ledger, path: &Path) -> BatchResult<()> {
    let persistence_error = |source: io::Error| BatchError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let mut document =
        serde_json::to_string_pretty(ledger).map_err(|e| persistence_error(e.into()))?;
    document.push('\n');

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(directory).map_err(persistence_error)?;
    file.write_all(document.as_bytes())
        .map_err(persistence_error)?;
    file.as_file().sync_all().map_err(persistence_error)?;
    file.persist(path).map_err(|e| persistence_error(e.error))?;

    debug!(path = %path.display(), accounts = ledger.len(), "Ledger saved");
    Ok(())
}

/// A ledger bound to its file. Every mutation is flushed before the call returns.
#[derive(Debug)]
pub struct LedgerStore {
    path: PathBuf,
    ledger: Ledger,
}

impl LedgerStore {
    pub fn open(path: impl Into<PathBuf>) -> BatchResult<Self> {
        let path = path.into();
        let ledger = load(&path)?;
        Ok(Self { path, ledger })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Upsert one account and persist the whole ledger.
    ///
    /// If saving fails the in-memory ledger is rolled back, so memory never runs ahead of disk.
    pub fn upsert_and_save(
        &mut self,
        address: Address,
        patch: AccountPatch,
    ) -> BatchResult<()> {
        let snapshot = self.ledger.clone();
        self.ledger.upsert_account(address, patch)?;
        if let Err(e) = save(&self.ledger, &self.path) {
            self.ledger = snapshot;
            return Err(e);
        }
        Ok(())
    }

    /// Pin a run parameter (see [`Ledger::pin_meta`]) and persist.
    pub fn pin_meta(&mut self, key: &str, value: &str) -> BatchResult<()> {
        if self.ledger.meta(key) == Some(value) {
            return Ok(());
        }
        self.ledger.pin_meta(key, value)?;
        self.save()
    }

    pub fn set_meta(&mut self, key: &str, value: &str) -> BatchResult<()> {
        self.ledger.set_meta(key, value);
        self.save()
    }

    pub fn ensure_total(&mut self, name: &str) -> BatchResult<()> {
        if self.ledger.totals().contains_key(name) {
            return Ok(());
        }
        self.ledger.ensure_total(name);
        self.save()
    }

    pub fn save(&self) -> BatchResult<()> {
        save(&self.ledger, &self.path)
    }
}
