//! Durable record of fully synchronized recordings.
//!
//! The ledger is a plain text log with one meeting id per line. An id is
//! appended only after every file of the recording was verified on disk and
//! the remote copy was deleted (or deletion is disabled). Entries are never
//! removed, so a crash at any point leaves the ledger either without the
//! entry (the recording is retried) or with it (the recording is done).

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use recsync_core::MeetingId;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from reading or appending to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The log exists but could not be read.
    #[error("failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry could not be durably appended.
    #[error("failed to append to ledger {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The id cannot be stored on a single line.
    #[error("meeting id cannot be stored in the ledger: {0:?}")]
    InvalidId(String),
}

/// The set of recordings that are fully synchronized.
///
/// Mutation takes `&mut self`: there is exactly one writer per run.
#[derive(Debug)]
pub struct CompletionLedger {
    path: PathBuf,
    entries: HashSet<MeetingId>,
    order: Vec<MeetingId>,
    // Last line was cut short by a crash; terminate it before appending.
    needs_newline: bool,
}

impl CompletionLedger {
    /// Loads the ledger at `path`.
    ///
    /// A missing file is an empty ledger. Blank and duplicate lines are
    /// ignored.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger yet, starting empty");
                String::new()
            }
            Err(source) => return Err(LedgerError::Read { path, source }),
        };

        let mut ledger = Self {
            path,
            entries: HashSet::new(),
            order: Vec::new(),
            needs_newline: !contents.is_empty() && !contents.ends_with('\n'),
        };
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            ledger.insert(MeetingId::new(line));
        }

        info!(
            path = %ledger.path.display(),
            entries = ledger.len(),
            "loaded completion ledger"
        );
        Ok(ledger)
    }

    /// Returns the path of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the recording is fully synchronized.
    pub fn is_complete(&self, meeting_id: &MeetingId) -> bool {
        self.entries.contains(meeting_id)
    }

    /// Durably records a recording as complete.
    ///
    /// Returns `false` without touching the log if the id is already present.
    /// The in-memory set is only updated once the line is on disk.
    pub fn mark_complete(&mut self, meeting_id: &MeetingId) -> Result<bool, LedgerError> {
        if self.is_complete(meeting_id) {
            return Ok(false);
        }
        let id = meeting_id.as_str();
        if id.trim().is_empty() || id.trim() != id || id.contains(['\n', '\r']) {
            return Err(LedgerError::InvalidId(id.to_string()));
        }

        self.append_line(id).map_err(|source| LedgerError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.needs_newline = false;
        self.insert(meeting_id.clone());

        debug!(meeting_id = %meeting_id, "recording marked complete");
        Ok(true)
    }

    /// Number of completed recordings.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing has been completed yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Completed ids in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &MeetingId> {
        self.order.iter()
    }

    fn insert(&mut self, meeting_id: MeetingId) {
        if self.entries.insert(meeting_id.clone()) {
            self.order.push(meeting_id);
        }
    }

    fn append_line(&self, id: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if self.needs_newline {
            writeln!(file)?;
        }
        writeln!(file, "{}", id)?;
        file.sync_all()
    }
}
