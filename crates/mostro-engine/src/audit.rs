//! Append-only audit journal.
//!
//! Every attempted action leaves exactly one JSON-lines entry with its
//! final outcome. The journal is never truncated or reordered.

use std::fs::OpenOptions;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Final outcome of an attempted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    Success,
    Failed,
    Pending,
    Rejected,
}

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unix timestamp.
    pub timestamp: i64,
    /// Protocol action attempted.
    pub action: String,
    pub order_id: Option<Uuid>,
    pub fiat_amount: Option<i64>,
    pub fiat_code: Option<String>,
    pub result: AuditResult,
    pub details: Option<String>,
}

impl AuditEntry {
    pub fn new(action: &str, result: AuditResult) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            action: action.to_string(),
            order_id: None,
            fiat_amount: None,
            fiat_code: None,
            result,
            details: None,
        }
    }

    pub fn order_id(mut self, order_id: Option<Uuid>) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn fiat(mut self, amount: Option<i64>, code: Option<&str>) -> Self {
        self.fiat_amount = amount;
        self.fiat_code = code.map(str::to_string);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// JSON-lines journal with owner-only permissions.
pub struct AuditJournal {
    path: PathBuf,
}

impl AuditJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one entry. Never rewrites existing lines.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Read the journal back, skipping unparseable lines.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        Ok(text
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_is_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::new(dir.path().join("audit.log"));

        journal
            .append(&AuditEntry::new("new-order", AuditResult::Success).details("first"))
            .unwrap();
        journal
            .append(&AuditEntry::new("cancel", AuditResult::Failed).details("second"))
            .unwrap();
        journal
            .append(&AuditEntry::new("release", AuditResult::Pending))
            .unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, "new-order");
        assert_eq!(entries[1].action, "cancel");
        assert_eq!(entries[2].action, "release");
        assert_eq!(entries[2].result, AuditResult::Pending);
    }

    #[test]
    fn rejected_entries_carry_the_reason() {
        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::new(dir.path().join("audit.log"));

        journal
            .append(
                &AuditEntry::new("new-order", AuditResult::Rejected)
                    .fiat(Some(1000), Some("USD"))
                    .details("amount 3333333 exceeds max trade amount 50000"),
            )
            .unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries[0].result, AuditResult::Rejected);
        assert_eq!(entries[0].fiat_code.as_deref(), Some("USD"));
        assert!(entries[0].details.as_deref().unwrap().contains("exceeds"));
    }

    #[test]
    fn malformed_lines_are_skipped_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let journal = AuditJournal::new(&path);

        journal
            .append(&AuditEntry::new("rate", AuditResult::Success))
            .unwrap();
        // Simulate a torn write from a crashed process.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ torn").unwrap();
        journal
            .append(&AuditEntry::new("cancel", AuditResult::Success))
            .unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn journal_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::new(dir.path().join("audit.log"));
        journal
            .append(&AuditEntry::new("new-order", AuditResult::Success))
            .unwrap();

        let mode = std::fs::metadata(journal.path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
