//! Journal domain model.
//!
//! A journal is the append-only, line-oriented event log kept next to every
//! job descriptor. Each line is `source :: key[ :: value]`. The file format is
//! shared with existing tooling and must stay byte-compatible.
//!
//! The journal is parsed once into typed entries; all queries (current status,
//! last known outcome fields, submission counts) run on the parsed view.

use std::fmt;

use super::failure::FailureKind;
use super::job_status::JobStatus;

/// Field separator of the on-disk format.
pub const SEPARATOR: &str = " :: ";

/// Journal keys written by this crate and by the solver worker.
pub mod keys {
    pub const STATUS: &str = "status";
    pub const SUBMISSION_ID: &str = "submissionId";
    pub const SUBMISSION_TIME: &str = "submissionTime";
    pub const SUBMISSION_ERROR: &str = "submissionError";
    pub const REPLACED_WITH: &str = "replacedWith";
    pub const ERROR_KIND: &str = "errorKind";
    pub const ERROR: &str = "error";
    pub const RESULT: &str = "result";
    pub const MESSAGE: &str = "message";
    pub const TERMINATE_REASON: &str = "terminateReason";
    pub const PRIMAL_OBJECTIVE: &str = "primalObjective";
    pub const DUAL_OBJECTIVE: &str = "dualObjective";
    pub const DUALITY_GAP: &str = "dualityGap";
    pub const PRIMAL_ERROR: &str = "primalError";
    pub const DUAL_ERROR: &str = "dualError";
    pub const RUNTIME: &str = "runtime";
}

/// Source tags identifying which component wrote an entry.
pub mod sources {
    /// The lifecycle driver (submission side)
    pub const DRIVER: &str = "sub";
    /// The decision engine
    pub const ANALYZER: &str = "ana";
    /// The worker running the solver on a compute node
    pub const WORKER: &str = "wrk";
    /// Manual operator actions from the CLI
    pub const OPERATOR: &str = "cli";
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub source: String,
    pub key: String,
    pub value: Option<String>,
}

impl JournalEntry {
    /// Entry without a value field.
    pub fn new(source: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
            value: None,
        }
    }

    /// Entry with a value, rendered through `Display`.
    pub fn with_value(
        source: impl Into<String>,
        key: impl Into<String>,
        value: impl fmt::Display,
    ) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
            value: Some(value.to_string()),
        }
    }

    /// A `status` entry.
    pub fn status(source: impl Into<String>, status: JobStatus) -> Self {
        Self::with_value(source, keys::STATUS, status)
    }

    /// Parse one line. Lines with fewer than two fields yield `None` and are
    /// skipped by readers rather than treated as errors.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut fields = line.splitn(3, SEPARATOR);
        let source = fields.next()?;
        let key = fields.next()?;
        if source.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self {
            source: source.to_string(),
            key: key.to_string(),
            value: fields.next().map(str::to_string),
        })
    }

    /// Render the entry as one newline-terminated line.
    ///
    /// Embedded line breaks would split the entry in two, so they are
    /// flattened to spaces.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(
            self.source.len() + self.key.len() + self.value.as_ref().map_or(0, String::len) + 8,
        );
        line.push_str(&flatten(&self.source));
        line.push_str(SEPARATOR);
        line.push_str(&flatten(&self.key));
        if let Some(value) = &self.value {
            line.push_str(SEPARATOR);
            line.push_str(&flatten(value));
        }
        line.push('\n');
        line
    }

    fn matches(&self, key: &str, source: Option<&str>) -> bool {
        self.key == key && source.map_or(true, |s| self.source == s)
    }
}

fn flatten(field: &str) -> String {
    field.replace(['\n', '\r'], " ")
}

/// A status value that is not part of the lifecycle vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

/// Parsed, read-only view of a journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    skipped_lines: usize,
}

impl Journal {
    /// Parse journal text. Never fails: malformed lines are counted and
    /// skipped, since the file may be read while a writer is appending.
    pub fn parse(text: &str) -> Self {
        let mut journal = Self::default();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match JournalEntry::parse_line(line) {
                Some(entry) => journal.entries.push(entry),
                None => journal.skipped_lines += 1,
            }
        }
        journal
    }

    pub fn from_entries(entries: Vec<JournalEntry>) -> Self {
        Self {
            entries,
            skipped_lines: 0,
        }
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lines that did not parse as entries.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Newest entry with `key`, optionally restricted to one source tag.
    pub fn last_entry(&self, key: &str, source: Option<&str>) -> Option<&JournalEntry> {
        self.entries.iter().rev().find(|e| e.matches(key, source))
    }

    /// Value of the newest entry with `key`.
    pub fn last_value(&self, key: &str, source: Option<&str>) -> Option<&str> {
        self.last_entry(key, source)?.value.as_deref()
    }

    /// Number of historical entries with exactly this key and value.
    pub fn count(&self, key: &str, value: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.key == key && e.value.as_deref() == Some(value))
            .count()
    }

    /// Current status: the last `status` entry is authoritative, earlier ones
    /// are history. No entry at all means `unsubmitted`.
    pub fn status(&self) -> Result<JobStatus, UnknownStatus> {
        match self.last_entry(keys::STATUS, None) {
            None => Ok(JobStatus::Unsubmitted),
            Some(entry) => {
                let raw = entry.value.as_deref().unwrap_or_default();
                JobStatus::from_str(raw).ok_or_else(|| UnknownStatus(raw.to_string()))
            }
        }
    }

    /// How many times the job was handed to a backend.
    pub fn submission_count(&self) -> usize {
        self.count(keys::STATUS, JobStatus::Submitted.as_str())
    }

    pub fn submission_id(&self) -> Option<&str> {
        self.last_value(keys::SUBMISSION_ID, None)
    }

    /// Successor recorded when this descriptor was superseded.
    pub fn replaced_with(&self) -> Option<&str> {
        self.last_value(keys::REPLACED_WITH, None)
    }

    /// Failure kind of the most recent failure, if it was recorded.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.last_value(keys::ERROR_KIND, None)
            .and_then(FailureKind::from_str)
    }
}
