//! Common test utilities for integration tests
//!
//! A temporary job directory with file-backed journal and descriptor stores,
//! plus helpers to seed journals and build drivers over a mock backend.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use babysitter::adapters::backends::MockBackend;
use babysitter::adapters::descriptor::YamlDescriptorStore;
use babysitter::adapters::journal::FileJournalStore;
use babysitter::domain::models::descriptor::journal_path_for;
use babysitter::domain::models::Journal;
use babysitter::services::{AnalyzerPolicy, DriverOptions, LifecycleDriver};
use tempfile::TempDir;

/// Bisection descriptor over `gap` with the given bounds.
pub fn bisection_yaml(value: &str, primal: &str, dual: &str, threshold: &str) -> String {
    format!(
        r#"solver:
  precision: 800
  settings:
    maxRuntime: 86400
data:
  - filename: gap.json
    variables:
      gap: "{value}"
search:
  binary_search:
    variable: gap
    primal: "{primal}"
    dual: "{dual}"
    threshold: "{threshold}"
"#
    )
}

/// Plain descriptor without a search directive.
pub const PLAIN_YAML: &str = "solver:\n  precision: 800\ndata:\n  - filename: plain.json\n";

/// A job directory with file-backed stores.
pub struct Workspace {
    pub dir: TempDir,
    pub journals: Arc<FileJournalStore>,
    pub descriptors: Arc<YamlDescriptorStore>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
            journals: Arc::new(FileJournalStore::new()),
            descriptors: Arc::new(YamlDescriptorStore::new()),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a descriptor file and return its path.
    pub fn descriptor(&self, name: &str, yaml: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, yaml).expect("Failed to write descriptor");
        path
    }

    /// Replace the journal of `descriptor` with `text`.
    pub fn seed_journal(&self, descriptor: &Path, text: &str) {
        std::fs::write(journal_path_for(descriptor), text).expect("Failed to write journal");
    }

    pub fn journal_text(&self, descriptor: &Path) -> String {
        std::fs::read_to_string(journal_path_for(descriptor)).unwrap_or_default()
    }

    pub fn journal(&self, descriptor: &Path) -> Journal {
        Journal::parse(&self.journal_text(descriptor))
    }

    pub fn backend(&self) -> Arc<MockBackend> {
        Arc::new(MockBackend::new(self.journals.clone()))
    }

    pub fn driver(&self, backend: Arc<MockBackend>, options: DriverOptions) -> LifecycleDriver {
        LifecycleDriver::new(
            backend,
            self.journals.clone(),
            self.descriptors.clone(),
            AnalyzerPolicy::default(),
            options,
        )
    }
}

/// `count` submit cycles that each ended in a budget timeout.
pub fn timed_out_submissions(count: usize) -> String {
    let mut text = String::new();
    for i in 1..=count {
        text.push_str(&format!(
            "sub :: status :: submitted\nsub :: submissionId :: {i}\nwrk :: status :: running\n\
             wrk :: terminateReason :: maxRuntime exceeded\nwrk :: status :: finished\n"
        ));
    }
    text
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
