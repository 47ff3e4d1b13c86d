//! Property tests for journal status derivation and successor naming.

use std::collections::HashSet;

use babysitter::adapters::journal::FileJournalStore;
use babysitter::domain::models::descriptor::{counter_of, successor_name};
use babysitter::domain::models::{JobStatus, Journal, JournalEntry};
use babysitter::domain::ports::JournalStore;
use proptest::prelude::*;

const STATUSES: [JobStatus; 6] = [
    JobStatus::ToSubmit,
    JobStatus::Submitted,
    JobStatus::Running,
    JobStatus::Finished,
    JobStatus::Concluded,
    JobStatus::Failed,
];

#[derive(Debug, Clone)]
enum Line {
    Status(usize),
    Other(String, String),
    Partial(String),
}

fn line() -> impl Strategy<Value = Line> {
    prop_oneof![
        (0..STATUSES.len()).prop_map(Line::Status),
        ("[a-zA-Z]{1,12}", "[a-z0-9 .]{0,20}").prop_map(|(k, v)| Line::Other(k, v)),
        "[a-z]{0,8}".prop_map(Line::Partial),
    ]
}

fn render(lines: &[Line]) -> (String, Option<JobStatus>) {
    let mut text = String::new();
    let mut last = None;
    for line in lines {
        match line {
            Line::Status(i) => {
                text.push_str(&JournalEntry::status("wrk", STATUSES[*i]).to_line());
                last = Some(STATUSES[*i]);
            }
            Line::Other(key, value) if key != "status" => {
                text.push_str(&JournalEntry::with_value("sub", key, value).to_line());
            }
            Line::Other(..) => {}
            Line::Partial(fragment) => {
                text.push_str(fragment);
                text.push('\n');
            }
        }
    }
    (text, last)
}

proptest! {
    /// Property: status is the value of the last status entry, whatever else
    /// is interleaved
    #[test]
    fn prop_status_is_last_status_entry(lines in prop::collection::vec(line(), 0..40)) {
        let (text, last) = render(&lines);
        let journal = Journal::parse(&text);
        prop_assert_eq!(journal.status().unwrap(), last.unwrap_or_default());
    }

    /// Property: a trailing half-written line never changes the status
    #[test]
    fn prop_partial_tail_is_ignored(
        lines in prop::collection::vec(line(), 0..20),
        tail in "[a-z]{0,6}",
    ) {
        let (mut text, last) = render(&lines);
        text.push_str(&tail);
        prop_assert_eq!(Journal::parse(&text).status().unwrap(), last.unwrap_or_default());
    }

    /// Property: successor counters strictly increase and never repeat
    #[test]
    fn prop_successor_counters_increase(stem in "[a-z][a-z_]{0,10}", steps in 1usize..1200) {
        let mut name = format!("{stem}.yaml");
        let mut seen = HashSet::new();
        let mut previous = counter_of(&name).unwrap_or(0);
        for _ in 0..steps {
            name = successor_name(&name);
            let counter = counter_of(&name).unwrap();
            prop_assert!(counter > previous);
            prop_assert!(seen.insert(name.clone()));
            prop_assert!(name.starts_with(&stem));
            prop_assert!(name.ends_with(".yaml"));
            previous = counter;
        }
    }
}

#[tokio::test]
async fn test_concurrent_writers_keep_lines_whole() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = dir.path().join("run.yaml");
    let store = FileJournalStore::new();

    let mut handles = Vec::new();
    for writer in 0..8 {
        let descriptor = descriptor.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                let entry = JournalEntry::with_value("wrk", format!("w{writer}"), i);
                store.append(&descriptor, &entry).await.unwrap();
            }
            store
                .append(&descriptor, &JournalEntry::status("wrk", JobStatus::Running))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let journal = store.load(&descriptor).await.unwrap();
    assert_eq!(journal.len(), 8 * 26);
    assert_eq!(journal.skipped_lines(), 0);
    assert_eq!(journal.status().unwrap(), JobStatus::Running);
    for writer in 0..8 {
        assert_eq!(journal.last_value(&format!("w{writer}"), None), Some("24"));
    }
}
