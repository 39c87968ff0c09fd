// e2e/journal_crash_consistency.rs — the journal's replay/commit
// crash-consistency story, exercised through the public ca_table API
// rather than journal.rs's own in-module unit tests.

use ca_table::Journal;
use tempfile::TempDir;

#[test]
fn committed_state_survives_reopen_across_many_files() {
    let dir = TempDir::new().unwrap();
    {
        let mut journal = Journal::open(dir.path()).unwrap();
        let a = journal.create_file("a").unwrap();
        let b = journal.create_file("b").unwrap();
        journal.append(a, b"first").unwrap();
        journal.append(b, b"second-file").unwrap();
        journal.commit().unwrap();
    }

    let journal = Journal::open(dir.path()).unwrap();
    assert_eq!(journal.logical_len(0), 5);
    assert_eq!(journal.logical_len(1), 11);
}

#[test]
fn uncommitted_writes_after_a_commit_do_not_survive_a_crash() {
    let dir = TempDir::new().unwrap();
    {
        let mut journal = Journal::open(dir.path()).unwrap();
        let idx = journal.create_file("a").unwrap();
        journal.append(idx, b"committed").unwrap();
        journal.commit().unwrap();

        journal.append(idx, b"-lost").unwrap();
        journal.flush().unwrap();
        // Dropped without a second commit: simulates a crash between flush
        // and commit. The flushed bytes are on disk but the journal still
        // claims the pre-flush length.
    }

    let journal = Journal::open(dir.path()).unwrap();
    assert_eq!(journal.logical_len(0), "committed".len() as u64);
}

#[test]
fn repeated_commits_keep_growing_the_same_file() {
    let dir = TempDir::new().unwrap();
    let mut journal = Journal::open(dir.path()).unwrap();
    let idx = journal.create_file("a").unwrap();

    for chunk in ["one", "two", "three"] {
        journal.append(idx, chunk.as_bytes()).unwrap();
        journal.commit().unwrap();
    }
    assert_eq!(journal.logical_len(idx), "onetwothree".len() as u64);

    drop(journal);
    let reopened = Journal::open(dir.path()).unwrap();
    assert_eq!(reopened.logical_len(0), "onetwothree".len() as u64);
}

#[test]
fn a_second_open_is_rejected_while_the_first_still_holds_the_lock() {
    let dir = TempDir::new().unwrap();
    let _first = Journal::open(dir.path()).unwrap();
    assert!(Journal::open(dir.path()).is_err());
}
