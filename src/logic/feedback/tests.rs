use super::*;
use crate::logic::labels::Correctness;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_feedback_append_and_read() {
    let dir = tempdir().unwrap();
    let log = FeedbackLog::new(dir.path().join("feedback.csv"));

    log.append(&FeedbackRecord::new("http://a.example", Correctness::Correct)).unwrap();
    log.append(&FeedbackRecord::new("http://b.example/x?y=1,2", Correctness::Incorrect)).unwrap();

    let records = log.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].url, "http://a.example");
    assert_eq!(records[1].url, "http://b.example/x?y=1,2");
    assert_eq!(records[1].tag, Correctness::Incorrect);
    assert_eq!(log.count().unwrap(), 2);
}

#[test]
fn test_rows_have_no_header() {
    let dir = tempdir().unwrap();
    let log = FeedbackLog::new(dir.path().join("feedback.csv"));
    log.append(&FeedbackRecord::new("http://a.example", Correctness::Correct)).unwrap();

    let content = fs::read_to_string(log.path()).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(",http://a.example,correct"));
}

#[test]
fn test_missing_log_is_empty() {
    let dir = tempdir().unwrap();
    let log = FeedbackLog::new(dir.path().join("feedback.csv"));
    assert!(log.read_all().unwrap().is_empty());
    assert!(log.snapshot().unwrap().is_none());
}

#[test]
fn test_malformed_rows_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("feedback.csv");
    fs::write(
        &path,
        "2024-01-01T00:00:00Z,http://ok.example,correct\n\
         garbage\n\
         2024-01-02T00:00:00Z,http://bad-tag.example,maybe\n\
         2024-01-03T00:00:00Z,http://ok2.example,incorrect\n",
    )
    .unwrap();

    let records = FeedbackLog::new(&path).read_all().unwrap();
    let urls: Vec<_> = records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["http://ok.example", "http://ok2.example"]);
}

#[test]
fn test_truncate_empties_log() {
    let dir = tempdir().unwrap();
    let log = FeedbackLog::new(dir.path().join("feedback.csv"));
    for i in 0..3 {
        log.append(&FeedbackRecord::new(format!("http://{i}.example"), Correctness::Correct)).unwrap();
    }

    log.truncate().unwrap();
    assert_eq!(log.count().unwrap(), 0);
    assert_eq!(log.snapshot().unwrap(), Some(Vec::new()));

    log.append(&FeedbackRecord::new("http://again.example", Correctness::Correct)).unwrap();
    assert_eq!(log.count().unwrap(), 1);
}

#[test]
fn test_failed_truncate_keeps_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("feedback.csv");
    let log = FeedbackLog::new(&path);
    log.append(&FeedbackRecord::new("http://kept.example", Correctness::Incorrect)).unwrap();
    let before = log.snapshot().unwrap();

    // A directory squatting on the temp name makes the rewrite fail
    fs::create_dir(dir.path().join("feedback.csv.tmp")).unwrap();

    assert!(matches!(log.truncate(), Err(FeedbackError::Storage(_))));
    assert_eq!(log.snapshot().unwrap(), before);
    assert_eq!(log.count().unwrap(), 1);
}
