#[path = "common/mod.rs"]
mod common;

use common::*;
use psdump::{in_progress_path, JsonArrayWriter};
use std::fs;

#[test]
fn empty_array_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("RC_foo_2016-05.json");
    let w = JsonArrayWriter::create(&path, 0).unwrap();
    assert!(in_progress_path(&path).exists());
    assert_eq!(w.finish().unwrap(), None);
    assert!(!path.exists());
    assert!(!in_progress_path(&path).exists());
}

#[test]
fn writes_exact_array_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    let mut w = JsonArrayWriter::create(&path, 0).unwrap();
    w.push(r#"{"id":"a"}"#).unwrap();
    w.push(r#"{"id":"b"}"#).unwrap();
    assert_eq!(w.written(), 2);
    // Nothing is visible under the final name until finish.
    assert!(!path.exists());
    assert_eq!(w.finish().unwrap().as_deref(), Some(path.as_path()));

    assert_eq!(fs::read_to_string(&path).unwrap(), "[\n{\"id\":\"a\"},\n{\"id\":\"b\"}\n]");
    assert!(!in_progress_path(&path).exists());
}

#[test]
fn single_element_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.json");
    let mut w = JsonArrayWriter::create(&path, 0).unwrap();
    w.push(&comment("x", "foo", MAY_14)).unwrap();
    w.finish().unwrap();
    let items = read_json_array(&path);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["subreddit"], "foo");
}

#[test]
fn reopen_appends_after_existing_elements() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("day.json");

    let mut w = JsonArrayWriter::create(&path, 0).unwrap();
    w.push(&comment("a", "foo", MAY_14)).unwrap();
    w.push(&comment("b", "foo", MAY_14)).unwrap();
    w.finish().unwrap();

    let mut w = JsonArrayWriter::reopen(&path, 0).unwrap();
    assert!(!path.exists(), "reopened file is moved back to in-progress");
    w.push(&comment("c", "foo", MAY_14)).unwrap();
    assert_eq!(w.written(), 1);
    w.finish().unwrap();

    let items = read_json_array(&path);
    assert_eq!(ids(&items), vec!["a", "b", "c"]);
}

#[test]
fn reopen_without_pushes_keeps_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("day.json");
    let mut w = JsonArrayWriter::create(&path, 0).unwrap();
    w.push(r#"{"id":"a"}"#).unwrap();
    w.finish().unwrap();

    let w = JsonArrayWriter::reopen(&path, 0).unwrap();
    // The array already had an element, so finishing keeps the file.
    assert_eq!(w.finish().unwrap().as_deref(), Some(path.as_path()));
    assert_eq!(fs::read_to_string(&path).unwrap(), "[\n{\"id\":\"a\"}\n]");
}

#[test]
fn reopen_rejects_non_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{\"id\":1}").unwrap();
    assert!(JsonArrayWriter::reopen(&path, 0).is_err());
}

#[test]
fn dropping_unfinished_writer_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.json");
    {
        let mut w = JsonArrayWriter::create(&path, 0).unwrap();
        w.push(r#"{"id":"a"}"#).unwrap();
    }
    assert!(!path.exists());
    assert!(!in_progress_path(&path).exists());
}

#[test]
fn create_fails_without_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.json");
    assert!(JsonArrayWriter::create(&path, 0).is_err());
}
