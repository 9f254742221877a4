#[path = "common/mod.rs"]
mod common;

use common::*;
use psdump::{
    in_progress_path, period_file_path, ArchiveKind, Codec, ExtractOutcome, RedditDumps, SplitOutcome, Sources,
    YearMonth,
};
use std::fs;
use std::path::Path;

fn ym(s: &str) -> YearMonth {
    s.parse().unwrap()
}

fn dumps(dir: &Path, sub: &str) -> RedditDumps {
    RedditDumps::new().data_dir(dir).subreddit(sub).sources(Sources::Comments)
}

fn may_2016_lines() -> Vec<String> {
    vec![
        comment("a", "foo", MAY_14),
        comment("x", "bar", MAY_14 + 10),
        comment("b", "Foo", MAY_14 + 3_600),
        comment("y", "bar", MAY_15),
        comment("c", "FOO", MAY_15 + 60),
    ]
}

#[test]
fn extract_then_split_bz2_month() {
    let dir = data_dir();
    let lines = may_2016_lines();
    write_archive(&dir.join("compressed/RC_2016-05.bz2"), Codec::Bz2, &lines);

    let d = dumps(&dir, "r/Foo");
    let out = period_file_path(&dir.join("extracted"), ArchiveKind::Comment, "foo", ym("2016-05"));
    assert_eq!(
        d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap(),
        ExtractOutcome::Written { path: out.clone(), records: 3 }
    );
    assert!(!in_progress_path(&out).exists());

    // Kept lines are copied byte for byte, in input order.
    let expected = format!("[\n{},\n{},\n{}\n]", lines[0], lines[2], lines[4]);
    assert_eq!(fs::read_to_string(&out).unwrap(), expected);

    let SplitOutcome::Split { days, .. } = d.split(ArchiveKind::Comment, ym("2016-05")).unwrap() else {
        panic!("expected a split");
    };
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].records, 2);
    assert_eq!(days[1].records, 1);

    let may14 = dir.join("extracted/foo/RC_foo_2016-05-14.json");
    let may15 = dir.join("extracted/foo/RC_foo_2016-05-15.json");
    assert_eq!(days[0].path, may14);
    assert_eq!(days[1].path, may15);
    assert_eq!(ids(&read_json_array(&may14)), vec!["a", "b"]);
    assert_eq!(ids(&read_json_array(&may15)), vec!["c"]);
    // The period file stays unless deletion was requested.
    assert!(out.exists());
}

#[test]
fn rerun_skips_existing_outputs() {
    let dir = data_dir();
    write_archive(&dir.join("compressed/RC_2016-05.bz2"), Codec::Bz2, &may_2016_lines());
    let d = dumps(&dir, "foo");

    d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap();
    let out = period_file_path(&dir.join("extracted"), ArchiveKind::Comment, "foo", ym("2016-05"));
    let before = fs::read(&out).unwrap();

    assert_eq!(
        d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap(),
        ExtractOutcome::Skipped { path: out.clone() }
    );
    assert_eq!(fs::read(&out).unwrap(), before);

    d.split(ArchiveKind::Comment, ym("2016-05")).unwrap();
    assert_eq!(
        d.split(ArchiveKind::Comment, ym("2016-05")).unwrap(),
        SplitOutcome::Skipped { existing: 2 }
    );

    // Forcing redoes the work with the same result.
    let forced = d.clone().force(true);
    assert_eq!(
        forced.extract(ArchiveKind::Comment, ym("2016-05")).unwrap(),
        ExtractOutcome::Written { path: out.clone(), records: 3 }
    );
    assert_eq!(fs::read(&out).unwrap(), before);
    assert!(matches!(forced.split(ArchiveKind::Comment, ym("2016-05")).unwrap(), SplitOutcome::Split { .. }));
}

#[test]
fn no_matches_leaves_no_file() {
    let dir = data_dir();
    write_archive(&dir.join("compressed/RC_2016-05.bz2"), Codec::Bz2, &may_2016_lines());
    let d = dumps(&dir, "nobody");
    assert_eq!(d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap(), ExtractOutcome::Empty);

    let out = period_file_path(&dir.join("extracted"), ArchiveKind::Comment, "nobody", ym("2016-05"));
    assert!(!out.exists());
    assert!(!in_progress_path(&out).exists());
    assert_eq!(d.split(ArchiveKind::Comment, ym("2016-05")).unwrap(), SplitOutcome::MissingInput);
}

/// Forcing a re-run that no longer matches anything removes the earlier output.
#[test]
fn forced_rerun_with_no_matches_removes_old_output() {
    let dir = data_dir();
    let archive = dir.join("compressed/RC_2016-05.bz2");
    write_archive(&archive, Codec::Bz2, &[comment("a", "foo", MAY_14)]);
    let d = dumps(&dir, "foo");
    assert!(matches!(
        d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap(),
        ExtractOutcome::Written { records: 1, .. }
    ));

    write_archive(&archive, Codec::Bz2, &[comment("x", "bar", MAY_14)]);
    let out = period_file_path(&dir.join("extracted"), ArchiveKind::Comment, "foo", ym("2016-05"));
    assert_eq!(d.force(true).extract(ArchiveKind::Comment, ym("2016-05")).unwrap(), ExtractOutcome::Empty);
    assert!(!out.exists());
    assert!(!in_progress_path(&out).exists());
}

#[test]
fn missing_archive_is_reported_not_fatal() {
    let dir = data_dir();
    let d = dumps(&dir, "foo");
    assert_eq!(d.extract(ArchiveKind::Comment, ym("2016-06")).unwrap(), ExtractOutcome::MissingInput);
}

#[test]
fn subreddit_is_required() {
    let dir = data_dir();
    let d = RedditDumps::new().data_dir(&dir);
    assert!(d.extract(ArchiveKind::Comment, ym("2016-05")).is_err());
    assert!(d.split(ArchiveKind::Comment, ym("2016-05")).is_err());
}

/// Noise in the dump (bad JSON, blank lines, broken UTF-8, a cut-off last line) costs
/// only the affected lines.
#[test]
fn noisy_archive_keeps_good_records() {
    let dir = data_dir();
    let mut raw = Vec::new();
    for l in [comment("a", "foo", MAY_14), "{\"subreddit\":\"foo\",".to_string(), String::new()] {
        raw.extend_from_slice(l.as_bytes());
        raw.push(b'\n');
    }
    raw.extend_from_slice(b"{\"subreddit\":\"foo\",\"id\":\"bad\xff\xfe\",\"x\":\"\xff\"}\n");
    raw.extend_from_slice(comment("b", "foo", MAY_15).as_bytes());
    raw.push(b'\n');
    raw.extend_from_slice(comment("cut", "foo", MAY_15).as_bytes());
    write_archive_bytes(&dir.join("compressed/RC_2016-05.bz2"), Codec::Bz2, &raw);

    let d = dumps(&dir, "foo");
    let ExtractOutcome::Written { path, records } = d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap() else {
        panic!("expected output");
    };
    assert_eq!(records, 2);
    assert_eq!(ids(&read_json_array(&path)), vec!["a", "b"]);
}

#[test]
fn corrupt_archive_yields_nothing() {
    let dir = data_dir();
    fs::write(dir.join("compressed/RC_2016-05.bz2"), b"definitely not bzip2 data").unwrap();
    let d = dumps(&dir, "foo");
    assert_eq!(d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap(), ExtractOutcome::Empty);
}

#[test]
fn xz_comments_and_zst_submissions() {
    let dir = data_dir();
    let jan18 = 1_514_764_800; // 2018-01-01
    write_archive(
        &dir.join("compressed/RC_2018-01.xz"),
        Codec::Xz,
        &[comment("a", "foo", jan18), comment("b", "bar", jan18)],
    );
    write_archive(
        &dir.join("compressed/RS_2018-01.zst"),
        Codec::Zst,
        &[comment("s1", "foo", jan18), comment("s2", "foo", jan18 + DAY)],
    );

    let d = dumps(&dir, "foo").sources(Sources::Both);
    assert!(matches!(
        d.extract(ArchiveKind::Comment, ym("2018-01")).unwrap(),
        ExtractOutcome::Written { records: 1, .. }
    ));
    assert!(matches!(
        d.extract(ArchiveKind::Submission, ym("2018-01")).unwrap(),
        ExtractOutcome::Written { records: 2, .. }
    ));
    assert!(dir.join("extracted/foo/RS_foo_2018-01.json").is_file());
}

/// From 2020 a month is assembled from whichever daily archives are present.
#[test]
fn daily_archives_are_combined_into_one_month() {
    let dir = data_dir();
    let feb1 = 1_580_515_200;
    write_archive(
        &dir.join("compressed/RC_2020-02-01.zst"),
        Codec::Zst,
        &[comment("a", "foo", feb1), comment("x", "bar", feb1)],
    );
    write_archive(&dir.join("compressed/RC_2020-02-03.zst"), Codec::Zst, &[comment("b", "foo", feb1 + 2 * DAY)]);

    let d = dumps(&dir, "foo");
    let ExtractOutcome::Written { path, records } = d.extract(ArchiveKind::Comment, ym("2020-02")).unwrap() else {
        panic!("expected output");
    };
    assert_eq!(records, 2);
    assert_eq!(path, dir.join("extracted/foo/RC_foo_2020-02.json"));

    let SplitOutcome::Split { days, .. } = d.split(ArchiveKind::Comment, ym("2020-02")).unwrap() else {
        panic!("expected a split");
    };
    let names: Vec<String> = days.iter().map(|s| s.day.to_string()).collect();
    assert_eq!(names, vec!["2020-02-01", "2020-02-03"]);
}

#[test]
fn batch_isolates_periods() {
    let dir = data_dir();
    write_archive(&dir.join("compressed/RC_2016-05.bz2"), Codec::Bz2, &may_2016_lines());
    let d = dumps(&dir, "foo").date_range(Some(ym("2016-04")), Some(ym("2016-06")));

    let report = d.extract_range().unwrap();
    assert!(report.is_ok());
    let outcomes: Vec<_> = report.done.iter().map(|(_, m, o)| (m.to_string(), o.clone())).collect();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].1, ExtractOutcome::MissingInput);
    assert!(matches!(outcomes[1].1, ExtractOutcome::Written { records: 3, .. }));
    assert_eq!(outcomes[2].1, ExtractOutcome::MissingInput);

    let split = d.split_range().unwrap();
    assert!(split.is_ok());
    assert!(split.done.iter().any(|(_, _, o)| matches!(o, SplitOutcome::Split { .. })));
}

#[test]
fn batch_skips_months_before_first_dump() {
    let dir = data_dir();
    let d = dumps(&dir, "foo").date_range(Some(ym("2005-10")), Some(ym("2005-12")));
    let report = d.extract_range().unwrap();
    assert_eq!(report.done.len(), 1);
    assert_eq!(report.done[0].1, ym("2005-12"));
}

#[test]
fn batch_requires_a_start_month() {
    let dir = data_dir();
    assert!(dumps(&dir, "foo").extract_range().is_err());
}

#[test]
fn delete_source_after_split() {
    let dir = data_dir();
    write_archive(&dir.join("compressed/RC_2016-05.bz2"), Codec::Bz2, &may_2016_lines());
    let d = dumps(&dir, "foo").delete_source_after_split(true);
    d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap();
    d.split(ArchiveKind::Comment, ym("2016-05")).unwrap();

    let out = period_file_path(&dir.join("extracted"), ArchiveKind::Comment, "foo", ym("2016-05"));
    assert!(!out.exists());
    assert!(dir.join("extracted/foo/RC_foo_2016-05-14.json").is_file());
    // The compressed archive is never touched.
    assert!(dir.join("compressed/RC_2016-05.bz2").is_file());
}

#[test]
fn local_config_sets_data_folder() {
    let dir = data_dir();
    write_archive(&dir.join("compressed/RC_2016-05.bz2"), Codec::Bz2, &may_2016_lines());
    let cfg = dir.join("local_config.json");
    fs::write(
        &cfg,
        serde_json::json!({ "dataFolder": dir, "splitThresholdMiB": 1, "chunkSizeMiB": 2 }).to_string(),
    )
    .unwrap();

    let d = RedditDumps::from_config_file(&cfg).unwrap().subreddit("foo");
    assert_eq!(d.options().compressed_dir, dir.join("compressed"));
    assert_eq!(d.options().split_threshold_bytes, 1024 * 1024);
    assert_eq!(d.options().chunk_bytes, 2 * 1024 * 1024);
    assert!(matches!(
        d.extract(ArchiveKind::Comment, ym("2016-05")).unwrap(),
        ExtractOutcome::Written { records: 3, .. }
    ));

    // No config file means defaults.
    let defaults = RedditDumps::from_config_file(&dir.join("absent.json")).unwrap();
    assert_eq!(defaults.options().split_threshold_bytes, psdump::DEFAULT_SPLIT_THRESHOLD_BYTES);
}
