#![allow(dead_code)]

use psdump::Codec;
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// 2016-05-14T00:00:00Z
pub const MAY_14: i64 = 1_463_184_000;
/// 2016-05-15T00:00:00Z
pub const MAY_15: i64 = 1_463_270_400;
pub const DAY: i64 = 86_400;

/// Compress `lines` (each followed by `\n`) into `path` with `codec`.
pub fn write_archive(path: &Path, codec: Codec, lines: &[String]) {
    let mut raw = Vec::new();
    for l in lines {
        raw.extend_from_slice(l.as_bytes());
        raw.push(b'\n');
    }
    write_archive_bytes(path, codec, &raw);
}

/// Compress arbitrary bytes (for malformed / unterminated input).
pub fn write_archive_bytes(path: &Path, codec: Codec, raw: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    match codec {
        Codec::Bz2 => {
            let mut enc = bzip2::write::BzEncoder::new(f, bzip2::Compression::default());
            enc.write_all(raw).unwrap();
            enc.finish().unwrap();
        }
        Codec::Xz => {
            let mut enc = xz2::write::XzEncoder::new(f, 6);
            enc.write_all(raw).unwrap();
            enc.finish().unwrap();
        }
        Codec::Zst => {
            let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
            enc.write_all(raw).unwrap();
            enc.finish().unwrap();
        }
    }
}

pub fn comment(id: &str, subreddit: &str, created_utc: i64) -> String {
    json!({
        "id": id, "author": "alice", "body": format!("comment {id}"),
        "subreddit": subreddit, "subreddit_id": "t5_x", "score": 1,
        "created_utc": created_utc, "parent_id": "t3_s1", "link_id": "t3_s1"
    })
    .to_string()
}

/// Fresh data dir with `compressed/` and `extracted/`.
pub fn data_dir() -> PathBuf {
    let dir = tempfile::tempdir().unwrap().into_path();
    fs::create_dir_all(dir.join("compressed")).unwrap();
    fs::create_dir_all(dir.join("extracted")).unwrap();
    dir
}

/// Parse a file that must be a JSON array.
pub fn read_json_array(path: &Path) -> Vec<Value> {
    let text = fs::read_to_string(path).unwrap();
    match serde_json::from_str::<Value>(&text).unwrap() {
        Value::Array(items) => items,
        other => panic!("{} is not a JSON array: {other}", path.display()),
    }
}

pub fn ids(values: &[Value]) -> Vec<String> {
    let mut v: Vec<String> = values
        .iter()
        .map(|x| x["id"].as_str().unwrap().to_string())
        .collect();
    v.sort();
    v
}
