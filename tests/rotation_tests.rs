use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use flate2::read::GzDecoder;
use logroll::{RotatingWriter, RotationConfig};

/// Contents of every file in `dir`, gzip archives decoded.
fn read_all(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("entry").path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        let mut data = Vec::new();
        if name.ends_with(".gz") {
            GzDecoder::new(File::open(&path).unwrap())
                .read_to_end(&mut data)
                .unwrap();
        } else {
            data = fs::read(&path).unwrap();
        }
        files.insert(name, data);
    }
    files
}

#[test]
fn test_no_rotation_when_disabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("app.log");
    let mut writer = RotatingWriter::new(&path, RotationConfig::default()).unwrap();

    for _ in 0..100 {
        writer.write_all(&[b'z'; 4096]).unwrap();
    }
    writer.close().unwrap();

    let files = read_all(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files["app.log"].len(), 100 * 4096);
}

#[test]
fn test_prefix_naming_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("app.log");
    let config = RotationConfig::new()
        .with_maximum_size(8)
        .with_time_format_as_prefix(true)
        .with_time_format("[year][month][day]");
    let mut writer = RotatingWriter::new(&path, config).unwrap();

    writer.write_all(b"12345678").unwrap();
    let archive = writer.force_rotate().unwrap();

    let name = archive.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("app."), "unexpected archive name {}", name);
    assert!(name.ends_with(".log"), "unexpected archive name {}", name);
    assert_eq!(name.len(), "app.YYYYMMDD.log".len());
    assert_eq!(fs::read(&archive).unwrap(), b"12345678");
    assert_eq!(fs::read(&path).unwrap(), b"");
}

#[test]
fn test_concurrent_writes_lose_nothing() {
    const THREADS: usize = 8;
    const LINES: usize = 200;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("busy.log");
    let config = RotationConfig::new()
        .with_maximum_size(256)
        .with_compress(true);
    let writer = Arc::new(RotatingWriter::new(&path, config).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                for i in 0..LINES {
                    let line = format!("t{:02}-{:04}\n", t, i);
                    (&*writer).write_all(line.as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    writer.close().unwrap();

    let files = read_all(dir.path());
    assert!(files.len() > 1, "expected rotations to have happened");
    for name in files.keys() {
        assert!(
            name == "busy.log" || name.ends_with(".gz"),
            "uncompressed archive left behind: {}",
            name
        );
    }

    let total: usize = files.values().map(Vec::len).sum();
    assert_eq!(total, THREADS * LINES * "t00-0000\n".len());

    let mut lines: Vec<String> = files
        .values()
        .flat_map(|data| {
            String::from_utf8(data.clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    lines.sort();

    let mut expected: Vec<String> = (0..THREADS)
        .flat_map(|t| (0..LINES).map(move |i| format!("t{:02}-{:04}", t, i)))
        .collect();
    expected.sort();
    assert_eq!(lines, expected);
}

#[test]
fn test_archives_stay_within_one_oversized_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("big.log");
    let mut writer =
        RotatingWriter::new(&path, RotationConfig::new().with_maximum_size(100)).unwrap();

    // a single write larger than the threshold is never split
    writer.write_all(&[b'L'; 1000]).unwrap();
    assert_eq!(fs::read(&path).unwrap().len(), 1000);
    assert_eq!(writer.current_size(), 1000);

    writer.write_all(b"next").unwrap();
    let files = read_all(dir.path());
    assert_eq!(files.len(), 2);
    assert_eq!(files["big.log"], b"next");
}
