//! Background gzip compression of rotated archives.
//!
//! A rotated file is no longer written to once it has been renamed, so it can be
//! read here while the writer carries on with the fresh file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::{Error, Result};

/// Extension appended to compressed archives.
pub const GZIP_EXTENSION: &str = "gz";

/// `app.log.2026-01-09` -> `app.log.2026-01-09.gz`
pub fn compressed_name(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(GZIP_EXTENSION);
    PathBuf::from(name)
}

fn gzip_into(src: &Path, dst: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(src)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(dst)?), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    let mut out = encoder.finish()?;
    out.flush()?;
    out.get_ref().sync_all()
}

/// Compress `src` to `src.gz`, then remove `src`.
///
/// `src` is only removed once the compressed file is fully written. On failure a
/// partial `.gz` is cleaned up and `src` is left untouched.
pub fn compress_file(src: &Path) -> Result<PathBuf> {
    let dst = compressed_name(src);

    if let Err(source) = gzip_into(src, &dst) {
        let _ = fs::remove_file(&dst);
        return Err(Error::Compression {
            path: src.to_path_buf(),
            source,
        });
    }

    fs::remove_file(src).map_err(|source| Error::Compression {
        path: src.to_path_buf(),
        source,
    })?;

    Ok(dst)
}

/// Run [`compress_file`] on a dedicated thread.
///
/// The outcome is logged; the handle also yields it for callers that want to wait.
pub fn spawn_compression(src: PathBuf) -> io::Result<JoinHandle<Result<PathBuf>>> {
    thread::Builder::new()
        .name("logroll-compress".to_string())
        .spawn(move || {
            let result = compress_file(&src);
            match &result {
                Ok(dst) => tracing::debug!(
                    src = %src.display(),
                    dst = %dst.display(),
                    "compressed archive"
                ),
                Err(e) => tracing::error!(
                    src = %src.display(),
                    error = %e,
                    "archive compression failed"
                ),
            }
            result
        })
}
