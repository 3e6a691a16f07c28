use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use time::OffsetDateTime;

use crate::compress::{compressed_name, spawn_compression};
use crate::rotation::{self, RotationConfig, RotationReason, make_dest_name, midnight};
use crate::{Error, Result};

/// State of the live file.
#[derive(Debug)]
struct FileState {
    /// The open file handle. `None` after `close` or a failed rotation.
    file: Option<File>,
    /// Bytes appended to `file` since it was opened.
    size: u64,
    /// Midnight of the day the file was opened; anchor for daily rotation.
    last_mod: OffsetDateTime,
}

impl FileState {
    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))
    }
}

/// What a rotation did, reported once the state lock is released.
struct Rotation {
    reason: RotationReason,
    archive: PathBuf,
    collided: bool,
    compression_error: Option<io::Error>,
}

/// An append-only file that rotates itself by size and/or calendar day.
///
/// The live file always sits at `path`. On rotation it is renamed to an archive
/// name (see [`make_dest_name`]) and a fresh file is opened in its place. With
/// `compress` set, archives are gzipped on a background thread.
///
/// `Write` is implemented for `&RotatingWriter`, so one writer can be shared
/// between threads; each write, including any rotation it triggers, runs under
/// a single lock.
#[derive(Debug)]
pub struct RotatingWriter {
    path: PathBuf,
    config: RotationConfig,
    state: Mutex<FileState>,
    compressions: Mutex<Vec<JoinHandle<Result<PathBuf>>>>,
}

impl RotatingWriter {
    /// Open (or create) `path` for appending.
    ///
    /// Missing parent directories are created. Bytes already in the file count
    /// toward `maximum_size`.
    pub fn new(path: impl AsRef<Path>, config: RotationConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::from_file(path, file, config)
    }

    /// Wrap an already-open handle to `path`.
    ///
    /// Writes continue at the end of the file.
    pub fn from_file(
        path: impl AsRef<Path>,
        mut file: File,
        config: RotationConfig,
    ) -> Result<Self> {
        config.validate()?;

        let size = file.metadata()?.len();
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            config,
            state: Mutex::new(FileState {
                file: Some(file),
                size,
                last_mod: midnight(rotation::now()),
            }),
            compressions: Mutex::new(Vec::new()),
        })
    }

    /// The path of the live file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Bytes written to the live file since it was opened.
    pub fn current_size(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .size
    }

    /// Rotate now, regardless of the configured triggers. Returns the archive path.
    pub fn force_rotate(&self) -> Result<PathBuf> {
        let mut state = self.lock_state()?;
        if state.file.is_none() {
            return Err(Error::Io(io::Error::other("log file is not open")));
        }
        let rotation = self.rotate_locked(&mut state, RotationReason::Forced, rotation::now())?;
        drop(state);

        self.report(&rotation);
        Ok(rotation.archive)
    }

    /// Join every outstanding compression task and return their outcomes.
    ///
    /// Tasks that had already finished by the time a later rotation ran are not
    /// included; their outcome was logged when they completed.
    pub fn wait_for_compression(&self) -> Vec<Result<PathBuf>> {
        let handles = std::mem::take(
            &mut *self
                .compressions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(Error::Io(io::Error::other("compression task panicked")))
                })
            })
            .collect()
    }

    /// Flush and release the live file, then wait for pending compression.
    ///
    /// Later writes fail.
    pub fn close(&self) -> Result<()> {
        let file = self.lock_state()?.file.take();
        if let Some(mut file) = file {
            file.flush()?;
        }
        self.wait_for_compression();
        Ok(())
    }

    fn lock_state(&self) -> io::Result<MutexGuard<'_, FileState>> {
        self.state
            .lock()
            .map_err(|_| io::Error::other("rotating writer lock poisoned"))
    }

    fn write_buf(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock_state()?;
        // A closed writer or one whose last rotation failed must not rename `path` again.
        state.file_mut()?;

        let now = rotation::now();
        let rotation = match self.config.rotation_due(state.size, state.last_mod, now) {
            Some(reason) => Some(
                self.rotate_locked(&mut state, reason, now)
                    .map_err(into_io_error)?,
            ),
            None => None,
        };

        let result = state.file_mut()?.write(buf);
        if let Ok(written) = result {
            state.size += written as u64;
        }
        drop(state);

        if let Some(rotation) = &rotation {
            self.report(rotation);
        }
        result
    }

    /// Close, rename, hand off for compression, reopen. Caller holds the lock.
    fn rotate_locked(
        &self,
        state: &mut FileState,
        reason: RotationReason,
        now: OffsetDateTime,
    ) -> Result<Rotation> {
        let timestamp = reason.archive_timestamp(state.last_mod, now);
        let candidate = make_dest_name(&self.path, timestamp, &self.config);
        let (archive, collided) = free_dest_name(candidate);

        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }

        fs::rename(&self.path, &archive)?;

        let compression_error = if self.config.compress {
            self.dispatch_compression(archive.clone()).err()
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;

        state.file = Some(file);
        state.size = 0;
        state.last_mod = midnight(now);

        Ok(Rotation {
            reason,
            archive,
            collided,
            compression_error,
        })
    }

    fn dispatch_compression(&self, archive: PathBuf) -> io::Result<()> {
        let handle = spawn_compression(archive)?;
        let mut pending = self
            .compressions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
        Ok(())
    }

    fn report(&self, rotation: &Rotation) {
        if rotation.collided {
            tracing::warn!(
                archive = %rotation.archive.display(),
                "archive name already taken, using a sequence suffix"
            );
        }
        tracing::info!(
            path = %self.path.display(),
            archive = %rotation.archive.display(),
            reason = rotation.reason.as_str(),
            "rotated log file"
        );
        if let Some(e) = &rotation.compression_error {
            tracing::error!(
                archive = %rotation.archive.display(),
                error = %e,
                "failed to start archive compression"
            );
        }
    }
}

/// Pick `candidate`, or `candidate.N` for the lowest N not already on disk
/// (plain or compressed).
fn free_dest_name(candidate: PathBuf) -> (PathBuf, bool) {
    let taken = |p: &Path| p.exists() || compressed_name(p).exists();
    if !taken(&candidate) {
        return (candidate, false);
    }

    let mut seq: u64 = 1;
    loop {
        let mut name = candidate.clone().into_os_string();
        name.push(format!(".{}", seq));
        let next = PathBuf::from(name);
        if !taken(&next) {
            return (next, true);
        }
        seq += 1;
    }
}

fn into_io_error(e: Error) -> io::Error {
    match e {
        Error::Io(e) => e,
        other => io::Error::other(other),
    }
}

impl Write for &RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_buf(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock_state()?.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_buf(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}
