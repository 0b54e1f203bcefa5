//! Append-only document log.
//!
//! Layout: a 5-byte header (magic + version) followed by frames of
//! `len: u32 | MessagePack(LogEntry) | crc32: u32`, all little-endian.

use crate::error::{BackingError, BackingResult};
use crate::types::{Document, RecordId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Magic bytes for document logs.
const LOG_MAGIC: &[u8; 4] = b"DOC\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Header size (magic + version).
const HEADER_SIZE: u64 = 5;

/// Frame overhead (length prefix + checksum).
const FRAME_OVERHEAD: u64 = 8;

/// Upper bound for a single encoded entry.
const MAX_ENTRY_SIZE: usize = 64 * 1024 * 1024;

/// A single log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LogEntry {
    /// Store (or replace) the document under `id`.
    Put { id: RecordId, document: Document },
    /// Delete all listed documents.
    Delete { ids: Vec<RecordId> },
    /// Identifiers up to `max_id` have been handed out (written by compaction).
    Watermark { max_id: RecordId },
}

/// Append-only document log.
pub struct DocumentLog {
    /// Path to the log file.
    path: PathBuf,

    /// Log file handle.
    file: File,

    /// Current file size (next append offset).
    size: u64,

    /// Number of writes since last sync.
    writes_since_sync: u64,

    /// Sync every N writes.
    sync_interval: u64,

    #[cfg(test)]
    fail_next_sync: bool,
}

impl DocumentLog {
    /// Open or create a log.
    /// - sync_interval = 0 or 1: sync every write
    /// - sync_interval = N: sync every N writes
    pub fn open(path: impl AsRef<Path>, sync_interval: u64) -> BackingResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let mut size = file.metadata()?.len();
        if size == 0 {
            file.write_all(LOG_MAGIC)?;
            file.write_all(&[LOG_VERSION])?;
            file.sync_all()?;
            size = HEADER_SIZE;
        } else {
            Self::verify_header(&mut file)?;
        }

        Ok(Self {
            path,
            file,
            size,
            writes_since_sync: 0,
            sync_interval: sync_interval.max(1),
            #[cfg(test)]
            fail_next_sync: false,
        })
    }

    fn verify_header(file: &mut File) -> BackingResult<()> {
        file.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != LOG_MAGIC {
            return Err(BackingError::InvalidFormat("Invalid log magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != LOG_VERSION {
            return Err(BackingError::InvalidFormat(format!(
                "Unsupported log version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    /// Replay every entry in file order.
    ///
    /// A torn final frame (left by a crash mid-append) is truncated away.
    pub fn replay<F>(&mut self, mut apply: F) -> BackingResult<()>
    where
        F: FnMut(u64, LogEntry),
    {
        self.file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let end = self.size;
        let mut offset = HEADER_SIZE;

        {
            let mut reader = BufReader::new(&mut self.file);
            while offset < end {
                match Self::read_frame(&mut reader) {
                    Ok((entry, frame_len)) => {
                        apply(offset, entry);
                        offset += frame_len;
                    }
                    Err(BackingError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e),
                }
            }
        }

        if offset < end {
            warn!(
                path = %self.path.display(),
                offset,
                dropped_bytes = end - offset,
                "truncating torn log tail"
            );
            self.file.set_len(offset)?;
            self.file.sync_all()?;
            self.size = offset;
        }

        Ok(())
    }

    /// Append an entry, returning the offset of its frame.
    pub fn append(&mut self, entry: &LogEntry) -> BackingResult<u64> {
        let encoded = rmp_serde::to_vec(entry)?;
        if encoded.len() > MAX_ENTRY_SIZE {
            return Err(BackingError::EntryTooLarge {
                size: encoded.len(),
                max: MAX_ENTRY_SIZE,
            });
        }
        let checksum = crc32fast::hash(&encoded);

        let mut frame = Vec::with_capacity(encoded.len() + FRAME_OVERHEAD as usize);
        frame.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        frame.extend_from_slice(&encoded);
        frame.extend_from_slice(&checksum.to_le_bytes());

        let offset = self.size;
        self.file.seek(SeekFrom::Start(offset))?;
        if let Err(e) = self.file.write_all(&frame) {
            // Leave no partial frame behind for later appends to build on
            let _ = self.file.set_len(offset);
            return Err(e.into());
        }

        let pending = self.writes_since_sync + 1;
        if pending >= self.sync_interval {
            if let Err(e) = self.sync_file() {
                // An unsynced frame must not replay as a committed write
                let _ = self.file.set_len(offset);
                return Err(e.into());
            }
            self.writes_since_sync = 0;
        } else {
            self.writes_since_sync = pending;
        }
        self.size = offset + frame.len() as u64;

        Ok(offset)
    }

    /// Read the entry whose frame starts at `offset`.
    pub fn read_at(&mut self, offset: u64) -> BackingResult<LogEntry> {
        if offset < HEADER_SIZE || offset >= self.size {
            return Err(BackingError::Corruption(format!(
                "Offset {} outside log bounds",
                offset
            )));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        Self::read_frame(&mut self.file).map(|(entry, _)| entry)
    }

    fn read_frame<R: Read>(reader: &mut R) -> BackingResult<(LogEntry, u64)> {
        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_ENTRY_SIZE {
            return Err(BackingError::Corruption("Log entry too large".into()));
        }

        let mut encoded = vec![0u8; len];
        reader.read_exact(&mut encoded)?;

        let mut checksum_bytes = [0u8; 4];
        reader.read_exact(&mut checksum_bytes)?;
        let stored = u32::from_le_bytes(checksum_bytes);
        let computed = crc32fast::hash(&encoded);
        if stored != computed {
            return Err(BackingError::ChecksumMismatch {
                expected: stored,
                got: computed,
            });
        }

        let entry = rmp_serde::from_slice(&encoded)?;
        Ok((entry, len as u64 + FRAME_OVERHEAD))
    }

    fn sync_file(&mut self) -> std::io::Result<()> {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_sync) {
            return Err(std::io::Error::new(ErrorKind::Other, "injected sync failure"));
        }
        self.file.sync_all()
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&mut self) -> BackingResult<()> {
        self.sync_file()?;
        self.writes_since_sync = 0;
        Ok(())
    }

    /// Replace the log with one holding only `entries`.
    ///
    /// The new log is written beside the old one and renamed over it, so a
    /// crash leaves either the old or the new file intact. Returns the
    /// offset of each entry in the new log.
    pub fn rewrite(&mut self, entries: &[LogEntry]) -> BackingResult<Vec<u64>> {
        let tmp_path = self.path.with_extension("compact");

        let _ = fs::remove_file(&tmp_path);
        let mut offsets = Vec::with_capacity(entries.len());
        {
            let mut tmp = DocumentLog::open(&tmp_path, u64::MAX)?;
            for entry in entries {
                offsets.push(tmp.append(entry)?);
            }
            tmp.sync()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        *self = DocumentLog::open(&self.path, self.sync_interval)?;

        Ok(offsets)
    }

    /// Current file size.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
