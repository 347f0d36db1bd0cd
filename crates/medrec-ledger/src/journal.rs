use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, error, warn};

use medrec_types::RecordEntry;

use crate::config::SyncMode;
use crate::error::JournalError;

/// Frame header: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

struct JournalWriter {
    file: File,
    offset: u64,
    /// Set when a failed append could not be rolled back; the file may
    /// end in a partial frame and must not be appended to.
    failed: bool,
}

/// Result of reading a journal front-to-back.
#[derive(Debug)]
pub struct Recovery {
    pub entries: Vec<RecordEntry>,
    /// End of the last complete frame. Bytes past it are a torn write.
    pub valid_len: u64,
}

/// Append-only file of committed ledger entries.
///
/// On-disk frame:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized RecordEntry)]
/// ```
///
/// Recovery reads front-to-back. A frame whose CRC does not match is skipped;
/// a frame cut short by a crash ends recovery and must be cut off with
/// [`Journal::truncate`] before the next append.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<JournalWriter>,
    sync_mode: SyncMode,
}

impl Journal {
    /// Open (or create) the journal file at `path`.
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(JournalWriter {
                file,
                offset,
                failed: false,
            }),
            sync_mode,
        })
    }

    /// Append one entry. Returns the byte offset of its frame.
    ///
    /// On error the file is cut back to where the frame started, so a
    /// rejected entry never reappears on recovery. If that cut fails too,
    /// the journal refuses every later append.
    pub fn append(&self, entry: &RecordEntry) -> Result<u64, JournalError> {
        let payload =
            bincode::serialize(entry).map_err(|e| JournalError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| JournalError::Serialization("entry exceeds 4 GiB".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.writer.lock().map_err(|_| JournalError::Poisoned)?;
        if w.failed {
            return Err(JournalError::Failed);
        }
        let frame_offset = w.offset;

        let written = w.file.write_all(&frame).and_then(|()| {
            if self.sync_mode == SyncMode::EveryWrite {
                w.file.sync_all()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            if let Err(rollback) = w.file.set_len(frame_offset) {
                w.failed = true;
                error!(
                    offset = frame_offset,
                    error = %rollback,
                    "journal rollback failed; refusing further appends"
                );
            } else {
                warn!(offset = frame_offset, error = %e, "journal append rolled back");
            }
            return Err(e.into());
        }

        w.offset += frame.len() as u64;

        debug!(
            offset = frame_offset,
            subject = %entry.subject(),
            seq = entry.sequence(),
            "journal append"
        );
        Ok(frame_offset)
    }

    /// Read back every intact entry in write order.
    pub fn recover(&self) -> Result<Recovery, JournalError> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let file_len = reader.get_ref().metadata()?.len();
        let mut entries = Vec::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE <= file_len {
            let mut header = [0u8; HEADER_SIZE as usize];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || offset + HEADER_SIZE + u64::from(length) > file_len {
                warn!(offset, length, file_len, "invalid journal frame length; stopping recovery");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated journal frame; stopping recovery");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            offset += HEADER_SIZE + u64::from(length);

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "journal CRC mismatch; skipping frame"
                );
                continue;
            }

            match bincode::deserialize::<RecordEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(offset, error = %e, "undecodable journal frame; skipping"),
            }
        }

        debug!(
            recovered = entries.len(),
            valid_len = offset,
            path = %self.path.display(),
            "journal recovery complete"
        );
        Ok(Recovery {
            entries,
            valid_len: offset,
        })
    }

    /// Current end-of-file offset.
    pub fn offset(&self) -> Result<u64, JournalError> {
        Ok(self.writer.lock().map_err(|_| JournalError::Poisoned)?.offset)
    }

    /// Cut the file to `len` bytes, discarding a torn tail.
    pub fn truncate(&self, len: u64) -> Result<(), JournalError> {
        let mut w = self.writer.lock().map_err(|_| JournalError::Poisoned)?;
        w.file.set_len(len)?;
        w.file.sync_all()?;
        w.offset = len;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
