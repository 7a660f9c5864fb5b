//! Append-only JSON-lines journal backing a durable telemetry store

use crate::error::IngestError;
use crate::events::DensitySample;
use log::{debug, error, info};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// A replayed sample and the 1-based file line it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub line: usize,
    pub sample: DensitySample,
}

/// One JSON document per line, one line per committed sample
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    /// Open (or create) the journal at `path` and return the entries it holds
    ///
    /// # Errors
    ///
    /// Returns `IngestError::CorruptJournal` with a 1-based line number if any
    /// non-blank line fails to parse.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<JournalEntry>), IngestError> {
        let path = path.as_ref().to_path_buf();
        let entries = Self::replay(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok((Self { path, file }, entries))
    }

    /// Read the entries at `path` without opening it for writing
    ///
    /// A missing file holds no entries and is not created.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<JournalEntry>, IngestError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let sample: DensitySample =
                serde_json::from_str(&line).map_err(|e| IngestError::CorruptJournal {
                    line: index + 1,
                    message: e.to_string(),
                })?;
            entries.push(JournalEntry {
                line: index + 1,
                sample,
            });
        }
        info!(
            "Replayed {} samples from journal {}",
            entries.len(),
            path.display()
        );
        Ok(entries)
    }

    /// Append samples with a single write so a batch lands as one unit
    ///
    /// A failed write is truncated away, so the file never keeps a torn line.
    pub fn append(&mut self, samples: &[DensitySample]) -> Result<(), IngestError> {
        let mut buffer = String::new();
        for sample in samples {
            buffer.push_str(&serde_json::to_string(sample)?);
            buffer.push('\n');
        }
        write_or_rollback(&mut self.file, buffer.as_bytes())?;
        debug!(
            "Journaled {} samples to {}",
            samples.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Storage the journal writes through
trait JournalFile: Write {
    fn committed_len(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl JournalFile for File {
    fn committed_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

fn write_or_rollback<F: JournalFile>(file: &mut F, bytes: &[u8]) -> Result<(), IngestError> {
    let committed = file.committed_len()?;
    if let Err(e) = file.write_all(bytes).and_then(|()| file.flush()) {
        if let Err(truncate_err) = file.truncate(committed) {
            error!(
                "Failed to roll journal back to {} bytes: {}",
                committed, truncate_err
            );
        }
        return Err(e.into());
    }
    Ok(())
}
