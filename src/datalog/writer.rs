use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::{format_row, header};
use crate::device::CacheSnapshot;

/// Append-only writer for the measurement log.
pub struct PressureLog {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl PressureLog {
    /// Open `path` for appending; the header is written only into an empty file.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let is_empty = file.metadata().await?.len() == 0;

        let mut log = Self {
            path,
            writer: BufWriter::new(file),
            rows: 0,
        };
        if is_empty {
            log.write_line(&header()).await?;
            log.flush().await?;
        }
        log::info!("Logging pressures to {}", log.path.display());
        Ok(log)
    }

    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await
    }

    /// Append one row for `snapshot` and flush it.
    pub async fn append(&mut self, snapshot: &CacheSnapshot) -> io::Result<()> {
        let Some(captured_at) = snapshot.captured_at else {
            // nothing has been measured yet
            return Ok(());
        };
        let row = format_row(captured_at.timestamp(), &snapshot.readings);
        self.write_line(&row).await?;
        self.rows += 1;
        self.flush().await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this writer.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }
}
