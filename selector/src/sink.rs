use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use time::{macros::format_description, OffsetDateTime};

use crate::{
    config::AccountId,
    error::{AuditError, Result},
};

/// Writes each item on its own `\n`-terminated line, truncating `path`.
pub fn write_lines<I, S>(path: &Path, items: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let io_err = |source| AuditError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    let mut lines = 0;
    for item in items {
        writer.write_all(item.as_ref().as_bytes()).map_err(io_err)?;
        writer.write_all(b"\n").map_err(io_err)?;
        lines += 1;
    }
    writer
        .into_inner()
        .map_err(|e| io_err(e.into_error()))?
        .sync_all()
        .map_err(io_err)?;
    tracing::info!(path = %path.display(), lines, "metrics written");
    Ok(lines)
}

/// `YYYYMMDDhhmmss`, as used in output file names.
pub fn run_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day][hour][minute][second]");
    at.format(format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Current local time, or UTC when the local offset cannot be determined.
///
/// The offset is only reliably known while the process is single-threaded,
/// so call this before starting the async runtime.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Destination files of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub used: PathBuf,
    pub unused: PathBuf,
}

impl OutputFiles {
    pub fn new(dir: &Path, account_id: AccountId, timestamp: &str) -> Self {
        Self {
            used: dir.join(format!("{account_id}_used_{timestamp}.txt")),
            unused: dir.join(format!("{account_id}_unused_{timestamp}.txt")),
        }
    }
}
