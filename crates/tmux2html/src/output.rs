//! Document output: atomic file replacement or stdout.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Default permissions for written documents.
pub const DEFAULT_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File { path: PathBuf, mode: u32 },
}

impl Output {
    #[must_use]
    pub fn new(path: Option<PathBuf>, mode: u32) -> Self {
        match path {
            Some(path) => Self::File { path, mode },
            None => Self::Stdout,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stdout => None,
            Self::File { path, .. } => Some(path),
        }
    }

    pub fn write(&self, content: &str) -> Result<()> {
        match self {
            Self::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(content.as_bytes())?;
                stdout.write_all(b"\n")?;
                stdout.flush()?;
                Ok(())
            }
            Self::File { path, mode } => write_atomic(path, content, *mode),
        }
    }
}

/// Write `content` next to `path` and rename it into place, so readers
/// never observe a partially written document.
pub fn write_atomic(path: &Path, content: &str, mode: u32) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::Builder::new()
        .prefix("tmux2html.")
        .tempfile_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.as_file().sync_all()?;

    #[cfg(unix)]
    fs::set_permissions(file.path(), fs::Permissions::from_mode(mode))?;
    #[cfg(not(unix))]
    let _ = mode;

    file.persist(path).map_err(|error| error.error)?;
    debug!(path = %path.display(), bytes = content.len(), "wrote document");
    Ok(())
}
