use std::path::{Path, PathBuf};

use chrono::Utc;

use super::document::XmlDocument;
use super::EngineResult;

/// Timestamped copies of the in-memory document.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `document` to `<stem>_<UTC timestamp>.xml`.
    ///
    /// An existing file is never overwritten; a counter suffix is added
    /// instead.
    pub fn create(&self, document: &XmlDocument) -> EngineResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let stem = document
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let base = format!("{stem}_{timestamp}");

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{base}.xml")
            } else {
                format!("{base}-{attempt}.xml")
            };
            let path = self.dir.join(name);
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    std::io::Write::write_all(&mut file, document.text().as_bytes())?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
