//! Scoped staging files for transcription uploads
//!
//! A [`StagedAudio`] owns a temp file for exactly one pipeline pass. The file
//! is removed when the value drops, whichever way the pass ends.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::Result;

/// Directory where staging files are created
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl Default for StagingArea {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl StagingArea {
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` to a uniquely named file ending in `.{extension}`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn stage(&self, data: &[u8], extension: &'static str) -> Result<StagedAudio> {
        let stamp = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        let prefix = format!("audio-{stamp}-");
        let suffix = format!(".{extension}");

        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        file.write_all(data)?;
        file.flush()?;

        tracing::debug!(
            path = %file.path().display(),
            bytes = data.len(),
            "staged audio for transcription"
        );

        Ok(StagedAudio {
            file,
            extension,
            len: data.len(),
        })
    }
}

/// Audio written to disk for the duration of one transcription call
#[derive(Debug)]
pub struct StagedAudio {
    file: NamedTempFile,
    extension: &'static str,
    len: usize,
}

impl StagedAudio {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Container extension, without the dot
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        self.extension
    }

    /// File name presented to the upstream service
    #[must_use]
    pub fn upload_name(&self) -> String {
        format!("audio.{}", self.extension)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete the file now, reporting failures instead of swallowing them
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be removed
    pub fn remove(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        tracing::debug!(path = %path.display(), "removed staged audio");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_file_has_extension_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().to_path_buf());

        let staged = area.stage(b"RIFF....WAVE", "wav").unwrap();
        let name = staged
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();

        assert!(name.starts_with("audio-"));
        assert!(name.ends_with(".wav"));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"RIFF....WAVE");
        assert_eq!(staged.upload_name(), "audio.wav");
        assert_eq!(staged.len(), 12);
    }

    #[test]
    fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().to_path_buf());

        let staged = area.stage(&[1, 2, 3], "ogg").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().to_path_buf());

        let staged = area.stage(&[1, 2, 3], "webm").unwrap();
        let path = staged.path().to_path_buf();
        staged.remove().unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn concurrent_stages_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().to_path_buf());

        let a = area.stage(&[0], "mp3").unwrap();
        let b = area.stage(&[0], "mp3").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let area = StagingArea::new(PathBuf::from("/nonexistent/voicestream/staging"));
        assert!(area.stage(&[0], "wav").is_err());
    }
}
