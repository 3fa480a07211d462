use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::error::CaptureError;
use crate::output;

/// One capture run and the directory it owns.
#[derive(Debug, Clone)]
pub struct Session {
    pub output_root: PathBuf,
    pub sequence_number: u32,
    pub directory: PathBuf,
    pub started_at: DateTime<Local>,
}

impl Session {
    /// Allocates a fresh `<prefix>_<N>` directory under `output_root`.
    pub fn begin(output_root: &Path, prefix: &str) -> Result<Self, CaptureError> {
        let (sequence_number, directory) = output::allocate_session_directory(output_root, prefix)?;
        Ok(Self {
            output_root: output_root.to_path_buf(),
            sequence_number,
            directory,
            started_at: Local::now(),
        })
    }

    /// Validates and writes one captured image into this session's directory.
    pub fn persist(&self, pattern_index: usize, image_bytes: Vec<u8>) -> Result<CapturedFrame, CaptureError> {
        let saved_path = output::save(&self.directory, pattern_index, &image_bytes)?;
        Ok(CapturedFrame {
            pattern_index,
            image_bytes,
            saved_path,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub pattern_index: usize,
    pub image_bytes: Vec<u8>,
    pub saved_path: PathBuf,
}

/// Outcome of a session that reached DONE.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session: Session,
    /// Saved paths, position `i` holding pattern `i`.
    pub saved: Vec<PathBuf>,
}

impl SessionReport {
    pub fn frame_count(&self) -> usize {
        self.saved.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Session {} started {} captured {} frames into {}",
            self.session.sequence_number,
            self.session.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.frame_count(),
            self.session.directory.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::jpeg_bytes;
    use tempfile::TempDir;

    #[test]
    fn test_begin_allocates_numbered_directory() {
        let temp_dir = TempDir::new().unwrap();
        let first = Session::begin(temp_dir.path(), "capture").unwrap();
        let second = Session::begin(temp_dir.path(), "capture").unwrap();

        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.sequence_number, 2);
        assert_eq!(first.directory, temp_dir.path().join("capture_1"));
        assert_eq!(second.output_root, temp_dir.path());
    }

    #[test]
    fn test_persist_returns_captured_frame() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::begin(temp_dir.path(), "capture").unwrap();
        let bytes = jpeg_bytes();

        let frame = session.persist(4, bytes.clone()).unwrap();
        assert_eq!(frame.pattern_index, 4);
        assert_eq!(frame.image_bytes, bytes);
        assert!(frame.saved_path.ends_with("capture_1/graycode_04.jpg"));
    }
}
