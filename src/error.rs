use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while driving a capture session.
///
/// All variants are fatal at the session level; the controller never retries.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("remote device transport error: {0}")]
    Transport(String),

    #[error("failed to load pattern asset {path}: {reason}")]
    AssetLoad { path: PathBuf, reason: String },

    #[error("captured bytes for pattern {index} are not a valid image: {reason}")]
    Encode { index: usize, reason: String },

    #[error("no patterns found in {0}")]
    EmptySequence(PathBuf),

    #[error("session directory {0} appeared while it was being allocated")]
    DirectoryConflict(PathBuf),

    #[error("remote device returned no image")]
    NoImage,

    #[error("display surface was closed")]
    DisplayClosed,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for CaptureError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Phases of a capture session, as reported in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Arming,
    Displaying,
    Capturing,
    Persisting,
    Disarming,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::Arming => "ARMING",
            Phase::Displaying => "DISPLAYING",
            Phase::Capturing => "CAPTURING",
            Phase::Persisting => "PERSISTING",
            Phase::Disarming => "DISARMING",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fatal session failure, tagged with where it happened.
#[derive(Debug, Error)]
pub struct SessionError {
    pub phase: Phase,
    pub pattern_index: Option<usize>,
    #[source]
    pub source: CaptureError,
}

impl SessionError {
    pub fn new(phase: Phase, pattern_index: Option<usize>, source: CaptureError) -> Self {
        Self {
            phase,
            pattern_index,
            source,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pattern_index {
            Some(index) => write!(
                f,
                "session aborted during {} at pattern index {}: {}",
                self.phase, index, self.source
            ),
            None => write!(f, "session aborted during {}: {}", self.phase, self.source),
        }
    }
}
