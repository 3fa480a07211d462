use log::{debug, info};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::error::CaptureError;

pub const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff", "webp"];

/// One projected pattern: its position in the sequence and where its image lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub index: usize,
    pub path: PathBuf,
}

impl Pattern {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Ordered, non-empty set of patterns enumerated from a directory.
///
/// Only paths are held; image data is decoded when a pattern is presented.
#[derive(Debug, Clone)]
pub struct PatternSequence {
    source: PathBuf,
    patterns: Vec<Pattern>,
}

impl PatternSequence {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| CaptureError::io(dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CaptureError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() || !is_pattern_file(&path) {
                debug!("Skipping non-pattern entry {}", path.display());
                continue;
            }
            files.push(path);
        }

        files.sort_by(|a, b| {
            let a = a.file_name().unwrap_or_default().to_string_lossy();
            let b = b.file_name().unwrap_or_default().to_string_lossy();
            natural_cmp(&a, &b).then_with(|| a.cmp(&b))
        });

        Self::from_paths(dir, files)
    }

    /// Builds a sequence from already ordered paths.
    pub fn from_paths<P: AsRef<Path>>(source: P, paths: Vec<PathBuf>) -> Result<Self, CaptureError> {
        let source = source.as_ref().to_path_buf();
        if paths.is_empty() {
            return Err(CaptureError::EmptySequence(source));
        }

        let patterns: Vec<Pattern> = paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| Pattern { index, path })
            .collect();

        info!("Enumerated {} patterns from {}", patterns.len(), source.display());
        Ok(Self { source, patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Walks the patterns in order; call again to restart.
    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }
}

fn is_pattern_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(true, |name| name.starts_with('.'));
    if hidden {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_FORMATS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Compares names so that runs of digits order by numeric value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a_chars);
                let right = take_digits(&mut b_chars);
                let left_trimmed = left.trim_start_matches('0');
                let right_trimmed = right.trim_start_matches('0');
                let ordering = left_trimmed
                    .len()
                    .cmp(&right_trimmed.len())
                    .then_with(|| left_trimmed.cmp(right_trimmed));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}
