use image::{ImageFormat, ImageOutputFormat};
use log::{debug, info};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::CaptureError;

const JPEG_QUALITY: u8 = 95;

/// Creates `root/<prefix>_<N>` for the smallest positive `N` not already taken.
///
/// The directory is created with a non-recursive create so a sibling that
/// appears between the scan and the create surfaces as `DirectoryConflict`.
pub fn allocate_session_directory(root: &Path, prefix: &str) -> Result<(u32, PathBuf), CaptureError> {
    std::fs::create_dir_all(root).map_err(|e| CaptureError::io(root, e))?;

    let mut taken = HashSet::new();
    for entry in std::fs::read_dir(root).map_err(|e| CaptureError::io(root, e))? {
        let entry = entry.map_err(|e| CaptureError::io(root, e))?;
        let name = entry.file_name();
        if let Some(number) = name.to_str().and_then(|name| parse_session_number(name, prefix)) {
            taken.insert(number);
        }
    }

    let mut number = 1u32;
    while taken.contains(&number) {
        number += 1;
    }

    let dir = create_session_directory(root, prefix, number)?;
    info!("Allocated session directory {}", dir.display());
    Ok((number, dir))
}

/// Creates `root/<prefix>_<number>`; never reuses a directory that already exists.
pub fn create_session_directory(root: &Path, prefix: &str, number: u32) -> Result<PathBuf, CaptureError> {
    let dir = root.join(session_dir_name(prefix, number));
    match std::fs::create_dir(&dir) {
        Ok(()) => Ok(dir),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(CaptureError::DirectoryConflict(dir))
        }
        Err(e) => Err(CaptureError::io(&dir, e)),
    }
}

pub fn session_dir_name(prefix: &str, number: u32) -> String {
    format!("{}_{}", prefix, number)
}

fn parse_session_number(name: &str, prefix: &str) -> Option<u32> {
    let suffix = name.strip_prefix(prefix)?.strip_prefix('_')?;
    // Only the canonical spelling names a session; `capture_01` is not `capture_1`
    if suffix.is_empty() || suffix.starts_with('0') || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().filter(|&n| n > 0)
}

/// File name for a captured pattern; zero padded so name order matches index order.
pub fn frame_file_name(pattern_index: usize) -> String {
    format!("graycode_{:02}.jpg", pattern_index)
}

/// Validates a captured blob and writes it as `graycode_<II>.jpg`.
///
/// JPEG payloads are stored verbatim; other decodable formats are re-encoded.
pub fn save(session_dir: &Path, pattern_index: usize, image_bytes: &[u8]) -> Result<PathBuf, CaptureError> {
    let decoded = image::load_from_memory(image_bytes).map_err(|e| CaptureError::Encode {
        index: pattern_index,
        reason: e.to_string(),
    })?;

    let save_path = session_dir.join(frame_file_name(pattern_index));

    let is_jpeg = matches!(image::guess_format(image_bytes), Ok(ImageFormat::Jpeg));
    if is_jpeg {
        std::fs::write(&save_path, image_bytes).map_err(|e| CaptureError::io(&save_path, e))?;
    } else {
        debug!(
            "Transcoding {}x{} frame {} to JPEG",
            decoded.width(),
            decoded.height(),
            pattern_index
        );
        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
        let mut encoded = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Jpeg(JPEG_QUALITY))
            .map_err(|e| CaptureError::Encode {
                index: pattern_index,
                reason: e.to_string(),
            })?;
        std::fs::write(&save_path, &encoded).map_err(|e| CaptureError::io(&save_path, e))?;
    }

    debug!("Frame {} saved to {}", pattern_index, save_path.display());
    Ok(save_path)
}
