//! Size-driven post-processing for downloaded images.
//!
//! Images above the byte ceiling are repeatedly halved in both dimensions and
//! re-encoded until they fit or the cycle budget runs out. If the ceiling
//! cannot be met the file on disk is left exactly as downloaded.
//!
//! File extensions come from the source URL and may lie, so the format is
//! sniffed from the bytes and the file is re-encoded in that same format.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use super::models::ImageQueueError;

/// Result of post-processing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessOutcome {
    /// Already under the ceiling.
    Untouched,
    /// Rewritten smaller after `cycles` halvings.
    Shrunk { cycles: u32, bytes: u64 },
    /// Still too large after the cycle budget; file kept unmodified.
    CeilingNotMet { bytes: u64 },
}

/// Step applied to every freshly written file.
///
/// Runs on a blocking thread; implementations may do synchronous IO.
pub trait ImagePostProcessor: Send + Sync {
    fn process(&self, path: &Path) -> Result<PostProcessOutcome, ImageQueueError>;
}

/// Post-processor that leaves every file alone.
pub struct NoOpPostProcessor;

impl ImagePostProcessor for NoOpPostProcessor {
    fn process(&self, _path: &Path) -> Result<PostProcessOutcome, ImageQueueError> {
        Ok(PostProcessOutcome::Untouched)
    }
}

/// Halve-and-re-encode until the file is at most `max_bytes`.
#[derive(Debug, Clone)]
pub struct SizeCeilingProcessor {
    pub max_bytes: u64,
    pub max_cycles: u32,
}

impl SizeCeilingProcessor {
    pub fn new(max_bytes: u64, max_cycles: u32) -> Self {
        Self {
            max_bytes,
            max_cycles,
        }
    }

    fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageQueueError> {
        let mut buffer = Cursor::new(Vec::new());
        let result = match format {
            // JPEG has no alpha channel.
            ImageFormat::Jpeg => {
                DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, format)
            }
            ImageFormat::Gif | ImageFormat::WebP => {
                DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut buffer, format)
            }
            _ => image.write_to(&mut buffer, format),
        };
        result.map_err(|e| ImageQueueError::Image(e.to_string()))?;
        Ok(buffer.into_inner())
    }
}

impl ImagePostProcessor for SizeCeilingProcessor {
    fn process(&self, path: &Path) -> Result<PostProcessOutcome, ImageQueueError> {
        let original_bytes = std::fs::metadata(path)?.len();
        if original_bytes <= self.max_bytes {
            return Ok(PostProcessOutcome::Untouched);
        }

        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| ImageQueueError::Image(format!("Unrecognized image format: {:?}", path)))?;
        let mut current = reader
            .decode()
            .map_err(|e| ImageQueueError::Image(e.to_string()))?;

        for cycle in 1..=self.max_cycles {
            let (width, height) = (current.width() / 2, current.height() / 2);
            if width == 0 || height == 0 {
                break;
            }
            current = current.resize_exact(width, height, FilterType::Triangle);
            let encoded = Self::encode(&current, format)?;
            debug!(
                "Shrink cycle {} for {:?}: {}x{} -> {} bytes",
                cycle,
                path,
                width,
                height,
                encoded.len()
            );

            if encoded.len() as u64 <= self.max_bytes {
                crate::persistence::write_bytes_atomic(path, &encoded)?;
                return Ok(PostProcessOutcome::Shrunk {
                    cycles: cycle,
                    bytes: encoded.len() as u64,
                });
            }
        }

        warn!(
            "Could not bring {:?} under {} bytes in {} cycles, keeping original ({} bytes)",
            path, self.max_bytes, self.max_cycles, original_bytes
        );
        Ok(PostProcessOutcome::CeilingNotMet {
            bytes: original_bytes,
        })
    }
}
