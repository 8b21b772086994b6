//! Delivery of the finished bitmap

use std::path::{Path, PathBuf};

use image::{imageops, ImageFormat, RgbaImage};
use log::{debug, info};

use crate::rendering::Bitmap;
use crate::{Error, Result};

/// Receives one bitmap per successful run
pub trait OutputSink: Send {
    /// Returns `false` when the bitmap was identical to the last one and
    /// nothing was written.
    fn deliver(&mut self, bitmap: &Bitmap) -> Result<bool>;
}

/// Counter-clockwise rotation applied before saving, for panels mounted on
/// their side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    pub fn from_degrees(degrees: u16) -> Result<Self> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Ccw90),
            180 => Ok(Rotation::Ccw180),
            270 => Ok(Rotation::Ccw270),
            other => Err(Error::ConfigError(format!("Unsupported rotation {}", other))),
        }
    }

    pub fn apply(self, image: RgbaImage) -> RgbaImage {
        // imageops rotates clockwise
        match self {
            Rotation::None => image,
            Rotation::Ccw90 => imageops::rotate270(&image),
            Rotation::Ccw180 => imageops::rotate180(&image),
            Rotation::Ccw270 => imageops::rotate90(&image),
        }
    }
}

/// Writes a PNG atomically: `<stem>.tmp.png` next to the target, then a
/// rename over it. Unchanged bitmaps are skipped by digest.
pub struct PngFileSink {
    path: PathBuf,
    rotation: Rotation,
    last_digest: Option<String>,
}

impl PngFileSink {
    pub fn new(path: impl Into<PathBuf>, rotation: Rotation) -> Self {
        Self {
            path: path.into(),
            rotation,
            last_digest: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.path.with_file_name(format!("{}.tmp.png", stem))
    }
}

impl OutputSink for PngFileSink {
    fn deliver(&mut self, bitmap: &Bitmap) -> Result<bool> {
        let digest = bitmap.digest();
        if self.last_digest.as_deref() == Some(digest.as_str()) {
            debug!("bitmap unchanged ({}), not writing", &digest[..12]);
            return Ok(false);
        }

        let image = self.rotation.apply(bitmap.to_image()?);
        let tmp = self.tmp_path();
        image.save_with_format(&tmp, ImageFormat::Png)?;
        std::fs::rename(&tmp, &self.path)?;

        info!("wrote {} ({}x{})", self.path.display(), image.width(), image.height());
        self.last_digest = Some(digest);
        Ok(true)
    }
}
