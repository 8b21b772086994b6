//! Layout, compositing and rasterization

pub mod layout;
pub mod optimize;
pub mod paint;
pub mod raster;

use std::io::Cursor;

use image::{ImageOutputFormat, RgbaImage};
use sha2::{Digest, Sha256};
use tiny_skia::Pixmap;

use crate::{Error, Result, Rgba};
use layout::Rect;

/// Final RGBA8 image, straight alpha, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn from_pixmap(pixmap: &Pixmap) -> Self {
        let mut pixels = Vec::with_capacity(pixmap.data().len());
        for p in pixmap.pixels() {
            let c = p.demultiply();
            pixels.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        Some((self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]))
    }

    /// Copy out a sub-rectangle; `None` when it does not fit.
    pub fn region(&self, rect: Rect) -> Option<Bitmap> {
        if rect.right() > u64::from(self.width) || rect.bottom() > u64::from(self.height) {
            return None;
        }
        let row = rect.width as usize * 4;
        let mut pixels = Vec::with_capacity(row * rect.height as usize);
        for y in rect.y..rect.y + rect.height {
            let start = ((y as usize) * (self.width as usize) + rect.x as usize) * 4;
            pixels.extend_from_slice(&self.pixels[start..start + row]);
        }
        Some(Bitmap {
            width: rect.width,
            height: rect.height,
            pixels,
        })
    }

    /// Hex SHA-256 of the dimensions and pixel data
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_be_bytes());
        hasher.update(self.height.to_be_bytes());
        hasher.update(&self.pixels);
        hex::encode(hasher.finalize())
    }

    pub fn to_image(&self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| Error::RenderError("Pixel buffer does not match dimensions".to_string()))
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.to_image()?.write_to(&mut out, ImageOutputFormat::Png)?;
        Ok(out.into_inner())
    }
}
