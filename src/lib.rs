//! Dashboard renderer
//!
//! Builds a single composite image for a low-refresh display (an e-ink panel
//! on the wall) out of data pulled from several upstream services.
//!
//! A run goes through four stages:
//!
//! - **Aggregation** ([`aggregate`]): every [`DataSource`] is fetched
//!   concurrently against one shared deadline. Whatever has not answered by
//!   then is recorded as a timeout.
//! - **Widgets** ([`widget`]): each [`WidgetRenderer`] turns its slice of the
//!   [`DashboardContext`] into a vector (SVG) or markup (HTML) widget, or into
//!   an "unavailable" placeholder when its source failed.
//! - **Layout** ([`rendering::layout`]): widgets are pinned into named slots
//!   on a fixed canvas.
//! - **Rasterization** ([`rendering::raster`]): vector widgets go through
//!   `resvg`, markup widgets through a pool of headless Chrome workers, and
//!   the tiles are composited into one [`Bitmap`].
//!
//! # Example
//!
//! ```no_run
//! use dashboard::{config::Config, pipeline::Dashboard};
//!
//! # async fn run() -> dashboard::Result<()> {
//! let config = Config::load(None)?;
//! let dashboard = Dashboard::from_config(&config)?;
//! let bitmap = dashboard.run().await?;
//! println!("{}x{} sha256={}", bitmap.width, bitmap.height, bitmap.digest());
//! # Ok(())
//! # }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod aggregate;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod rendering;
pub mod source;
pub mod widget;

// Headless Chrome backend for markup widgets
#[cfg(feature = "cdp")]
pub mod cdp;

pub use aggregate::{aggregate, DashboardContext};
pub use pool::{EngineFactory, HeadlessPool, MarkupEngine};
pub use rendering::layout::{layout, CanvasSpec, ComposedSurface, LayoutError, Rect, Slot};
pub use rendering::raster::{RasterBackend, TileProducer};
pub use rendering::Bitmap;
pub use source::{DataSource, FailureKind, SourceFailure, SourceResult, SourceValue};
pub use widget::{Widget, WidgetContent, WidgetKind, WidgetRenderer};

/// Width and height in pixels
///
/// Used for the canvas, for widget natural sizes and for the window of the
/// headless renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when `self` fits inside `other` without scaling
    pub fn fits_within(&self, other: Size) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Straight (non-premultiplied) RGBA colour
pub type Rgba = (u8, u8, u8, u8);

/// Parse a `#rrggbb` or `#rrggbbaa` colour string.
pub fn parse_color(value: &str) -> Result<Rgba> {
    let hex = value.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return Err(Error::ConfigError(format!("Invalid colour '{}'", value)));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|_| Error::ConfigError(format!("Invalid colour '{}'", value)))
    };
    match hex.len() {
        6 => Ok((channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Ok((channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
        _ => Err(Error::ConfigError(format!("Invalid colour '{}'", value))),
    }
}
