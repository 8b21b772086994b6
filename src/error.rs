//! Error types for the dashboard pipeline

use thiserror::Error;

use crate::rendering::layout::LayoutError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while producing a dashboard
///
/// Only a few of these are fatal for a run: `Layout`, `RasterService` and
/// configuration problems. The rest describe failures of a single widget or
/// engine call and are turned into placeholder tiles by the raster backend.
#[derive(Error, Debug)]
pub enum Error {
    /// The layout configuration cannot hold the rendered widgets
    #[error("Layout failed: {0}")]
    Layout(#[from] LayoutError),

    /// The shared headless rendering service is unavailable
    #[error("Rasterization service failure: {0}")]
    RasterService(String),

    /// Failed to start a headless engine instance
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// The headless engine process died or stopped answering
    #[error("Headless engine failure: {0}")]
    EngineFailure(String),

    /// Failed to render one widget
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    /// A DevTools call failed; the pool checks whether the browser is still
    /// alive before treating it as a dead engine
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means the engine itself is gone rather than one
    /// render having failed.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            Error::EngineFailure(_) | Error::InitializationError(_) | Error::RasterService(_)
        )
    }

    /// Whether the run must abort instead of degrading a widget.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Layout(_) | Error::RasterService(_) | Error::ConfigError(_) | Error::Toml(_)
        )
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(format!("{:#}", err))
    }
}
