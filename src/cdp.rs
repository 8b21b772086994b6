//! Headless Chrome markup engine over the DevTools protocol

use std::ffi::OsStr;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;

use crate::pool::{EngineFactory, MarkupEngine};
use crate::{Error, Result, Size};

// Reproducible screenshots: no GPU, no scrollbars, no font hinting, and no
// first-run or sync chatter from a fresh profile
static CHROME_FLAGS: &[&str] = &[
    "--lang=en",
    "--hide-scrollbars",
    "--no-first-run",
    "--disable-sync",
    "--disable-features=dbus",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--font-render-hinting=none",
    "--force-device-scale-factor=1",
    "--disable-extensions",
];

/// One Chrome process with a single tab, reused for every render
pub struct CdpRenderer {
    browser: Browser,
    tab: Arc<Tab>,
}

impl CdpRenderer {
    /// Launch Chrome with a window large enough for any widget.
    pub fn launch(window: Size) -> Result<Self> {
        let args: Vec<&OsStr> = CHROME_FLAGS.iter().map(OsStr::new).collect();
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((window.width, window.height)))
            .args(args)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        debug!("chrome launched with a {} window", window);

        Ok(Self { browser, tab })
    }
}

impl MarkupEngine for CdpRenderer {
    fn render_markup(&mut self, document: &str, size: Size) -> Result<Vec<u8>> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(document);
        let url = format!("data:text/html;base64,{}", encoded);

        self.tab
            .navigate_to(&url)
            .and_then(|tab| tab.wait_until_navigated())
            .context("navigation failed")?;

        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: f64::from(size.width),
            height: f64::from(size.height),
            scale: 1.0,
        };
        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .context("screenshot failed")?;
        Ok(png)
    }

    fn is_alive(&self) -> bool {
        self.browser.get_version().is_ok()
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Dropping the browser kills the child process
        let CdpRenderer { browser, tab } = *self;
        drop(tab);
        drop(browser);
        Ok(())
    }
}

/// Factory that launches one Chrome per pool worker.
pub fn engine_factory(window: Size) -> EngineFactory {
    Arc::new(move || Ok(Box::new(CdpRenderer::launch(window)?) as Box<dyn MarkupEngine>))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdp_render_smoke() {
        // Requires Chrome, so skip in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let mut engine = match CdpRenderer::launch(Size::new(200, 100)) {
            Ok(e) => e,
            Err(e) => {
                eprintln!("Skipping CDP render test because Chrome is not available: {}", e);
                return;
            }
        };
        assert!(engine.is_alive());
        let png = engine
            .render_markup("<html><body style=\"margin:0;background:#000\"></body></html>", Size::new(50, 20))
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 20));
    }
}
