#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone};
use futures::future::BoxFuture;
use image::{ImageOutputFormat, Rgba, RgbaImage};

use dashboard::pool::{EngineFactory, MarkupEngine};
use dashboard::source::{Condition, FetchContext, Weather};
use dashboard::{DataSource, Error, Result, Size, SourceResult, SourceValue};

pub const MARKUP_FILL: [u8; 4] = [10, 20, 30, 255];

pub fn fixed_now() -> DateTime<FixedOffset> {
    FixedOffset::west_opt(8 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 3, 9, 30, 0)
        .unwrap()
}

pub fn png(size: Size, fill: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(size.width, size.height, Rgba(fill));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

/// Paints every document as one flat colour
pub struct SolidEngine;

impl MarkupEngine for SolidEngine {
    fn render_markup(&mut self, _document: &str, size: Size) -> Result<Vec<u8>> {
        Ok(png(size, MARKUP_FILL))
    }
}

pub fn solid_factory() -> EngineFactory {
    Arc::new(|| Ok(Box::new(SolidEngine) as Box<dyn MarkupEngine>))
}

/// Paints like `SolidEngine` but rejects any document containing `marker`
pub struct RejectingEngine {
    marker: &'static str,
}

impl MarkupEngine for RejectingEngine {
    fn render_markup(&mut self, document: &str, size: Size) -> Result<Vec<u8>> {
        if document.contains(self.marker) {
            return Err(Error::RenderError(format!("script error in {}", self.marker)));
        }
        Ok(png(size, MARKUP_FILL))
    }
}

pub fn rejecting_factory(marker: &'static str) -> EngineFactory {
    Arc::new(move || Ok(Box::new(RejectingEngine { marker }) as Box<dyn MarkupEngine>))
}

pub fn unreachable_factory() -> EngineFactory {
    Arc::new(|| Err(Error::InitializationError("chrome: connection refused".into())))
}

/// Answers immediately with a fixed result
pub struct Ready {
    pub name: &'static str,
    pub result: SourceResult,
}

impl DataSource for Ready {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch<'a>(&'a self, _ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult> {
        Box::pin(async move { self.result.clone() })
    }
}

/// Answers after a delay
pub struct Slow {
    pub name: &'static str,
    pub delay: Duration,
}

impl DataSource for Slow {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch<'a>(&'a self, _ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            SourceResult::Success(SourceValue::Sensors(Default::default()))
        })
    }
}

/// Never answers and ignores cancellation
pub struct Hang {
    pub name: String,
}

impl DataSource for Hang {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch<'a>(&'a self, _ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult> {
        Box::pin(futures::future::pending())
    }
}

pub fn sunny() -> Weather {
    Weather {
        temperature: 72,
        high_temp: 75,
        low_temp: 58,
        condition: Condition::from_code(800),
        forecasts: vec![],
        hourly: vec![],
    }
}
