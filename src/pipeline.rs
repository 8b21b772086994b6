//! One dashboard run: aggregate, render widgets, lay out, rasterize

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Local};
use log::{debug, info};

use crate::aggregate::{aggregate, DashboardContext};
use crate::config::Config;
use crate::rendering::layout::{layout, CanvasSpec};
use crate::rendering::raster::{MarkupTiles, RasterBackend, VectorTiles};
use crate::rendering::Bitmap;
use crate::source::{CalendarSource, DataSource, HomeAssistant, SensorSource, WeatherSource};
use crate::widget::{self, render_all, WidgetRenderer};
use crate::{Error, Result};

const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

pub struct Dashboard {
    sources: Vec<Arc<dyn DataSource>>,
    renderers: Vec<Box<dyn WidgetRenderer>>,
    canvas: CanvasSpec,
    window: Duration,
    backend: RasterBackend,
}

impl Dashboard {
    pub fn new(canvas: CanvasSpec, backend: RasterBackend) -> Self {
        Self {
            sources: Vec::new(),
            renderers: Vec::new(),
            canvas,
            window: DEFAULT_WINDOW,
            backend,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn WidgetRenderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Build sources, one renderer per configured slot, and the raster
    /// backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        let canvas = config.canvas_spec()?;
        canvas.validate()?;

        let mut dashboard = Self::new(canvas.clone(), backend_from_config(config)?).with_window(config.render.window());

        if let Some(weather) = &config.weather {
            dashboard = dashboard.with_source(Arc::new(WeatherSource::new(weather.settings())?));
        }
        if let Some(ha) = &config.home_assistant {
            let api = HomeAssistant::new(&ha.url, &ha.token)?;
            if !ha.calendars.is_empty() {
                dashboard = dashboard.with_source(Arc::new(CalendarSource::new(
                    api.clone(),
                    ha.calendars.clone(),
                    ha.weeks(),
                )));
            }
            if !ha.sensors.is_empty() {
                dashboard = dashboard.with_source(Arc::new(SensorSource::new(api, ha.sensors.clone())));
            }
        }

        for slot in &canvas.slots {
            dashboard = dashboard.with_renderer(renderer_for(&slot.name, config)?);
        }
        info!(
            "dashboard with {} sources and {} widgets",
            dashboard.sources.len(),
            dashboard.renderers.len()
        );
        Ok(dashboard)
    }

    pub fn canvas(&self) -> &CanvasSpec {
        &self.canvas
    }

    /// Run against the local clock.
    pub async fn run(&self) -> Result<Bitmap> {
        let now = Local::now();
        self.run_at(now.with_timezone(now.offset())).await
    }

    pub async fn run_at(&self, now: DateTime<FixedOffset>) -> Result<Bitmap> {
        let started = Instant::now();
        let context = aggregate(&self.sources, self.window, now).await;
        debug!("aggregation took {:?}", started.elapsed());
        let bitmap = self.render(&context).await?;
        info!("run finished in {:?}, digest {}", started.elapsed(), &bitmap.digest()[..12]);
        Ok(bitmap)
    }

    /// Everything after aggregation. Fails only on layout or service errors.
    pub async fn render(&self, context: &DashboardContext) -> Result<Bitmap> {
        let widgets = render_all(&self.renderers, context);
        let surface = layout(&widgets, &self.canvas)?;
        self.backend.rasterize(&surface).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.backend.shutdown().await
    }
}

fn renderer_for(name: &str, config: &Config) -> Result<Box<dyn WidgetRenderer>> {
    let weeks = config
        .home_assistant
        .as_ref()
        .map(|ha| ha.weeks())
        .unwrap_or(crate::source::calendar::DEFAULT_WEEKS);
    let renderer: Box<dyn WidgetRenderer> = match name {
        "weather" => Box::new(widget::WeatherWidget::new(
            config.widget_size(name, widget::weather::DEFAULT_SIZE),
        )),
        "forecast" => Box::new(widget::ForecastWidget::new(
            config.widget_size(name, widget::forecast::DEFAULT_SIZE),
        )),
        "calendar" => Box::new(widget::CalendarWidget::new(
            config.widget_size(name, widget::calendar::DEFAULT_SIZE),
            weeks,
        )),
        "agenda" => Box::new(widget::AgendaWidget::new(
            config.widget_size(name, widget::agenda::DEFAULT_SIZE),
        )),
        "sensors" => Box::new(widget::SensorsWidget::new(
            config.widget_size(name, widget::sensors::DEFAULT_SIZE),
        )),
        other => return Err(Error::ConfigError(format!("Unknown widget '{}'", other))),
    };
    Ok(renderer)
}

/// Vector tiles always; markup tiles when built with the `cdp` feature.
pub fn backend_from_config(config: &Config) -> Result<RasterBackend> {
    let vector = VectorTiles::new(config.render.load_system_fonts)?;
    Ok(RasterBackend::new(vector, markup_from_config(config)?))
}

#[cfg(feature = "cdp")]
fn markup_from_config(config: &Config) -> Result<Option<MarkupTiles>> {
    let window = crate::Size::new(config.canvas.width, config.canvas.height);
    let tiles = MarkupTiles::new(
        crate::cdp::engine_factory(window),
        config.render.worker_count(),
        config.render.markup_timeout(),
    );
    Ok(Some(match &config.render.stylesheet {
        Some(path) => tiles.with_stylesheet(std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Cannot read stylesheet {}: {}", path.display(), e))
        })?),
        None => tiles,
    }))
}

#[cfg(not(feature = "cdp"))]
fn markup_from_config(_config: &Config) -> Result<Option<MarkupTiles>> {
    Ok(None)
}
