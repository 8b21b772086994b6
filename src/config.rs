//! TOML configuration with environment overrides for credentials
//!
//! Every section is optional. A config with no `[[slot]]` entries gets the
//! default five-widget portrait layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::rendering::layout::{CanvasSpec, Rect, Slot};
use crate::source::calendar::DEFAULT_WEEKS;
use crate::source::weather::{WeatherSettings, DEFAULT_CACHE_SECS, DEFAULT_ENDPOINT};
use crate::{parse_color, Error, Result, Size};

pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub background: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 820,
            height: 1200,
            background: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Aggregation window shared by all sources
    pub window_ms: u64,
    /// Per-render timeout for the headless engine
    pub markup_timeout_ms: u64,
    /// Headless worker count; defaults to `min(num_cpus, 2)`
    pub workers: Option<usize>,
    pub load_system_fonts: bool,
    /// Replaces the built-in markup stylesheet
    pub stylesheet: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_ms: 10_000,
            markup_timeout_ms: 10_000,
            workers: None,
            load_system_fonts: true,
            stylesheet: None,
        }
    }
}

impl RenderConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn markup_timeout(&self) -> Duration {
        Duration::from_millis(self.markup_timeout_ms)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().min(2)).max(1)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    /// Counter-clockwise degrees: 0, 90, 180 or 270
    pub rotate: u16,
    pub interval_secs: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output.png"),
            rotate: 0,
            interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_cache_secs")]
    pub cache_secs: u64,
}

fn default_units() -> String {
    "imperial".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_cache_secs() -> u64 {
    DEFAULT_CACHE_SECS
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            units: default_units(),
            endpoint: default_endpoint(),
            cache_secs: default_cache_secs(),
        }
    }
}

impl WeatherConfig {
    pub fn settings(&self) -> WeatherSettings {
        WeatherSettings {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            units: self.units.clone(),
            cache_ttl: Duration::from_secs(self.cache_secs),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeAssistantConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub calendars: Vec<String>,
    #[serde(default)]
    pub sensors: Vec<String>,
    pub weeks: Option<u32>,
}

impl HomeAssistantConfig {
    pub fn weeks(&self) -> u32 {
        self.weeks.unwrap_or(DEFAULT_WEEKS)
    }
}

/// Natural-size override for one widget
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WidgetConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl WidgetConfig {
    pub fn size_or(&self, default: Size) -> Size {
        Size::new(
            self.width.unwrap_or(default.width),
            self.height.unwrap_or(default.height),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub render: RenderConfig,
    pub output: OutputConfig,
    pub weather: Option<WeatherConfig>,
    pub home_assistant: Option<HomeAssistantConfig>,
    pub widgets: BTreeMap<String, WidgetConfig>,
    #[serde(rename = "slot")]
    pub slots: Vec<Slot>,
}

/// The default portrait layout: five full-width bands
pub fn default_slots() -> Vec<Slot> {
    [
        ("weather", 10, 230),
        ("forecast", 250, 150),
        ("calendar", 410, 410),
        ("agenda", 830, 250),
        ("sensors", 1090, 100),
    ]
    .into_iter()
    .map(|(name, y, height)| Slot::new(name, Rect::new(10, y, 800, height)))
    .collect()
}

impl Config {
    /// Load from `path`, or from `dashboard.toml` in the working directory
    /// when it exists, then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?,
            None => {
                debug!("no config file, using defaults");
                Self::default()
            }
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&text)?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Credentials and location from the environment win over the file.
    /// Setting any of them enables the corresponding section.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("HOMEASSISTANT_URL") {
            self.home_assistant.get_or_insert_with(Default::default).url = url;
        }
        if let Some(token) = lookup("HOMEASSISTANT_TOKEN") {
            self.home_assistant.get_or_insert_with(Default::default).token = token;
        }
        if let Some(key) = lookup("OPENWEATHERMAP_API_KEY") {
            self.weather.get_or_insert_with(Default::default).api_key = key;
        }
        for (var, is_latitude) in [("LATITUDE", true), ("LONGITUDE", false)] {
            let Some(value) = lookup(var) else { continue };
            let parsed: f64 = value
                .trim()
                .parse()
                .map_err(|_| Error::ConfigError(format!("{} must be a number, got '{}'", var, value)))?;
            let weather = self.weather.get_or_insert_with(Default::default);
            if is_latitude {
                weather.latitude = parsed;
            } else {
                weather.longitude = parsed;
            }
        }
        Ok(())
    }

    pub fn slots(&self) -> Vec<Slot> {
        if self.slots.is_empty() {
            default_slots()
        } else {
            self.slots.clone()
        }
    }

    pub fn canvas_spec(&self) -> Result<CanvasSpec> {
        Ok(CanvasSpec::new(
            Size::new(self.canvas.width, self.canvas.height),
            parse_color(&self.canvas.background)?,
            self.slots(),
        ))
    }

    pub fn widget_size(&self, name: &str, default: Size) -> Size {
        self.widgets
            .get(name)
            .map(|w| w.size_or(default))
            .unwrap_or(default)
    }

    pub fn validate(&self) -> Result<()> {
        self.canvas_spec()?.validate()?;
        if self.render.window_ms == 0 {
            return Err(Error::ConfigError("render.window_ms must be positive".to_string()));
        }
        if self.render.markup_timeout_ms == 0 {
            return Err(Error::ConfigError("render.markup_timeout_ms must be positive".to_string()));
        }
        if self.render.workers == Some(0) {
            return Err(Error::ConfigError("render.workers must be at least 1".to_string()));
        }
        if !matches!(self.output.rotate, 0 | 90 | 180 | 270) {
            return Err(Error::ConfigError(format!(
                "output.rotate must be 0, 90, 180 or 270, got {}",
                self.output.rotate
            )));
        }
        if let Some(ha) = &self.home_assistant {
            if ha.url.is_empty() {
                return Err(Error::ConfigError("home_assistant.url is required".to_string()));
            }
            if ha.weeks() == 0 {
                return Err(Error::ConfigError("home_assistant.weeks must be at least 1".to_string()));
            }
        }
        if let Some(weather) = &self.weather {
            if weather.api_key.is_empty() {
                return Err(Error::ConfigError("weather.api_key is required".to_string()));
            }
        }
        Ok(())
    }
}
