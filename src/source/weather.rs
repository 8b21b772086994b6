//! OpenWeatherMap One Call 3.0 adapter

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use futures::future::BoxFuture;
use log::{debug, warn};
use serde::Deserialize;
use url::Url;

use super::cache::{Cached, TtlCache};
use super::{http, DataSource, FetchContext, SourceFailure, SourceResult, SourceValue};
use crate::{Error, Result};

pub const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org/data/3.0/onecall";
pub const DEFAULT_CACHE_SECS: u64 = 600;

const THUNDERSTORM: u32 = 200;
const DRIZZLE: u32 = 300;
const RAIN: u32 = 500;
const SNOW: u32 = 600;

/// Human readable condition and its Weather Icons class suffix
///
/// Codes follow <https://openweathermap.org/weather-conditions>; icon names
/// are from <https://erikflowers.github.io/weather-icons/>.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub name: &'static str,
    pub icon: &'static str,
}

impl Condition {
    pub fn from_code(code: u32) -> Self {
        let (icon, name) = match code {
            c if (THUNDERSTORM..THUNDERSTORM + 100).contains(&c) => ("thunderstorm", "Thunderstorm"),
            c if (DRIZZLE..DRIZZLE + 100).contains(&c) => ("sprinkle", "Drizzle"),
            c if (RAIN..RAIN + 100).contains(&c) => ("rain", "Rain"),
            c if (SNOW..SNOW + 100).contains(&c) => ("snow", "Snow"),
            701 => ("fog", "Mist"),
            711 => ("smoke", "Smoke"),
            721 => ("day-haze", "Haze"),
            731 | 761 => ("dust", "Dust"),
            741 => ("fog", "Fog"),
            751 => ("sandstorm", "Sand"),
            762 => ("volcano", "Ash"),
            771 => ("strong-wind", "Squall"),
            781 => ("tornado", "Tornado"),
            800 => ("day-sunny", "Clear"),
            801 => ("cloud", "Few Clouds"),
            802 | 803 => ("cloudy", "Partly Cloudy"),
            804 => ("cloudy", "Overcast"),
            _ => ("na", "Unknown"),
        };
        Self { name, icon }
    }

    /// CSS classes for the icon font, e.g. `wi wi-day-sunny`
    pub fn css_class(&self) -> String {
        format!("wi wi-{}", self.icon)
    }
}

/// Hourly temperature point
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyForecast {
    pub time: DateTime<FixedOffset>,
    pub temp: i32,
    pub condition: Condition,
}

/// Daily forecast
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub date: DateTime<FixedOffset>,
    pub high_temp: i32,
    pub low_temp: i32,
    pub condition: Condition,
}

/// Current conditions plus forecasts
///
/// `forecasts` starts with tomorrow: today's daily entry is folded into
/// `high_temp`/`low_temp`.
#[derive(Debug, Clone, PartialEq)]
pub struct Weather {
    pub temperature: i32,
    pub high_temp: i32,
    pub low_temp: i32,
    pub condition: Condition,
    pub forecasts: Vec<Forecast>,
    pub hourly: Vec<HourlyForecast>,
}

#[derive(Debug, Deserialize)]
struct OneCallCondition {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct OneCallCurrent {
    temp: f64,
    #[serde(default)]
    weather: Vec<OneCallCondition>,
}

#[derive(Debug, Deserialize)]
struct OneCallHourly {
    dt: i64,
    temp: f64,
    #[serde(default)]
    weather: Vec<OneCallCondition>,
}

#[derive(Debug, Deserialize)]
struct OneCallTemp {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OneCallDaily {
    dt: i64,
    temp: OneCallTemp,
    #[serde(default)]
    weather: Vec<OneCallCondition>,
}

#[derive(Debug, Deserialize)]
struct OneCall {
    current: OneCallCurrent,
    #[serde(default)]
    hourly: Vec<OneCallHourly>,
    #[serde(default)]
    daily: Vec<OneCallDaily>,
}

fn first_condition(weather: &[OneCallCondition]) -> Condition {
    Condition::from_code(weather.first().map(|w| w.id).unwrap_or(0))
}

fn local_time(ts: i64, offset: FixedOffset) -> std::result::Result<DateTime<FixedOffset>, SourceFailure> {
    DateTime::from_timestamp(ts, 0)
        .map(|utc| utc.with_timezone(&offset))
        .ok_or_else(|| SourceFailure::parse(format!("timestamp {} out of range", ts)))
}

impl Weather {
    /// Normalize a One Call response, converting timestamps into `offset`.
    pub fn from_one_call_json(body: &str, offset: FixedOffset) -> std::result::Result<Self, SourceFailure> {
        let one: OneCall =
            serde_json::from_str(body).map_err(|e| SourceFailure::parse(e.to_string()))?;
        Self::from_one_call(one, offset)
    }

    fn from_one_call(one: OneCall, offset: FixedOffset) -> std::result::Result<Self, SourceFailure> {
        let mut forecasts = one
            .daily
            .iter()
            .map(|d| {
                Ok(Forecast {
                    date: local_time(d.dt, offset)?,
                    high_temp: d.temp.max as i32,
                    low_temp: d.temp.min as i32,
                    condition: first_condition(&d.weather),
                })
            })
            .collect::<std::result::Result<Vec<_>, SourceFailure>>()?;
        forecasts.sort_by_key(|f| f.date);

        let mut hourly = one
            .hourly
            .iter()
            .map(|h| {
                Ok(HourlyForecast {
                    time: local_time(h.dt, offset)?,
                    temp: h.temp as i32,
                    condition: first_condition(&h.weather),
                })
            })
            .collect::<std::result::Result<Vec<_>, SourceFailure>>()?;
        hourly.sort_by_key(|h| h.time);

        if forecasts.is_empty() {
            return Err(SourceFailure::parse("response has no daily forecast"));
        }
        let today = forecasts.remove(0);

        Ok(Weather {
            temperature: one.current.temp as i32,
            high_temp: today.high_temp,
            low_temp: today.low_temp,
            condition: first_condition(&one.current.weather),
            forecasts,
            hourly,
        })
    }
}

/// Settings for [`WeatherSource`]
#[derive(Debug, Clone)]
pub struct WeatherSettings {
    pub endpoint: String,
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub units: String,
    pub cache_ttl: Duration,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            units: "imperial".to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_SECS),
        }
    }
}

/// Fetches current weather and forecasts for one location
pub struct WeatherSource {
    client: reqwest::Client,
    endpoint: Url,
    settings: WeatherSettings,
    cache: TtlCache<Weather>,
}

impl WeatherSource {
    pub fn new(settings: WeatherSettings) -> Result<Self> {
        let endpoint = Url::parse(&settings.endpoint).map_err(|e| {
            Error::ConfigError(format!("Invalid weather endpoint '{}': {}", settings.endpoint, e))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            cache: TtlCache::new(settings.cache_ttl),
            settings,
        })
    }

    fn cache_key(&self) -> String {
        format!("{},{}", self.settings.latitude, self.settings.longitude)
    }

    fn request_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("lat", &self.settings.latitude.to_string())
            .append_pair("lon", &self.settings.longitude.to_string())
            .append_pair("appid", &self.settings.api_key)
            .append_pair("units", &self.settings.units)
            .append_pair("exclude", "minutely");
        url
    }

    async fn fetch_fresh(&self, ctx: &FetchContext) -> std::result::Result<Weather, SourceFailure> {
        let request = self.client.get(self.request_url()).timeout(ctx.remaining());
        let one: OneCall = http::get_json(request).await?;
        Weather::from_one_call(one, *ctx.now.offset())
    }
}

impl DataSource for WeatherSource {
    fn name(&self) -> &str {
        "weather"
    }

    fn fetch<'a>(&'a self, ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult> {
        Box::pin(async move {
            let key = self.cache_key();
            let stale = match self.cache.load(&key) {
                Some(Cached::Fresh(weather)) => {
                    debug!("weather: serving cached data for {}", key);
                    return SourceResult::Success(SourceValue::Weather(weather));
                }
                Some(Cached::Stale(weather)) => Some(weather),
                None => None,
            };

            match ctx.run(self.fetch_fresh(ctx)).await {
                Ok(weather) => {
                    self.cache.save(&key, weather.clone());
                    SourceResult::Success(SourceValue::Weather(weather))
                }
                Err(failure) => match stale {
                    Some(weather) => {
                        warn!("weather: {}; falling back to stale data", failure);
                        SourceResult::Success(SourceValue::Weather(weather))
                    }
                    None => SourceResult::Failure(failure),
                },
            }
        })
    }
}
