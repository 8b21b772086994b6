//! Current conditions and daily forecast (markup)

use std::fmt::Write;

use chrono::{DateTime, FixedOffset};

use super::{escape, WidgetContent, WidgetRenderer};
use crate::source::{SourceValue, Weather};
use crate::Size;

pub const DEFAULT_SIZE: Size = Size::new(800, 220);
const MAX_DAYS: usize = 6;

pub struct WeatherWidget {
    size: Size,
}

impl WeatherWidget {
    pub fn new(size: Size) -> Self {
        Self { size }
    }

    pub fn html(weather: &Weather) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<section class="weather"><div class="current"><i class="{icon}"></i><span class="temp">{temp}°</span><div class="summary"><span class="condition">{cond}</span><span class="range">H {hi}° / L {lo}°</span></div></div>"#,
            icon = escape(&weather.condition.css_class()),
            temp = weather.temperature,
            cond = escape(weather.condition.name),
            hi = weather.high_temp,
            lo = weather.low_temp,
        );
        out.push_str(r#"<ul class="daily">"#);
        for day in weather.forecasts.iter().take(MAX_DAYS) {
            let _ = write!(
                out,
                r#"<li><span class="day">{day}</span><i class="{icon}"></i><span class="hi">{hi}°</span><span class="lo">{lo}°</span></li>"#,
                day = day.date.format("%a"),
                icon = escape(&day.condition.css_class()),
                hi = day.high_temp,
                lo = day.low_temp,
            );
        }
        out.push_str("</ul></section>");
        out
    }
}

impl Default for WeatherWidget {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl WidgetRenderer for WeatherWidget {
    fn name(&self) -> &str {
        "weather"
    }

    fn title(&self) -> &str {
        "Weather"
    }

    fn source(&self) -> &str {
        "weather"
    }

    fn size(&self) -> Size {
        self.size
    }

    fn draw(&self, value: &SourceValue, _now: DateTime<FixedOffset>) -> Option<WidgetContent> {
        match value {
            SourceValue::Weather(weather) => Some(WidgetContent::Html(Self::html(weather))),
            _ => None,
        }
    }
}
