//! Widgets and the renderers that produce them
//!
//! A [`WidgetRenderer`] is a pure function of the [`DashboardContext`]: it
//! looks up its own source, and either draws the data or, when the source
//! failed, is missing, or holds the wrong kind of payload, returns the
//! "unavailable" placeholder. Renderers never fail.

use chrono::{DateTime, FixedOffset};

use crate::aggregate::DashboardContext;
use crate::source::{SourceResult, SourceValue};
use crate::Size;

pub mod agenda;
pub mod calendar;
pub mod forecast;
pub mod placeholder;
pub mod sensors;
pub mod svg;
pub mod weather;

pub use agenda::AgendaWidget;
pub use calendar::CalendarWidget;
pub use forecast::ForecastWidget;
pub use placeholder::placeholder;
pub use sensors::SensorsWidget;
pub use weather::WeatherWidget;

/// Which backend rasterizes a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// SVG document, rasterized in-process
    Vector,
    /// HTML fragment, screenshotted by the headless engine
    Markup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetContent {
    Svg(String),
    Html(String),
}

/// A named, sized drawable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Widget {
    pub name: String,
    /// Heading used if the tile has to be replaced by a placeholder
    pub title: String,
    /// Natural size; the layout slot must be at least this large
    pub size: Size,
    pub content: WidgetContent,
    /// Blend over what is underneath instead of overwriting it
    pub transparent: bool,
}

impl Widget {
    pub fn vector(name: impl Into<String>, size: Size, svg: String) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            size,
            content: WidgetContent::Svg(svg),
            transparent: false,
        }
    }

    pub fn markup(name: impl Into<String>, size: Size, html: String) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            size,
            content: WidgetContent::Html(html),
            transparent: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn kind(&self) -> WidgetKind {
        match self.content {
            WidgetContent::Svg(_) => WidgetKind::Vector,
            WidgetContent::Html(_) => WidgetKind::Markup,
        }
    }
}

/// Maps one context fragment to a widget
pub trait WidgetRenderer: Send + Sync {
    /// Widget name; also the layout slot it goes into
    fn name(&self) -> &str;

    /// Heading shown on the placeholder
    fn title(&self) -> &str;

    /// Context key this renderer reads
    fn source(&self) -> &str;

    fn size(&self) -> Size;

    /// Draw `value`. `None` means the payload is not one this renderer
    /// understands.
    fn draw(&self, value: &SourceValue, now: DateTime<FixedOffset>) -> Option<WidgetContent>;

    /// Render from the full context, degrading to the placeholder.
    fn render(&self, context: &DashboardContext) -> Widget {
        let reason = match context.get(self.source()) {
            Some(SourceResult::Success(value)) => match self.draw(value, context.generated_at) {
                Some(content) => {
                    return Widget {
                        name: self.name().to_string(),
                        title: self.title().to_string(),
                        size: self.size(),
                        content,
                        transparent: false,
                    }
                }
                None => format!("unexpected {} data", value.kind_name()),
            },
            Some(SourceResult::Failure(failure)) => failure.kind.to_string(),
            None => "no data".to_string(),
        };
        placeholder(self.name(), self.title(), self.size(), &reason)
    }
}

/// Render every widget in declaration order.
pub fn render_all(renderers: &[Box<dyn WidgetRenderer>], context: &DashboardContext) -> Vec<Widget> {
    renderers.iter().map(|r| r.render(context)).collect()
}

/// Escape text for HTML and XML content or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
