//! Hourly temperature chart (vector)

use chrono::{DateTime, FixedOffset};

use super::svg::{Anchor, PathData, SvgDocument};
use super::{WidgetContent, WidgetRenderer};
use crate::source::{HourlyForecast, SourceValue};
use crate::Size;

pub const DEFAULT_SIZE: Size = Size::new(800, 140);
const HOURS: usize = 24;
const SAMPLES: usize = 100;
const PADDING: f64 = 20.0;
const FONT_SIZE: f64 = 20.0;
const STROKE: f64 = 5.0;

/// Natural cubic spline through `(xs[i], ys[i])`; `xs` must be strictly
/// increasing.
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    // Second derivatives at each knot
    m: Vec<f64>,
}

impl CubicSpline {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Option<Self> {
        let n = xs.len();
        if n < 2 || ys.len() != n || xs.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let mut m = vec![0.0; n];
        if n > 2 {
            // Thomas algorithm over the interior knots, m[0] = m[n-1] = 0
            let mut cp = vec![0.0; n];
            let mut dp = vec![0.0; n];
            for i in 1..n - 1 {
                let a = h[i - 1];
                let b = 2.0 * (h[i - 1] + h[i]);
                let c = h[i];
                let d = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
                let denom = b - a * cp[i - 1];
                cp[i] = c / denom;
                dp[i] = (d - a * dp[i - 1]) / denom;
            }
            for i in (1..n - 1).rev() {
                m[i] = dp[i] - cp[i] * m[i + 1];
            }
        }

        Some(Self { xs, ys, m })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let last = self.xs.len() - 2;
        let i = self
            .xs
            .windows(2)
            .position(|w| x <= w[1])
            .unwrap_or(last);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;
        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}

pub struct ForecastWidget {
    size: Size,
}

impl ForecastWidget {
    pub fn new(size: Size) -> Self {
        Self { size }
    }

    /// Draw the next 24 hourly temperatures as a smoothed line.
    pub fn svg(hourly: &[HourlyForecast], size: Size) -> String {
        let (width, height) = (f64::from(size.width), f64::from(size.height));
        let mut doc = SvgDocument::new(size.width, size.height);
        doc.rect(0.0, 0.0, width, height, "white");

        let hours = &hourly[..hourly.len().min(HOURS)];
        let (Some(first), Some(last)) = (hours.first(), hours.last()) else {
            doc.text(width / 2.0, height / 2.0, FONT_SIZE, Anchor::Middle, "No hourly forecast");
            return doc.finish();
        };

        let min_temp = hours.iter().map(|h| h.temp).min().unwrap_or(first.temp);
        let max_temp = hours.iter().map(|h| h.temp).max().unwrap_or(first.temp);
        let span_secs = (last.time - first.time).num_seconds().max(1) as f64;
        let span_temp = f64::from((max_temp - min_temp).max(1));

        let x_scale = (width - PADDING * 1.5) / span_secs;
        let y_scale = (height - PADDING * 1.5) / span_temp;
        let coords = |h: &HourlyForecast| {
            let x = PADDING * 1.5 + (h.time - first.time).num_seconds() as f64 * x_scale;
            let y = height - PADDING - f64::from(h.temp - min_temp) * y_scale;
            (x, y)
        };

        let (xs, ys): (Vec<f64>, Vec<f64>) = hours.iter().map(coords).unzip();
        let path = match CubicSpline::new(xs.clone(), ys.clone()) {
            Some(spline) => {
                let (lo, hi) = (xs[0], xs[xs.len() - 1]);
                let step = (hi - lo) / (SAMPLES - 1) as f64;
                (1..SAMPLES).fold(PathData::new().move_to(lo, spline.eval(lo)), |p, i| {
                    let x = lo + step * i as f64;
                    p.line_to(x, spline.eval(x))
                })
            }
            // One point, or duplicate timestamps: draw the raw polyline
            None => xs
                .iter()
                .zip(&ys)
                .skip(1)
                .fold(PathData::new().move_to(xs[0], ys[0]), |p, (x, y)| p.line_to(*x, *y)),
        };
        doc.path(&path, STROKE);

        doc.text(0.0, height - 20.0, FONT_SIZE, Anchor::Start, &format!("{}°", min_temp))
            .text(0.0, 20.0, FONT_SIZE, Anchor::Start, &format!("{}°", max_temp));

        let label = |h: &HourlyForecast| h.time.format("%-I%p").to_string();
        let middle = &hours[hours.len() / 2];
        doc.text(30.0, height, FONT_SIZE, Anchor::Start, &label(first))
            .text(((width - 20.0) / 2.0).floor(), height, FONT_SIZE, Anchor::Start, &label(middle))
            .text(width, height, FONT_SIZE, Anchor::End, &label(last));

        doc.finish()
    }
}

impl Default for ForecastWidget {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl WidgetRenderer for ForecastWidget {
    fn name(&self) -> &str {
        "forecast"
    }

    fn title(&self) -> &str {
        "Forecast"
    }

    fn source(&self) -> &str {
        "weather"
    }

    fn size(&self) -> Size {
        self.size
    }

    fn draw(&self, value: &SourceValue, _now: DateTime<FixedOffset>) -> Option<WidgetContent> {
        match value {
            SourceValue::Weather(weather) => Some(WidgetContent::Svg(Self::svg(&weather.hourly, self.size))),
            _ => None,
        }
    }
}
