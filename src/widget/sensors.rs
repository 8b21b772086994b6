//! Sensor readings table (vector)

use chrono::{DateTime, FixedOffset};

use super::svg::{Anchor, SvgDocument};
use super::{WidgetContent, WidgetRenderer};
use crate::source::{SensorReading, SourceValue};
use crate::Size;

pub const DEFAULT_SIZE: Size = Size::new(800, 100);
const ROW_HEIGHT: f64 = 32.0;
const FONT_SIZE: f64 = 24.0;
const MARGIN: f64 = 8.0;

pub struct SensorsWidget {
    size: Size,
}

impl SensorsWidget {
    pub fn new(size: Size) -> Self {
        Self { size }
    }

    /// One row per reading, name on the left and value on the right. Rows
    /// that would not fit are dropped.
    pub fn svg(readings: &[SensorReading], size: Size) -> String {
        let (width, height) = (f64::from(size.width), f64::from(size.height));
        let mut doc = SvgDocument::new(size.width, size.height);
        doc.rect(0.0, 0.0, width, height, "white");

        let rows = ((height - MARGIN) / ROW_HEIGHT).floor().max(0.0) as usize;
        for (i, reading) in readings.iter().take(rows).enumerate() {
            let baseline = MARGIN + ROW_HEIGHT * (i as f64 + 1.0) - (ROW_HEIGHT - FONT_SIZE);
            doc.text(MARGIN, baseline, FONT_SIZE, Anchor::Start, &reading.name)
                .text(width - MARGIN, baseline, FONT_SIZE, Anchor::End, &reading.display_value());
        }
        if readings.is_empty() {
            doc.text(width / 2.0, height / 2.0, FONT_SIZE, Anchor::Middle, "No sensors");
        }
        doc.finish()
    }
}

impl Default for SensorsWidget {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl WidgetRenderer for SensorsWidget {
    fn name(&self) -> &str {
        "sensors"
    }

    fn title(&self) -> &str {
        "Sensors"
    }

    fn source(&self) -> &str {
        "sensors"
    }

    fn size(&self) -> Size {
        self.size
    }

    fn draw(&self, value: &SourceValue, _now: DateTime<FixedOffset>) -> Option<WidgetContent> {
        match value {
            SourceValue::Sensors(sensors) => Some(WidgetContent::Svg(Self::svg(&sensors.readings, self.size))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(name: &str, state: &str) -> SensorReading {
        SensorReading {
            entity_id: format!("sensor.{}", name.to_lowercase()),
            name: name.into(),
            state: state.into(),
            unit: Some("°F".into()),
        }
    }

    #[test]
    fn rows_are_clipped_to_height() {
        let readings = vec![reading("Outdoor", "41"), reading("Garage", "50"), reading("Attic", "38")];
        let svg = SensorsWidget::svg(&readings, Size::new(400, 80));
        assert!(svg.contains(">Outdoor<"));
        assert!(svg.contains(">41 °F<"));
        assert!(svg.contains(">Garage<"));
        assert!(!svg.contains(">Attic<"));
    }
}
