//! Upcoming events grouped by day (markup)

use std::fmt::Write;

use chrono::{DateTime, FixedOffset};

use super::{escape, WidgetContent, WidgetRenderer};
use crate::source::{Calendar, SourceValue};
use crate::Size;

pub const DEFAULT_SIZE: Size = Size::new(800, 240);
const MAX_EVENTS: usize = 8;

pub struct AgendaWidget {
    size: Size,
    max_events: usize,
}

impl AgendaWidget {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            max_events: MAX_EVENTS,
        }
    }

    pub fn html(calendar: &Calendar, now: DateTime<FixedOffset>, max_events: usize) -> String {
        let today = now.date_naive();
        let mut out = String::from(r#"<section class="agenda">"#);
        let mut shown = 0;

        for (day, events) in calendar.days.range(today..) {
            if shown >= max_events {
                break;
            }
            let heading = if *day == today {
                "Today".to_string()
            } else {
                day.format("%a, %b %-d").to_string()
            };
            let _ = write!(out, "<h3>{}</h3><ul>", escape(&heading));
            for event in events.iter().take(max_events - shown) {
                let when = if event.all_day {
                    "All day".to_string()
                } else {
                    event.start.format("%-I:%M %p").to_string()
                };
                let _ = write!(
                    out,
                    r#"<li><span class="when">{}</span><span class="what">{}</span></li>"#,
                    escape(&when),
                    escape(&event.name)
                );
                shown += 1;
            }
            out.push_str("</ul>");
        }

        if shown == 0 {
            out.push_str(r#"<p class="empty">Nothing scheduled</p>"#);
        }
        out.push_str("</section>");
        out
    }
}

impl Default for AgendaWidget {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl WidgetRenderer for AgendaWidget {
    fn name(&self) -> &str {
        "agenda"
    }

    fn title(&self) -> &str {
        "Agenda"
    }

    fn source(&self) -> &str {
        "calendar"
    }

    fn size(&self) -> Size {
        self.size
    }

    fn draw(&self, value: &SourceValue, now: DateTime<FixedOffset>) -> Option<WidgetContent> {
        match value {
            SourceValue::Calendar(calendar) => {
                Some(WidgetContent::Html(Self::html(calendar, now, self.max_events)))
            }
            _ => None,
        }
    }
}
