//! Multi-week month grid with per-day event counts (markup)

use std::fmt::Write;

use chrono::{DateTime, Days, FixedOffset, NaiveDate};

use super::{escape, WidgetContent, WidgetRenderer};
use crate::source::calendar::{week_start, DEFAULT_WEEKS};
use crate::source::{Calendar, SourceValue};
use crate::Size;

pub const DEFAULT_SIZE: Size = Size::new(800, 400);
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// One grid cell
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateCount {
    pub day: NaiveDate,
    pub events: usize,
    pub is_past: bool,
    pub is_today: bool,
}

/// Every date from the Monday of the current week, spanning `weeks` weeks,
/// plus the (exclusive) end date.
pub fn calendar_dates(now: DateTime<FixedOffset>, weeks: u32) -> (Vec<NaiveDate>, NaiveDate) {
    let start = week_start(now);
    let days = u64::from(weeks) * 7;
    let dates = (0..days).map(|i| start + Days::new(i)).collect();
    (dates, start + Days::new(days))
}

pub fn dates_with_events(dates: &[NaiveDate], calendar: &Calendar, today: NaiveDate) -> Vec<DateCount> {
    dates
        .iter()
        .map(|&day| DateCount {
            day,
            events: calendar.count_on(day),
            is_past: day < today,
            is_today: day == today,
        })
        .collect()
}

pub struct CalendarWidget {
    size: Size,
    weeks: u32,
}

impl CalendarWidget {
    pub fn new(size: Size, weeks: u32) -> Self {
        Self {
            size,
            weeks: weeks.max(1),
        }
    }

    pub fn html(calendar: &Calendar, now: DateTime<FixedOffset>, weeks: u32) -> String {
        let (dates, _) = calendar_dates(now, weeks);
        let cells = dates_with_events(&dates, calendar, now.date_naive());

        let mut out = String::new();
        let _ = write!(
            out,
            r#"<section class="calendar"><h2>{}</h2><table><thead><tr>"#,
            escape(&now.format("%B %Y").to_string())
        );
        for day in WEEKDAYS {
            let _ = write!(out, "<th>{}</th>", day);
        }
        out.push_str("</tr></thead><tbody>");

        for week in cells.chunks(7) {
            out.push_str("<tr>");
            for cell in week {
                let mut class = String::from("day");
                if cell.is_past {
                    class.push_str(" past");
                }
                if cell.is_today {
                    class.push_str(" today");
                }
                let _ = write!(
                    out,
                    r#"<td class="{}"><span class="date">{}</span>"#,
                    class,
                    cell.day.format("%-d")
                );
                if cell.events > 0 {
                    let _ = write!(out, r#"<span class="count">{}</span>"#, cell.events);
                }
                out.push_str("</td>");
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody></table></section>");
        out
    }
}

impl Default for CalendarWidget {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE, DEFAULT_WEEKS)
    }
}

impl WidgetRenderer for CalendarWidget {
    fn name(&self) -> &str {
        "calendar"
    }

    fn title(&self) -> &str {
        "Calendar"
    }

    fn source(&self) -> &str {
        "calendar"
    }

    fn size(&self) -> Size {
        self.size
    }

    fn draw(&self, value: &SourceValue, now: DateTime<FixedOffset>) -> Option<WidgetContent> {
        match value {
            SourceValue::Calendar(calendar) => Some(WidgetContent::Html(Self::html(calendar, now, self.weeks))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Event;
    use chrono::TimeZone;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 3, 9, 0, 0)
            .unwrap()
    }

    fn event(day: u32, name: &str) -> Event {
        let start = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap();
        Event {
            start,
            end: start + chrono::Duration::hours(1),
            name: name.into(),
            all_day: false,
        }
    }

    #[test]
    fn dates_start_monday_and_span_weeks() {
        let (dates, end) = calendar_dates(now(), 4);
        assert_eq!(dates.len(), 28);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 29).unwrap());
    }

    #[test]
    fn counts_and_flags() {
        let cal = Calendar::from_events(vec![event(1, "a"), event(3, "b"), event(3, "c")]);
        let (dates, _) = calendar_dates(now(), 1);
        let cells = dates_with_events(&dates, &cal, now().date_naive());
        assert_eq!(cells[0].events, 1);
        assert!(cells[0].is_past);
        assert_eq!(cells[2].events, 2);
        assert!(cells[2].is_today && !cells[2].is_past);
        assert!(!cells[3].is_past && !cells[3].is_today);
    }

    #[test]
    fn html_marks_today() {
        let cal = Calendar::from_events(vec![event(3, "b")]);
        let html = CalendarWidget::html(&cal, now(), 2);
        assert!(html.contains("<h2>January 2024</h2>"));
        assert!(html.contains(r#"<td class="day today"><span class="date">3</span><span class="count">1</span></td>"#));
        assert_eq!(html.matches("<tr>").count(), 3);
    }
}
