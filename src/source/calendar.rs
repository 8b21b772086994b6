//! Home Assistant calendar adapter

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use futures::future::{try_join_all, BoxFuture};
use log::debug;
use serde::Deserialize;

use super::home_assistant::HomeAssistant;
use super::{DataSource, FetchContext, SourceFailure, SourceResult, SourceValue};

pub const DEFAULT_WEEKS: u32 = 4;

/// One calendar entry. Ordering is by start, end, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Event {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub name: String,
    pub all_day: bool,
}

/// Events grouped by local start date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calendar {
    pub days: BTreeMap<NaiveDate, Vec<Event>>,
}

impl Calendar {
    /// De-duplicate, sort and group events.
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Self {
        let unique: BTreeSet<Event> = events.into_iter().collect();
        let mut days: BTreeMap<NaiveDate, Vec<Event>> = BTreeMap::new();
        for event in unique {
            days.entry(event.start.date_naive()).or_default().push(event);
        }
        Self { days }
    }

    pub fn events_on(&self, day: NaiveDate) -> &[Event] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count_on(&self, day: NaiveDate) -> usize {
        self.events_on(day).len()
    }

    pub fn len(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// The Monday that starts the week containing `now`
pub fn week_start(now: DateTime<FixedOffset>) -> NaiveDate {
    let today = now.date_naive();
    today - Days::new(u64::from(today.weekday().num_days_from_monday()))
}

/// Local midnight of `day` in `offset`
pub fn local_midnight(day: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    // A fixed offset has no gaps or folds, so the mapping is always single.
    offset.from_utc_datetime(&(day.and_time(NaiveTime::MIN) - offset))
}

#[derive(Debug, Deserialize)]
struct RawDate {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    summary: String,
    start: RawDate,
    end: RawDate,
}

fn parse_date(
    name: &str,
    raw: &RawDate,
    offset: FixedOffset,
) -> std::result::Result<(DateTime<FixedOffset>, bool), SourceFailure> {
    if let Some(dt) = raw.date_time.as_deref() {
        let parsed = DateTime::parse_from_rfc3339(dt)
            .or_else(|_| DateTime::parse_from_str(dt, "%Y-%m-%dT%H:%M:%S%z"))
            .map_err(|e| SourceFailure::parse(format!("event '{}': bad dateTime '{}': {}", name, dt, e)))?;
        return Ok((parsed.with_timezone(&offset), false));
    }
    if let Some(d) = raw.date.as_deref() {
        let day = NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|e| SourceFailure::parse(format!("event '{}': bad date '{}': {}", name, d, e)))?;
        return Ok((local_midnight(day, offset), true));
    }
    Err(SourceFailure::parse(format!(
        "The calendar event '{}' is missing a start date",
        name
    )))
}

impl RawEvent {
    fn into_event(self, offset: FixedOffset) -> std::result::Result<Event, SourceFailure> {
        let (start, _) = parse_date(&self.summary, &self.start, offset)?;
        let (end, all_day) = parse_date(&self.summary, &self.end, offset)?;
        Ok(Event {
            start,
            end,
            name: self.summary,
            all_day,
        })
    }
}

/// Parse one calendar response body into events.
pub fn parse_events(body: &str, offset: FixedOffset) -> std::result::Result<Vec<Event>, SourceFailure> {
    let raw: Vec<RawEvent> =
        serde_json::from_str(body).map_err(|e| SourceFailure::parse(e.to_string()))?;
    raw.into_iter().map(|r| r.into_event(offset)).collect()
}

/// Fetches events from one or more Home Assistant calendars
pub struct CalendarSource {
    api: HomeAssistant,
    calendars: Vec<String>,
    weeks: u32,
}

impl CalendarSource {
    pub fn new(api: HomeAssistant, calendars: Vec<String>, weeks: u32) -> Self {
        Self {
            api,
            calendars,
            weeks: weeks.max(1),
        }
    }

    /// Local start and end of the range shown on the dashboard
    pub fn range(&self, now: DateTime<FixedOffset>) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        let start = week_start(now);
        let end = start + Days::new(u64::from(self.weeks) * 7);
        (
            local_midnight(start, *now.offset()),
            local_midnight(end, *now.offset()),
        )
    }

    async fn fetch_calendar(
        &self,
        id: &str,
        ctx: &FetchContext,
    ) -> std::result::Result<Vec<Event>, SourceFailure> {
        let (start, end) = self.range(ctx.now);
        let path = format!("calendars/calendar.{}", id);
        let query = [("start", start.to_rfc3339()), ("end", end.to_rfc3339())];
        let raw: Vec<RawEvent> = self.api.get_json(&path, &query, ctx.remaining()).await?;
        debug!("calendar.{}: {} events", id, raw.len());
        raw.into_iter()
            .map(|r| r.into_event(*ctx.now.offset()))
            .collect()
    }
}

impl DataSource for CalendarSource {
    fn name(&self) -> &str {
        "calendar"
    }

    fn fetch<'a>(&'a self, ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult> {
        Box::pin(async move {
            let all = try_join_all(self.calendars.iter().map(|id| self.fetch_calendar(id, ctx)));
            let calendar = ctx
                .run(all)
                .await
                .map(|lists| SourceValue::Calendar(Calendar::from_events(lists.into_iter().flatten())));
            SourceResult::from(calendar)
        })
    }
}
