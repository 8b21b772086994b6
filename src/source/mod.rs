//! Data source adapters
//!
//! Every upstream service is wrapped in a [`DataSource`]. Adapters normalize
//! provider payloads into a [`SourceValue`] and report every problem as a
//! typed [`SourceFailure`], so the aggregator only ever sees
//! [`SourceResult`]s and never provider-specific fields.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub mod cache;
pub mod calendar;
pub mod home_assistant;
pub mod http;
pub mod sensors;
pub mod weather;

pub use cache::{Cached, TtlCache};
pub use calendar::{Calendar, CalendarSource, Event};
pub use home_assistant::HomeAssistant;
pub use sensors::{SensorReading, SensorSource, Sensors};
pub use weather::{Condition, Forecast, HourlyForecast, Weather, WeatherSource};

/// Why a fetch did not produce a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The shared deadline elapsed or the fetch was cancelled
    Timeout,
    /// Transport error or unexpected HTTP status
    Network,
    /// The response could not be decoded into the expected shape
    Parse,
    /// Credentials were rejected
    Auth,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Parse => "parse",
            FailureKind::Auth => "auth",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed fetch failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct SourceFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SourceFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, message)
    }
}

/// Normalized payload of a successful fetch
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Weather(Weather),
    Calendar(Calendar),
    Sensors(Sensors),
}

impl SourceValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SourceValue::Weather(_) => "weather",
            SourceValue::Calendar(_) => "calendar",
            SourceValue::Sensors(_) => "sensors",
        }
    }
}

/// Outcome of one adapter fetch. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResult {
    Success(SourceValue),
    Failure(SourceFailure),
}

impl SourceResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        SourceResult::Failure(SourceFailure::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SourceResult::Success(_))
    }

    pub fn value(&self) -> Option<&SourceValue> {
        match self {
            SourceResult::Success(value) => Some(value),
            SourceResult::Failure(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SourceResult::Success(_) => None,
            SourceResult::Failure(failure) => Some(failure.kind),
        }
    }
}

impl From<std::result::Result<SourceValue, SourceFailure>> for SourceResult {
    fn from(res: std::result::Result<SourceValue, SourceFailure>) -> Self {
        match res {
            Ok(value) => SourceResult::Success(value),
            Err(failure) => SourceResult::Failure(failure),
        }
    }
}

/// Per-run information handed to every adapter
///
/// All adapters of a run share the same `deadline`. `cancel` is triggered by
/// the aggregator once the deadline passes; adapters should stop as soon as
/// they observe it. `now` is the logical time of the run and is what adapters
/// use to compute date ranges and local offsets.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub deadline: Instant,
    pub cancel: CancellationToken,
    pub now: DateTime<FixedOffset>,
}

impl FetchContext {
    pub fn new(deadline: Instant, now: DateTime<FixedOffset>) -> Self {
        Self {
            deadline,
            cancel: CancellationToken::new(),
            now,
        }
    }

    /// Time left before the shared deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Drive `fut` until it finishes, the deadline passes, or the fetch is
    /// cancelled, whichever comes first.
    pub async fn run<T, F>(&self, fut: F) -> std::result::Result<T, SourceFailure>
    where
        F: Future<Output = std::result::Result<T, SourceFailure>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SourceFailure::timeout("fetch cancelled")),
            res = tokio::time::timeout_at(self.deadline, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(SourceFailure::timeout("deadline elapsed before upstream answered")),
            },
        }
    }
}

/// An upstream data provider
///
/// Implementations must return by the context deadline and must never panic
/// on upstream errors; every problem is reported as a `SourceFailure`.
pub trait DataSource: Send + Sync {
    /// Key of this source in the dashboard context
    fn name(&self) -> &str;

    /// Fetch and normalize the latest data
    fn fetch<'a>(&'a self, ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx(window: Duration) -> FetchContext {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 3, 12, 0, 0)
            .unwrap();
        FetchContext::new(Instant::now() + window, now)
    }

    #[tokio::test]
    async fn run_returns_inner_result() {
        let ctx = ctx(Duration::from_secs(1));
        let res = ctx.run(async { Ok::<_, SourceFailure>(5) }).await;
        assert_eq!(res, Ok(5));
    }

    #[tokio::test]
    async fn run_times_out_at_deadline() {
        let ctx = ctx(Duration::from_millis(20));
        let res: std::result::Result<(), _> = ctx.run(futures::future::pending()).await;
        assert_eq!(res.unwrap_err().kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn run_observes_cancellation() {
        let ctx = ctx(Duration::from_secs(30));
        ctx.cancel.cancel();
        let res: std::result::Result<(), _> = ctx.run(futures::future::pending()).await;
        let failure = res.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.message.contains("cancelled"));
    }

    #[test]
    fn failure_display_includes_kind() {
        let f = SourceFailure::auth("token rejected");
        assert_eq!(f.to_string(), "auth: token rejected");
        let r: SourceResult = Err(f).into();
        assert_eq!(r.failure_kind(), Some(FailureKind::Auth));
    }
}
