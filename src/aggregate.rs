//! Concurrent fan-out over all data sources with one hard deadline

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use log::{debug, info, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::source::{DataSource, FailureKind, FetchContext, SourceResult};

/// Everything the widgets of one run are rendered from
///
/// Keys are source names in sorted order. A name that is not present is a
/// "missing" source. Read-only once aggregation returns.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardContext {
    pub generated_at: DateTime<FixedOffset>,
    results: BTreeMap<String, SourceResult>,
}

impl DashboardContext {
    pub fn new(generated_at: DateTime<FixedOffset>) -> Self {
        Self {
            generated_at,
            results: BTreeMap::new(),
        }
    }

    /// Builder used by tests and callers that already hold results
    pub fn with(mut self, name: impl Into<String>, result: SourceResult) -> Self {
        self.results.insert(name.into(), result);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SourceResult> {
        self.results.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SourceResult)> {
        self.results
            .iter()
            .filter(|(_, r)| !r.is_success())
            .map(|(k, v)| (k.as_str(), v))
    }
}

/// Fetch every source concurrently and collect one result per source.
///
/// All sources start together and share the deadline `start + window`.
/// Sources still pending at the deadline get their cancellation token
/// triggered, their task aborted, and a `Timeout` failure recorded; a result
/// that shows up later is never read. The call itself returns by the
/// deadline no matter how many sources hang.
pub async fn aggregate(
    sources: &[Arc<dyn DataSource>],
    window: Duration,
    now: DateTime<FixedOffset>,
) -> DashboardContext {
    let started = Instant::now();
    let deadline = started + window;
    let root = CancellationToken::new();

    let pending = sources.iter().map(|source| {
        let ctx = FetchContext {
            deadline,
            cancel: root.child_token(),
            now,
        };
        let cancel = ctx.cancel.clone();
        let name = source.name().to_string();
        let source = Arc::clone(source);
        let mut handle = tokio::spawn(async move { source.fetch(&ctx).await });

        async move {
            let result = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => SourceResult::failure(
                    FailureKind::Network,
                    format!("adapter task failed: {}", join_err),
                ),
                Err(_) => {
                    cancel.cancel();
                    handle.abort();
                    SourceResult::failure(
                        FailureKind::Timeout,
                        format!("no result within {}ms", window.as_millis()),
                    )
                }
            };
            (name, result)
        }
    });

    let outcomes = join_all(pending).await;
    root.cancel();

    let mut context = DashboardContext::new(now);
    for (name, result) in outcomes {
        if context.results.contains_key(&name) {
            warn!("aggregate: duplicate source name '{}', keeping the first result", name);
            continue;
        }
        if let SourceResult::Failure(failure) = &result {
            warn!("aggregate: source '{}' failed: {}", name, failure);
        }
        context.results.insert(name, result);
    }

    debug!(
        "aggregate: {} sources in {}ms",
        sources.len(),
        started.elapsed().as_millis()
    );
    info!(
        "aggregate: {}/{} sources succeeded",
        context.len() - context.failures().count(),
        context.len()
    );
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Sensors, SourceValue};
    use chrono::TimeZone;
    use futures::future::BoxFuture;

    struct Ready(&'static str);

    impl DataSource for Ready {
        fn name(&self) -> &str {
            self.0
        }

        fn fetch<'a>(&'a self, _ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult> {
            Box::pin(async { SourceResult::Success(SourceValue::Sensors(Sensors::default())) })
        }
    }

    struct Panics;

    impl DataSource for Panics {
        fn name(&self) -> &str {
            "broken"
        }

        fn fetch<'a>(&'a self, _ctx: &'a FetchContext) -> BoxFuture<'a, SourceResult> {
            Box::pin(async {
                let garbage: Option<SourceResult> = None;
                garbage.expect("upstream returned garbage")
            })
        }
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 3, 12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn keys_are_sorted_and_complete() {
        let sources: Vec<Arc<dyn DataSource>> =
            vec![Arc::new(Ready("weather")), Arc::new(Ready("calendar"))];
        let ctx = aggregate(&sources, Duration::from_millis(200), now()).await;
        assert_eq!(ctx.names().collect::<Vec<_>>(), vec!["calendar", "weather"]);
        assert!(ctx.get("weather").unwrap().is_success());
        assert_eq!(ctx.generated_at, now());
    }

    #[tokio::test]
    async fn panicking_adapter_is_isolated() {
        let sources: Vec<Arc<dyn DataSource>> = vec![Arc::new(Panics), Arc::new(Ready("weather"))];
        let ctx = aggregate(&sources, Duration::from_millis(200), now()).await;
        assert_eq!(ctx.get("broken").unwrap().failure_kind(), Some(FailureKind::Network));
        assert!(ctx.get("weather").unwrap().is_success());
    }

    #[tokio::test]
    async fn duplicate_names_keep_first() {
        let sources: Vec<Arc<dyn DataSource>> = vec![Arc::new(Panics), Arc::new(Panics)];
        let ctx = aggregate(&sources, Duration::from_millis(200), now()).await;
        assert_eq!(ctx.len(), 1);
    }
}
