mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{fixed_now, Hang, Ready, Slow};
use dashboard::source::Sensors;
use dashboard::{aggregate, DataSource, FailureKind, SourceResult, SourceValue};

const WINDOW: Duration = Duration::from_millis(200);
// Scheduling slack on a loaded CI box
const EPSILON: Duration = Duration::from_millis(250);

#[tokio::test]
async fn returns_by_deadline_when_sources_hang() {
    let names: Vec<String> = (0..32).map(|i| format!("hang-{:02}", i)).collect();
    let mut sources: Vec<Arc<dyn DataSource>> = names
        .iter()
        .map(|name| Arc::new(Hang { name: name.clone() }) as Arc<dyn DataSource>)
        .collect();
    sources.push(Arc::new(Ready {
        name: "sensors",
        result: SourceResult::Success(SourceValue::Sensors(Sensors::default())),
    }));

    let started = Instant::now();
    let ctx = aggregate(&sources, WINDOW, fixed_now()).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= WINDOW, "returned before the deadline: {:?}", elapsed);
    assert!(elapsed < WINDOW + EPSILON, "took {:?}", elapsed);
    assert_eq!(ctx.len(), 33);
    assert!(ctx.get("sensors").unwrap().is_success());
    for name in &names {
        assert_eq!(ctx.get(name).unwrap().failure_kind(), Some(FailureKind::Timeout));
    }
}

#[tokio::test]
async fn slow_but_in_time_sources_succeed() {
    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(Slow {
            name: "quick",
            delay: Duration::from_millis(20),
        }),
        Arc::new(Slow {
            name: "late",
            delay: Duration::from_secs(5),
        }),
    ];
    let ctx = aggregate(&sources, WINDOW, fixed_now()).await;
    assert!(ctx.get("quick").unwrap().is_success());
    assert_eq!(ctx.get("late").unwrap().failure_kind(), Some(FailureKind::Timeout));
    assert_eq!(ctx.failures().count(), 1);
}

#[tokio::test]
async fn no_sources_is_an_empty_context() {
    let started = Instant::now();
    let ctx = aggregate(&[], WINDOW, fixed_now()).await;
    assert!(ctx.is_empty());
    assert!(started.elapsed() < WINDOW);
    assert_eq!(ctx.generated_at, fixed_now());
}
