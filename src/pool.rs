//! Pool of headless markup engines, each owned by a dedicated worker thread
//!
//! Engines are synchronous and not necessarily `Send`, so every engine is
//! created on its own OS thread and driven through a command channel. Async
//! callers talk to the worker with oneshot replies. A worker is guarded by an
//! async mutex so it never runs two renders at once; the pool spreads
//! concurrent renders across idle workers.
//!
//! Dropping the pool drops the command senders, which ends every worker loop
//! and with it the engine process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard, Semaphore};

use crate::{Error, Result, Size};

/// A synchronous engine that turns an HTML document into PNG bytes
pub trait MarkupEngine {
    /// Render `document` in a viewport of `size` and return the PNG.
    fn render_markup(&mut self, document: &str, size: Size) -> Result<Vec<u8>>;

    /// Whether the underlying process still answers. Checked after a failed
    /// render to tell a bad document from a dead engine.
    fn is_alive(&self) -> bool {
        true
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Creates one engine; called on the worker thread
pub type EngineFactory = Arc<dyn Fn() -> Result<Box<dyn MarkupEngine>> + Send + Sync>;

enum Command {
    Render {
        document: String,
        size: Size,
        reply: oneshot::Sender<Result<Vec<u8>>>,
    },
    Close(oneshot::Sender<Result<()>>),
}

struct Worker {
    id: usize,
    cmd_tx: Sender<Command>,
}

impl Worker {
    /// Spawn the thread and wait until its engine is up.
    async fn spawn(id: usize, factory: EngineFactory) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::Builder::new()
            .name(format!("markup-worker-{}", id))
            .spawn(move || {
                let mut engine = match factory() {
                    Ok(e) => e,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(()));

                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Render { document, size, reply } => {
                            let res = match engine.render_markup(&document, size) {
                                Err(err) if !err.is_service_failure() && !engine.is_alive() => {
                                    Err(Error::EngineFailure(format!("engine died while rendering: {}", err)))
                                }
                                other => other,
                            };
                            let dead = matches!(&res, Err(err) if err.is_service_failure());
                            let _ = reply.send(res);
                            if dead {
                                break;
                            }
                        }
                        Command::Close(reply) => {
                            let _ = reply.send(engine.close());
                            return;
                        }
                    }
                }
            })?;

        init_rx
            .await
            .map_err(|e| Error::InitializationError(format!("Worker init canceled: {}", e)))??;
        debug!("markup worker {} started", id);

        Ok(Self { id, cmd_tx })
    }

    async fn render(&self, document: String, size: Size) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Render {
                document,
                size,
                reply: tx,
            })
            .map_err(|_| Error::EngineFailure(format!("worker {} has exited", self.id)))?;
        rx.await
            .map_err(|_| Error::EngineFailure(format!("worker {} dropped the render", self.id)))?
    }

    async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close(tx)).is_err() {
            return Ok(());
        }
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}

type Slot = Arc<Mutex<Option<Worker>>>;

struct PoolShared {
    slots: Vec<Slot>,
    permits: Arc<Semaphore>,
    factory: EngineFactory,
    render_timeout: Duration,
    service_failures: AtomicUsize,
}

impl PoolShared {
    fn idle_slot(&self) -> Option<(usize, OwnedMutexGuard<Option<Worker>>)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(i, slot)| slot.clone().try_lock_owned().ok().map(|g| (i, g)))
    }

    async fn render(self: Arc<Self>, document: String, size: Size) -> Result<Vec<u8>> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::RasterService("worker pool is shut down".to_string()))?;
        let (id, mut guard) = self
            .idle_slot()
            .ok_or_else(|| Error::RenderError("no idle markup worker".to_string()))?;

        let result = match self.ensure_started(id, &mut guard).await {
            Ok(worker) => worker.render(document, size).await,
            Err(err) => Err(err),
        };
        let result = match result {
            Err(err) if err.is_service_failure() => Err(self.recover(id, &mut guard, err).await),
            other => other,
        };

        // Release the worker before the permit so the next waiter finds it idle
        drop(guard);
        drop(permit);
        result
    }

    /// Start a worker that never came up at launch. This is a late start,
    /// not a death, so it does not use up the run's failure budget; if the
    /// engine still cannot start only this widget degrades.
    async fn ensure_started<'g>(&self, id: usize, slot: &'g mut Option<Worker>) -> Result<&'g Worker> {
        if slot.is_none() {
            debug!("starting markup worker {} on demand", id);
            let worker = Worker::spawn(id, self.factory.clone())
                .await
                .map_err(|err| Error::RenderError(format!("markup worker {} could not start: {}", id, err)))?;
            *slot = Some(worker);
        }
        slot.as_ref()
            .ok_or_else(|| Error::RenderError(format!("markup worker {} is not running", id)))
    }

    /// First engine death in a run relaunches the worker and degrades the
    /// widget; anything after that takes the whole service down.
    async fn recover(&self, id: usize, slot: &mut Option<Worker>, err: Error) -> Error {
        *slot = None;
        let failures = self.service_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures > 1 {
            return Error::RasterService(format!("headless engine failed again: {}", err));
        }

        warn!("markup worker {} failed ({}), relaunching", id, err);
        match Worker::spawn(id, self.factory.clone()).await {
            Ok(worker) => {
                *slot = Some(worker);
                Error::RenderError(format!("headless engine restarted after: {}", err))
            }
            Err(relaunch) => Error::RasterService(format!("cannot relaunch headless engine: {}", relaunch)),
        }
    }
}

/// Fixed-size pool of markup workers, shared across widgets and runs
#[derive(Clone)]
pub struct HeadlessPool {
    shared: Arc<PoolShared>,
}

impl HeadlessPool {
    /// Start `size` workers. Workers that fail to start are retried lazily on
    /// first use; if none start at all the service is unavailable.
    pub async fn launch(size: usize, factory: EngineFactory, render_timeout: Duration) -> Result<Self> {
        if size == 0 {
            return Err(Error::ConfigError("worker pool needs at least one worker".to_string()));
        }

        let started = join_all((0..size).map(|id| Worker::spawn(id, factory.clone()))).await;
        let mut slots = Vec::with_capacity(size);
        let mut running = 0;
        let mut last_error = None;
        for (id, res) in started.into_iter().enumerate() {
            match res {
                Ok(worker) => {
                    running += 1;
                    slots.push(Arc::new(Mutex::new(Some(worker))));
                }
                Err(err) => {
                    warn!("markup worker {} failed to start: {}", id, err);
                    last_error = Some(err);
                    slots.push(Arc::new(Mutex::new(None)));
                }
            }
        }

        if running == 0 {
            let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
            return Err(Error::RasterService(format!("no markup worker could start: {}", reason)));
        }
        info!("markup pool started with {}/{} workers", running, size);

        Ok(Self {
            shared: Arc::new(PoolShared {
                slots,
                permits: Arc::new(Semaphore::new(size)),
                factory,
                render_timeout,
                service_failures: AtomicUsize::new(0),
            }),
        })
    }

    pub fn size(&self) -> usize {
        self.shared.slots.len()
    }

    /// Reset the per-run service failure count.
    pub fn begin_run(&self) {
        self.shared.service_failures.store(0, Ordering::SeqCst);
    }

    pub fn service_failures(&self) -> usize {
        self.shared.service_failures.load(Ordering::SeqCst)
    }

    /// Render one document on the next idle worker.
    ///
    /// Times out with [`Error::Timeout`] after the configured render timeout;
    /// the worker stays busy until its engine answers.
    pub async fn render(&self, document: String, size: Size) -> Result<Vec<u8>> {
        let task = tokio::spawn(self.shared.clone().render(document, size));
        match tokio::time::timeout(self.shared.render_timeout, task).await {
            Ok(Ok(res)) => res,
            Ok(Err(join)) => Err(Error::RenderError(format!("render task failed: {}", join))),
            Err(_) => Err(Error::Timeout(self.shared.render_timeout.as_millis() as u64)),
        }
    }

    /// Close every worker, waiting for in-flight renders.
    pub async fn shutdown(&self) -> Result<()> {
        self.shared.permits.close();
        for slot in &self.shared.slots {
            if let Some(worker) = slot.lock().await.take() {
                if let Err(err) = worker.close().await {
                    warn!("markup worker close failed: {}", err);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        delay: Duration,
    }

    impl MarkupEngine for Echo {
        fn render_markup(&mut self, document: &str, _size: Size) -> Result<Vec<u8>> {
            thread::sleep(self.delay);
            if document.contains("bad") {
                return Err(Error::RenderError("bad document".into()));
            }
            Ok(document.as_bytes().to_vec())
        }
    }

    fn echo(delay_ms: u64) -> EngineFactory {
        Arc::new(move || Ok(Box::new(Echo { delay: Duration::from_millis(delay_ms) }) as Box<dyn MarkupEngine>))
    }

    struct Dies;

    impl MarkupEngine for Dies {
        fn render_markup(&mut self, _document: &str, _size: Size) -> Result<Vec<u8>> {
            Err(Error::RenderError("connection closed".into()))
        }

        fn is_alive(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn renders_on_workers() {
        let pool = HeadlessPool::launch(2, echo(0), Duration::from_secs(5)).await.unwrap();
        assert_eq!(pool.size(), 2);
        let (a, b) = tokio::join!(
            pool.render("one".into(), Size::new(1, 1)),
            pool.render("two".into(), Size::new(1, 1))
        );
        assert_eq!(a.unwrap(), b"one");
        assert_eq!(b.unwrap(), b"two");
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn document_errors_do_not_count_as_service_failures() {
        let pool = HeadlessPool::launch(1, echo(0), Duration::from_secs(5)).await.unwrap();
        let err = pool.render("bad".into(), Size::new(1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::RenderError(_)));
        assert_eq!(pool.service_failures(), 0);
        assert_eq!(pool.render("ok".into(), Size::new(1, 1)).await.unwrap(), b"ok");
    }

    #[tokio::test]
    async fn slow_render_times_out() {
        let pool = HeadlessPool::launch(1, echo(300), Duration::from_millis(50)).await.unwrap();
        let err = pool.render("slow".into(), Size::new(1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(50)));
    }

    #[tokio::test]
    async fn no_worker_starts() {
        let factory: EngineFactory = Arc::new(|| Err(Error::InitializationError("no chrome".into())));
        let err = HeadlessPool::launch(2, factory, Duration::from_secs(1)).await.err().unwrap();
        assert!(matches!(err, Error::RasterService(_)));
    }

    #[tokio::test]
    async fn worker_missing_at_launch_starts_on_demand() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory: EngineFactory = Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::InitializationError("chrome still starting".into()));
            }
            Ok(Box::new(Echo { delay: Duration::from_millis(50) }) as Box<dyn MarkupEngine>)
        });
        let pool = HeadlessPool::launch(2, factory, Duration::from_secs(5)).await.unwrap();

        // Two renders at once occupy both slots, including the empty one
        let (a, b) = tokio::join!(
            pool.render("one".into(), Size::new(1, 1)),
            pool.render("two".into(), Size::new(1, 1))
        );
        assert_eq!(a.unwrap(), b"one");
        assert_eq!(b.unwrap(), b"two");
        assert_eq!(pool.service_failures(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn late_start_failure_degrades_without_using_the_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        // Worker 0 starts; every later start fails
        let factory: EngineFactory = Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Box::new(Echo { delay: Duration::from_millis(100) }) as Box<dyn MarkupEngine>)
            } else {
                Err(Error::InitializationError("no chrome".into()))
            }
        });
        let pool = HeadlessPool::launch(2, factory, Duration::from_secs(5)).await.unwrap();

        let (a, b) = tokio::join!(
            pool.render("one".into(), Size::new(1, 1)),
            pool.render("two".into(), Size::new(1, 1))
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::RenderError(msg)) if msg.contains("could not start"))));
        assert_eq!(pool.service_failures(), 0);
    }

    #[tokio::test]
    async fn second_engine_death_is_fatal() {
        let factory: EngineFactory = Arc::new(|| Ok(Box::new(Dies) as Box<dyn MarkupEngine>));
        let pool = HeadlessPool::launch(1, factory, Duration::from_secs(5)).await.unwrap();

        let err = pool.render("x".into(), Size::new(1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::RenderError(_)), "{:?}", err);
        let err = pool.render("x".into(), Size::new(1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::RasterService(_)), "{:?}", err);

        pool.begin_run();
        assert_eq!(pool.service_failures(), 0);
    }
}
