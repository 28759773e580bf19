//! Single-Flight GC Scheduler
//!
//! The decision-and-dispatch loop: every tick it derives a fresh safe point
//! from the oracle clock and, when the run interval has passed and no sweep
//! is in flight, dispatches exactly one sweep to the executor. Sweep
//! completion comes back over a single-slot channel, so all state transitions
//! happen on the loop itself and need no locking.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cluster::ClusterError;
use crate::config::{Config, ExecMode};
use crate::metrics::Metrics;
use crate::timestamp::{SafePoint, Timestamp};

/// Fixed decision-loop period. Deliberately decoupled from the configured
/// run interval: how often we check is not how often we act.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Source of fresh cluster timestamps.
#[async_trait]
pub trait TimestampOracle: Send + Sync + 'static {
    async fn current_timestamp(&self) -> Result<Timestamp, ClusterError>;
}

/// Executes one GC sweep at a safe point. Opaque to the scheduler: it only
/// observes success or failure.
#[async_trait]
pub trait GcExecutor: Send + Sync + 'static {
    async fn run_sweep(
        &self,
        safe_point: SafePoint,
        mode: ExecMode,
        identifier: &str,
    ) -> Result<(), ClusterError>;
}

/// Outcome of one background sweep, delivered over the completion channel.
#[derive(Debug)]
struct SweepOutcome {
    safe_point: SafePoint,
    result: Result<(), ClusterError>,
}

/// The scheduler instance. Owns all mutable run state; constructed once and
/// consumed by [`GcScheduler::run`].
pub struct GcScheduler<O, E> {
    oracle: Arc<O>,
    executor: Arc<E>,

    mode: ExecMode,
    run_interval: Duration,
    life_time: Duration,
    tick_interval: Duration,

    // Run state. Mutated only on the loop; the background sweep communicates
    // exclusively through the completion channel.
    in_flight: bool,
    last_run: Option<Instant>,

    metrics: Arc<Metrics>,
}

impl<O, E> GcScheduler<O, E>
where
    O: TimestampOracle,
    E: GcExecutor,
{
    /// Create a scheduler from validated configuration.
    pub fn new(oracle: Arc<O>, executor: Arc<E>, config: &Config) -> Self {
        Self {
            oracle,
            executor,
            mode: config.mode,
            run_interval: config.run_interval,
            life_time: config.life_time,
            tick_interval: TICK_INTERVAL,
            in_flight: false,
            last_run: None,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Override the tick period.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Shared handle to the loop counters.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Drive the loop until the token is cancelled.
    ///
    /// Cancellation is observed at the select boundary only; an in-flight
    /// sweep is not aborted, it is simply no longer waited for.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let (done_tx, mut done_rx) = mpsc::channel::<SweepOutcome>(1);
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);

        info!(
            "Scheduler started, tick every {:?}, run interval {:?}, life time {:?}",
            self.tick_interval, self.run_interval, self.life_time
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping scheduler loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(&done_tx).await;
                }
                Some(outcome) = done_rx.recv() => {
                    self.complete(outcome);
                }
            }
        }

        info!("Scheduler stopped. {}", self.metrics.summary());
    }

    /// One decision-loop iteration.
    async fn tick(&mut self, done_tx: &mpsc::Sender<SweepOutcome>) {
        self.metrics.record_tick();

        if self.in_flight {
            info!("GC is running, skip");
            self.metrics.record_skip_running();
            return;
        }

        // The safe point must come from a timestamp fetched on this tick;
        // a stale one would silently shrink the retention window.
        let now = match self.oracle.current_timestamp().await {
            Ok(ts) => ts,
            Err(e) => {
                error!("Cannot get tso: {}", e);
                return;
            }
        };
        let safe_point = SafePoint::compute(now, self.life_time);

        if !is_due(self.last_run, self.run_interval, Instant::now()) {
            info!("GC run interval hasn't passed, skip");
            self.metrics.record_skip_interval();
            return;
        }

        info!("Start GC at {}, safe point {}", now, safe_point);
        self.in_flight = true;
        self.metrics.record_dispatch();

        let executor = Arc::clone(&self.executor);
        let mode = self.mode;
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let identifier = format!("gc-worker-{}", safe_point.into_raw());
            let result = executor.run_sweep(safe_point, mode, &identifier).await;
            if let Err(e) = &result {
                error!("GC job failed: {}", e);
            }
            // Single slot is enough: at most one sweep is ever in flight, so
            // this send can never block. A closed channel means the loop has
            // already exited.
            let _ = done_tx.send(SweepOutcome { safe_point, result }).await;
        });
    }

    /// Observe a sweep completion. The run interval is measured from here,
    /// not from dispatch, so long sweeps damp their own retry pressure; a
    /// failed sweep still counts against the pacing budget.
    fn complete(&mut self, outcome: SweepOutcome) {
        self.in_flight = false;
        self.last_run = Some(Instant::now());
        self.metrics.record_completion(outcome.result.is_ok());

        match outcome.result {
            Ok(()) => info!("GC finished, safe point {}", outcome.safe_point),
            Err(_) => info!("GC failed, safe point {}", outcome.safe_point),
        }
    }
}

/// Run-interval gate: a sweep is due when none has ever completed, or the
/// configured interval has passed since the last completion. Process-local
/// wall-clock pacing, independent of the cluster clock.
pub fn is_due(last_run: Option<Instant>, run_interval: Duration, now: Instant) -> bool {
    match last_run {
        None => true,
        Some(at) => now.duration_since(at) >= run_interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;
    use tokio::time::advance;

    struct MockOracle {
        ts: AtomicU64,
        fail: AtomicBool,
        calls: AtomicU64,
    }

    impl MockOracle {
        fn at(ts: Timestamp) -> Arc<Self> {
            Arc::new(Self {
                ts: AtomicU64::new(ts.into_raw()),
                fail: AtomicBool::new(false),
                calls: AtomicU64::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            let oracle = Self::at(Timestamp::compose(1_700_000_000_000, 0));
            oracle.fail.store(true, Ordering::Relaxed);
            oracle
        }
    }

    #[async_trait]
    impl TimestampOracle for MockOracle {
        async fn current_timestamp(&self) -> Result<Timestamp, ClusterError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail.load(Ordering::Relaxed) {
                return Err(ClusterError::ConnectionClosed);
            }
            // Advance the logical counter so every tick sees a fresh value.
            Ok(Timestamp::from_raw(self.ts.fetch_add(1, Ordering::Relaxed)))
        }
    }

    struct MockExecutor {
        dispatches: AtomicU64,
        fail: AtomicBool,
        gate: Option<Arc<Semaphore>>,
        seen: Mutex<Vec<(SafePoint, ExecMode, String)>>,
    }

    impl MockExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                dispatches: AtomicU64::new(0),
                fail: AtomicBool::new(false),
                gate: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            let exec = Self::new();
            exec.fail.store(true, Ordering::Relaxed);
            exec
        }

        // Sweeps block until a permit is added to `gate`.
        fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
            Arc::new(Self {
                dispatches: AtomicU64::new(0),
                fail: AtomicBool::new(false),
                gate: Some(gate),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn dispatches(&self) -> u64 {
            self.dispatches.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl GcExecutor for MockExecutor {
        async fn run_sweep(
            &self,
            safe_point: SafePoint,
            mode: ExecMode,
            identifier: &str,
        ) -> Result<(), ClusterError> {
            self.dispatches.fetch_add(1, Ordering::Relaxed);
            self.seen
                .lock()
                .unwrap()
                .push((safe_point, mode, identifier.to_string()));

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }

            if self.fail.load(Ordering::Relaxed) {
                Err(ClusterError::Remote("sweep failed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn scheduler<O: TimestampOracle, E: GcExecutor>(
        oracle: Arc<O>,
        executor: Arc<E>,
    ) -> GcScheduler<O, E> {
        GcScheduler::new(oracle, executor, &Config::default())
    }

    #[test]
    fn test_is_due_gate_boundaries() {
        let t0 = Instant::now();
        let r = Duration::from_secs(600);

        // Never ran: always due.
        assert!(is_due(None, r, t0));

        // [t0, t0+r) is not due; t0+r and beyond is.
        assert!(!is_due(Some(t0), r, t0));
        assert!(!is_due(Some(t0), r, t0 + r - Duration::from_millis(1)));
        assert!(is_due(Some(t0), r, t0 + r));
        assert!(is_due(Some(t0), r, t0 + r + Duration::from_secs(3600)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_dispatches_and_completion_resets() {
        let now = Timestamp::compose(1_700_000_000_000, 5);
        let oracle = MockOracle::at(now);
        let executor = MockExecutor::new();
        let mut sched = scheduler(oracle, Arc::clone(&executor));
        let (tx, mut rx) = mpsc::channel(1);

        sched.tick(&tx).await;
        assert!(sched.in_flight);
        assert_eq!(executor.dispatches(), 1);

        // The sweep saw the freshly computed safe point, zero logical,
        // the configured mode and the derived identifier.
        let outcome = rx.recv().await.unwrap();
        {
            let seen = executor.seen.lock().unwrap();
            let (sp, mode, id) = &seen[0];
            assert_eq!(sp.timestamp().physical_millis(), 1_699_999_400_000);
            assert_eq!(sp.timestamp().logical(), 0);
            assert_eq!(*mode, ExecMode::Distributed);
            assert_eq!(*id, format!("gc-worker-{}", sp.into_raw()));
        }

        sched.complete(outcome);
        assert!(!sched.in_flight);
        assert!(sched.last_run.is_some());
        assert_eq!(sched.metrics.completed_ok(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_skips_while_in_flight() {
        let oracle = MockOracle::at(Timestamp::compose(1_700_000_000_000, 0));
        let executor = MockExecutor::gated(Arc::new(Semaphore::new(0)));
        let mut sched = scheduler(Arc::clone(&oracle), Arc::clone(&executor));
        let (tx, _rx) = mpsc::channel(1);

        sched.tick(&tx).await;
        assert_eq!(executor.dispatches(), 1);
        let oracle_calls = oracle.calls.load(Ordering::Relaxed);

        // Subsequent ticks short-circuit before even consulting the oracle.
        for _ in 0..9 {
            sched.tick(&tx).await;
        }
        assert_eq!(executor.dispatches(), 1);
        assert_eq!(oracle.calls.load(Ordering::Relaxed), oracle_calls);
        assert_eq!(sched.metrics.skipped_running(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_oracle_failure_leaves_state() {
        let oracle = MockOracle::failing();
        let executor = MockExecutor::new();
        let mut sched = scheduler(oracle, Arc::clone(&executor));
        let (tx, _rx) = mpsc::channel(1);

        sched.tick(&tx).await;

        assert!(!sched.in_flight);
        assert!(sched.last_run.is_none());
        assert_eq!(executor.dispatches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_respects_run_interval() {
        let oracle = MockOracle::at(Timestamp::compose(1_700_000_000_000, 0));
        let executor = MockExecutor::new();
        let mut sched = scheduler(oracle, Arc::clone(&executor));
        let (tx, _rx) = mpsc::channel(1);

        sched.last_run = Some(Instant::now());
        sched.tick(&tx).await;
        assert_eq!(executor.dispatches(), 0);
        assert_eq!(sched.metrics.skipped_interval(), 1);

        // Once the interval has fully passed, the next tick dispatches.
        advance(Duration::from_secs(600)).await;
        sched.tick(&tx).await;
        assert_eq!(executor.dispatches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_single_flight_under_long_sweep() {
        let oracle = MockOracle::at(Timestamp::compose(1_700_000_000_000, 0));
        let executor = MockExecutor::gated(Arc::new(Semaphore::new(0)));
        let sched = scheduler(oracle, Arc::clone(&executor));
        let metrics = sched.metrics();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sched.run(shutdown.clone()));

        // Ten ticks elapse while the sweep never completes: exactly one
        // dispatch, nine "GC is running" skips.
        tokio::time::sleep(Duration::from_secs(605)).await;
        assert_eq!(executor.dispatches(), 1);
        assert_eq!(metrics.dispatched(), 1);
        assert_eq!(metrics.skipped_running(), 9);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_redispatches_after_failure() {
        let oracle = MockOracle::at(Timestamp::compose(1_700_000_000_000, 0));
        let executor = MockExecutor::failing();
        let sched = scheduler(oracle, Arc::clone(&executor));
        let metrics = sched.metrics();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sched.run(shutdown.clone()));

        // First dispatch at t=60 fails immediately; the failure still counts
        // against the pacing budget, so the next dispatch lands on the first
        // tick at least run_interval after completion (t=660).
        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(executor.dispatches(), 2);
        assert!(metrics.completed_err() >= 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_completion_reenables_dispatch() {
        let gate = Arc::new(Semaphore::new(0));
        let oracle = MockOracle::at(Timestamp::compose(1_700_000_000_000, 0));
        let executor = MockExecutor::gated(Arc::clone(&gate));
        let sched = scheduler(oracle, Arc::clone(&executor));
        let metrics = sched.metrics();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sched.run(shutdown.clone()));

        // Dispatch at t=60; release the sweep at t=150.
        tokio::time::sleep(Duration::from_secs(150)).await;
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(metrics.completed_ok(), 1);

        // last_run anchors at completion (~t=150), not dispatch, so the
        // second dispatch lands on the first tick past t=750.
        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(executor.dispatches(), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_while_sweep_in_flight() {
        let oracle = MockOracle::at(Timestamp::compose(1_700_000_000_000, 0));
        let executor = MockExecutor::gated(Arc::new(Semaphore::new(0)));
        let sched = scheduler(oracle, Arc::clone(&executor));
        let metrics = sched.metrics();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sched.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(executor.dispatches(), 1);

        // The loop must exit promptly even though the sweep never finishes.
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(metrics.completed_ok() + metrics.completed_err(), 0);
    }
}
