//! Telemetry retention and sampling engine.
//!
//! One updater task owns all mutable state: it drives the periodic
//! fetch cadence, applies fetch outcomes to the history store, and
//! publishes whole, consistent states through a shared lock. Everything
//! else, the UI included, only ever reads snapshots via [`Monitor`].

pub mod history;
pub mod locate;
pub mod reduce;

pub use history::{GpuSample, HistoryStore};
pub use reduce::RENDER_POINT_BUDGET;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, warn};

use crate::source::{FetchOutput, SampleSource, SourceError, Target};

/// Default fetch cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long samples are kept, independent of the selected display
/// window. Must cover the largest [`DisplayWindow`].
pub fn retention_horizon() -> ChronoDuration {
    ChronoDuration::hours(24)
}

/// User-selectable span of history shown by charts and queries.
///
/// Filters what is displayed, never what is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayWindow {
    OneHour,
    SixHours,
    #[default]
    OneDay,
}

impl DisplayWindow {
    pub const ALL: [DisplayWindow; 3] = [
        DisplayWindow::OneHour,
        DisplayWindow::SixHours,
        DisplayWindow::OneDay,
    ];

    pub fn duration(self) -> ChronoDuration {
        match self {
            DisplayWindow::OneHour => ChronoDuration::hours(1),
            DisplayWindow::SixHours => ChronoDuration::hours(6),
            DisplayWindow::OneDay => ChronoDuration::hours(24),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DisplayWindow::OneHour => "1h",
            DisplayWindow::SixHours => "6h",
            DisplayWindow::OneDay => "24h",
        }
    }
}

/// Connection status as seen by consumers. Exactly one holds at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineStatus {
    /// No valid target configured; a steady state, not a fault.
    #[default]
    SetupRequired,
    /// The last fetch succeeded.
    Connected,
    /// The last fetch failed; retried on the next tick.
    Error(String),
}

/// State published by the updater task.
#[derive(Debug, Default)]
pub struct EngineState {
    pub status: EngineStatus,
    /// Most recent reading per GPU; cleared on error or setup-required.
    pub current: Vec<GpuSample>,
    /// Raw source text from the most recent successful fetch.
    pub last_raw: String,
    pub history: HistoryStore,
}

impl EngineState {
    /// History for one GPU restricted to the display window ending at `now`.
    fn windowed_history(&self, gpu_index: u32, window: DisplayWindow, now: DateTime<Utc>) -> Vec<GpuSample> {
        self.history.snapshot_since(gpu_index, now - window.duration())
    }
}

type SharedState = Arc<RwLock<EngineState>>;

enum Command {
    Refresh,
    SetTarget(Target),
}

struct FetchOutcome {
    /// Configuration generation the fetch was issued under.
    generation: u64,
    result: Result<FetchOutput, SourceError>,
}

/// The single writer. Owns the target, the generation counter, and the
/// in-flight flag; every mutation of [`EngineState`] goes through here.
struct EngineCore {
    source: Arc<dyn SampleSource>,
    target: Target,
    generation: u64,
    in_flight: bool,
    shared: SharedState,
    outcome_tx: mpsc::Sender<FetchOutcome>,
}

impl EngineCore {
    /// Start a fetch unless the target is unset or one is already
    /// outstanding. Overlapping triggers coalesce into no-ops so that
    /// appends can never interleave out of timestamp order.
    fn trigger_refresh(&mut self) {
        if self.target.is_placeholder() {
            let mut state = self.shared.write().unwrap();
            state.status = EngineStatus::SetupRequired;
            state.current.clear();
            return;
        }
        if self.in_flight {
            debug!("fetch already in flight; coalescing trigger");
            return;
        }
        self.in_flight = true;

        let source = Arc::clone(&self.source);
        let target = self.target.clone();
        let generation = self.generation;
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = source.fetch(&target).await;
            let _ = outcome_tx.send(FetchOutcome { generation, result }).await;
        });
    }

    fn set_target(&mut self, target: Target) {
        debug!(user = %target.user, host = %target.host, "target changed");
        self.target = target;
        self.generation += 1;
        self.trigger_refresh();
    }

    fn apply_outcome(&mut self, outcome: FetchOutcome) {
        self.in_flight = false;
        if outcome.generation != self.generation {
            debug!(
                stale = outcome.generation,
                current = self.generation,
                "discarding fetch result from a superseded target"
            );
            return;
        }

        let mut state = self.shared.write().unwrap();
        match outcome.result {
            Ok(output) => {
                // One shared stamp for the whole batch keeps each GPU's
                // sequence non-decreasing across serialized fetches.
                let now = Utc::now();
                let samples: Vec<GpuSample> = output
                    .readings
                    .iter()
                    .map(|reading| GpuSample::from_reading(reading, now))
                    .collect();

                let cutoff = now - retention_horizon();
                for sample in &samples {
                    state.history.append(*sample);
                }
                // Only GPUs present in this batch are pruned; a GPU that
                // stopped reporting keeps its history frozen.
                for sample in &samples {
                    state.history.evict_before(sample.gpu_index, cutoff);
                }

                debug!(gpus = samples.len(), "applied fetch batch");
                state.current = samples;
                state.last_raw = output.raw;
                state.status = EngineStatus::Connected;
            }
            Err(err) => {
                warn!(error = %err, "fetch failed");
                state.status = EngineStatus::Error(err.to_string());
                state.current.clear();
            }
        }
    }
}

async fn run_updater(
    mut core: EngineCore,
    mut commands: mpsc::Receiver<Command>,
    mut outcomes: mpsc::Receiver<FetchOutcome>,
) {
    let mut ticker = time::interval(DEFAULT_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => core.trigger_refresh(),
            command = commands.recv() => match command {
                Some(Command::Refresh) => core.trigger_refresh(),
                Some(Command::SetTarget(target)) => core.set_target(target),
                // Handle dropped; stop updating.
                None => break,
            },
            Some(outcome) = outcomes.recv() => core.apply_outcome(outcome),
        }
    }
}

/// Handle to the engine: read-only queries plus the two triggers.
pub struct Monitor {
    shared: SharedState,
    commands: mpsc::Sender<Command>,
}

impl Monitor {
    /// Spawn the updater task. The first tick fires immediately, so a
    /// configured target is fetched right away on startup.
    pub fn spawn(source: Arc<dyn SampleSource>, target: Target) -> Self {
        let shared: SharedState = Arc::new(RwLock::new(EngineState::default()));
        let (command_tx, command_rx) = mpsc::channel(8);
        let (outcome_tx, outcome_rx) = mpsc::channel(4);

        let core = EngineCore {
            source,
            target,
            generation: 0,
            in_flight: false,
            shared: Arc::clone(&shared),
            outcome_tx,
        };
        tokio::spawn(run_updater(core, command_rx, outcome_rx));

        Self {
            shared,
            commands: command_tx,
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.shared.read().unwrap().status.clone()
    }

    /// Latest reading per GPU from the most recent successful fetch.
    pub fn current_readings(&self) -> Vec<GpuSample> {
        self.shared.read().unwrap().current.clone()
    }

    /// Raw source text kept for diagnostic display.
    pub fn last_raw_output(&self) -> String {
        self.shared.read().unwrap().last_raw.clone()
    }

    /// Every GPU index ever seen, ascending.
    pub fn resource_ids(&self) -> Vec<u32> {
        self.shared.read().unwrap().history.resource_ids()
    }

    /// One GPU's history restricted to the display window.
    pub fn history_for(&self, gpu_index: u32, window: DisplayWindow) -> Vec<GpuSample> {
        self.shared
            .read()
            .unwrap()
            .windowed_history(gpu_index, window, Utc::now())
    }

    /// Windowed history reduced for rendering; the bucket winner is
    /// chosen by used memory and reused for every chart of this GPU.
    pub fn downsampled(&self, gpu_index: u32, window: DisplayWindow, limit: usize) -> Vec<GpuSample> {
        reduce::downsample(&self.history_for(gpu_index, window), limit, |sample| {
            sample.memory_used_mib
        })
    }

    /// Sample closest to `query` within the display window.
    pub fn nearest(
        &self,
        gpu_index: u32,
        window: DisplayWindow,
        query: DateTime<Utc>,
    ) -> Option<GpuSample> {
        locate::nearest(&self.history_for(gpu_index, window), query).copied()
    }

    /// Request an immediate fetch, coalescing with any outstanding one.
    pub fn refresh_now(&self) {
        if self.commands.try_send(Command::Refresh).is_err() {
            debug!("refresh request dropped; updater busy or gone");
        }
    }

    /// Switch to a new target and fetch under a fresh generation; a
    /// late result from the old target will be discarded.
    pub fn set_target(&self, target: Target) {
        if self.commands.try_send(Command::SetTarget(target)).is_err() {
            warn!("target change dropped; updater busy or gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{GpuReading, MockSampleSource};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reading(index: u32, used: u64, total: u64, util: u16) -> GpuReading {
        GpuReading {
            index,
            memory_used_mib: used,
            memory_total_mib: total,
            utilization_percent: util,
        }
    }

    fn output(readings: Vec<GpuReading>) -> FetchOutput {
        FetchOutput {
            readings,
            raw: "raw".to_string(),
        }
    }

    fn core_with_mock(source: MockSampleSource, target: Target) -> (EngineCore, SharedState) {
        let shared: SharedState = Arc::new(RwLock::new(EngineState::default()));
        let (outcome_tx, _outcome_rx) = mpsc::channel(4);
        let core = EngineCore {
            source: Arc::new(source),
            target,
            generation: 0,
            in_flight: false,
            shared: Arc::clone(&shared),
            outcome_tx,
        };
        (core, shared)
    }

    async fn wait_until(monitor: &Monitor, predicate: impl Fn(&Monitor) -> bool) {
        for _ in 0..500 {
            if predicate(monitor) {
                return;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_target_means_setup_required_and_no_fetch() {
        // The mock panics on any unexpected call, so reaching the end
        // of this test proves no fetch was attempted.
        let monitor = Monitor::spawn(Arc::new(MockSampleSource::new()), Target::placeholder());

        wait_until(&monitor, |m| m.status() == EngineStatus::SetupRequired).await;
        monitor.refresh_now();
        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(monitor.status(), EngineStatus::SetupRequired);
        assert_eq!(monitor.current_readings(), vec![]);
    }

    #[tokio::test(start_paused = true)]
    async fn success_then_failure_keeps_history_but_clears_snapshot() {
        let mut source = MockSampleSource::new();
        // Expectations are matched in declaration order: the first fetch
        // succeeds once, every later fetch fails. (`Sequence` cannot be
        // used here because mockall only allows sequences on expectations
        // with an exact call count, and the second one is `1..`.)
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(output(vec![reading(0, 1024, 4096, 10)])));
        source
            .expect_fetch()
            .times(1..)
            .returning(|_| Err(SourceError::CommandFailed("boom".to_string())));

        let monitor = Monitor::spawn(Arc::new(source), Target::new("alice", "gpubox"));

        wait_until(&monitor, |m| m.status() == EngineStatus::Connected).await;
        let current = monitor.current_readings();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].usage_percent(), 25);
        assert_eq!(monitor.last_raw_output(), "raw");

        monitor.refresh_now();
        wait_until(&monitor, |m| matches!(m.status(), EngineStatus::Error(_))).await;

        assert_eq!(
            monitor.status(),
            EngineStatus::Error("ssh command failed: boom".to_string())
        );
        assert_eq!(monitor.current_readings(), vec![]);
        // A transient outage does not erase prior history.
        assert_eq!(monitor.history_for(0, DisplayWindow::OneDay).len(), 1);
        // Raw text from the last successful fetch stays queryable.
        assert_eq!(monitor.last_raw_output(), "raw");
    }

    #[tokio::test(start_paused = true)]
    async fn set_target_leaves_setup_required_and_fetches() {
        let mut source = MockSampleSource::new();
        source
            .expect_fetch()
            .times(1..)
            .returning(|_| Ok(output(vec![reading(0, 512, 2048, 5)])));

        let monitor = Monitor::spawn(Arc::new(source), Target::placeholder());
        wait_until(&monitor, |m| m.status() == EngineStatus::SetupRequired).await;

        monitor.set_target(Target::new("alice", "gpubox"));
        wait_until(&monitor, |m| m.status() == EngineStatus::Connected).await;
        assert_eq!(monitor.current_readings().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_parse_is_a_success_not_an_error() {
        let mut source = MockSampleSource::new();
        source.expect_fetch().times(1..).returning(|_| {
            Ok(FetchOutput {
                readings: vec![],
                raw: "no gpus here".to_string(),
            })
        });

        let monitor = Monitor::spawn(Arc::new(source), Target::new("alice", "gpubox"));
        wait_until(&monitor, |m| m.status() == EngineStatus::Connected).await;

        assert_eq!(monitor.current_readings(), vec![]);
        assert_eq!(monitor.last_raw_output(), "no gpus here");
    }

    #[tokio::test]
    async fn stale_generation_results_are_discarded() {
        let (mut core, shared) = core_with_mock(MockSampleSource::new(), Target::new("a", "b"));
        core.generation = 3;
        core.in_flight = true;

        core.apply_outcome(FetchOutcome {
            generation: 2,
            result: Ok(output(vec![reading(0, 1, 2, 3)])),
        });

        assert!(!core.in_flight);
        let state = shared.read().unwrap();
        assert_eq!(state.status, EngineStatus::SetupRequired);
        assert_eq!(state.history.resource_ids(), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn eviction_touches_only_gpus_in_the_batch() {
        let (mut core, shared) = core_with_mock(MockSampleSource::new(), Target::new("a", "b"));

        let ancient = Utc::now() - ChronoDuration::hours(30);
        {
            let mut state = shared.write().unwrap();
            state
                .history
                .append(GpuSample::from_reading(&reading(0, 10, 100, 1), ancient));
            state
                .history
                .append(GpuSample::from_reading(&reading(1, 20, 100, 2), ancient));
        }

        // The new batch only mentions GPU 0.
        core.apply_outcome(FetchOutcome {
            generation: 0,
            result: Ok(output(vec![reading(0, 30, 100, 3)])),
        });

        let state = shared.read().unwrap();
        // GPU 0 was pruned down to the fresh sample.
        assert_eq!(state.history.len(0), 1);
        assert_eq!(state.history.snapshot(0)[0].memory_used_mib, 30);
        // GPU 1 was absent from the batch; its stale history is frozen.
        assert_eq!(state.history.len(1), 1);
        assert_eq!(state.history.snapshot(1)[0].timestamp, ancient);
    }

    #[tokio::test]
    async fn window_identity_when_under_the_render_budget() {
        let mut state = EngineState::default();
        let now = Utc::now();

        // 500 samples, 73 s apart, oldest first: exactly 50 fall inside
        // the last hour.
        for i in (0..500i64).rev() {
            state.history.append(GpuSample::from_reading(
                &reading(0, i as u64, 8192, 0),
                now - ChronoDuration::seconds(i * 73),
            ));
        }

        let windowed = state.windowed_history(0, DisplayWindow::OneHour, now);
        assert_eq!(windowed.len(), 50);

        // Under the point budget the reducer must return it untouched.
        let reduced = reduce::downsample(&windowed, RENDER_POINT_BUDGET, |s| s.memory_used_mib);
        assert_eq!(reduced, windowed);
    }

    struct SlowSource {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl SlowSource {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl SampleSource for SlowSource {
        async fn fetch(&self, _target: &Target) -> Result<FetchOutput, SourceError> {
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            time::sleep(Duration::from_millis(200)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(output(vec![reading(0, 100, 1000, 10)]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refreshes_never_run_concurrent_fetches() {
        let source = Arc::new(SlowSource::new());
        let monitor = Monitor::spawn(
            Arc::clone(&source) as Arc<dyn SampleSource>,
            Target::new("alice", "gpubox"),
        );

        // Burst of manual triggers while the first fetch is slow.
        monitor.refresh_now();
        monitor.refresh_now();
        monitor.refresh_now();

        // Let several poll intervals elapse on top of the burst.
        time::sleep(Duration::from_secs(12)).await;

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(source.calls.load(Ordering::SeqCst) >= 2);

        let history = monitor.history_for(0, DisplayWindow::OneDay);
        assert!(!history.is_empty());
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
