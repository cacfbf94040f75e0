//! Progress telemetry: per-run broadcast channels and throttled reporting
//!
//! Publishing never blocks a run. Each run owns one bounded broadcast
//! channel; slow subscribers lag and lose intermediate snapshots, never the
//! run's time. The channel is closed right after the terminal snapshot is
//! sent, which ends every subscriber's stream once it has drained.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::Stream;
use loadbench_config::TelemetryConfig;
use loadbench_core::{Phase, ProgressSnapshot, RunId, RunState};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Stream of snapshots for one run, ending after its terminal snapshot
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressSnapshot> + Send>>;

/// Publish/subscribe hub keyed by run id
#[derive(Clone)]
pub struct ProgressHub {
    channels: Arc<RwLock<HashMap<RunId, broadcast::Sender<ProgressSnapshot>>>>,
    capacity: usize,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Open the channel of a run; a no-op when it is already open
    pub fn register(&self, run_id: RunId) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(run_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Best-effort delivery; a terminal snapshot closes the channel
    pub fn publish(&self, snapshot: ProgressSnapshot) {
        let run_id = snapshot.test_id;
        let terminal = snapshot.is_terminal();

        if terminal {
            let sender = self
                .channels
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&run_id);
            if let Some(sender) = sender {
                if sender.send(snapshot).is_err() {
                    debug!(run_id = %run_id, "Terminal snapshot had no subscribers");
                }
            }
            return;
        }

        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        match channels.get(&run_id) {
            Some(sender) => {
                if sender.send(snapshot).is_err() {
                    debug!(run_id = %run_id, "No subscribers for progress snapshot");
                }
            }
            None => debug!(run_id = %run_id, "Dropping snapshot for unregistered run"),
        }
    }

    /// Subscribe to a live run. `None` once the run's channel has closed.
    pub fn subscribe(&self, run_id: RunId) -> Option<ProgressStream> {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        let receiver = channels.get(&run_id)?.subscribe();

        let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(snapshot) => Some(snapshot),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(run_id = %run_id, skipped, "Subscriber lagged; skipped progress snapshots");
                None
            }
        });
        Some(Box::pin(stream))
    }

    /// Drop a run's channel without a terminal snapshot
    pub fn close(&self, run_id: RunId) {
        self.channels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&run_id);
    }

    pub fn is_open(&self, run_id: RunId) -> bool {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&run_id)
    }

    pub fn subscriber_count(&self, run_id: RunId) -> usize {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&run_id)
            .map_or(0, |sender| sender.receiver_count())
    }
}

/// Moving-average throughput over a trailing time window
#[derive(Debug)]
pub struct ThroughputWindow {
    window: Duration,
    samples: VecDeque<(Instant, u64)>,
}

impl ThroughputWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Record the cumulative row count observed at `now`
    pub fn record(&mut self, now: Instant, total_rows: u64) {
        // coalesce bursts of ticks so the buffer stays small
        let granularity = self.window / 64;
        let len = self.samples.len();
        let coalesce = len > 1
            && self
                .samples
                .get(len - 2)
                .is_some_and(|(t, _)| now.duration_since(*t) < granularity);
        match self.samples.back_mut() {
            Some(last) if coalesce => *last = (now, total_rows),
            _ => self.samples.push_back((now, total_rows)),
        }
        // keep one sample at or beyond the window edge as the baseline
        while self.samples.len() > 2 {
            match self.samples.get(1) {
                Some((t, _)) if now.duration_since(*t) >= self.window => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }
    }

    /// Rows per second across the retained samples
    pub fn rate(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some((t0, r0)), Some((t1, r1))) if t1 > t0 => {
                r1.saturating_sub(*r0) as f64 / t1.duration_since(*t0).as_secs_f64()
            }
            _ => 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Format a remaining-time estimate, e.g. `1m 12s`
pub fn format_eta(remaining_rows: u64, rows_per_second: f64) -> String {
    if remaining_rows == 0 {
        return "0s".to_string();
    }
    if rows_per_second <= 0.0 || !rows_per_second.is_finite() {
        return "unknown".to_string();
    }
    let secs = (remaining_rows as f64 / rows_per_second).ceil() as u64;
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

/// Turns per-unit progress ticks of one run into throttled snapshots
pub struct ProgressReporter {
    hub: ProgressHub,
    run_id: RunId,
    interval: Duration,
    throughput: ThroughputWindow,
    state: RunState,
    phase_total: u64,
    phase_done: u64,
    overall: f64,
    last_emit: Option<Instant>,
}

impl ProgressReporter {
    pub fn new(hub: ProgressHub, run_id: RunId, config: &TelemetryConfig) -> Self {
        Self {
            hub,
            run_id,
            interval: config.publish_interval(),
            throughput: ThroughputWindow::new(config.throughput_window()),
            state: RunState::Pending,
            phase_total: 0,
            phase_done: 0,
            overall: 0.0,
            last_emit: None,
        }
    }

    /// Mandatory snapshot at a phase boundary
    pub fn enter_phase(&mut self, state: RunState, total_rows: u64) {
        self.state = state;
        self.phase_total = total_rows;
        self.phase_done = 0;
        self.throughput.reset();
        self.throughput.record(Instant::now(), 0);
        let message = match state.phase() {
            Some(phase) => format!("Starting {} of {} rows", phase, total_rows),
            None => format!("Run {}", state),
        };
        self.emit(message);
    }

    /// Report cumulative rows processed in the current phase; throttled
    pub fn advance(&mut self, rows_done: u64) {
        self.phase_done = rows_done;
        let now = Instant::now();
        self.throughput.record(now, rows_done);

        let due = self
            .last_emit
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if due {
            let message = format!("{} {}/{} rows", self.state, self.phase_done, self.phase_total);
            self.emit(message);
        }
    }

    /// Final snapshot; closes the run's channel
    pub fn finish(&mut self, state: RunState, message: impl Into<String>) {
        self.state = state;
        if state == RunState::Completed {
            self.phase_done = self.phase_total;
        }
        self.emit(message.into());
    }

    fn phase_progress(&self) -> f64 {
        if self.phase_total == 0 {
            return if self.state.is_terminal() || self.phase_done > 0 { 100.0 } else { 0.0 };
        }
        (self.phase_done as f64 / self.phase_total as f64 * 100.0).min(100.0)
    }

    fn emit(&mut self, message: String) {
        let phase_progress = self.phase_progress();
        self.overall = match (self.state, self.state.phase()) {
            (RunState::Completed, _) => 100.0,
            (_, Some(phase)) => Phase::overall(&phase, phase_progress).max(self.overall),
            _ => self.overall,
        };

        let rate = self.throughput.rate();
        let eta = if self.state.is_terminal() {
            "0s".to_string()
        } else {
            format_eta(self.phase_total.saturating_sub(self.phase_done), rate)
        };

        self.hub.publish(ProgressSnapshot {
            kind: ProgressSnapshot::kind_for(self.state),
            test_id: self.run_id,
            phase: self.state,
            overall_progress: self.overall,
            phase_progress,
            rows_processed: self.phase_done,
            rows_per_second: rate,
            eta,
            message,
        });
        self.last_emit = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadbench_core::SnapshotKind;

    fn telemetry(interval_ms: u64) -> TelemetryConfig {
        TelemetryConfig {
            publish_interval_ms: interval_ms,
            throughput_window_ms: 1000,
            channel_capacity: 64,
        }
    }

    async fn drain(mut stream: ProgressStream) -> Vec<ProgressSnapshot> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_reporting_with_forced_boundaries() {
        let hub = ProgressHub::new(64);
        let run_id = RunId::new();
        hub.register(run_id);
        let stream = hub.subscribe(run_id).unwrap();

        let mut reporter = ProgressReporter::new(hub.clone(), run_id, &telemetry(250));
        reporter.enter_phase(RunState::Inserting, 1000);
        for done in 1..=1000 {
            reporter.advance(done);
        }
        tokio::time::advance(Duration::from_millis(300)).await;
        reporter.advance(1000);
        reporter.finish(RunState::Completed, "done");

        let events = drain(stream).await;
        // phase start, one tick once the interval elapsed, terminal
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].rows_processed, 1000);
        assert_eq!(events[0].kind, SnapshotKind::Progress);
        assert_eq!(events[0].overall_progress, 30.0);
        let last = events.last().unwrap();
        assert_eq!(last.kind, SnapshotKind::Complete);
        assert_eq!(last.overall_progress, 100.0);
        assert_eq!(last.eta, "0s");
        assert!(!hub.is_open(run_id));
    }

    #[tokio::test]
    async fn test_terminal_snapshot_reaches_every_subscriber() {
        let hub = ProgressHub::new(8);
        let run_id = RunId::new();
        hub.register(run_id);
        let a = hub.subscribe(run_id).unwrap();
        let b = hub.subscribe(run_id).unwrap();
        assert_eq!(hub.subscriber_count(run_id), 2);

        let mut reporter = ProgressReporter::new(hub.clone(), run_id, &telemetry(250));
        reporter.enter_phase(RunState::Generating, 10);
        reporter.finish(RunState::Failed, "boom");

        for events in [drain(a).await, drain(b).await] {
            assert_eq!(events.len(), 2);
            assert_eq!(events[1].kind, SnapshotKind::Error);
            assert_eq!(events[1].message, "boom");
        }
        assert!(hub.subscribe(run_id).is_none());
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let hub = ProgressHub::new(8);
        let (a, b) = (RunId::new(), RunId::new());
        hub.register(a);
        hub.register(b);
        let stream_a = hub.subscribe(a).unwrap();

        let mut reporter_b = ProgressReporter::new(hub.clone(), b, &telemetry(250));
        reporter_b.enter_phase(RunState::Generating, 5);
        reporter_b.finish(RunState::Completed, "b done");
        let mut reporter_a = ProgressReporter::new(hub.clone(), a, &telemetry(250));
        reporter_a.finish(RunState::Cancelled, "a cancelled");

        let events = drain(stream_a).await;
        assert_eq!(events.len(), 1);
        assert!(events.iter().all(|e| e.test_id == a));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_harmless() {
        let hub = ProgressHub::new(1);
        let run_id = RunId::new();
        hub.register(run_id);
        let mut reporter = ProgressReporter::new(hub.clone(), run_id, &telemetry(0));
        reporter.enter_phase(RunState::Generating, 100);
        for done in 0..100 {
            reporter.advance(done);
        }
        reporter.finish(RunState::Completed, "done");
        assert!(!hub.is_open(run_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throughput_window_follows_recent_rate() {
        let mut window = ThroughputWindow::new(Duration::from_secs(2));
        let start = Instant::now();
        window.record(start, 0);
        window.record(start + Duration::from_secs(1), 1000);
        assert_eq!(window.rate(), 1000.0);

        // slowdown: only recent samples count once the window slides
        window.record(start + Duration::from_secs(3), 1100);
        window.record(start + Duration::from_secs(5), 1300);
        assert_eq!(window.rate(), 100.0);
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(0, 0.0), "0s");
        assert_eq!(format_eta(10, 0.0), "unknown");
        assert_eq!(format_eta(720, 10.0), "1m 12s");
    }
}
