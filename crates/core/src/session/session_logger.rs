use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for capture session events.
///
/// Decouples the capture loop from specific output mechanisms so callers can
/// observe per-tick behavior without changing the loop itself.
pub trait SessionLogger: Send {
    /// Report that presentation tick `tick` of the current session ran.
    fn tick(&mut self, tick: u64);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Forget everything recorded so far; called when a session starts.
    fn reset(&mut self) {}

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn tick(&mut self, _tick: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Running aggregate of one stage or metric. Constant size however long the
/// session runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageStats {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl StageStats {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count.max(1) as f64
    }
}

fn record(stats: &mut HashMap<String, StageStats>, name: &str, value: f64) {
    match stats.get_mut(name) {
        Some(entry) => entry.record(value),
        None => {
            stats.insert(name.to_string(), StageStats::first(value));
        }
    }
}

/// Logger that tracks per-stage timing and metrics through the `log` crate
/// and reports a summary when the session stops.
///
/// Tick progress is throttled to every `throttle_ticks` ticks.
pub struct LogSessionLogger {
    throttle_ticks: u64,
    timings: HashMap<String, StageStats>,
    metrics: HashMap<String, StageStats>,
    start_time: Instant,
    ticks: u64,
}

impl LogSessionLogger {
    pub fn new(throttle_ticks: u64) -> Self {
        Self {
            throttle_ticks: throttle_ticks.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            ticks: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let ticks = self.ticks;
        let mut lines = Vec::new();

        lines.push(format!(
            "Session summary ({ticks} ticks, {:.1}s total):",
            elapsed_ms / 1000.0
        ));

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stats) in stages {
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms  ({} samples)",
                stats.mean(),
                stats.max,
                stats.sum,
                stats.count
            ));
        }

        let mut metrics: Vec<_> = self.metrics.iter().collect();
        metrics.sort_by(|a, b| a.0.cmp(b.0));
        for (name, stats) in metrics {
            lines.push(format!(
                "  {name}: avg {:.1}  max {:.0}",
                stats.mean(),
                stats.max
            ));
        }

        if ticks > 0 && elapsed_ms > 0.0 {
            let fps = ticks as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Presentation rate: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&StageStats> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&StageStats> {
        self.metrics.get(name)
    }
}

impl Default for LogSessionLogger {
    fn default() -> Self {
        Self::new(60)
    }
}

impl SessionLogger for LogSessionLogger {
    fn tick(&mut self, tick: u64) {
        self.ticks = tick;
        if tick % self.throttle_ticks == 0 {
            log::info!("Capture running: {tick} ticks");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn reset(&mut self) {
        self.timings.clear();
        self.metrics.clear();
        self.ticks = 0;
        self.start_time = Instant::now();
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
