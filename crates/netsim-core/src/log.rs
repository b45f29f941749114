use std::collections::{HashMap, HashSet};

use netsim_types::{EntityId, Metric};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("log interval must be > 0, got {0}")]
pub struct InvalidInterval(pub f64);

fn mean(values: &[f64], _interval_length: f64) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn rate_mbps(values: &[f64], interval_length: f64) -> f64 {
    values.iter().sum::<f64>() * 8e-6 / interval_length
}

fn sum_count(values: &[f64], _interval_length: f64) -> f64 {
    values.iter().sum()
}

fn aggregator(metric: Metric) -> fn(&[f64], f64) -> f64 {
    match metric {
        Metric::LinkRate | Metric::FlowRate => rate_mbps,
        Metric::PacketLoss => sum_count,
        Metric::BufferOccupancy | Metric::WindowSize => mean,
    }
}

/// Bucket-and-aggregate sample stream, one series per (metric, entity)
/// (§4.8). Entities not flagged `show` are discarded at ingestion — this
/// mirrors the reference's plotting opt-in and keeps the sink's memory
/// bounded to whatever a caller actually wants to retain.
pub struct LogSink {
    interval: f64,
    bucket_start: f64,
    shown: HashSet<EntityId>,
    pending: HashMap<(Metric, EntityId), Vec<f64>>,
    series: HashMap<(Metric, EntityId), Vec<(f64, f64)>>,
}

impl LogSink {
    pub fn new(interval: f64) -> Result<Self, InvalidInterval> {
        if !(interval > 0.0) {
            return Err(InvalidInterval(interval));
        }
        Ok(Self {
            interval,
            bucket_start: 0.0,
            shown: HashSet::new(),
            pending: HashMap::new(),
            series: HashMap::new(),
        })
    }

    /// Flag an entity's samples as worth retaining.
    pub fn show(&mut self, entity: EntityId) {
        self.shown.insert(entity);
    }

    pub fn is_shown(&self, entity: &EntityId) -> bool {
        self.shown.contains(entity)
    }

    /// Record one sample at virtual time `now`. Crossing a bucket boundary
    /// flushes every pending series first, so all metrics share one global
    /// bucket clock rather than drifting independently per metric.
    pub fn record(&mut self, metric: Metric, entity: EntityId, now: f64, value: f64) {
        if !self.shown.contains(&entity) {
            return;
        }
        if now - self.interval >= self.bucket_start {
            self.flush(now);
        }
        self.pending.entry((metric, entity)).or_default().push(value);
    }

    fn flush(&mut self, now: f64) {
        let interval_length = self.interval.min(now - self.bucket_start);
        if interval_length > 0.0 {
            for ((metric, entity), values) in self.pending.iter_mut() {
                if values.is_empty() {
                    continue;
                }
                let agg = aggregator(*metric)(values, interval_length);
                let x = self.bucket_start + interval_length / 2.0;
                self.series
                    .entry((*metric, entity.clone()))
                    .or_default()
                    .push((x, agg));
                values.clear();
            }
        }
        self.bucket_start = (now / self.interval).floor() * self.interval;
    }

    /// Flush whatever is left in the current bucket. The reference
    /// implementation never does this (its bucket boundary is only crossed
    /// by a later `log()` call that never comes once the run loop exits),
    /// so the final partial bucket is otherwise silently dropped. Calling
    /// this once after the run loop finishes lets a CLI export the tail of
    /// each series instead of truncating it.
    pub fn flush_all(&mut self, now: f64) {
        if now > self.bucket_start {
            self.flush(now);
        }
    }

    pub fn series(&self, metric: Metric, entity: &EntityId) -> Option<&[(f64, f64)]> {
        self.series.get(&(metric, entity.clone())).map(|v| v.as_slice())
    }

    pub fn all_series(&self) -> impl Iterator<Item = (&(Metric, EntityId), &Vec<(f64, f64)>)> {
        self.series.iter()
    }
}
