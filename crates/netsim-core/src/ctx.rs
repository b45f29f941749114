use netsim_types::{EntityId, Metric};

use crate::log::LogSink;
use crate::scheduler::{Action, Scheduler};

/// The capability handed to link/host/router/flow logic while the
/// controller is dispatching one event: schedule further work, and emit a
/// sample. Mirrors the "context" object a discrete-event simulator typically
/// hands to its entities instead of giving them a back-reference to the
/// whole controller — it only exposes the two effects any of them ever
/// need, so entities never hold a pointer back into the controller at all.
pub struct Ctx<'a> {
    pub now: f64,
    scheduler: &'a mut Scheduler,
    log: &'a mut LogSink,
}

impl<'a> Ctx<'a> {
    pub fn new(now: f64, scheduler: &'a mut Scheduler, log: &'a mut LogSink) -> Self {
        Self { now, scheduler, log }
    }

    pub fn schedule(&mut self, at: f64, action: Action) {
        debug_assert!(at >= self.now, "cannot schedule an event in the past");
        self.scheduler.schedule(at, action);
    }

    pub fn emit(&mut self, metric: Metric, entity: impl Into<EntityId>, value: f64) {
        self.log.record(metric, entity.into(), self.now, value);
    }
}
