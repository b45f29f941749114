use std::collections::{HashMap, HashSet};

use netsim_types::{DeviceId, EntityId, FlowId, LinkId, Metric};
use tracing::debug;

use crate::ctx::Ctx;
use crate::error::{CoreError, CoreResult};
use crate::host::Host;
use crate::link::Link;
use crate::log::LogSink;
use crate::router::Router;
use crate::scheduler::{Action, Scheduler};

/// The two device kinds a `Controller` can own (§4.1 / §9's "heterogeneous
/// device types" note). Both expose `receive_packet`; only `Router` cares
/// about peer kind when deciding where Bellman-Ford updates propagate, and
/// that distinction is baked into each `Router`'s `host_links`/`router_links`
/// at construction rather than re-derived on every dispatch.
pub enum Device {
    Host(Host),
    Router(Router),
}

impl Device {
    pub fn as_host(&self) -> Option<&Host> {
        match self {
            Device::Host(h) => Some(h),
            Device::Router(_) => None,
        }
    }

    pub fn as_router(&self) -> Option<&Router> {
        match self {
            Device::Router(r) => Some(r),
            Device::Host(_) => None,
        }
    }
}

/// Owns the event queue, the virtual clock, every link and device, the
/// logging sink, and the set of flow ids still active (§4.7). A flow is
/// added to this set unconditionally when registered and removed only when
/// its sender (necessarily finite) has transmitted every byte — an infinite
/// flow simply never leaves it, so the run loop's "no active flows left"
/// condition never fires on its own if one is present.
pub struct Controller {
    time: f64,
    scheduler: Scheduler,
    log: LogSink,
    links: HashMap<LinkId, Link>,
    devices: HashMap<DeviceId, Device>,
    active_flows: HashSet<FlowId>,
}

impl Controller {
    pub fn new(
        links: HashMap<LinkId, Link>,
        devices: HashMap<DeviceId, Device>,
        log_interval: f64,
    ) -> CoreResult<Self> {
        let log = LogSink::new(log_interval).map_err(|e| CoreError::InvalidLogInterval(e.0))?;
        Ok(Self {
            time: 0.0,
            scheduler: Scheduler::new(),
            log,
            links,
            devices,
            active_flows: HashSet::new(),
        })
    }

    pub fn current_time(&self) -> f64 {
        self.time
    }

    pub fn show_link(&mut self, id: LinkId) {
        self.log.show(EntityId::Link(id));
    }

    pub fn show_flow(&mut self, id: FlowId) {
        self.log.show(EntityId::Flow(id));
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    /// Read-only lookup of a device by id, e.g. for a caller that wants to
    /// inspect a flow's receive-side state after a run.
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Schedule a router's first Bellman-Ford round, if it has one. Call
    /// once per router right after all devices/links are wired up.
    pub fn schedule_initial_bf_round(&mut self, router_id: &DeviceId) -> CoreResult<()> {
        let Some(Device::Router(router)) = self.devices.get(router_id) else {
            return Err(CoreError::UnknownDevice(router_id.clone()));
        };
        if let Some(delay) = router.first_round_delay() {
            self.scheduler.schedule(delay, Action::BfRound { router_id: router_id.clone() });
        }
        Ok(())
    }

    /// Add a flow to its source host's table. Call before `register_flow`.
    pub fn add_flow_to_host(&mut self, host_id: &DeviceId, flow: crate::flow::Flow) -> CoreResult<()> {
        match self.devices.get_mut(host_id) {
            Some(Device::Host(host)) => {
                host.add_flow(flow);
                Ok(())
            }
            _ => Err(CoreError::UnknownDevice(host_id.clone())),
        }
    }

    /// Register a flow as active and schedule its first send attempt at
    /// `start_time`. The flow itself must already have been added to its
    /// source host's table (`add_flow_to_host`).
    pub fn register_flow(&mut self, host_id: DeviceId, flow_id: FlowId, start_time: f64) {
        self.active_flows.insert(flow_id.clone());
        self.scheduler.schedule(start_time, Action::SendNextPacket { host_id, flow_id });
    }

    /// Run until the event queue drains, `time_limit` is reached, or every
    /// registered flow has completed.
    pub fn run(&mut self, time_limit: f64) -> CoreResult<()> {
        while self.time < time_limit && !self.active_flows.is_empty() {
            let Some((time, action)) = self.scheduler.pop() else {
                break;
            };
            self.time = time;
            debug!(time = self.time, ?action, "dispatching event");
            self.dispatch(action)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, action: Action) -> CoreResult<()> {
        match action {
            Action::SendNextPacket { host_id, flow_id } => self.on_send_next_packet(host_id, flow_id),
            Action::PacketOnWire { link_id, direction } => self.on_packet_on_wire(link_id, direction),
            Action::ReceivePacket { device_id, link_id, packet } => {
                self.on_receive_packet(device_id, link_id, packet)
            }
            Action::BfRound { router_id } => self.on_bf_round(router_id),
            Action::RetransmitCheck { host_id, flow_id, seq, ssthresh } => {
                self.on_retransmit_check(host_id, flow_id, seq, ssthresh)
            }
        }
    }

    fn on_send_next_packet(&mut self, host_id: DeviceId, flow_id: FlowId) -> CoreResult<()> {
        let link_id = match self.devices.get(&host_id) {
            Some(Device::Host(host)) => host.link.clone(),
            _ => return Err(CoreError::UnknownDevice(host_id)),
        };
        let link = self.links.get_mut(&link_id).ok_or_else(|| CoreError::UnknownLink(link_id.clone()))?;
        let Some(Device::Host(host)) = self.devices.get_mut(&host_id) else {
            return Err(CoreError::UnknownDevice(host_id));
        };

        let mut ctx = Ctx::new(self.time, &mut self.scheduler, &mut self.log);
        let finished = host.send_next_packet(&flow_id, link, &mut ctx)?;
        if finished {
            self.active_flows.remove(&flow_id);
        }
        Ok(())
    }

    fn on_packet_on_wire(&mut self, link_id: LinkId, direction: crate::scheduler::Direction) -> CoreResult<()> {
        let link = self.links.get_mut(&link_id).ok_or_else(|| CoreError::UnknownLink(link_id.clone()))?;
        let mut ctx = Ctx::new(self.time, &mut self.scheduler, &mut self.log);
        link.packet_on_wire(direction, &mut ctx)
    }

    fn on_receive_packet(
        &mut self,
        device_id: DeviceId,
        link_id: LinkId,
        packet: netsim_types::Packet,
    ) -> CoreResult<()> {
        let mut ctx = Ctx::new(self.time, &mut self.scheduler, &mut self.log);
        match self.devices.get_mut(&device_id) {
            Some(Device::Host(host)) => {
                let link = self.links.get_mut(&host.link).ok_or_else(|| CoreError::UnknownLink(host.link.clone()))?;
                host.receive_packet(packet, link, &mut ctx)
            }
            Some(Device::Router(router)) => router.receive_packet(packet, &link_id, &mut ctx, &mut self.links),
            None => Err(CoreError::UnknownDevice(device_id)),
        }
    }

    fn on_bf_round(&mut self, router_id: DeviceId) -> CoreResult<()> {
        let mut ctx = Ctx::new(self.time, &mut self.scheduler, &mut self.log);
        let Some(Device::Router(router)) = self.devices.get_mut(&router_id) else {
            return Err(CoreError::UnknownDevice(router_id));
        };
        router.start_bellman_ford_round(&mut ctx, &mut self.links)
    }

    fn on_retransmit_check(&mut self, host_id: DeviceId, flow_id: FlowId, seq: u64, ssthresh: f64) -> CoreResult<()> {
        let Some(Device::Host(host)) = self.devices.get_mut(&host_id) else {
            return Err(CoreError::UnknownDevice(host_id));
        };
        if let Some(flow) = host.flow_mut(&flow_id) {
            flow.transition_to_retransmit(seq, ssthresh);
        }
        Ok(())
    }

    /// Flush the logging sink's final partial bucket and hand back every
    /// collected (metric, entity) series, e.g. for a CLI to export as a
    /// trace file.
    pub fn finish_and_collect(mut self) -> HashMap<(Metric, EntityId), Vec<(f64, f64)>> {
        self.log.flush_all(self.time);
        self.log.all_series().map(|(k, v)| (*k, v.clone())).collect()
    }
}
