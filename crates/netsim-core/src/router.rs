use std::collections::HashMap;

use netsim_types::{DeviceId, LinkId, Packet, PacketKind};

use crate::ctx::Ctx;
use crate::error::{CoreError, CoreResult};
use crate::link::Link;
use crate::scheduler::Action;

/// Distance-vector routing over a periodic Bellman-Ford round (§4.4). A
/// router's two kinds of attached links are classified once at construction
/// time from the static topology: links to directly-attached hosts (whose
/// cost is re-measured every round) and links to other routers (the only
/// peers routing updates are flooded to).
pub struct Router {
    pub id: DeviceId,
    host_links: Vec<(LinkId, DeviceId)>,
    router_links: Vec<LinkId>,
    bf_freq: f64,
    routing_table: HashMap<DeviceId, LinkId>,
    cost_table: HashMap<DeviceId, f64>,
}

impl Router {
    pub fn new(
        id: DeviceId,
        host_links: Vec<(LinkId, DeviceId)>,
        router_links: Vec<LinkId>,
        bf_freq: f64,
    ) -> Self {
        Self::with_seeded_routes(id, host_links, router_links, bf_freq, HashMap::new())
    }

    /// Like `new`, but pre-populates the routing table from the topology
    /// file's static `routing_table` map. Cost table entries are left
    /// unseeded (absent, i.e. infinity) — a statically-seeded route is just
    /// initial state, overwritten by the first Bellman-Ford round or
    /// inbound update like any other entry.
    pub fn with_seeded_routes(
        id: DeviceId,
        host_links: Vec<(LinkId, DeviceId)>,
        router_links: Vec<LinkId>,
        bf_freq: f64,
        seeded_routes: HashMap<DeviceId, LinkId>,
    ) -> Self {
        Self {
            id,
            host_links,
            router_links,
            bf_freq,
            routing_table: seeded_routes,
            cost_table: HashMap::new(),
        }
    }

    /// Time of this router's first Bellman-Ford round, or `None` if
    /// `bf_freq` is zero (routing never runs, matching the reference's
    /// "a frequency of 0 skips scheduling entirely" behavior).
    pub fn first_round_delay(&self) -> Option<f64> {
        if self.bf_freq > 0.0 {
            Some(1.0 / self.bf_freq)
        } else {
            None
        }
    }

    pub fn route_for(&self, dst: &DeviceId) -> Option<&LinkId> {
        self.routing_table.get(dst)
    }

    /// Adopt `cost` as the best known path to `host_id` via `via_link`, then
    /// flood the update to every other router-facing link (never to a link
    /// whose far end is a host, and never back out the link the update
    /// arrived on).
    fn bellman_ford_update(
        &mut self,
        host_id: DeviceId,
        cost: f64,
        via_link: &LinkId,
        ctx: &mut Ctx,
        links: &mut HashMap<LinkId, Link>,
    ) -> CoreResult<()> {
        self.routing_table.insert(host_id.clone(), via_link.clone());
        self.cost_table.insert(host_id.clone(), cost);

        for link_id in &self.router_links {
            if link_id == via_link {
                continue;
            }
            let link = links
                .get_mut(link_id)
                .ok_or_else(|| CoreError::UnknownLink(link_id.clone()))?;
            let update = Packet::new_routing_update(self.id.clone(), host_id.clone(), cost);
            link.queue_packet(&self.id, update, ctx)?;
        }
        Ok(())
    }

    /// One periodic Bellman-Ford round: reschedule the next round, reset
    /// every known cost to infinity, then re-measure the cost to each
    /// directly-attached host and re-advertise it.
    pub fn start_bellman_ford_round(
        &mut self,
        ctx: &mut Ctx,
        links: &mut HashMap<LinkId, Link>,
    ) -> CoreResult<()> {
        ctx.schedule(
            ctx.now + 1.0 / self.bf_freq,
            Action::BfRound { router_id: self.id.clone() },
        );

        for cost in self.cost_table.values_mut() {
            *cost = f64::INFINITY;
        }

        for (link_id, host_id) in self.host_links.clone() {
            let cost = links
                .get(&link_id)
                .ok_or_else(|| CoreError::UnknownLink(link_id.clone()))?
                .estimate_cost(&self.id, ctx.now)?;
            self.bellman_ford_update(host_id, cost, &link_id, ctx, links)?;
        }
        Ok(())
    }

    /// A packet arrived off `sending_link_id`: TCP traffic is forwarded
    /// along the routing-table entry for its destination (dropped silently
    /// if there is none yet); routing-update packets feed the distance
    /// vector.
    pub fn receive_packet(
        &mut self,
        packet: Packet,
        sending_link_id: &LinkId,
        ctx: &mut Ctx,
        links: &mut HashMap<LinkId, Link>,
    ) -> CoreResult<()> {
        match &packet.kind {
            PacketKind::TcpData { .. } | PacketKind::TcpAck { .. } => {
                let dst = packet
                    .dst
                    .clone()
                    .ok_or_else(|| CoreError::UnsupportedPacketAtRouter(self.id.clone()))?;
                let Some(link_id) = self.routing_table.get(&dst).cloned() else {
                    return Ok(());
                };
                let link = links
                    .get_mut(&link_id)
                    .ok_or_else(|| CoreError::UnknownLink(link_id.clone()))?;
                link.queue_packet(&self.id, packet, ctx)?;
                Ok(())
            }
            PacketKind::RoutingUpdate { host_id, cost } => {
                let host_id = host_id.clone();
                let advertised_cost = *cost;
                let link_cost = links
                    .get(sending_link_id)
                    .ok_or_else(|| CoreError::UnknownLink(sending_link_id.clone()))?
                    .estimate_cost(&self.id, ctx.now)?;
                let host_cost = advertised_cost + link_cost;
                // Missing entries default to infinity rather than panicking
                // on an unseen host — a router can hear a flooded update for
                // a host before it has measured any cost to it itself.
                let known_cost = self.cost_table.get(&host_id).copied().unwrap_or(f64::INFINITY);
                if host_cost < known_cost {
                    self.bellman_ford_update(host_id, host_cost, sending_link_id, ctx, links)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogSink;
    use crate::scheduler::Scheduler;

    fn build_link(id: &str, left: &str, right: &str) -> Link {
        Link::new(
            LinkId::from(id),
            DeviceId::from(left),
            DeviceId::from(right),
            1_000_000.0,
            0.01,
            64 * 1024,
        )
    }

    #[test]
    fn bf_round_learns_direct_host_costs() {
        let mut router = Router::new(
            DeviceId::from("R1"),
            vec![(LinkId::from("L1"), DeviceId::from("H1"))],
            vec![],
            1.0,
        );
        let mut links = HashMap::new();
        links.insert(LinkId::from("L1"), build_link("L1", "R1", "H1"));

        let mut sched = Scheduler::new();
        let mut log = LogSink::new(1.0).unwrap();
        let mut ctx = Ctx::new(0.0, &mut sched, &mut log);

        router.start_bellman_ford_round(&mut ctx, &mut links).unwrap();
        assert_eq!(router.route_for(&DeviceId::from("H1")), Some(&LinkId::from("L1")));
        assert_eq!(sched.len(), 1, "only the next round should be scheduled with no router peers");
    }

    #[test]
    fn unrouted_destination_is_dropped_silently() {
        let mut router = Router::new(DeviceId::from("R1"), vec![], vec![], 1.0);
        let mut links = HashMap::new();
        let mut sched = Scheduler::new();
        let mut log = LogSink::new(1.0).unwrap();
        let mut ctx = Ctx::new(0.0, &mut sched, &mut log);

        let packet = Packet::new_data(
            DeviceId::from("H1"),
            DeviceId::from("H2"),
            netsim_types::FlowId::from("f0"),
            0,
            1024,
            0.0,
        );
        let result = router.receive_packet(packet, &LinkId::from("L1"), &mut ctx, &mut links);
        assert!(result.is_ok());
    }

    #[test]
    fn zero_bf_freq_never_schedules_a_round() {
        let router = Router::new(DeviceId::from("R1"), vec![], vec![], 0.0);
        assert_eq!(router.first_round_delay(), None);
    }
}
