use std::collections::HashMap;

use netsim_types::{CongestionAlgorithm, DeviceId, FlowId, LinkId, Packet, PacketKind, MSS};

use crate::ctx::Ctx;
use crate::error::{CoreError, CoreResult};
use crate::flow::Flow;
use crate::link::Link;
use crate::scheduler::Action;

/// An endpoint device: exactly one attached link, a table of flows keyed by
/// flow id (§4.2). A host both originates flows explicitly registered with
/// it and lazily instantiates receiving-side `Flow`s the first time it sees
/// a flow id it doesn't recognize.
pub struct Host {
    pub id: DeviceId,
    pub link: LinkId,
    flows: HashMap<FlowId, Flow>,
}

impl Host {
    pub fn new(id: DeviceId, link: LinkId) -> Self {
        Self {
            id,
            link,
            flows: HashMap::new(),
        }
    }

    pub fn add_flow(&mut self, flow: Flow) {
        self.flows.insert(flow.id.clone(), flow);
    }

    pub fn flow(&self, flow_id: &FlowId) -> Option<&Flow> {
        self.flows.get(flow_id)
    }

    pub fn flow_mut(&mut self, flow_id: &FlowId) -> Option<&mut Flow> {
        self.flows.get_mut(flow_id)
    }

    /// Attempt one send cycle for `flow_id`: if the link buffer has room and
    /// the congestion window isn't full, queue a data packet. Either way,
    /// reschedule the next attempt one segment-transmission-time later,
    /// unless the flow just finished — in which case `Ok(true)` is returned
    /// so the caller can drop it from other bookkeeping (e.g. an
    /// active-flow set), but the flow itself stays in this host's table:
    /// trailing acks for bytes already sent still need a live flow to land
    /// on.
    pub fn send_next_packet(
        &mut self,
        flow_id: &FlowId,
        link: &mut Link,
        ctx: &mut Ctx,
    ) -> CoreResult<bool> {
        let Some(flow) = self.flows.get_mut(flow_id) else {
            return Ok(false);
        };

        let mut finished = false;
        if !link.buffer_is_full(&self.id, MSS)? && !flow.window_is_full() {
            if let Some(packet) = flow.construct_next_data_packet(ctx.now) {
                link.queue_packet(&self.id, packet, ctx)?;
                if !flow.is_infinite() && flow.num_remaining_bytes() == Some(0) {
                    finished = true;
                }
            }
        }

        if finished {
            return Ok(true);
        }

        let throughput = link.throughput;
        ctx.schedule(
            ctx.now + MSS as f64 / throughput,
            Action::SendNextPacket {
                host_id: self.id.clone(),
                flow_id: flow_id.clone(),
            },
        );
        Ok(false)
    }

    /// A packet arrived off the host's one link. Acks update the
    /// originating flow's congestion state; data packets update the
    /// receiving-side flow and trigger an ack in reply.
    pub fn receive_packet(&mut self, packet: Packet, link: &mut Link, ctx: &mut Ctx) -> CoreResult<()> {
        if !packet.is_tcp() {
            return Err(CoreError::NonTcpPacketAtHost(self.id.clone()));
        }
        let flow_id = packet
            .flow_id()
            .expect("is_tcp() guarantees a flow id")
            .clone();

        if !self.flows.contains_key(&flow_id) {
            // First packet seen for this flow: lazily stand up the
            // receiving-side half. Its congestion algorithm is irrelevant —
            // this instance never originates data, so it never runs
            // `receive_ack`/`window_is_full` in anger.
            let flow = Flow::new_receiver(
                flow_id.clone(),
                packet.src.clone(),
                self.id.clone(),
                CongestionAlgorithm::Reno,
            );
            self.add_flow(flow);
        }

        if packet.is_tcp_ack() {
            let host_id = self.id.clone();
            let flow = self.flows.get_mut(&flow_id).expect("just inserted");
            flow.receive_ack(&packet, ctx, &host_id);
        } else {
            let data_time = match &packet.kind {
                PacketKind::TcpData { data_time, .. } => *data_time,
                _ => unreachable!("is_tcp_data checked above"),
            };
            let flow = self.flows.get_mut(&flow_id).expect("just inserted");
            flow.receive_data(&packet, ctx);
            let ack = flow.construct_next_ack_packet(data_time, ctx.now);
            let admitted = link.queue_packet(&self.id, ack, ctx)?;
            debug_assert!(admitted, "a bare ack should never overflow the link buffer");
        }
        Ok(())
    }
}
