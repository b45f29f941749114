use std::collections::VecDeque;

use netsim_types::{DeviceId, LinkId, Metric, Packet};
use tracing::debug;

use crate::ctx::Ctx;
use crate::error::{CoreError, CoreResult};
use crate::scheduler::{Action, Direction};

/// A bidirectional store-and-forward channel between two devices (§4.3).
/// Each direction has its own FIFO buffer and its own
/// "next start transmission time" cursor; the two cursors interact only
/// through the half-duplex-like bound applied in `queue_packet`.
pub struct Link {
    pub id: LinkId,
    pub throughput: f64,
    pub propagation_delay: f64,
    pub buffer_capacity: u64,
    pub left: DeviceId,
    pub right: DeviceId,
    rightward_buffer: VecDeque<Packet>,
    leftward_buffer: VecDeque<Packet>,
    /// Indexed by `Direction`: the instant the next byte queued in that
    /// direction will begin leaving the buffer.
    next_start_tx: [f64; 2],
}

fn idx(d: Direction) -> usize {
    match d {
        Direction::Leftward => 0,
        Direction::Rightward => 1,
    }
}

impl Link {
    pub fn new(
        id: LinkId,
        left: DeviceId,
        right: DeviceId,
        throughput: f64,
        propagation_delay: f64,
        buffer_capacity: u64,
    ) -> Self {
        Self {
            id,
            throughput,
            propagation_delay,
            buffer_capacity,
            left,
            right,
            rightward_buffer: VecDeque::new(),
            leftward_buffer: VecDeque::new(),
            next_start_tx: [0.0, 0.0],
        }
    }

    fn direction_from(&self, from_device_id: &DeviceId) -> CoreResult<Direction> {
        if *from_device_id == self.left {
            Ok(Direction::Rightward)
        } else if *from_device_id == self.right {
            Ok(Direction::Leftward)
        } else {
            Err(CoreError::UnknownLinkEndpoint(from_device_id.clone()))
        }
    }

    pub fn opposite_device(&self, from_device_id: &DeviceId) -> CoreResult<&DeviceId> {
        if *from_device_id == self.left {
            Ok(&self.right)
        } else if *from_device_id == self.right {
            Ok(&self.left)
        } else {
            Err(CoreError::UnknownLinkEndpoint(from_device_id.clone()))
        }
    }

    fn buffer(&self, direction: Direction) -> &VecDeque<Packet> {
        match direction {
            Direction::Rightward => &self.rightward_buffer,
            Direction::Leftward => &self.leftward_buffer,
        }
    }

    fn buffer_mut(&mut self, direction: Direction) -> &mut VecDeque<Packet> {
        match direction {
            Direction::Rightward => &mut self.rightward_buffer,
            Direction::Leftward => &mut self.leftward_buffer,
        }
    }

    fn bytes_in_buffer(&self, direction: Direction) -> u64 {
        self.buffer(direction).iter().map(|p| p.size).sum()
    }

    pub fn num_packets_in_buffers(&self) -> usize {
        self.rightward_buffer.len() + self.leftward_buffer.len()
    }

    pub fn buffer_is_full(&self, from_device_id: &DeviceId, packet_size: u64) -> CoreResult<bool> {
        let direction = self.direction_from(from_device_id)?;
        Ok(self.buffer_capacity - self.bytes_in_buffer(direction) < packet_size)
    }

    /// Lower-bound estimate of the remaining queueing + serialization delay
    /// for a packet submitted now in the direction leaving `from_device_id`.
    pub fn estimate_cost(&self, from_device_id: &DeviceId, now: f64) -> CoreResult<f64> {
        let direction = self.direction_from(from_device_id)?;
        Ok((self.next_start_tx[idx(direction)] - now).max(0.0))
    }

    /// Attempt to admit `packet` for transmission away from `from_device_id`.
    /// Returns `false` (and logs a packet-loss sample) if the destination
    /// buffer is full.
    pub fn queue_packet(
        &mut self,
        from_device_id: &DeviceId,
        packet: Packet,
        ctx: &mut Ctx,
    ) -> CoreResult<bool> {
        // Bring both cursors forward to "now" in case the link has been idle.
        self.next_start_tx[idx(Direction::Rightward)] =
            self.next_start_tx[idx(Direction::Rightward)].max(ctx.now);
        self.next_start_tx[idx(Direction::Leftward)] =
            self.next_start_tx[idx(Direction::Leftward)].max(ctx.now);

        ctx.emit(
            Metric::BufferOccupancy,
            self.id.clone(),
            self.num_packets_in_buffers() as f64,
        );

        let direction = self.direction_from(from_device_id)?;
        let size = packet.size;

        if self.buffer_capacity - self.bytes_in_buffer(direction) < size {
            debug!(link = %self.id, ?direction, size, "packet dropped, buffer full");
            ctx.emit(Metric::PacketLoss, self.id.clone(), 1.0);
            return Ok(false);
        }
        ctx.emit(Metric::PacketLoss, self.id.clone(), 0.0);

        self.buffer_mut(direction).push_back(packet);
        let transmission_time = size as f64 / self.throughput;

        let start = self.next_start_tx[idx(direction)] + transmission_time;
        self.next_start_tx[idx(direction)] = start;
        self.next_start_tx[idx(direction.opposite())] = start + self.propagation_delay;

        ctx.schedule(
            start,
            Action::PacketOnWire {
                link_id: self.id.clone(),
                direction,
            },
        );

        Ok(true)
    }

    /// The packet at the head of `direction`'s buffer has finished
    /// serializing and is now propagating towards the peer.
    pub fn packet_on_wire(&mut self, direction: Direction, ctx: &mut Ctx) -> CoreResult<()> {
        let packet = match self.buffer_mut(direction).pop_front() {
            Some(p) => p,
            None => return Ok(()),
        };
        let size = packet.size;
        let target = match direction {
            Direction::Rightward => self.right.clone(),
            Direction::Leftward => self.left.clone(),
        };
        let receive_time = ctx.now + self.propagation_delay;

        ctx.emit(Metric::LinkRate, self.id.clone(), size as f64);

        ctx.schedule(
            receive_time,
            Action::ReceivePacket {
                device_id: target,
                link_id: self.id.clone(),
                packet,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogSink;
    use crate::scheduler::Scheduler;
    use netsim_types::{EntityId, FlowId};

    fn test_link() -> Link {
        Link::new(
            LinkId::from("L0"),
            DeviceId::from("A"),
            DeviceId::from("B"),
            1_000_000.0,
            0.01,
            2 * 1024,
        )
    }

    #[test]
    fn rejects_when_buffer_would_overflow() {
        let mut link = test_link();
        let mut sched = Scheduler::new();
        let mut log = LogSink::new(1.0).unwrap();
        log.show(EntityId::Link(link.id.clone()));

        let a = DeviceId::from("A");
        let pkt = |seq| {
            Packet::new_data(a.clone(), DeviceId::from("B"), FlowId::from("f0"), seq, 1024, 0.0)
        };

        {
            let mut ctx = Ctx::new(0.0, &mut sched, &mut log);
            assert!(link.queue_packet(&a, pkt(0), &mut ctx).unwrap());
            assert!(link.queue_packet(&a, pkt(1), &mut ctx).unwrap());
            assert!(!link.queue_packet(&a, pkt(2), &mut ctx).unwrap());
        }
        log.flush_all(1.0);

        let (_, total_loss) =
            log.series(Metric::PacketLoss, &EntityId::Link(link.id.clone())).unwrap()[0];
        assert_eq!(total_loss, 1.0);
    }

    #[test]
    fn unknown_endpoint_is_an_error() {
        let link = test_link();
        let stranger = DeviceId::from("Z");
        assert!(matches!(
            link.opposite_device(&stranger),
            Err(CoreError::UnknownLinkEndpoint(_))
        ));
    }

    #[test]
    fn cursor_never_precedes_current_time_after_admission() {
        let mut link = test_link();
        let mut sched = Scheduler::new();
        let mut log = LogSink::new(1.0).unwrap();
        let a = DeviceId::from("A");
        let pkt = Packet::new_data(a.clone(), DeviceId::from("B"), FlowId::from("f0"), 0, 1024, 0.0);
        let mut ctx = Ctx::new(2.0, &mut sched, &mut log);
        link.queue_packet(&a, pkt, &mut ctx).unwrap();
        assert!(link.next_start_tx[idx(Direction::Rightward)] >= 2.0);
    }
}
