use std::cmp::Ordering;
use std::collections::BinaryHeap;

use netsim_types::{DeviceId, FlowId, LinkId, Packet};

/// Which direction a link event pertains to. `Leftward`/`Rightward` name the
/// two bound endpoints the way the link itself does (§4.3): `Rightward`
/// carries traffic originating at the left endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Leftward,
    Rightward,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Leftward => Direction::Rightward,
            Direction::Rightward => Direction::Leftward,
        }
    }
}

/// A tagged record of deferred work. The event queue never stores closures —
/// every scheduled callback is one of these variants, dispatched by the
/// controller's run loop. This keeps scheduling traceable and avoids
/// heap-allocated trait objects for something as hot as the event loop.
#[derive(Debug, Clone)]
pub enum Action {
    /// A host's sender wants to attempt another send cycle for one of its flows.
    SendNextPacket { host_id: DeviceId, flow_id: FlowId },
    /// A link has finished serializing a packet in `direction` and it is now
    /// propagating towards the peer.
    PacketOnWire { link_id: LinkId, direction: Direction },
    /// A packet has finished propagating and is arriving at `device_id`.
    ReceivePacket {
        device_id: DeviceId,
        link_id: LinkId,
        packet: Packet,
    },
    /// A router's periodic Bellman-Ford round.
    BfRound { router_id: DeviceId },
    /// The fast-recovery retransmit timer for a Reno flow. A no-op if acks
    /// have already advanced past `seq` by the time this fires.
    RetransmitCheck {
        host_id: DeviceId,
        flow_id: FlowId,
        seq: u64,
        ssthresh: f64,
    },
}

/// One entry in the priority queue: a scheduled time, the action to run, and
/// a monotonically increasing insertion id used to break ties in FIFO order.
#[derive(Debug)]
struct Event {
    time: f64,
    id: u64,
    action: Action,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest time (and, on a
        // tie, the smallest insertion id) pops first.
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// The discrete-event scheduler: a min-priority queue keyed by virtual time,
/// insertion order breaking ties (§4.1).
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Event>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_id: 0,
        }
    }

    /// Enqueue `action` to run at virtual time `at`. Callers must ensure
    /// `at` is not in the past; the scheduler does not enforce it itself
    /// since the controller is the only caller and always supplies
    /// `current_time + nonnegative_delay`.
    pub fn schedule(&mut self, at: f64, action: Action) {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Event { time: at, id, action });
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.queue.peek().map(|e| e.time)
    }

    /// Pop the lowest-time event, returning its scheduled time and action.
    pub fn pop(&mut self) -> Option<(f64, Action)> {
        self.queue.pop().map(|e| (e.time, e.action))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsim_types::FlowId;

    fn send(host: &str, flow: &str) -> Action {
        Action::SendNextPacket {
            host_id: DeviceId::from(host),
            flow_id: FlowId::from(flow),
        }
    }

    #[test]
    fn pops_in_time_order() {
        let mut s = Scheduler::new();
        s.schedule(5.0, send("A", "0"));
        s.schedule(1.0, send("B", "0"));
        s.schedule(3.0, send("C", "0"));

        let times: Vec<f64> = std::iter::from_fn(|| s.pop().map(|(t, _)| t)).collect();
        assert_eq!(times, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn ties_break_fifo() {
        let mut s = Scheduler::new();
        s.schedule(1.0, send("first", "0"));
        s.schedule(1.0, send("second", "0"));
        s.schedule(1.0, send("third", "0"));

        let order: Vec<String> = std::iter::from_fn(|| s.pop())
            .map(|(_, a)| match a {
                Action::SendNextPacket { host_id, .. } => host_id.to_string(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }
}
