use serde::{Deserialize, Serialize};

use crate::ids::{DeviceId, FlowId};

/// Maximum-segment-size payload used by every TCP-DATA packet.
pub const MSS: u64 = 1024;
/// Size of a bare TCP-ACK packet.
pub const ACK_SIZE: u64 = 64;
/// Size of a routing-update packet; same as a full data segment.
pub const ROUTING_UPDATE_SIZE: u64 = 1024;

/// The payload carried by a packet, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PacketKind {
    TcpData {
        flow_id: FlowId,
        sequence_number: u64,
        /// Virtual time at which the sender emitted this DATA packet.
        data_time: f64,
    },
    TcpAck {
        flow_id: FlowId,
        ack_number: u64,
        /// Data-creation time of the packet being acknowledged; the RTT reference.
        data_time: f64,
        ack_time: f64,
    },
    RoutingUpdate {
        /// The host whose reachability cost is being advertised.
        host_id: DeviceId,
        cost: f64,
    },
}

/// A packet flowing between devices. Common header fields plus a tagged payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Packet {
    pub src: DeviceId,
    pub dst: Option<DeviceId>,
    pub size: u64,
    pub kind: PacketKind,
}

impl Packet {
    pub fn new_data(
        src: DeviceId,
        dst: DeviceId,
        flow_id: FlowId,
        sequence_number: u64,
        size: u64,
        data_time: f64,
    ) -> Self {
        Self {
            src,
            dst: Some(dst),
            size,
            kind: PacketKind::TcpData {
                flow_id,
                sequence_number,
                data_time,
            },
        }
    }

    pub fn new_ack(
        src: DeviceId,
        dst: DeviceId,
        flow_id: FlowId,
        ack_number: u64,
        data_time: f64,
        ack_time: f64,
    ) -> Self {
        Self {
            src,
            dst: Some(dst),
            size: ACK_SIZE,
            kind: PacketKind::TcpAck {
                flow_id,
                ack_number,
                data_time,
                ack_time,
            },
        }
    }

    /// `dst` is left unset: routing updates are flooded to every router peer
    /// attached to the originating link, not addressed to a single device.
    pub fn new_routing_update(src: DeviceId, host_id: DeviceId, cost: f64) -> Self {
        Self {
            src,
            dst: None,
            size: ROUTING_UPDATE_SIZE,
            kind: PacketKind::RoutingUpdate { host_id, cost },
        }
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self.kind, PacketKind::TcpData { .. } | PacketKind::TcpAck { .. })
    }

    pub fn is_tcp_data(&self) -> bool {
        matches!(self.kind, PacketKind::TcpData { .. })
    }

    pub fn is_tcp_ack(&self) -> bool {
        matches!(self.kind, PacketKind::TcpAck { .. })
    }

    pub fn is_routing_update(&self) -> bool {
        matches!(self.kind, PacketKind::RoutingUpdate { .. })
    }

    pub fn flow_id(&self) -> Option<&FlowId> {
        match &self.kind {
            PacketKind::TcpData { flow_id, .. } | PacketKind::TcpAck { flow_id, .. } => {
                Some(flow_id)
            }
            PacketKind::RoutingUpdate { .. } => None,
        }
    }
}
