use netsim_types::{DeviceId, LinkId};
use thiserror::Error;

/// Programmer errors the spec calls fatal: a device id that does not match
/// either endpoint of a link, a non-TCP packet handed to a host, or a
/// packet kind a router has no handling for. None of these are reachable
/// through a topology the loader has validated; they exist so a bug
/// surfaces as a typed error the CLI can report and exit non-zero on,
/// rather than a panic deep in the event loop.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("device '{0}' is not an endpoint of this link")]
    UnknownLinkEndpoint(DeviceId),
    #[error("host '{0}' received a non-TCP packet")]
    NonTcpPacketAtHost(DeviceId),
    #[error("router '{0}' received an unsupported packet kind")]
    UnsupportedPacketAtRouter(DeviceId),
    #[error("device '{0}' referenced by an event is not registered with the controller")]
    UnknownDevice(DeviceId),
    #[error("link '{0}' referenced by an event is not registered with the controller")]
    UnknownLink(LinkId),
    #[error("log interval must be > 0, got {0}")]
    InvalidLogInterval(f64),
}

pub type CoreResult<T> = Result<T, CoreError>;
