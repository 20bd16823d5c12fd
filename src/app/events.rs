//! Outbound node events.
//!
//! The power orchestrator and the link dispatcher emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder).

use crate::error::{AlarmError, LinkError, SensorError};
use crate::link::ConnectionState;
use crate::power::{HealthVerdict, PowerState, WakeCause};
use crate::store::SensorSample;

use super::ports::{ConnHandle, ConnParamsReport};

/// Structured events emitted by the domain core.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The node service has started.
    Started,

    /// The orchestrator moved between power states.
    PowerChanged { from: PowerState, to: PowerState },

    /// Suspension was abandoned because no wake path could be armed.
    SuspendAborted(AlarmError),

    /// Resume sequence completed.
    Resumed(WakeCause),

    /// A fused sample was written to the store.
    SampleAcquired(SensorSample),

    /// An acquisition cycle was skipped.
    AcquisitionSkipped(SensorError),

    /// Post-wake abnormality check finished.
    HealthChecked(HealthVerdict),

    /// The dispatcher moved between connection states.
    LinkChanged { from: ConnectionState, to: ConnectionState },

    /// A peer connected.
    PeerConnected(ConnHandle),

    /// The controller reported new connection timing.
    ConnParamsUpdated(ConnParamsReport),

    /// Peer enabled or disabled notifications.
    NotificationsChanged(bool),

    /// A sample was pushed to the peer.
    SampleNotified(SensorSample),

    /// A link operation failed; retried on the next dispatch tick.
    LinkFailed(LinkError),
}
