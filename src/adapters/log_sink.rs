//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured node events to the
//! ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Started => info!("START | node service up"),
            NodeEvent::PowerChanged { from, to } => info!("POWER | {:?} -> {:?}", from, to),
            NodeEvent::SuspendAborted(e) => warn!("POWER | suspend aborted: {}", e),
            NodeEvent::Resumed(cause) => info!("POWER | resumed ({:?})", cause),
            NodeEvent::SampleAcquired(s) => {
                info!(
                    "SAMPLE | T={:.1}\u{00b0}C RH={:.1}% P={:.0}Pa gas={:.1}k\u{03a9} \
                     VOC={:.2}ppm PM2.5={:.0}\u{00b5}g/m\u{00b3}",
                    s.temperature, s.humidity, s.pressure, s.gas_resistance, s.voc_ppm, s.pm25,
                );
            }
            NodeEvent::AcquisitionSkipped(e) => warn!("SAMPLE | skipped: {}", e),
            NodeEvent::HealthChecked(v) => info!(
                "HEALTH | {}/{} over ceiling, {} failed reads -> {}",
                v.exceeded,
                v.samples,
                v.failed_reads,
                if v.is_abnormal() { "ABNORMAL" } else { "normal" }
            ),
            NodeEvent::LinkChanged { from, to } => info!("LINK | {:?} -> {:?}", from, to),
            NodeEvent::PeerConnected(h) => info!("LINK | peer handle={}", h.0),
            NodeEvent::ConnParamsUpdated(r) => info!(
                "LINK | params interval={}.{:02}ms latency={} timeout={}ms",
                r.interval_us() / 1_000,
                r.interval_us() % 1_000 / 10,
                r.latency,
                r.supervision_timeout_ms()
            ),
            NodeEvent::NotificationsChanged(on) => {
                info!("LINK | notifications {}", if *on { "on" } else { "off" });
            }
            NodeEvent::SampleNotified(_) => info!("LINK | sample sent"),
            NodeEvent::LinkFailed(e) => warn!("LINK | {}", e),
        }
    }
}
