//! Post-wake abnormality check.
//!
//! Takes `samples` fresh particulate + environmental readings spaced by a
//! fixed delay and counts how many exceed either ceiling.  A strict
//! majority marks the set abnormal.  A failed read counts as a normal
//! reading for that attempt.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::SensorPort;
use crate::config::HealthCheckConfig;
use crate::error::SensorError;
use crate::sensors::{EnvReading, PmReading};

/// Outcome of one abnormality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub exceeded: u8,
    pub samples: u8,
    pub failed_reads: u8,
}

impl HealthVerdict {
    pub fn is_abnormal(&self) -> bool {
        is_majority(self.exceeded, self.samples)
    }
}

/// `count > total / 2` with integer division.
pub const fn is_majority(count: u8, total: u8) -> bool {
    count > total / 2
}

/// Whether one pair of readings is over either ceiling.
pub fn reading_exceeds(env: &EnvReading, pm: &PmReading, cfg: &HealthCheckConfig) -> bool {
    f32::from(pm.pm2_5_env) > cfg.pm25_ceiling_ug_m3 || env.voc_ppm > cfg.voc_ceiling_ppm
}

fn classify(
    env: Result<EnvReading, SensorError>,
    pm: Result<PmReading, SensorError>,
    cfg: &HealthCheckConfig,
) -> Result<bool, SensorError> {
    Ok(reading_exceeds(&env?, &pm?, cfg))
}

/// Run the check against live sensors.  Blocks for
/// `(samples - 1) × spacing_ms`.
pub fn run_health_check(
    hw: &mut (impl SensorPort + DelayNs),
    cfg: &HealthCheckConfig,
) -> HealthVerdict {
    let mut verdict = HealthVerdict { exceeded: 0, samples: cfg.samples, failed_reads: 0 };

    for i in 0..cfg.samples {
        if i > 0 {
            hw.delay_ms(cfg.spacing_ms);
        }
        let env = hw.read_environment();
        let pm = hw.read_particulate();
        match classify(env, pm, cfg) {
            Ok(true) => verdict.exceeded += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("health: read {} failed ({}), counted as normal", i + 1, e);
                verdict.failed_reads += 1;
            }
        }
    }

    debug!(
        "health: {}/{} over ceiling ({} failed)",
        verdict.exceeded, verdict.samples, verdict.failed_reads
    );
    verdict
}
