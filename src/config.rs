//! Node configuration parameters.
//!
//! Every timing constant and threshold used by the power orchestrator and
//! the link dispatcher lives here.  Nothing is persisted: the node boots
//! with [`NodeConfig::default()`] and logs it as JSON.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Abnormality check tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Fresh readings per check.
    pub samples: u8,
    /// Delay between readings (ms).
    pub spacing_ms: u32,
    /// Environmental PM2.5 ceiling (µg/m³).
    pub pm25_ceiling_ug_m3: f32,
    /// Estimated VOC ceiling (ppm).
    pub voc_ceiling_ppm: f32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            samples: 5,
            spacing_ms: 500,
            pm25_ceiling_ug_m3: 12.0,
            voc_ceiling_ppm: 0.5,
        }
    }
}

/// Link dispatcher tuning.  Interval fields use the controller's native
/// units so they can be handed to the stack unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Period of the per-connection dispatch timer (ms).
    pub dispatch_period_ms: u32,
    /// Delay from connect to the first dispatch tick (ms).
    pub first_dispatch_delay_ms: u32,
    /// Minimum spacing between two successful sends (ms).
    pub min_send_interval_ms: u32,
    /// Advertising indicator toggle period (ms).
    pub blink_period_ms: u32,
    /// Advertising interval (units of 0.625 ms).
    pub adv_interval: u16,
    /// Minimum connection interval (units of 1.25 ms).
    pub conn_interval_min: u16,
    /// Maximum connection interval (units of 1.25 ms).
    pub conn_interval_max: u16,
    /// Peripheral latency (connection events).
    pub peripheral_latency: u16,
    /// Supervision timeout (units of 10 ms).
    pub supervision_timeout: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            dispatch_period_ms: 3_000,
            first_dispatch_delay_ms: 1_000,
            min_send_interval_ms: 2_900,
            blink_period_ms: 500,
            adv_interval: 800,
            conn_interval_min: 8,
            conn_interval_max: 16,
            peripheral_latency: 0,
            supervision_timeout: 50,
        }
    }
}

/// Core node configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Suspension ---
    /// Continuous stillness before the node suspends (ms).
    pub no_movement_timeout_ms: u32,
    /// Suspend → pre-wake alarm lead (ms).
    pub pre_wake_lead_ms: u32,
    /// Pre-wake → full-wake alarm lead, the particulate warm-up window (ms).
    pub full_wake_lead_ms: u32,
    /// Accelerometer vector magnitude above which the node counts as moving (g).
    pub motion_threshold_g: f32,

    // --- Resume ---
    /// Settle time after clocks are restored (ms).
    pub clock_settle_ms: u32,
    /// Indicator pulses shown on resume.
    pub resume_pulse_count: u8,
    /// On and off time of each resume pulse (ms).
    pub resume_pulse_ms: u32,
    /// Delay from resume to the next periodic acquisition (ms).
    pub resume_acquisition_lead_ms: u32,

    // --- Awake ---
    /// Periodic acquisition cadence while awake (ms).
    pub acquisition_period_ms: u32,
    /// Run-loop idle delay while awake (ms).
    pub awake_poll_interval_ms: u32,
    /// Boot-time sensor warm-up before the first acquisition (ms).
    pub sensor_warmup_ms: u32,

    pub health: HealthCheckConfig,
    pub link: LinkConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            no_movement_timeout_ms: 600_000, // 10 min
            pre_wake_lead_ms: 20_000,
            full_wake_lead_ms: 15_000,
            motion_threshold_g: 0.10,

            clock_settle_ms: 100,
            resume_pulse_count: 5,
            resume_pulse_ms: 200,
            resume_acquisition_lead_ms: 7_000,

            acquisition_period_ms: 7_000,
            awake_poll_interval_ms: 100,
            sensor_warmup_ms: 180_000, // 3 min

            health: HealthCheckConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

// ── Validation ────────────────────────────────────────────────

/// Errors from [`NodeConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl core::error::Error for ConfigError {}

fn check(ok: bool, msg: &'static str) -> Result<(), ConfigError> {
    if ok { Ok(()) } else { Err(ConfigError::ValidationFailed(msg)) }
}

fn positive_finite(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl NodeConfig {
    /// Reject values that would leave the node unwakeable or the link
    /// out of the controller's legal ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.no_movement_timeout_ms > 0, "no_movement_timeout_ms must be > 0")?;
        check(self.pre_wake_lead_ms > 0, "pre_wake_lead_ms must be > 0")?;
        check(self.full_wake_lead_ms > 0, "full_wake_lead_ms must be > 0")?;
        check(self.acquisition_period_ms > 0, "acquisition_period_ms must be > 0")?;
        check(positive_finite(self.motion_threshold_g), "motion_threshold_g must be positive")?;

        let h = &self.health;
        check((1..=15).contains(&h.samples), "health.samples must be 1..=15")?;
        check(positive_finite(h.pm25_ceiling_ug_m3), "health.pm25_ceiling_ug_m3 must be positive")?;
        check(positive_finite(h.voc_ceiling_ppm), "health.voc_ceiling_ppm must be positive")?;

        self.link.validate()
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.dispatch_period_ms > 0, "link.dispatch_period_ms must be > 0")?;
        check(self.blink_period_ms > 0, "link.blink_period_ms must be > 0")?;
        check(
            self.min_send_interval_ms <= self.dispatch_period_ms,
            "link.min_send_interval_ms must not exceed dispatch_period_ms",
        )?;
        check(
            (32..=16_384).contains(&self.adv_interval),
            "link.adv_interval must be 32..=16384",
        )?;
        check(
            (6..=3_200).contains(&self.conn_interval_min)
                && (6..=3_200).contains(&self.conn_interval_max),
            "link.conn_interval must be 6..=3200",
        )?;
        check(
            self.conn_interval_min <= self.conn_interval_max,
            "link.conn_interval_min must not exceed conn_interval_max",
        )?;
        check(self.peripheral_latency <= 499, "link.peripheral_latency must be <= 499")?;
        check(
            (10..=3_200).contains(&self.supervision_timeout),
            "link.supervision_timeout must be 10..=3200",
        )?;
        // timeout_ms > (1 + latency) * interval_ms * 2
        let timeout_ms = u32::from(self.supervision_timeout) * 10;
        let max_interval_x4 = u32::from(self.conn_interval_max) * 5; // ×1.25 ms ×4
        let floor_ms = (1 + u32::from(self.peripheral_latency)) * max_interval_x4 / 2;
        check(
            timeout_ms > floor_ms,
            "link.supervision_timeout too short for interval and latency",
        )
    }
}
