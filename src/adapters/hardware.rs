//! Hardware adapter: bridges real peripherals to the board port traits.
//!
//! Owns the accelerometer, both acquisition sensors, the status LED, the
//! clock and a delay provider, exposing them through [`SensorPort`],
//! [`MotionPort`], [`PowerPort`], [`ClockPort`] and [`IndicatorPort`].
//! On non-espidf targets the GPIO and clock drivers use cfg-gated
//! simulation stubs.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;

use crate::app::ports::{
    AlarmHandle, AlarmTarget, ClockPort, IndicatorPort, Instant, MotionPort, PowerPort, SensorPort,
};
use crate::drivers::status_led::StatusLed;
use crate::drivers::{clocks, hw_init};
use crate::error::{AlarmError, SensorError};
use crate::pins;
use crate::sensors::accel::Lis3dh;
use crate::sensors::particulate::Pmsa003i;
use crate::sensors::{EnvReading, PmReading, Sensor};

use super::time::Esp32Clock;

/// Upper bound of one low-power wait before the run loop re-checks.
pub const WAIT_SLICE_MS: u32 = 1_000;

/// Concrete adapter that combines all board hardware behind port traits.
pub struct BoardAdapter<A, P, E, D> {
    accel: Lis3dh<A>,
    particulate: Pmsa003i<P>,
    environment: E,
    led: StatusLed,
    clock: Esp32Clock,
    delay: D,
    particulate_powered: bool,
    motion_armed: bool,
}

impl<A, P, E, D> BoardAdapter<A, P, E, D>
where
    A: I2c,
    P: I2c,
    E: Sensor<Reading = EnvReading>,
    D: DelayNs,
{
    pub fn new(
        accel: Lis3dh<A>,
        particulate: Pmsa003i<P>,
        environment: E,
        led: StatusLed,
        clock: Esp32Clock,
        delay: D,
    ) -> Self {
        Self {
            accel,
            particulate,
            environment,
            led,
            clock,
            delay,
            particulate_powered: false,
            motion_armed: false,
        }
    }

    pub fn particulate_powered(&self) -> bool {
        self.particulate_powered
    }

    pub fn motion_armed(&self) -> bool {
        self.motion_armed
    }

    pub fn indicator_on(&self) -> bool {
        self.led.is_on()
    }
}

// ── SensorPort ────────────────────────────────────────────────

impl<A, P, E, D> SensorPort for BoardAdapter<A, P, E, D>
where
    A: I2c,
    P: I2c,
    E: Sensor<Reading = EnvReading>,
    D: DelayNs,
{
    /// Every sensor is attempted; the first failure is reported.
    fn init_sensors(&mut self) -> Result<(), SensorError> {
        let results = [self.accel.init(), self.environment.init(), self.particulate.init()];
        results.into_iter().collect()
    }

    fn read_environment(&mut self) -> Result<EnvReading, SensorError> {
        self.environment.read()
    }

    fn read_particulate(&mut self) -> Result<PmReading, SensorError> {
        self.particulate.read()
    }

    fn set_particulate_power(&mut self, on: bool) {
        hw_init::gpio_write(pins::PM_SET_GPIO, on);
        self.particulate_powered = on;
    }
}

// ── MotionPort ────────────────────────────────────────────────

impl<A, P, E, D> MotionPort for BoardAdapter<A, P, E, D>
where
    A: I2c,
    P: I2c,
    E: Sensor<Reading = EnvReading>,
    D: DelayNs,
{
    fn is_moving(&mut self) -> bool {
        self.accel.is_moving()
    }

    fn arm_motion_interrupt(&mut self) {
        if let Err(e) = self.accel.enable_interrupt() {
            warn!("board: motion interrupt arm failed ({})", e);
        }
        hw_init::set_motion_gpio_enabled(true);
        self.motion_armed = true;
    }

    fn disarm_motion_interrupt(&mut self) {
        hw_init::set_motion_gpio_enabled(false);
        if let Err(e) = self.accel.disable_interrupt() {
            warn!("board: motion interrupt disarm failed ({})", e);
        }
        // Release any latch left from the wake edge.
        let _ = self.accel.acknowledge_interrupt();
        self.motion_armed = false;
    }
}

// ── PowerPort ─────────────────────────────────────────────────

impl<A, P, E, D> PowerPort for BoardAdapter<A, P, E, D>
where
    A: I2c,
    P: I2c,
    E: Sensor<Reading = EnvReading>,
    D: DelayNs,
{
    fn reduce_clocks(&mut self) {
        clocks::reduce();
    }

    fn restore_clocks(&mut self) {
        clocks::restore();
    }

    fn wait_for_interrupt(&mut self) {
        clocks::wait(WAIT_SLICE_MS);
    }
}

// ── ClockPort / IndicatorPort / DelayNs ───────────────────────

impl<A, P, E, D> ClockPort for BoardAdapter<A, P, E, D>
where
    A: I2c,
    P: I2c,
    E: Sensor<Reading = EnvReading>,
    D: DelayNs,
{
    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn schedule_at(&mut self, at: Instant, target: AlarmTarget) -> Result<AlarmHandle, AlarmError> {
        self.clock.schedule_at(at, target)
    }

    fn cancel(&mut self, handle: AlarmHandle) {
        self.clock.cancel(handle);
    }
}

impl<A, P, E, D> IndicatorPort for BoardAdapter<A, P, E, D>
where
    A: I2c,
    P: I2c,
    E: Sensor<Reading = EnvReading>,
    D: DelayNs,
{
    fn set_indicator(&mut self, on: bool) {
        self.led.set(on);
    }

    fn toggle_indicator(&mut self) {
        self.led.toggle();
    }
}

impl<A, P, E, D: DelayNs> DelayNs for BoardAdapter<A, P, E, D> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
