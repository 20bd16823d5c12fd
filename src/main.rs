//! EnvNode firmware main entry point.
//!
//! Hexagonal architecture with an interrupt-fed run loop.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  BoardAdapter                     BleAdapter   LogEventSink  │
//! │  (Sensor·Motion·Power·Clock·LED)  (LinkPort)   (EventSink)   │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                NodeService (pure logic)                │  │
//! │  │      PowerOrchestrator · Dispatcher · SampleStore      │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use envnode::adapters::ble::BleAdapter;
use envnode::adapters::device_id;
use envnode::adapters::hardware::BoardAdapter;
use envnode::adapters::log_sink::LogEventSink;
use envnode::adapters::time::Esp32Clock;
use envnode::app::service::NodeService;
use envnode::config::NodeConfig;
use envnode::drivers::status_led::StatusLed;
use envnode::drivers::{clocks, hw_init, hw_timer};
use envnode::events::SYSTEM_EVENTS;
use envnode::pins;
use envnode::sensors::accel::Lis3dh;
use envnode::sensors::environment::Bme68x;
use envnode::sensors::particulate::Pmsa003i;
use envnode::store::SampleStore;

/// Shared with the BLE read callback, hence `'static`.
static STORE: SampleStore = SampleStore::new();

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  EnvNode v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = NodeConfig::default();
    config.validate().map_err(|e| anyhow!("config: {}", e))?;
    info!("config: {}", serde_json::to_string(&config)?);

    // ── 3. Board bring-up ─────────────────────────────────────
    hw_init::init_peripherals().map_err(|e| anyhow!("HAL init failed: {}", e))?;
    hw_timer::init_timers().map_err(|e| anyhow!("timer init failed (rc={})", e.0))?;
    if let Err(e) = hw_init::init_isr_service() {
        warn!("ISR service init failed: {} (no motion wake)", e);
    }
    clocks::register_main_task();
    clocks::restore();

    let p = Peripherals::take()?;
    let i2c_cfg = I2cConfig::new().baudrate(Hertz(pins::I2C_BAUD_HZ));
    // Pin numbers mirror `pins::ACCEL_*` and `pins::SENSOR_*`.
    let accel_bus = I2cDriver::new(p.i2c1, p.pins.gpio4, p.pins.gpio5, &i2c_cfg)?;
    let sensor_bus = I2cDriver::new(p.i2c0, p.pins.gpio8, p.pins.gpio9, &i2c_cfg)?;

    let mut board = BoardAdapter::new(
        Lis3dh::new(accel_bus, config.motion_threshold_g),
        Pmsa003i::new(sensor_bus),
        Bme68x::new(pins::SENSOR_I2C_PORT),
        StatusLed::new(),
        Esp32Clock::new(),
        FreeRtos,
    );

    // ── 4. Link ───────────────────────────────────────────────
    let name = device_id::device_name(&device_id::read_mac());
    let mut ble = BleAdapter::new(name.clone());
    ble.init(&STORE).map_err(|e| anyhow!("BLE init failed: {}", e))?;

    // ── 5. Service ────────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut service = NodeService::new(config, &STORE, &name);
    service.start(&mut board, &mut sink);

    info!("System ready. Entering run loop.");

    // ── 6. Run loop ───────────────────────────────────────────
    loop {
        service.run_once(&mut board, &mut ble, &SYSTEM_EVENTS, &mut sink);
    }
}
