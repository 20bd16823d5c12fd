//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                         | Connects to            |
//! |-------------|------------------------------------|------------------------|
//! | `ble`       | LinkPort                           | Bluedroid GATT server  |
//! | `hardware`  | SensorPort, MotionPort, PowerPort  | I²C sensors, GPIO, PM  |
//! |             | ClockPort, IndicatorPort, DelayNs  | esp_timer, status LED  |
//! | `log_sink`  | EventSink                          | Serial log output      |
//! | `time`      | ClockPort                          | esp_timer one-shots    |
//! | `device_id` |                                    | eFuse MAC              |

pub mod ble;
pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod time;
