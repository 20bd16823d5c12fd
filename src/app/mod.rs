//! Application core: pure domain logic, zero I/O.
//!
//! [`service::NodeService`] composes the power orchestrator and the link
//! dispatcher around the shared sample store.  All interaction with
//! hardware happens through the **port traits** in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
