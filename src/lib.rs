//! EnvNode firmware library.
//!
//! Exposes the pure-logic modules for integration testing and the board
//! adapters for the binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod pins;
pub mod power;
pub mod store;

// Board-facing modules compile on every target; the espidf code paths
// inside them are cfg-gated with simulation stubs beside them.
pub mod adapters;
pub mod drivers;
pub mod sensors;
