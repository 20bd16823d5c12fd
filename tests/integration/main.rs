//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the virtual-clock board and recording link in `mock_hw`.  All
//! tests run on the host (x86_64) with no real hardware required.

mod link_dispatch_tests;
mod mock_hw;
mod power_cycle_tests;
mod service_loop_tests;
