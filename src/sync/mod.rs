//! The synchronization core: drift monitoring and clock-transition handling.

pub mod controller;
pub mod monitor;

pub use controller::{SessionError, VideoComponent};
pub use monitor::{DriftMonitor, SyncTuning};
