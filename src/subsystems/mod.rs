//! Long-running subsystems spawned at startup.

pub mod comms;
pub mod runtime;
