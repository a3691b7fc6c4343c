//! Coordination infrastructure shared by the swarm's control loops
//!
//! Graceful shutdown handling: intake gating, in-flight gauges and drain
//! phase sequencing.

pub mod shutdown;

pub use shutdown::{
    GracefulShutdown, InFlightGauge, InFlightGuard, ShutdownConfig, ShutdownError, ShutdownPhase,
    ShutdownSignal,
};
