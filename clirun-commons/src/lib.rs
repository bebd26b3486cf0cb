//! Shared traits and helper types reused across the clirun crates. The goal
//! is to keep the process engine and the program wrapper decoupled from any
//! particular logging backend or monitoring service while still sharing
//! common contracts.

pub mod errors;
pub mod paths;
pub mod reference;
pub mod telemetry;

pub use errors::{ErrorReporter, NoopErrorReporter};
pub use paths::{base_directory, normalize_path, resolve_directory};
pub use reference::{MemoryErrorReporter, MemoryTelemetry};
pub use telemetry::{NoopTelemetry, TelemetrySink};
