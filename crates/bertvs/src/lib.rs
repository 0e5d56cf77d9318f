//! Offline replay and reporting for BER fixture register dumps.

use env_logger as _;

/// Register dumps and input file loading.
pub mod dump;
pub use dump::{load_config, load_dump, load_signal_map, LoadError, RegisterDump};

/// Dump replay through a tester session.
pub mod replay;
pub use replay::{replay, Replay};

/// Terminal report lines.
pub mod report;
