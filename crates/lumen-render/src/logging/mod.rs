//! Logger initialization.
//!
//! The crate itself only emits through the `log` facade; hosts that already
//! install a logger never need this module.

mod init;

pub use init::{init_logging, LoggingConfig};
