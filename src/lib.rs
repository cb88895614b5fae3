//! Tickergrid - Main Library
//!
//! Live ticker table client: consumes a keyed row-update stream and keeps
//! an incremental console view synchronized with it.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (env settings, runners)
//! - **tickertable**: Reconciliation engine (re-exported from workspace)
//! - **streamlink**: WebSocket library (re-exported from workspace)

// Re-export workspace libraries for convenience
pub use streamlink;
pub use tickertable;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::AppSettings;
    pub use runner::{shutdown_signal, BinaryRunner, RunConfig};
}
