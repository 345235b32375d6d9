//! CyNova Common Library
//!
//! Report model, analytics insight types, live message shapes,
//! configuration and errors shared by every CyNova crate.

pub mod config;
pub mod error;
pub mod insights;
pub mod message;
pub mod types;

pub use config::{CyNovaOptions, LiveServerOptions, DIFF_DIR_NAME, HISTORY_FILE_NAME};
pub use error::{Error, Result};
pub use insights::*;
pub use message::LiveMessage;
pub use types::*;

/// CyNova version written into every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
