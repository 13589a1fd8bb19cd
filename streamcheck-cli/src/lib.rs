//! Library target for the `streamcheck` package.
//!
//! The primary deliverable of this package is the `streamcheck` CLI binary
//! (`src/main.rs`); the modules live here so integration tests can drive them.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod processor;
pub mod utils;

#[doc(hidden)]
pub use streamcheck_engine;

pub use error::AppError;
