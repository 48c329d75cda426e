//! AIS Common Library
//!
//! Shared logging setup for the AIS ingestion workspace:
//! [`logging::LogConfig`] and [`logging::init_logging`].
//!
//! # Example
//!
//! ```no_run
//! use ais_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod logging;
