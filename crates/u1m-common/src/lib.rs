//! u1m Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging and error handling for the u1m workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`U1mError`] and the crate-wide [`Result`] alias
//! - **Logging**: [`logging::init_logging`] sets up the global `tracing` subscriber
//! - **Types**: [`types::RankedEntry`] plus the domain/rank validation rules shared
//!   by the loader and the read API
//!
//! # Example
//!
//! ```no_run
//! use u1m_common::types::{validate_domain, RankedEntry};
//!
//! fn check(entry: &RankedEntry) -> u1m_common::Result<()> {
//!     validate_domain(&entry.name)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, U1mError};
