//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the request core:
//! - Logging and tracing infrastructure
//! - Configuration management (host capabilities, fail-fast validation)
//!
//! ## Overview
//!
//! Hosts build a [`CoreConfig`](config::CoreConfig) once at start-up, declaring
//! which transports and stores exist, and optionally call
//! [`init_logging`](logging::init_logging). Everything else reads from that
//! configuration.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
