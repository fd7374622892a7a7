//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the
//! platform-appropriate directory, writes it back on request, and supplies
//! defaults on first run.  No attendance attempt state is ever persisted.

pub mod config;
