//! # Jenky Engine
//!
//! The traversal, validation, and lifecycle core that sits between a caller
//! (MCP tool surface or CLI) and one or more Jenkins servers:
//!
//! - **`config`**: YAML configuration (servers + scenario table), merging,
//!   and validation
//! - **`walker`**: recursive job discovery with a bounded-depth tree query
//!   and keyword filtering
//! - **`params`**: parameter introspection and the pure supplied-value
//!   validator
//! - **`lifecycle`**: build trigger/status/stop/log and queue snapshots
//! - **`provision`**: idempotent create-or-update of pipeline jobs under the
//!   managed namespace
//! - **`scenario`**: named-scenario resolution and scoped searches
//!
//! All results are produced fresh per call and owned by the caller; remote
//! state is authoritative and never cached across calls. The only shared
//! mutable state (the per-server security token) lives below this crate in
//! `jenky-api`.

pub mod config;
mod engine;
pub mod lifecycle;
pub mod params;
pub mod provision;
pub mod scenario;
pub mod walker;

pub use engine::Engine;
