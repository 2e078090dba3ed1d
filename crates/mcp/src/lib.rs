//! Model Context Protocol (MCP) tool surface for jenky.
//!
//! This crate binds the engine's operations to MCP: one tool per public
//! operation, scenario-oriented prompts, and both stdio and streamable-HTTP
//! hosts.

pub mod schemas;
pub mod server;

pub use server::{JenkyMcpCore, McpHttpServer, RunningMcpHttpServer, resolve_bind_address, serve_stdio};
