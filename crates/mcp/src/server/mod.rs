mod core;
mod http;
mod prompts;

pub use core::JenkyMcpCore;
pub use http::{McpHttpServer, RunningMcpHttpServer, resolve_bind_address, serve_stdio};
