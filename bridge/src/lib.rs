//! MCP bridge: exposes the speech tools to MCP clients over stdio

pub mod protocol;
pub mod server;

pub use protocol::{McpError, Result};
pub use server::McpServer;
