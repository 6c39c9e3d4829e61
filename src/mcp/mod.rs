//! Model Context Protocol (MCP) server implementation.
//!
//! Exposes the Revit bridge's relay calls as MCP tools. The server speaks
//! JSON-RPC 2.0 over one of two transports, chosen at startup.
//!
//! # Architecture
//!
//! ```text
//!   stdio lines ──┐
//!                 ├──▶ McpServer ──▶ tools ──▶ RelayClient ──▶ /revit_mcp/...
//!   POST /mcp  ───┘   (lifecycle)   (table)      (reqwest)
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod http;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Reply, MCP_PROTOCOL_VERSION};
pub use server::{Lifecycle, McpServer};
pub use transport::{LineTransport, StdioTransport};
