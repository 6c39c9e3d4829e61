//! revit-mcp-bridge: MCP server that relays tool calls to a running Revit
//! session
//!
//! The bridge exposes a handful of read-only and export operations on the
//! document open in Revit. It never reimplements Revit's document model: each
//! tool call becomes one HTTP call against a route listener living inside the
//! host application, and every outcome comes back as a uniform envelope.
//!
//! # Architecture
//!
//! ```text
//!   MCP client ──▶ mcp (stdio | HTTP) ──▶ relay ══HTTP══▶ routes ──▶ host::Document
//!                                                           │
//!                                            lookup ◀───────┤
//!                                            export ◀───────┤
//!                                            envelope ◀─────┘
//! ```
//!
//! The route side is written against the [`host::Document`] and
//! [`host::SessionProvider`] traits, so it can be embedded wherever a host
//! adapter exists. [`host::memory`] provides a snapshot-backed host that the
//! binary can serve directly with `--serve-snapshot`.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Error types
//! - [`envelope`] — Uniform response envelope
//! - [`host`] — The consumed interface of the host application
//! - [`lookup`] — Sheet and level resolvers
//! - [`export`] — PDF/image export with strategy fallback
//! - [`routes`] — Route dispatcher and its HTTP router
//! - [`relay`] — Outbound relay client
//! - [`mcp`] — MCP protocol implementation

pub mod config;
pub mod envelope;
pub mod error;
pub mod export;
pub mod host;
pub mod lookup;
pub mod mcp;
pub mod relay;
pub mod routes;
