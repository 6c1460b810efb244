#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP client for the payOS payment gateway.
//!
//! Every call goes through one execution engine, [`PayOsClient`]: it signs
//! the request, runs it through the middleware chain, retries transient
//! failures with backoff, and unwraps and verifies the response envelope.
//! [`PayOs`] layers typed endpoint wrappers on top.
//!
//! # Modules
//!
//! - [`client`] - The execution engine
//! - [`options`] - Client configuration
//! - [`request`] - Per-request options and query encoding
//! - [`middleware`] - The debug-logging middleware
//! - [`download`] - Binary download handling
//! - [`resources`] - Typed endpoint wrappers
//! - [`constants`] - Header names, base URL and defaults
//! - [`legacy`] - Deprecated free functions
//!
//! # Feature Flags
//!
//! - `telemetry` - Tracing spans on the engine's public operations

pub mod client;
pub mod constants;
pub mod download;
pub mod legacy;
pub mod middleware;
pub mod options;
pub mod request;
pub mod resources;

pub use client::PayOsClient;
pub use middleware::DebugLogger;
pub use options::ClientOptions;
pub use payos as core;
pub use request::{RequestOptions, Signatures};
pub use resources::PayOs;
