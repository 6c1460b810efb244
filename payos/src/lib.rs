#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the payOS payment gateway.
//!
//! This crate holds everything about talking to payOS that does not need an
//! HTTP client: the canonical serialization used for HMAC checksums, the
//! signer/verifier, the retry and backoff policy, the lazy pagination cursor,
//! the response envelope and the error taxonomy shared by every layer.
//! The transport itself lives in `payos-http`.
//!
//! # Modules
//!
//! - [`canonical`] - Deterministic `key=value` rendering of JSON objects
//! - [`signature`] - HMAC signing and verification in every request/response mode
//! - [`retry`] - Retry eligibility and backoff computation
//! - [`pagination`] - `Page` and the lazy `PageIterator`
//! - [`proto`] - Wire envelope, pagination metadata and download results
//! - [`config`] - Credential resolution and validation
//! - [`webhook`] - Verification of incoming webhook payloads
//! - [`error`] - The error taxonomy
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing output from the pagination cursor

pub mod canonical;
pub mod config;
pub mod error;
pub mod pagination;
pub mod proto;
pub mod retry;
pub mod signature;
pub mod webhook;

pub use error::{ApiError, ApiErrorKind, Error, ErrorKind};
