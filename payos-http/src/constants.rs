//! HTTP-specific constants for the payOS API.

use std::time::Duration;

/// Production API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api-merchant.payos.vn";

/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Merchant client id header.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Merchant API key header.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Partner code header, sent only when configured.
pub const PARTNER_CODE_HEADER: &str = "x-partner-code";

/// Header-mode signature, on requests and responses.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Idempotency key header for create operations.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Content type of every request body and envelope response.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type reported for downloads that carry none.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// `User-Agent` value identifying this library.
#[must_use]
pub fn user_agent() -> String {
    format!("PayOS/Rust {}", env!("CARGO_PKG_VERSION"))
}
