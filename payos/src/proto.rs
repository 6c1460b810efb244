//! Wire format types shared by every payOS endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only `code` that denotes success.
pub const SUCCESS_CODE: &str = "00";

/// Uniform response wrapper: `{code, desc, data, signature}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Server result code. `"00"` is success.
    #[serde(default)]
    pub code: String,
    /// Human-readable description of `code`.
    #[serde(default)]
    pub desc: String,
    /// Endpoint payload.
    #[serde(default)]
    pub data: Option<Value>,
    /// Body signature over `data`, present on body-signed endpoints.
    #[serde(default)]
    pub signature: Option<String>,
}

impl Envelope {
    /// Returns the payload if `code` is `"00"` and `data` is not null.
    #[must_use]
    pub fn success_data(&self) -> Option<&Value> {
        if self.code != SUCCESS_CODE {
            return None;
        }
        self.data.as_ref().filter(|d| !d.is_null())
    }
}

/// Pagination metadata returned by list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Requested page size.
    pub limit: u64,
    /// Offset of the first item of this page.
    pub offset: u64,
    /// Total items across all pages.
    pub total: u64,
    /// Items in this page.
    pub count: u64,
    /// Whether another page follows.
    pub has_more: bool,
}

impl Pagination {
    /// Offset of the page after this one.
    #[must_use]
    pub const fn next_offset(&self) -> u64 {
        self.offset.saturating_add(self.count)
    }
}

/// Result of a binary download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDownload {
    /// File name from `Content-Disposition`, if present.
    pub filename: Option<String>,
    /// `Content-Type`, defaulting to `application/octet-stream`.
    pub content_type: String,
    /// `Content-Length`, if present and numeric.
    pub size: Option<u64>,
    /// Raw body.
    pub data: Vec<u8>,
}
