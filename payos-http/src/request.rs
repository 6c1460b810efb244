//! Per-call request description.
//!
//! A [`RequestOptions`] is everything the engine needs to build one logical
//! call: method, path, ordered query, optional JSON body, extra headers, the
//! signing/verification [`Signatures`] and an optional cancellation token.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use payos::Error;
use payos::canonical;
use payos::signature::{RequestSignature, ResponseSignature};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Request signing and response verification modes for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signatures {
    /// How the request body is signed.
    pub request: RequestSignature,
    /// How the response is verified.
    pub response: ResponseSignature,
}

impl Signatures {
    /// No signing, no verification.
    pub const NONE: Self = Self {
        request: RequestSignature::None,
        response: ResponseSignature::None,
    };

    /// Creates a pair of modes.
    #[must_use]
    pub const fn new(request: RequestSignature, response: ResponseSignature) -> Self {
        Self { request, response }
    }

    /// Verification only.
    #[must_use]
    pub const fn response(response: ResponseSignature) -> Self {
        Self {
            request: RequestSignature::None,
            response,
        }
    }
}

/// A single logical call to the payOS API.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Path resolved against the base URL.
    pub path: String,
    /// Query parameters in insertion order. `null` values are skipped.
    pub query: Vec<(String, Value)>,
    /// JSON body.
    pub body: Option<Value>,
    /// Extra headers. They override the identification headers.
    pub headers: HeaderMap,
    /// Signing and verification modes.
    pub signatures: Signatures,
    /// Aborts the call, including retries and backoff waits.
    pub cancellation: Option<CancellationToken>,
}

impl RequestOptions {
    /// Creates options for `method` and `path`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` and sets it as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `body` cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::InvalidRequest(format!("failed to serialize request body: {e}")))?;
        Ok(self.with_body(value))
    }

    /// Sets a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the signing and verification modes.
    #[must_use]
    pub const fn with_signatures(mut self, signatures: Signatures) -> Self {
        self.signatures = signatures;
        self
    }

    /// Sets the request signing mode.
    #[must_use]
    pub const fn with_request_signature(mut self, mode: RequestSignature) -> Self {
        self.signatures.request = mode;
        self
    }

    /// Sets the response verification mode.
    #[must_use]
    pub const fn with_response_signature(mut self, mode: ResponseSignature) -> Self {
        self.signatures.response = mode;
        self
    }

    /// Binds the call to a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Renders query parameters: strings as-is, numbers in plain decimal,
/// arrays and objects as JSON, `null` omitted.
#[must_use]
pub fn encode_query(query: &[(String, Value)]) -> Vec<(String, String)> {
    query
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), canonical::render_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_query_renders_each_kind() {
        let options = RequestOptions::get("/v1/payouts")
            .with_query("referenceId", "ref 1")
            .with_query("limit", 20)
            .with_query("ratio", 0.5)
            .with_query("toDate", Value::Null)
            .with_query("category", json!(["salary", "bonus"]))
            .with_query("filter", json!({"b": 1, "a": true}));

        assert_eq!(
            encode_query(&options.query),
            vec![
                ("referenceId".to_owned(), "ref 1".to_owned()),
                ("limit".to_owned(), "20".to_owned()),
                ("ratio".to_owned(), "0.5".to_owned()),
                ("category".to_owned(), r#"["salary","bonus"]"#.to_owned()),
                ("filter".to_owned(), r#"{"a":true,"b":1}"#.to_owned()),
            ]
        );
    }

    #[test]
    fn test_builder_sets_fields() {
        let token = CancellationToken::new();
        let options = RequestOptions::post("/v2/payment-requests")
            .with_json(&json!({"amount": 1}))
            .unwrap()
            .with_request_signature(RequestSignature::PaymentRequest)
            .with_response_signature(ResponseSignature::Body)
            .with_cancellation(token);

        assert_eq!(options.method, Method::POST);
        assert_eq!(options.body, Some(json!({"amount": 1})));
        assert_eq!(
            options.signatures,
            Signatures::new(RequestSignature::PaymentRequest, ResponseSignature::Body)
        );
        assert!(options.cancellation.is_some());
    }
}
