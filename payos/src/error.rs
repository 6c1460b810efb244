//! Error types for the payOS client.
//!
//! Every failure the client can produce is classified into exactly one
//! [`Error`] variant. Retry eligibility is decided from the fieldless
//! [`ErrorKind`] tag plus the HTTP status, see [`crate::retry::should_retry`].

use std::fmt;

use http::{HeaderMap, StatusCode};

/// Boxed transport error carried by [`Error::Connection`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Base error type for payOS operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid credentials. Raised while constructing a client.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure (DNS, refused, reset, unreadable body).
    #[error("connection error: {message}: {source}")]
    Connection {
        /// Human-readable context.
        message: String,
        /// The underlying transport error.
        #[source]
        source: BoxError,
    },

    /// The request deadline elapsed, or cancellation was observed while the
    /// request was in flight.
    #[error("connection timeout: {message}")]
    Timeout {
        /// Human-readable context.
        message: String,
    },

    /// The caller's cancellation signal fired before dispatch or during a
    /// backoff wait.
    #[error("request cancelled")]
    Cancelled,

    /// The server answered with a failure status or a non-success envelope.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Request signing failed, or a response signature was absent or did not
    /// match its payload.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A response body could not be decoded into the expected shape.
    #[error("failed to parse response: {context}")]
    Parse {
        /// Human-readable context.
        context: String,
        /// The underlying JSON error, if any.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The caller passed parameters that cannot form a valid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A webhook payload is missing its data or signature.
    #[error("invalid webhook: {0}")]
    Webhook(String),
}

/// Fieldless classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Configuration`].
    Configuration,
    /// See [`Error::Connection`].
    Connection,
    /// See [`Error::Timeout`].
    Timeout,
    /// See [`Error::Cancelled`].
    Cancelled,
    /// See [`Error::Api`].
    Api(ApiErrorKind),
    /// See [`Error::InvalidSignature`].
    InvalidSignature,
    /// See [`Error::Parse`].
    Parse,
    /// See [`Error::InvalidRequest`].
    InvalidRequest,
    /// See [`Error::Webhook`].
    Webhook,
}

impl Error {
    /// Creates a [`Error::Connection`] from any transport error.
    pub fn connection(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Creates a [`Error::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a [`Error::Parse`] wrapping a JSON error.
    pub fn parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Returns the classification tag of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Api(e) => ErrorKind::Api(e.kind),
            Self::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Webhook(_) => ErrorKind::Webhook,
        }
    }

    /// HTTP status of the response that produced this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(e) => Some(e.status),
            _ => None,
        }
    }

    /// Response headers carried by an API error, used for backoff hints.
    #[must_use]
    pub const fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Self::Api(e) => Some(&e.headers),
            _ => None,
        }
    }

    /// Returns `true` if the engine may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        crate::retry::should_retry(self.kind(), self.status())
    }
}

/// Subclassification of API errors by HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 429
    TooManyRequests,
    /// Any 5xx status.
    InternalServer,
    /// Any other status, including a 200 with a failure envelope.
    Other,
}

impl ApiErrorKind {
    /// Maps an HTTP status to its error subkind.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::BadRequest,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Self::TooManyRequests,
            s if s.is_server_error() => Self::InternalServer,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::TooManyRequests => "too many requests",
            Self::InternalServer => "internal server error",
            Self::Other => "api error",
        };
        f.write_str(name)
    }
}

/// A failure reported by the payOS API.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Status subclassification.
    pub kind: ApiErrorKind,
    /// HTTP status of the response.
    pub status: StatusCode,
    /// Server error code from the envelope, if the body was an envelope.
    pub code: Option<String>,
    /// Server description, or the raw body when it was not an envelope.
    pub description: String,
    /// Response headers, kept for `Retry-After` style hints.
    pub headers: HeaderMap,
}

impl ApiError {
    /// Creates an API error, deriving the subkind from `status`.
    #[must_use]
    pub fn from_status(status: StatusCode, description: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::from_status(status),
            status,
            code: None,
            description: description.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Sets the server error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        self.code = (!code.is_empty()).then_some(code);
        self
    }

    /// Sets the response headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {}", self.kind, self.status.as_u16())?;
        if let Some(code) = &self.code {
            write!(f, ", code {code}")?;
        }
        write!(f, "): {}", self.description)
    }
}

impl std::error::Error for ApiError {}
