//! Request/response interceptors.
//!
//! Interceptors are [`reqwest_middleware::Middleware`] implementations. The
//! first configured middleware is the outermost one: it sees the request first
//! and the response last. When enabled, [`DebugLogger`] is always placed in
//! front of every user middleware so it observes the fully composed chain.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::{Extensions, HeaderMap};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;

use crate::constants::API_KEY_HEADER;

/// Destination for debug dumps.
pub type DebugSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Bodies longer than this are truncated in dumps.
const MAX_LOGGED_BODY: usize = 16 * 1024;

/// Dumps every request and response, with the API key redacted.
///
/// Without a sink, dumps go to `tracing` at `DEBUG` level under the
/// `payos::http` target.
#[derive(Clone, Default)]
pub struct DebugLogger {
    sink: Option<DebugSink>,
}

impl fmt::Debug for DebugLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugLogger")
            .field("sink", &self.sink.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl DebugLogger {
    /// Logs through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs through `sink`.
    #[must_use]
    pub fn with_sink<F>(sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    fn emit(&self, message: &str) {
        match &self.sink {
            Some(sink) => sink(message),
            None => tracing::debug!(target: "payos::http", "{message}"),
        }
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for DebugLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let start = Instant::now();
        self.emit(&format!("Request:\n{}", dump_request(&req)));

        let res = match next.run(req, extensions).await {
            Ok(res) => res,
            Err(err) => {
                self.emit(&format!("Request failed after {:?}: {err}", start.elapsed()));
                return Err(err);
            }
        };

        let elapsed = start.elapsed();
        let status = res.status();
        let version = res.version();
        let headers = res.headers().clone();
        let body = res.bytes().await.map_err(rqm::Error::Reqwest)?;

        let mut dump = format!("{version:?} {status}\n");
        write_headers(&mut dump, &headers);
        dump.push('\n');
        write_body(&mut dump, &body);
        self.emit(&format!("Response (in {elapsed:?}):\n{dump}"));

        let mut rebuilt = http::Response::new(reqwest::Body::from(body));
        *rebuilt.status_mut() = status;
        *rebuilt.version_mut() = version;
        *rebuilt.headers_mut() = headers;
        Ok(Response::from(rebuilt))
    }
}

fn dump_request(req: &Request) -> String {
    let mut dump = format!("{} {} {:?}\n", req.method(), req.url(), req.version());
    write_headers(&mut dump, req.headers());
    if let Some(body) = req.body().and_then(reqwest::Body::as_bytes) {
        dump.push('\n');
        write_body(&mut dump, body);
    }
    dump
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let value = if name.as_str().eq_ignore_ascii_case(API_KEY_HEADER) {
            "[REDACTED]"
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        out.push_str(&format!("{name}: {value}\n"));
    }
}

fn write_body(out: &mut String, body: &[u8]) {
    let shown = &body[..body.len().min(MAX_LOGGED_BODY)];
    out.push_str(&String::from_utf8_lossy(shown));
    if body.len() > MAX_LOGGED_BODY {
        out.push_str(&format!("... ({} bytes)", body.len()));
    }
}
