//! Request execution engine.
//!
//! [`PayOsClient`] turns a [`RequestOptions`] into an HTTP call and back into
//! verified data. One logical call goes through
//!
//! ```text
//! build -> sign -> serialize -> [dispatch -> decode -> verify status -> verify signature]
//! ```
//!
//! where the bracketed part is repeated under the client's [`RetryPolicy`].
//! Signing happens once, so every attempt sends identical bytes.
//!
//! Dispatch goes through the configured `reqwest_middleware` chain. A
//! cancellation token on the request preempts both the in-flight call and any
//! backoff wait.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use payos::proto::{Envelope, FileDownload, SUCCESS_CODE};
use payos::retry::RetryPolicy;
use payos::signature::{RequestSignature, ResponseSignature, SignatureMode, Signer};
use payos::{ApiError, Error};
use reqwest_middleware as rqm;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::constants::{
    API_KEY_HEADER, CLIENT_ID_HEADER, JSON_CONTENT_TYPE, PARTNER_CODE_HEADER, SIGNATURE_HEADER,
    user_agent,
};
use crate::download;
use crate::options::ClientOptions;
use crate::request::{RequestOptions, Signatures, encode_query};

/// A configured payOS API client.
///
/// Cheap to clone; clones share configuration and the HTTP connection pool.
#[derive(Clone)]
pub struct PayOsClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: Url,
    headers: HeaderMap,
    http: rqm::ClientWithMiddleware,
    signer: Signer,
    retry: RetryPolicy,
    timeout: Duration,
}

impl fmt::Debug for PayOsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayOsClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("retry", &self.inner.retry)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

/// A request ready to be sent, possibly several times.
struct Prepared {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl Prepared {
    fn to_request(&self, timeout: Duration) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        request.headers_mut().clone_from(&self.headers);
        *request.timeout_mut() = Some(timeout);
        if let Some(body) = &self.body {
            *request.body_mut() = Some(reqwest::Body::from(body.clone()));
        }
        request
    }
}

/// Status, headers and body of one HTTP exchange.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl PayOsClient {
    /// Builds a client, resolving unset values from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the client id, API key or checksum
    /// key is missing, or the base URL or a credential cannot be used.
    pub fn try_new(options: ClientOptions) -> Result<Self, Error> {
        let credentials = options.resolved_credentials();
        credentials.validate()?;

        let mut normalized = options.resolved_base_url().trim_end_matches('/').to_owned();
        normalized.push('/');
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::Configuration(format!("invalid base url {normalized:?}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_ID_HEADER, header_value("client id", &credentials.client_id)?);
        let mut api_key = header_value("API key", &credentials.api_key)?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(USER_AGENT, header_value("user agent", &user_agent())?);
        if let Some(partner_code) = &credentials.partner_code {
            headers.insert(PARTNER_CODE_HEADER, header_value("partner code", partner_code)?);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                base_url,
                headers,
                http: options.build_http_client(),
                signer: Signer::new(credentials.checksum_key).with_algorithm(options.algorithm()),
                retry: options.resolved_retry_policy(),
                timeout: options.resolved_timeout(),
            }),
        })
    }

    /// Base URL every path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Signer holding the checksum key.
    #[must_use]
    pub fn signer(&self) -> &Signer {
        &self.inner.signer
    }

    /// Retry policy applied to every call.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    /// Executes a call and returns the verified envelope `data`.
    ///
    /// # Errors
    ///
    /// Any [`Error`] kind except [`Error::Configuration`] and
    /// [`Error::Webhook`]. Retryable failures are retried first; the last
    /// failure is returned as is.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "payos.request",
            skip_all,
            fields(method = %options.method, path = %options.path),
            err
        )
    )]
    pub async fn request(&self, options: RequestOptions) -> Result<Value, Error> {
        let prepared = self.prepare(&options)?;
        let cancel = options.cancellation.as_ref();
        let response = options.signatures.response;
        let prepared = &prepared;
        self.with_retry(cancel, move |attempt| async move {
            tracing::debug!(
                attempt,
                method = %prepared.method,
                url = %prepared.url,
                "sending payOS request"
            );
            let raw = self.dispatch(prepared, cancel).await?;
            self.decode(&raw, response)
        })
        .await
    }

    /// Executes a call and decodes the verified `data` into `T`.
    ///
    /// # Errors
    ///
    /// As [`Self::request`], plus [`Error::Parse`] if `data` is not a `T`.
    pub async fn request_as<T: DeserializeOwned>(&self, options: RequestOptions) -> Result<T, Error> {
        let data = self.request(options).await?;
        serde_json::from_value(data).map_err(|e| Error::parse("response data", e))
    }

    /// `GET path`.
    ///
    /// # Errors
    ///
    /// As [`Self::request_as`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        signatures: Signatures,
    ) -> Result<T, Error> {
        self.request_as(RequestOptions::get(path).with_signatures(signatures))
            .await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// As [`Self::request_as`], plus [`Error::InvalidRequest`] if `body`
    /// cannot be serialized.
    pub async fn post<T, B>(
        &self,
        path: impl Into<String>,
        body: &B,
        signatures: Signatures,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let options = RequestOptions::post(path)
            .with_json(body)?
            .with_signatures(signatures);
        self.request_as(options).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// As [`Self::post`].
    pub async fn put<T, B>(
        &self,
        path: impl Into<String>,
        body: &B,
        signatures: Signatures,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let options = RequestOptions::put(path)
            .with_json(body)?
            .with_signatures(signatures);
        self.request_as(options).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// As [`Self::request_as`].
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        signatures: Signatures,
    ) -> Result<T, Error> {
        self.request_as(RequestOptions::delete(path).with_signatures(signatures))
            .await
    }

    /// Downloads a binary resource.
    ///
    /// Retries like [`Self::request`] but skips envelope decoding and
    /// signature verification. A successful status with a JSON body is
    /// decoded as an error envelope.
    ///
    /// # Errors
    ///
    /// As [`Self::request`], minus [`Error::InvalidSignature`] on responses.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "payos.download", skip_all, fields(path = %options.path), err)
    )]
    pub async fn download(&self, options: RequestOptions) -> Result<FileDownload, Error> {
        let prepared = self.prepare(&options)?;
        let cancel = options.cancellation.as_ref();
        let prepared = &prepared;
        self.with_retry(cancel, move |attempt| async move {
            tracing::debug!(attempt, url = %prepared.url, "downloading payOS file");
            let raw = self.dispatch(prepared, cancel).await?;
            download::into_file(raw.status, &raw.headers, raw.body)
        })
        .await
    }

    /// `GET path` as a binary download.
    ///
    /// # Errors
    ///
    /// As [`Self::download`].
    pub async fn download_file(&self, path: impl Into<String>) -> Result<FileDownload, Error> {
        self.download(RequestOptions::get(path)).await
    }

    fn prepare(&self, options: &RequestOptions) -> Result<Prepared, Error> {
        let mut url = self
            .inner
            .base_url
            .join(options.path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidRequest(format!("invalid path {:?}: {e}", options.path)))?;
        let query = encode_query(&options.query);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(&query);
        }

        let mut headers = self.inner.headers.clone();
        for name in options.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &options.headers {
            headers.append(name.clone(), value.clone());
        }

        let mut body = options.body.clone();
        if let Some(payload) = body.as_mut() {
            self.sign(payload, &mut headers, options.signatures.request)?;
        }
        let body = body
            .map(|b| serde_json::to_vec(&b))
            .transpose()
            .map_err(|e| Error::InvalidRequest(format!("failed to serialize request body: {e}")))?;

        Ok(Prepared {
            method: options.method.clone(),
            url,
            headers,
            body,
        })
    }

    /// Attaches the request signature to the body or the header set.
    fn sign(
        &self,
        payload: &mut Value,
        headers: &mut HeaderMap,
        placement: RequestSignature,
    ) -> Result<(), Error> {
        let Some(mode) = placement.mode() else {
            return Ok(());
        };
        if placement == RequestSignature::Header {
            let signature = self.inner.signer.sign(payload, mode)?;
            let value = HeaderValue::from_str(&signature)
                .map_err(|e| Error::InvalidSignature(format!("unusable signature header: {e}")))?;
            headers.insert(SIGNATURE_HEADER, value);
            return Ok(());
        }

        let object = payload.as_object_mut().ok_or_else(|| {
            Error::InvalidSignature("signed request body must be a JSON object".into())
        })?;
        object.remove("signature");
        let signature = self.inner.signer.sign(payload, mode)?;
        if let Some(object) = payload.as_object_mut() {
            object.insert("signature".to_owned(), Value::String(signature));
        }
        Ok(())
    }

    async fn send(&self, prepared: &Prepared) -> Result<RawResponse, Error> {
        let response = self
            .inner
            .http
            .execute(prepared.to_request(self.inner.timeout))
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(format!("reading response body: {e}"))
            } else {
                Error::connection("failed to read response body", e)
            }
        })?;
        tracing::debug!(%status, bytes = body.len(), "payOS response received");
        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }

    /// Sends once. Cancellation observed while in flight is a timeout.
    async fn dispatch(
        &self,
        prepared: &Prepared,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse, Error> {
        let Some(token) = cancel else {
            return self.send(prepared).await;
        };
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::timeout("cancelled while waiting for the response")),
            result = self.send(prepared) => match result {
                Err(_) if token.is_cancelled() => {
                    Err(Error::timeout("cancelled while waiting for the response"))
                }
                other => other,
            },
        }
    }

    fn decode(&self, raw: &RawResponse, mode: ResponseSignature) -> Result<Value, Error> {
        if raw.status != StatusCode::OK {
            return Err(api_error(raw.status, &raw.headers, &raw.body).into());
        }
        let envelope: Envelope =
            serde_json::from_slice(&raw.body).map_err(|e| Error::parse("response envelope", e))?;
        let Some(data) = envelope.success_data() else {
            let description = if envelope.code == SUCCESS_CODE {
                "response carried no data".to_owned()
            } else {
                envelope.desc.clone()
            };
            return Err(ApiError::from_status(raw.status, description)
                .with_code(envelope.code.clone())
                .with_headers(raw.headers.clone())
                .into());
        };
        self.verify_response(data, &envelope, &raw.headers, mode)?;
        Ok(data.clone())
    }

    fn verify_response(
        &self,
        data: &Value,
        envelope: &Envelope,
        headers: &HeaderMap,
        mode: ResponseSignature,
    ) -> Result<(), Error> {
        let (expected, canonical) = match mode {
            ResponseSignature::None => return Ok(()),
            ResponseSignature::Body => (envelope.signature.as_deref(), SignatureMode::Body),
            ResponseSignature::Header => (
                headers
                    .get(SIGNATURE_HEADER)
                    .and_then(|v| v.to_str().ok()),
                SignatureMode::Header,
            ),
        };
        let expected = expected
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::InvalidSignature("response signature is missing".into()))?;
        if self.inner.signer.verify(data, canonical, expected)? {
            Ok(())
        } else {
            Err(Error::InvalidSignature(
                "response data does not match its signature".into(),
            ))
        }
    }

    /// Runs `attempt` until it succeeds, fails terminally, exhausts the
    /// budget or is cancelled.
    async fn with_retry<T, F, Fut>(
        &self,
        cancel: Option<&CancellationToken>,
        mut attempt: F,
    ) -> Result<T, Error>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let policy = self.inner.retry;
        let cancelled = || cancel.is_some_and(CancellationToken::is_cancelled);
        let mut index = 0u32;
        loop {
            if cancelled() {
                return Err(Error::Cancelled);
            }
            let err = match attempt(index).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if cancelled() || index.saturating_add(1) >= policy.max_attempts() || !err.is_retryable()
            {
                return Err(err);
            }

            let delay = policy.backoff(index, err.headers());
            tracing::warn!(
                attempt = index,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "retrying payOS request"
            );
            match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => return Err(Error::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
            index += 1;
        }
    }
}

/// Builds the API error for a failed response.
///
/// The envelope's code and description are used when the body is an
/// envelope, the raw body text otherwise.
pub(crate) fn api_error(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> ApiError {
    let (code, description) = match serde_json::from_slice::<Envelope>(body) {
        Ok(envelope) if !(envelope.code.is_empty() && envelope.desc.is_empty()) => {
            (envelope.code, envelope.desc)
        }
        _ => (String::new(), String::from_utf8_lossy(body).trim().to_owned()),
    };
    let description = if description.is_empty() {
        status.canonical_reason().unwrap_or("empty response").to_owned()
    } else {
        description
    };
    ApiError::from_status(status, description)
        .with_code(code)
        .with_headers(headers.clone())
}

fn transport_error(err: rqm::Error) -> Error {
    match err {
        rqm::Error::Reqwest(e) if e.is_timeout() => Error::timeout(e.to_string()),
        rqm::Error::Reqwest(e) => Error::connection("request failed", e),
        rqm::Error::Middleware(e) => Error::connection("middleware failed", e),
    }
}

fn header_value(what: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Configuration(format!("{what} is not a valid header value: {e}")))
}
