//! Typed endpoint wrappers.
//!
//! Every wrapper is a thin call into [`PayOsClient`]; none of them talks to
//! the transport directly.

mod invoices;
mod payment_requests;
mod payouts;
mod payouts_account;
mod webhooks;

pub use invoices::{Invoice, Invoices, InvoicesInfo};
pub use payment_requests::{
    CancelPaymentLinkRequest, CreatePaymentLinkRequest, CreatePaymentLinkResponse,
    InvoiceRequest, MAX_ORDER_CODE, PaymentLink, PaymentLinkItem, PaymentLinkStatus,
    PaymentRequestId, PaymentRequests, Transaction,
};
pub use payouts::{
    EstimateCredit, ListPayoutsParams, Payout, PayoutApprovalState, PayoutBatch, PayoutBatchItem,
    PayoutBatchRequest, PayoutList, PayoutPage, PayoutRequest, PayoutTransaction,
    PayoutTransactionState, Payouts, PayoutsIterator,
};
pub use payouts_account::{PayoutAccountInfo, PayoutsAccount};
pub use webhooks::{ConfirmWebhookRequest, ConfirmWebhookResponse, Webhooks};

use payos::Error;
use payos::canonical::encode_component;
use payos::proto::FileDownload;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::client::PayOsClient;
use crate::options::ClientOptions;
use crate::request::RequestOptions;

/// Percent-encodes an identifier for use as one path segment.
///
/// Empty and dot-only identifiers are rejected: `Url::join` would resolve them
/// as relative segments, even percent-encoded, and hit another resource.
pub(crate) fn path_segment(what: &str, id: &str) -> Result<String, Error> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidRequest(format!("{what} must not be empty")));
    }
    if trimmed.chars().all(|c| c == '.') {
        return Err(Error::InvalidRequest(format!("{what} {id:?} is not a valid identifier")));
    }
    Ok(encode_component(id).into_owned())
}

/// Client plus the cancellation token bound to every call made through it.
#[derive(Debug, Clone)]
pub(crate) struct Handle {
    client: PayOsClient,
    cancellation: Option<CancellationToken>,
}

impl Handle {
    fn bind(&self, options: RequestOptions) -> RequestOptions {
        match (&self.cancellation, &options.cancellation) {
            (Some(token), None) => options.with_cancellation(token.clone()),
            _ => options,
        }
    }

    async fn call<T: DeserializeOwned>(&self, options: RequestOptions) -> Result<T, Error> {
        self.client.request_as(self.bind(options)).await
    }

    async fn download(&self, options: RequestOptions) -> Result<FileDownload, Error> {
        self.client.download(self.bind(options)).await
    }
}

/// Entry point to the payOS API.
///
/// ```no_run
/// # async fn run() -> Result<(), payos_http::core::Error> {
/// use payos_http::{ClientOptions, PayOs};
/// use payos_http::resources::CreatePaymentLinkRequest;
///
/// let payos = PayOs::new(
///     ClientOptions::new()
///         .with_client_id("client-id")
///         .with_api_key("api-key")
///         .with_checksum_key("checksum-key"),
/// )?;
/// let link = payos
///     .payment_requests()
///     .create(&CreatePaymentLinkRequest::new(
///         1234,
///         2000,
///         "Order 1234",
///         "https://shop.example/cancel",
///         "https://shop.example/return",
///     ))
///     .await?;
/// println!("{}", link.checkout_url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PayOs {
    handle: Handle,
}

impl PayOs {
    /// Builds a client from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if credentials are missing.
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        PayOsClient::try_new(options).map(Self::from_client)
    }

    /// Builds a client entirely from `PAYOS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a required variable is unset.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ClientOptions::new())
    }

    /// Wraps an existing engine.
    #[must_use]
    pub const fn from_client(client: PayOsClient) -> Self {
        Self {
            handle: Handle {
                client,
                cancellation: None,
            },
        }
    }

    /// The underlying engine, for calls without a typed wrapper.
    #[must_use]
    pub const fn client(&self) -> &PayOsClient {
        &self.handle.client
    }

    /// A copy whose calls are all aborted when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            handle: Handle {
                client: self.handle.client.clone(),
                cancellation: Some(token),
            },
        }
    }

    /// Payment links.
    #[must_use]
    pub fn payment_requests(&self) -> PaymentRequests {
        PaymentRequests::new(self.handle.clone())
    }

    /// Payouts.
    #[must_use]
    pub fn payouts(&self) -> Payouts {
        Payouts::new(self.handle.clone())
    }

    /// Payout account.
    #[must_use]
    pub fn payouts_account(&self) -> PayoutsAccount {
        PayoutsAccount::new(self.handle.clone())
    }

    /// Webhook registration and verification.
    #[must_use]
    pub fn webhooks(&self) -> Webhooks {
        Webhooks::new(self.handle.clone())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use payos::retry::RetryPolicy;
    use payos::signature::{SignatureMode, sign};
    use serde_json::{Value, json};
    use wiremock::{MockServer, ResponseTemplate};

    use super::PayOs;
    use crate::options::ClientOptions;

    pub(crate) const CHECKSUM: &str = "test-checksum-key";

    pub(crate) fn payos(server: &MockServer) -> PayOs {
        PayOs::new(
            ClientOptions::new()
                .with_client_id("client-id")
                .with_api_key("api-key")
                .with_checksum_key(CHECKSUM)
                .with_base_url(server.uri())
                .with_retry_policy(RetryPolicy::new(1).with_initial_delay(Duration::from_millis(1))),
        )
        .unwrap()
    }

    /// Success envelope with a body signature over `data`.
    pub(crate) fn body_signed(data: &Value) -> ResponseTemplate {
        let signature = sign(CHECKSUM, data, SignatureMode::Body).unwrap();
        ResponseTemplate::new(200).set_body_json(
            json!({"code": "00", "desc": "success", "data": data, "signature": signature}),
        )
    }

    /// Success envelope with an `x-signature` header over `data`.
    pub(crate) fn header_signed(data: &Value) -> ResponseTemplate {
        let signature = sign(CHECKSUM, data, SignatureMode::Header).unwrap();
        ResponseTemplate::new(200)
            .insert_header("x-signature", signature.as_str())
            .set_body_json(json!({"code": "00", "desc": "success", "data": data}))
    }

    pub(crate) fn unsigned(data: &Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"code": "00", "desc": "success", "data": data}))
    }
}
