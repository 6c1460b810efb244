//! Deprecated free functions kept for callers of the first-generation API.
//!
//! Each function builds a [`PayOs`] from the given credentials and calls the
//! same engine as the resource API. Build one [`PayOs`] and reuse it instead.

#![allow(deprecated)]

use payos::Error;
use payos::config::Credentials;
use payos::signature::Signer;
use payos::webhook::{self, WebhookData};
use serde_json::Value;

use crate::options::ClientOptions;
use crate::resources::{
    CreatePaymentLinkRequest, CreatePaymentLinkResponse, PayOs, PaymentLink, PaymentRequestId,
};

fn client(credentials: &Credentials) -> Result<PayOs, Error> {
    PayOs::new(ClientOptions::new().with_credentials(credentials.clone()))
}

/// Creates a payment link.
///
/// # Errors
///
/// As [`crate::resources::PaymentRequests::create`].
#[deprecated(note = "use `PayOs::payment_requests().create`")]
pub async fn create_payment_link(
    credentials: &Credentials,
    request: &CreatePaymentLinkRequest,
) -> Result<CreatePaymentLinkResponse, Error> {
    client(credentials)?.payment_requests().create(request).await
}

/// Fetches a payment link.
///
/// # Errors
///
/// As [`crate::resources::PaymentRequests::get`].
#[deprecated(note = "use `PayOs::payment_requests().get`")]
pub async fn get_payment_link_information(
    credentials: &Credentials,
    id: impl Into<PaymentRequestId>,
) -> Result<PaymentLink, Error> {
    client(credentials)?.payment_requests().get(id).await
}

/// Cancels a payment link.
///
/// # Errors
///
/// As [`crate::resources::PaymentRequests::cancel`].
#[deprecated(note = "use `PayOs::payment_requests().cancel`")]
pub async fn cancel_payment_link(
    credentials: &Credentials,
    id: impl Into<PaymentRequestId>,
    cancellation_reason: Option<&str>,
) -> Result<PaymentLink, Error> {
    client(credentials)?
        .payment_requests()
        .cancel(id, cancellation_reason)
        .await
}

/// Registers a webhook URL and returns it as confirmed by payOS.
///
/// # Errors
///
/// As [`crate::resources::Webhooks::confirm`].
#[deprecated(note = "use `PayOs::webhooks().confirm`")]
pub async fn confirm_webhook(credentials: &Credentials, webhook_url: &str) -> Result<String, Error> {
    client(credentials)?
        .webhooks()
        .confirm(webhook_url)
        .await
        .map(|confirmed| confirmed.webhook_url)
}

/// Verifies a webhook body with the given checksum key. Makes no network
/// call and needs no other credential.
///
/// # Errors
///
/// As [`payos::webhook::verify`].
#[deprecated(note = "use `PayOs::webhooks().verify`")]
pub fn verify_payment_webhook_data(checksum_key: &str, body: &Value) -> Result<WebhookData, Error> {
    if checksum_key.trim().is_empty() {
        return Err(Error::Configuration("checksum key must not be empty".into()));
    }
    webhook::verify(body, &Signer::new(checksum_key))
}
