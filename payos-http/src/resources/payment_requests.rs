//! Payment links: `/v2/payment-requests`.

use std::fmt;

use payos::Error;
use payos::signature::{RequestSignature, ResponseSignature};
use serde::{Deserialize, Serialize};

use super::invoices::Invoices;
use super::{Handle, path_segment};
use crate::request::{RequestOptions, Signatures};

/// Largest order code accepted in either direction (`2^53 - 1`).
pub const MAX_ORDER_CODE: i64 = 9_007_199_254_740_991;

/// Lifecycle of a payment link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum PaymentLinkStatus {
    Pending,
    Cancelled,
    Underpaid,
    Paid,
    Expired,
    Processing,
    Failed,
}

/// A line item shown on the checkout page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkItem {
    /// Item name.
    pub name: String,
    /// Quantity.
    pub quantity: i64,
    /// Unit price.
    pub price: i64,
    /// Unit of measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// One of `-2`, `-1`, `0`, `5`, `10`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_percentage: Option<i32>,
}

/// Electronic invoice settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    /// Skip issuing an invoice to the buyer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_not_get_invoice: Option<bool>,
    /// Tax rate applied to the whole invoice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_percentage: Option<i32>,
}

/// Parameters of a new payment link.
///
/// The request signature is computed and attached by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct CreatePaymentLinkRequest {
    pub order_code: i64,
    pub amount: i64,
    pub description: String,
    pub cancel_url: String,
    pub return_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<PaymentLinkItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_tax_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceRequest>,
    /// Unix timestamp after which the link expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
}

impl CreatePaymentLinkRequest {
    /// Creates a request with the five signed fields.
    pub fn new(
        order_code: i64,
        amount: i64,
        description: impl Into<String>,
        cancel_url: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            order_code,
            amount,
            description: description.into(),
            cancel_url: cancel_url.into(),
            return_url: return_url.into(),
            ..Self::default()
        }
    }

    /// Appends a line item.
    #[must_use]
    pub fn with_item(mut self, item: PaymentLinkItem) -> Self {
        self.items.push(item);
        self
    }

    /// Checks the fields the server requires before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if a signed field is zero or empty,
    /// or the order code is outside `±(2^53 - 1)`.
    pub fn validate(&self) -> Result<(), Error> {
        if self.order_code == 0
            || self.amount == 0
            || self.description.is_empty()
            || self.cancel_url.is_empty()
            || self.return_url.is_empty()
        {
            return Err(Error::InvalidRequest(
                "orderCode, amount, description, cancelUrl and returnUrl must be set".into(),
            ));
        }
        if !(-MAX_ORDER_CODE..=MAX_ORDER_CODE).contains(&self.order_code) {
            return Err(Error::InvalidRequest("order code out of range".into()));
        }
        Ok(())
    }
}

/// A freshly created payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct CreatePaymentLinkResponse {
    pub bin: String,
    pub account_number: String,
    pub account_name: String,
    pub amount: i64,
    pub description: String,
    pub order_code: i64,
    pub currency: String,
    pub payment_link_id: String,
    pub status: PaymentLinkStatus,
    #[serde(default)]
    pub expired_at: Option<i64>,
    pub checkout_url: String,
    pub qr_code: String,
}

/// Body of a cancel call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPaymentLinkRequest {
    /// Shown to the buyer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

/// A bank transfer matched to a payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Transaction {
    pub reference: String,
    pub amount: i64,
    pub account_number: String,
    pub description: String,
    pub transaction_date_time: String,
    #[serde(default)]
    pub virtual_account_name: Option<String>,
    #[serde(default)]
    pub virtual_account_number: Option<String>,
    #[serde(default)]
    pub counter_account_bank_id: Option<String>,
    #[serde(default)]
    pub counter_account_bank_name: Option<String>,
    #[serde(default)]
    pub counter_account_name: Option<String>,
    #[serde(default)]
    pub counter_account_number: Option<String>,
}

/// Full state of a payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PaymentLink {
    pub id: String,
    pub order_code: i64,
    pub amount: i64,
    pub amount_paid: i64,
    pub amount_remaining: i64,
    pub status: PaymentLinkStatus,
    pub created_at: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub canceled_at: Option<String>,
}

/// A payment link is addressed by its id or by the merchant's order code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentRequestId {
    /// Payment link id.
    Id(String),
    /// Merchant order code.
    OrderCode(i64),
}

impl PaymentRequestId {
    /// Percent-encoded path segment.
    pub(crate) fn segment(&self) -> Result<String, Error> {
        match self {
            Self::Id(id) => path_segment("payment request id", id),
            Self::OrderCode(code) => Ok(code.to_string()),
        }
    }
}

impl fmt::Display for PaymentRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => f.write_str(id),
            Self::OrderCode(code) => write!(f, "{code}"),
        }
    }
}

impl From<&str> for PaymentRequestId {
    fn from(id: &str) -> Self {
        Self::Id(id.to_owned())
    }
}

impl From<String> for PaymentRequestId {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<i64> for PaymentRequestId {
    fn from(code: i64) -> Self {
        Self::OrderCode(code)
    }
}

/// Payment link operations.
#[derive(Debug, Clone)]
pub struct PaymentRequests {
    handle: Handle,
}

impl PaymentRequests {
    pub(crate) const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Invoices issued for payment links.
    #[must_use]
    pub fn invoices(&self) -> Invoices {
        Invoices::new(self.handle.clone())
    }

    /// Creates a payment link.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] from [`CreatePaymentLinkRequest::validate`],
    /// otherwise any error of the engine.
    pub async fn create(
        &self,
        request: &CreatePaymentLinkRequest,
    ) -> Result<CreatePaymentLinkResponse, Error> {
        request.validate()?;
        let options = RequestOptions::post("/v2/payment-requests")
            .with_json(request)?
            .with_signatures(Signatures::new(
                RequestSignature::PaymentRequest,
                ResponseSignature::Body,
            ));
        self.handle.call(options).await
    }

    /// Fetches a payment link.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for an empty id, otherwise any error of the
    /// engine.
    pub async fn get(&self, id: impl Into<PaymentRequestId>) -> Result<PaymentLink, Error> {
        let path = format!("/v2/payment-requests/{}", id.into().segment()?);
        let options = RequestOptions::get(path).with_response_signature(ResponseSignature::Body);
        self.handle.call(options).await
    }

    /// Cancels a payment link.
    ///
    /// # Errors
    ///
    /// As [`Self::get`].
    pub async fn cancel(
        &self,
        id: impl Into<PaymentRequestId>,
        cancellation_reason: Option<&str>,
    ) -> Result<PaymentLink, Error> {
        let path = format!("/v2/payment-requests/{}/cancel", id.into().segment()?);
        let mut options =
            RequestOptions::post(path).with_response_signature(ResponseSignature::Body);
        if let Some(reason) = cancellation_reason {
            options = options.with_json(&CancelPaymentLinkRequest {
                cancellation_reason: Some(reason.to_owned()),
            })?;
        }
        self.handle.call(options).await
    }
}
