//! Invoices of a payment link.

use payos::Error;
use payos::proto::FileDownload;
use payos::signature::ResponseSignature;
use serde::{Deserialize, Serialize};

use super::{Handle, path_segment};
use super::payment_requests::PaymentRequestId;
use crate::request::RequestOptions;

/// An electronic invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Invoice {
    pub invoice_id: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub issued_timestamp: Option<i64>,
    #[serde(default)]
    pub issued_datetime: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub reservation_code: Option<String>,
    #[serde(default)]
    pub code_of_tax: Option<String>,
}

/// Invoices issued for one payment link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicesInfo {
    /// Issued invoices.
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

/// Invoice operations.
#[derive(Debug, Clone)]
pub struct Invoices {
    handle: Handle,
}

impl Invoices {
    pub(crate) const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Lists the invoices of a payment link.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for an empty id, otherwise any error of the
    /// engine.
    pub async fn get(&self, id: impl Into<PaymentRequestId>) -> Result<InvoicesInfo, Error> {
        let path = format!("/v2/payment-requests/{}/invoices", id.into().segment()?);
        let options = RequestOptions::get(path).with_response_signature(ResponseSignature::Body);
        self.handle.call(options).await
    }

    /// Downloads an invoice as PDF.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for an empty or dot-only id, otherwise any error of
    /// [`crate::PayOsClient::download`].
    pub async fn download(
        &self,
        invoice_id: &str,
        id: impl Into<PaymentRequestId>,
    ) -> Result<FileDownload, Error> {
        let path = format!(
            "/v2/payment-requests/{}/invoices/{}/download",
            id.into().segment()?,
            path_segment("invoice id", invoice_id)?
        );
        self.handle.download(RequestOptions::get(path)).await
    }
}
