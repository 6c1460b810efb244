//! Webhook registration and verification.

use payos::Error;
use payos::webhook::{self, WebhookData};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Handle;
use crate::request::RequestOptions;

/// Body of `POST /confirm-webhook`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmWebhookRequest {
    /// URL payOS will post payment notifications to.
    pub webhook_url: String,
}

/// Account details returned once a webhook URL is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ConfirmWebhookResponse {
    pub webhook_url: String,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
}

/// Webhook operations.
#[derive(Debug, Clone)]
pub struct Webhooks {
    handle: Handle,
}

impl Webhooks {
    pub(crate) const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Registers `webhook_url` with payOS. payOS probes the URL before
    /// accepting it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for an empty URL, otherwise any error of the
    /// engine.
    pub async fn confirm(&self, webhook_url: &str) -> Result<ConfirmWebhookResponse, Error> {
        if webhook_url.trim().is_empty() {
            return Err(Error::InvalidRequest("webhook url must not be empty".into()));
        }
        let options = RequestOptions::post("/confirm-webhook").with_json(&ConfirmWebhookRequest {
            webhook_url: webhook_url.to_owned(),
        })?;
        self.handle.call(options).await
    }

    /// Verifies an incoming webhook body against the checksum key. Makes no
    /// network call.
    ///
    /// # Errors
    ///
    /// See [`payos::webhook::verify`].
    pub fn verify(&self, body: &Value) -> Result<WebhookData, Error> {
        webhook::verify(body, self.handle.client.signer())
    }

    /// As [`Self::verify`], returning `data` without decoding it.
    ///
    /// # Errors
    ///
    /// See [`payos::webhook::verify_value`].
    pub fn verify_value(&self, body: &Value) -> Result<Value, Error> {
        webhook::verify_value(body, self.handle.client.signer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{CHECKSUM, payos, unsigned};
    use payos::signature::{SignatureMode, sign};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payment() -> Value {
        json!({
            "orderCode": 123,
            "amount": 3000,
            "description": "VQRIO123",
            "accountNumber": "12345678",
            "reference": "TF230204212323",
            "transactionDateTime": "2023-02-04 18:25:00",
            "currency": "VND",
            "paymentLinkId": "124c33293c43417ab7879e14c8d9eb18",
            "code": "00",
            "desc": "Thành công",
            "counterAccountBankId": "",
            "counterAccountBankName": "",
            "counterAccountName": null,
            "counterAccountNumber": null,
            "virtualAccountName": null,
            "virtualAccountNumber": null
        })
    }

    #[tokio::test]
    async fn test_confirm_posts_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/confirm-webhook"))
            .and(body_json(json!({"webhookUrl": "https://shop.example/hook"})))
            .respond_with(unsigned(&json!({
                "webhookUrl": "https://shop.example/hook",
                "accountName": "SHOP",
                "accountNumber": "0123",
                "name": "Shop",
                "shortName": "SHOP"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let confirmed = payos(&server)
            .webhooks()
            .confirm("https://shop.example/hook")
            .await
            .unwrap();
        assert_eq!(confirmed.short_name.as_deref(), Some("SHOP"));
    }

    #[tokio::test]
    async fn test_confirm_rejects_empty_url() {
        let server = MockServer::start().await;
        let err = payos(&server).webhooks().confirm("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_confirm_surfaces_server_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"code": "20", "desc": "Webhook url invalid"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = payos(&server)
            .webhooks()
            .confirm("https://unreachable.example")
            .await
            .unwrap_err();
        match err {
            Error::Api(api) => {
                assert_eq!(api.code.as_deref(), Some("20"));
                assert_eq!(api.description, "Webhook url invalid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verify_webhook() {
        let server = MockServer::start().await;
        let data = payment();
        let signature = sign(CHECKSUM, &data, SignatureMode::Body).unwrap();
        let body = json!({"code": "00", "desc": "success", "success": true, "data": data, "signature": signature});

        let webhooks = payos(&server).webhooks();
        let verified = webhooks.verify(&body).unwrap();
        assert_eq!(verified.order_code, 123);
        assert_eq!(webhooks.verify_value(&body).unwrap(), payment());
    }

    #[tokio::test]
    async fn test_verify_rejects_tampered_data() {
        let server = MockServer::start().await;
        let signature = sign(CHECKSUM, &payment(), SignatureMode::Body).unwrap();
        let mut data = payment();
        data["amount"] = json!(1);
        let body = json!({"data": data, "signature": signature});

        let err = payos(&server).webhooks().verify(&body).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature(_)));
    }
}
