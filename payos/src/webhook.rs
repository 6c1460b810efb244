//! Verification of payment webhooks.
//!
//! payOS posts `{code, desc, success, data, signature}` to the merchant's
//! webhook URL. `signature` is the body-mode checksum of `data`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::signature::{SignatureMode, Signer};

/// Raw webhook body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    /// Result code.
    #[serde(default)]
    pub code: String,
    /// Result description.
    #[serde(default)]
    pub desc: String,
    /// Whether the payment succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Payment details.
    #[serde(default)]
    pub data: Option<Value>,
    /// Body checksum of `data`.
    #[serde(default)]
    pub signature: String,
}

/// Payment details carried by a verified webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct WebhookData {
    pub order_code: i64,
    pub amount: i64,
    pub description: String,
    pub account_number: String,
    pub reference: String,
    pub transaction_date_time: String,
    pub currency: String,
    pub payment_link_id: String,
    pub code: String,
    pub desc: String,
    #[serde(default)]
    pub counter_account_bank_id: Option<String>,
    #[serde(default)]
    pub counter_account_bank_name: Option<String>,
    #[serde(default)]
    pub counter_account_name: Option<String>,
    #[serde(default)]
    pub counter_account_number: Option<String>,
    #[serde(default)]
    pub virtual_account_name: Option<String>,
    #[serde(default)]
    pub virtual_account_number: Option<String>,
}

/// Verifies a webhook body and returns its `data` unchanged.
///
/// # Errors
///
/// - [`Error::Webhook`] if the body is not an object, or `data` or
///   `signature` is missing
/// - [`Error::InvalidSignature`] if the checksum does not match
pub fn verify_value(body: &Value, signer: &Signer) -> Result<Value, Error> {
    let object = body
        .as_object()
        .ok_or_else(|| Error::Webhook("webhook body must be a JSON object".into()))?;
    let data = object
        .get("data")
        .filter(|d| !d.is_null())
        .ok_or_else(|| Error::Webhook("no data".into()))?;
    let signature = object
        .get("signature")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Webhook("no signature".into()))?;

    if !signer.verify(data, SignatureMode::Body, signature)? {
        return Err(Error::InvalidSignature(
            "webhook data does not match its signature".into(),
        ));
    }
    Ok(data.clone())
}

/// Verifies a webhook body and decodes its `data`.
///
/// # Errors
///
/// As [`verify_value`], plus [`Error::Parse`] if `data` is not a
/// [`WebhookData`].
pub fn verify(body: &Value, signer: &Signer) -> Result<WebhookData, Error> {
    let data = verify_value(body, signer)?;
    serde_json::from_value(data).map_err(|e| Error::parse("webhook data", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign;
    use serde_json::json;

    const KEY: &str = "checksum";

    fn data() -> Value {
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
            "counterAccountName": "",
            "counterAccountNumber": "",
            "virtualAccountName": "",
            "virtualAccountNumber": ""
        })
    }

    #[test]
    fn test_verify_valid_webhook() {
        let data = data();
        let signature = sign(KEY, &data, SignatureMode::Body).unwrap();
        let body = json!({"code": "00", "desc": "success", "success": true, "data": data, "signature": signature});

        let verified = verify(&body, &Signer::new(KEY)).unwrap();
        assert_eq!(verified.order_code, 123);
        assert_eq!(verified.currency, "VND");
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        let signature = sign(KEY, &data(), SignatureMode::Body).unwrap();
        let mut tampered = data();
        tampered["amount"] = json!(3001);
        let body = json!({"data": tampered, "signature": signature});
        let err = verify(&body, &Signer::new(KEY)).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature(_)));
    }

    #[test]
    fn test_verify_requires_data_and_signature() {
        let signer = Signer::new(KEY);
        let err = verify_value(&json!({"data": null, "signature": "ab"}), &signer).unwrap_err();
        assert!(matches!(err, Error::Webhook(ref m) if m == "no data"));

        let err = verify_value(&json!({"data": {"a": 1}, "signature": ""}), &signer).unwrap_err();
        assert!(matches!(err, Error::Webhook(ref m) if m == "no signature"));

        let err = verify_value(&json!("text"), &signer).unwrap_err();
        assert!(matches!(err, Error::Webhook(_)));
    }
}
