//! Payout account balance.

use payos::Error;
use payos::signature::ResponseSignature;
use serde::{Deserialize, Serialize};

use super::Handle;
use crate::request::RequestOptions;

/// Balance of the merchant's payout account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutAccountInfo {
    /// Account number.
    pub account_number: String,
    /// Account holder.
    pub account_name: String,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Balance as a decimal string.
    pub balance: String,
}

/// Payout account operations.
#[derive(Debug, Clone)]
pub struct PayoutsAccount {
    handle: Handle,
}

impl PayoutsAccount {
    pub(crate) const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Current balance.
    ///
    /// # Errors
    ///
    /// Any error of the engine.
    pub async fn balance(&self) -> Result<PayoutAccountInfo, Error> {
        let options = RequestOptions::get("/v1/payouts-account/balance")
            .with_response_signature(ResponseSignature::Header);
        self.handle.call(options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{header_signed, payos, unsigned};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer};

    fn info() -> serde_json::Value {
        json!({
            "accountNumber": "0123456789",
            "accountName": "SHOP",
            "currency": "VND",
            "balance": "1500000"
        })
    }

    #[tokio::test]
    async fn test_balance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payouts-account/balance"))
            .respond_with(header_signed(&info()))
            .expect(1)
            .mount(&server)
            .await;

        let account = payos(&server)
            .payouts_account()
            .balance()
            .await
            .unwrap();
        assert_eq!(account.balance, "1500000");
        assert_eq!(account.currency, "VND");
    }

    #[tokio::test]
    async fn test_balance_requires_signature_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(unsigned(&info()))
            .expect(1)
            .mount(&server)
            .await;

        let err = payos(&server)
            .payouts_account()
            .balance()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSignature(_)));
    }
}
