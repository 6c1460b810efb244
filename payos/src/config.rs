//! Credential resolution.
//!
//! Explicit values win; empty fields fall back to the `PAYOS_*` environment
//! variables. [`Credentials::validate`] runs before any client is built.

use std::env;
use std::fmt;

use crate::error::Error;

/// Environment variable holding the client id.
pub const ENV_CLIENT_ID: &str = "PAYOS_CLIENT_ID";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "PAYOS_API_KEY";
/// Environment variable holding the checksum key.
pub const ENV_CHECKSUM_KEY: &str = "PAYOS_CHECKSUM_KEY";
/// Environment variable holding the optional partner code.
pub const ENV_PARTNER_CODE: &str = "PAYOS_PARTNER_CODE";
/// Environment variable overriding the API base URL.
pub const ENV_BASE_URL: &str = "PAYOS_BASE_URL";

/// Merchant credentials for one payment channel.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// `x-client-id`.
    pub client_id: String,
    /// `x-api-key`.
    pub api_key: String,
    /// HMAC checksum key.
    pub checksum_key: String,
    /// Optional `x-partner-code`.
    pub partner_code: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("api_key", &"<redacted>")
            .field("checksum_key", &"<redacted>")
            .field("partner_code", &self.partner_code)
            .finish()
    }
}

impl Credentials {
    /// Creates credentials from explicit values.
    pub fn new(
        client_id: impl Into<String>,
        api_key: impl Into<String>,
        checksum_key: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            api_key: api_key.into(),
            checksum_key: checksum_key.into(),
            partner_code: None,
        }
    }

    /// Reads all fields from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().resolve()
    }

    /// Sets the partner code.
    #[must_use]
    pub fn with_partner_code(mut self, partner_code: impl Into<String>) -> Self {
        self.partner_code = Some(partner_code.into());
        self
    }

    /// Fills empty fields from the environment.
    #[must_use]
    pub fn resolve(self) -> Self {
        self.resolve_with(|name| env::var(name).ok())
    }

    /// Fills empty fields using `lookup` as the environment.
    #[must_use]
    pub fn resolve_with(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |value: String, name: &str| {
            if value.is_empty() {
                lookup(name).unwrap_or_default()
            } else {
                value
            }
        };
        let partner_code = self
            .partner_code
            .filter(|p| !p.is_empty())
            .or_else(|| lookup(ENV_PARTNER_CODE))
            .filter(|p| !p.is_empty());
        Self {
            client_id: pick(self.client_id, ENV_CLIENT_ID),
            api_key: pick(self.api_key, ENV_API_KEY),
            checksum_key: pick(self.checksum_key, ENV_CHECKSUM_KEY),
            partner_code,
        }
    }

    /// Checks that client id, API key and checksum key are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first missing value.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            (&self.client_id, ENV_CLIENT_ID, "client_id"),
            (&self.api_key, ENV_API_KEY, "api_key"),
            (&self.checksum_key, ENV_CHECKSUM_KEY, "checksum_key"),
        ];
        for (value, var, field) in required {
            if value.trim().is_empty() {
                return Err(Error::Configuration(format!(
                    "the {var} environment variable is missing or empty; \
                     either provide it, or construct the client with a `{field}` value"
                )));
            }
        }
        Ok(())
    }
}
