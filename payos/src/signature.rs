//! HMAC signing and verification of payOS payloads.
//!
//! A [`Signer`] owns the checksum key and hash algorithm, canonicalizes a JSON
//! payload according to a [`SignatureMode`] and produces a lowercase hex MAC.
//! [`RequestSignature`] and [`ResponseSignature`] describe where a signature is
//! attached on the wire; each maps to the canonicalization it uses.

use std::fmt;

use hmac::{Hmac, Mac};
use md5::Md5;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::canonical::{self, DeepOptions};
use crate::error::Error;

/// Hash function used inside the HMAC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// HMAC-SHA256, used by every payOS endpoint.
    #[default]
    Sha256,
    /// HMAC-SHA1.
    Sha1,
    /// HMAC-SHA512.
    Sha512,
    /// HMAC-MD5.
    Md5,
}

impl HashAlgorithm {
    /// All supported algorithms.
    pub const ALL: [Self; 4] = [Self::Sha256, Self::Sha1, Self::Sha512, Self::Md5];
}

/// Canonicalization applied before computing the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureMode {
    /// The five payment-link fields in fixed order.
    PaymentRequest,
    /// Top-level sorted rendering of the whole object.
    Body,
    /// Deep sorted, percent-encoded rendering of the whole object.
    Header,
}

/// How an outgoing request body is signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RequestSignature {
    /// No signature.
    #[default]
    None,
    /// Fixed-field signature placed in the body as `signature`.
    PaymentRequest,
    /// Shallow body signature placed in the body as `signature`.
    Body,
    /// Deep signature sent as the `x-signature` header.
    Header,
}

impl RequestSignature {
    /// Canonicalization used by this placement, if any.
    #[must_use]
    pub const fn mode(self) -> Option<SignatureMode> {
        match self {
            Self::None => None,
            Self::PaymentRequest => Some(SignatureMode::PaymentRequest),
            Self::Body => Some(SignatureMode::Body),
            Self::Header => Some(SignatureMode::Header),
        }
    }
}

/// How a response is verified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResponseSignature {
    /// No verification.
    #[default]
    None,
    /// The envelope's `signature` field over a shallow rendering of `data`.
    Body,
    /// The `x-signature` response header over a deep rendering of `data`.
    Header,
}

impl ResponseSignature {
    /// Canonicalization used by this placement, if any.
    #[must_use]
    pub const fn mode(self) -> Option<SignatureMode> {
        match self {
            Self::None => None,
            Self::Body => Some(SignatureMode::Body),
            Self::Header => Some(SignatureMode::Header),
        }
    }
}

/// Computes and checks checksums with a single key.
#[derive(Clone)]
pub struct Signer {
    key: String,
    algorithm: HashAlgorithm,
    sort_arrays: bool,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("sort_arrays", &self.sort_arrays)
            .finish()
    }
}

impl Signer {
    /// Creates a SHA-256 signer for the given checksum key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            algorithm: HashAlgorithm::default(),
            sort_arrays: false,
        }
    }

    /// Selects the hash algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sorts array elements in header mode. Only valid when element order is
    /// not meaningful to the server.
    #[must_use]
    pub const fn with_sorted_arrays(mut self, sort_arrays: bool) -> Self {
        self.sort_arrays = sort_arrays;
        self
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Produces the string that is fed to the MAC.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if `payload` is not a JSON object.
    pub fn canonicalize(&self, payload: &Value, mode: SignatureMode) -> Result<String, Error> {
        let object = as_object(payload)?;
        Ok(match mode {
            SignatureMode::PaymentRequest => canonical::payment_request(object),
            SignatureMode::Body => canonical::shallow(object, false),
            SignatureMode::Header => canonical::deep(
                object,
                DeepOptions {
                    encode_uri: true,
                    sort_arrays: self.sort_arrays,
                },
            ),
        })
    }

    /// Signs `payload` and returns the lowercase hex MAC.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if `payload` is not a JSON object.
    pub fn sign(&self, payload: &Value, mode: SignatureMode) -> Result<String, Error> {
        let message = self.canonicalize(payload, mode)?;
        self.sign_message(message.as_bytes())
    }

    /// Signs an already canonical message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if the key cannot initialize the MAC.
    pub fn sign_message(&self, message: &[u8]) -> Result<String, Error> {
        let key = self.key.as_bytes();
        let bytes = match self.algorithm {
            HashAlgorithm::Sha256 => digest::<Hmac<Sha256>>(key, message)?,
            HashAlgorithm::Sha1 => digest::<Hmac<Sha1>>(key, message)?,
            HashAlgorithm::Sha512 => digest::<Hmac<Sha512>>(key, message)?,
            HashAlgorithm::Md5 => digest::<Hmac<Md5>>(key, message)?,
        };
        Ok(hex::encode(bytes))
    }

    /// Checks `expected` against the MAC of `payload` in constant time.
    ///
    /// A signature that is not valid hex never matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if `payload` is not a JSON object.
    pub fn verify(
        &self,
        payload: &Value,
        mode: SignatureMode,
        expected: &str,
    ) -> Result<bool, Error> {
        let message = self.canonicalize(payload, mode)?;
        let Ok(expected) = hex::decode(expected.trim()) else {
            return Ok(false);
        };
        let key = self.key.as_bytes();
        let message = message.as_bytes();
        match self.algorithm {
            HashAlgorithm::Sha256 => check::<Hmac<Sha256>>(key, message, &expected),
            HashAlgorithm::Sha1 => check::<Hmac<Sha1>>(key, message, &expected),
            HashAlgorithm::Sha512 => check::<Hmac<Sha512>>(key, message, &expected),
            HashAlgorithm::Md5 => check::<Hmac<Md5>>(key, message, &expected),
        }
    }
}

/// Signs with SHA-256 and default options.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if `payload` is not a JSON object.
pub fn sign(key: &str, payload: &Value, mode: SignatureMode) -> Result<String, Error> {
    Signer::new(key).sign(payload, mode)
}

/// Verifies with SHA-256 and default options. Any failure reads as `false`.
#[must_use]
pub fn verify(key: &str, payload: &Value, mode: SignatureMode, expected: &str) -> bool {
    Signer::new(key)
        .verify(payload, mode, expected)
        .unwrap_or(false)
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>, Error> {
    payload
        .as_object()
        .ok_or_else(|| Error::InvalidSignature("signed payload must be a JSON object".into()))
}

fn keyed<M: Mac + hmac::digest::KeyInit>(key: &[u8], message: &[u8]) -> Result<M, Error> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| Error::InvalidSignature(format!("invalid checksum key: {e}")))?;
    mac.update(message);
    Ok(mac)
}

fn digest<M: Mac + hmac::digest::KeyInit>(key: &[u8], message: &[u8]) -> Result<Vec<u8>, Error> {
    Ok(keyed::<M>(key, message)?.finalize().into_bytes().to_vec())
}

fn check<M: Mac + hmac::digest::KeyInit>(
    key: &[u8],
    message: &[u8],
    expected: &[u8],
) -> Result<bool, Error> {
    Ok(keyed::<M>(key, message)?.verify_slice(expected).is_ok())
}
