//! Traits for the external collaborators the core consumes, plus their
//! default and mock implementations.

use std::sync::{Arc, Mutex};

use crate::error::{DomainError, DomainResult};
use crate::models::order::PaymentCallback;
use crate::models::payment::PaymentAccount;
use shared::cipher::CredentialCipher;

/// Signed-URL capability of the object store.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns a time-limited GET URL for a private object.
    async fn sign_get(
        &self,
        object_key: &str,
        ttl_secs: u64,
        content_disposition: &str,
    ) -> DomainResult<String>;

    /// Returns the unsigned URL of a public object.
    fn public_url(&self, object_key: &str) -> String;
}

/// Encryption at rest for app-account credentials.
pub trait AccountCipher: Send + Sync {
    fn seal(&self, plaintext: &str) -> DomainResult<String>;

    fn open(&self, sealed: &str) -> DomainResult<String>;

    /// Whether `value` already decrypts under the configured key.
    fn is_sealed(&self, value: &str) -> bool;

    /// Encrypts `value` unless it is already ciphertext under this key.
    fn seal_if_needed(&self, value: &str) -> DomainResult<String> {
        if self.is_sealed(value) {
            Ok(value.to_string())
        } else {
            self.seal(value)
        }
    }
}

impl AccountCipher for CredentialCipher {
    fn seal(&self, plaintext: &str) -> DomainResult<String> {
        Ok(CredentialCipher::seal(self, plaintext)?)
    }

    fn open(&self, sealed: &str) -> DomainResult<String> {
        Ok(CredentialCipher::open(self, sealed)?)
    }

    fn is_sealed(&self, value: &str) -> bool {
        CredentialCipher::is_sealed(self, value)
    }
}

/// Verifies provider callback signatures.
pub trait CallbackVerifier: Send + Sync {
    /// Fails with `Unauthenticated` if the signature does not match.
    fn verify(&self, account: &PaymentAccount, callback: &PaymentCallback) -> DomainResult<()>;

    /// Produces the signature a provider would attach.
    fn sign(&self, account: &PaymentAccount, callback: &PaymentCallback) -> String;
}

/// HMAC-SHA256 over the callback's canonical string, hex encoded, keyed by
/// the account's callback secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacCallbackVerifier;

impl CallbackVerifier for HmacCallbackVerifier {
    fn verify(&self, account: &PaymentAccount, callback: &PaymentCallback) -> DomainResult<()> {
        let ok = shared::crypto::verify_hmac_sha256_hex(
            &account.callback_secret,
            &callback.canonical_string(),
            &callback.signature,
        );
        if ok {
            Ok(())
        } else {
            Err(DomainError::Unauthenticated(
                "Invalid callback signature".to_string(),
            ))
        }
    }

    fn sign(&self, account: &PaymentAccount, callback: &PaymentCallback) -> String {
        shared::crypto::hmac_sha256_hex(&account.callback_secret, &callback.canonical_string())
    }
}

/// A recorded `sign_get` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub object_key: String,
    pub ttl_secs: u64,
    pub content_disposition: String,
}

/// Mock object store for development and testing.
///
/// Produces deterministic URLs and records every signing request.
#[derive(Debug, Clone, Default)]
pub struct MockObjectStore {
    pub simulate_failure: bool,
    calls: Arc<Mutex<Vec<SignedRequest>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SignedRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn sign_get(
        &self,
        object_key: &str,
        ttl_secs: u64,
        content_disposition: &str,
    ) -> DomainResult<String> {
        if self.simulate_failure {
            tracing::warn!(object_key = %object_key, "Mock object store simulating failure");
            return Err(DomainError::ExternalDependency(
                "Simulated object store failure".to_string(),
            ));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(SignedRequest {
                object_key: object_key.to_string(),
                ttl_secs,
                content_disposition: content_disposition.to_string(),
            });
        }
        Ok(format!("https://mock-bucket.local/{}?Expires={}&Signature=mock", object_key, ttl_secs))
    }

    fn public_url(&self, object_key: &str) -> String {
        format!("https://mock-bucket.local/{}", object_key)
    }
}
