//! The two vault request paths

use std::sync::Arc;

use keyvault_crypto::{self as crypto, SymmetricKey};
use keyvault_store::{CallerIdentity, StoreError, VaultStore};
use secrecy::SecretString;

use crate::identity::IdentityResolver;
use crate::{Result, VaultError};

/// Result of a successful set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Saved,
    Cleared,
}

impl SetOutcome {
    pub fn cleared(self) -> bool {
        matches!(self, SetOutcome::Cleared)
    }
}

/// Request-handling core. Cheap to clone; all state is shared read-only.
#[derive(Clone)]
pub struct VaultService {
    key: Arc<SymmetricKey>,
    resolver: Arc<dyn IdentityResolver>,
    store: Arc<dyn VaultStore>,
}

impl VaultService {
    pub fn new(
        key: Arc<SymmetricKey>,
        resolver: Arc<dyn IdentityResolver>,
        store: Arc<dyn VaultStore>,
    ) -> Self {
        Self {
            key,
            resolver,
            store,
        }
    }

    /// Store, replace or clear the caller's secret.
    ///
    /// An absent or all-whitespace `secret` clears it. Otherwise the trimmed
    /// value is encrypted under a fresh IV and upserted.
    pub async fn set_secret(
        &self,
        authorization: Option<&str>,
        secret: Option<&str>,
    ) -> Result<SetOutcome> {
        let identity = self.authenticate(authorization).await?;

        let plaintext = secret.map(str::trim).filter(|s| !s.is_empty());
        let Some(plaintext) = plaintext else {
            self.store
                .put(&identity, None)
                .await
                .map_err(|e| store_failure(e, "clear"))?;
            tracing::info!(identity = %identity, "Secret cleared");
            return Ok(SetOutcome::Cleared);
        };

        let envelope = crypto::encrypt_str(&self.key, plaintext)?;
        self.store
            .put(&identity, Some(&envelope))
            .await
            .map_err(|e| store_failure(e, "put"))?;

        tracing::info!(identity = %identity, "Secret saved");
        Ok(SetOutcome::Saved)
    }

    /// Recover the caller's secret. `Ok(None)` means nothing is stored.
    pub async fn get_secret(&self, authorization: Option<&str>) -> Result<Option<SecretString>> {
        let identity = self.authenticate(authorization).await?;

        let envelope = self
            .store
            .get(&identity)
            .await
            .map_err(|e| store_failure(e, "get"))?;

        let Some(envelope) = envelope else {
            tracing::debug!(identity = %identity, "No secret stored");
            return Ok(None);
        };

        match crypto::decrypt_string(&self.key, &envelope) {
            Ok(secret) => Ok(Some(secret)),
            Err(e) => {
                tracing::warn!(
                    identity = %identity,
                    key_fingerprint = %self.key.fingerprint(),
                    error = %e,
                    "Stored secret failed to decrypt - corrupted data or key mismatch"
                );
                Err(e.into())
            }
        }
    }

    /// Resolve the caller without touching the store
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<CallerIdentity> {
        self.resolver.resolve(authorization).await.map_err(|e| {
            tracing::debug!(error = %e, "Authentication failed");
            VaultError::Unauthenticated(e)
        })
    }
}

fn store_failure(err: StoreError, operation: &str) -> VaultError {
    tracing::error!(operation, error = %err, "Vault store failure");
    VaultError::StoreUnavailable(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{bearer_token, AuthError};
    use async_trait::async_trait;
    use keyvault_crypto::SecretEnvelope;
    use keyvault_store::{MemoryVaultStore, VaultRecord};
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps fixed tokens to identities
    struct StaticResolver(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl IdentityResolver for StaticResolver {
        async fn resolve(&self, authorization: Option<&str>) -> std::result::Result<CallerIdentity, AuthError> {
            let token = bearer_token(authorization)?;
            self.0
                .get(token)
                .map(|id| CallerIdentity::new(*id))
                .ok_or(AuthError::Rejected(401))
        }
    }

    /// Counts calls and optionally fails them
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryVaultStore,
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingStore {
        fn check(&self) -> keyvault_store::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl VaultStore for CountingStore {
        async fn get(&self, identity: &CallerIdentity) -> keyvault_store::Result<Option<SecretEnvelope>> {
            self.check()?;
            self.inner.get(identity).await
        }

        async fn put(
            &self,
            identity: &CallerIdentity,
            envelope: Option<&SecretEnvelope>,
        ) -> keyvault_store::Result<()> {
            self.check()?;
            self.inner.put(identity, envelope).await
        }

        async fn record(&self, identity: &CallerIdentity) -> keyvault_store::Result<Option<VaultRecord>> {
            self.inner.record(identity).await
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    const ALICE: Option<&str> = Some("Bearer alice-token");
    const BOB: Option<&str> = Some("Bearer bob-token");

    fn service_with(store: Arc<CountingStore>) -> VaultService {
        let resolver = StaticResolver(HashMap::from([
            ("alice-token", "alice"),
            ("bob-token", "bob"),
        ]));
        VaultService::new(
            Arc::new(SymmetricKey::generate().unwrap()),
            Arc::new(resolver),
            store,
        )
    }

    fn service() -> (VaultService, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::default());
        (service_with(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (svc, _) = service();

        let outcome = svc.set_secret(ALICE, Some("sk-abc123")).await.unwrap();
        assert_eq!(outcome, SetOutcome::Saved);
        assert!(!outcome.cleared());

        let secret = svc.get_secret(ALICE).await.unwrap().unwrap();
        assert_eq!(secret.expose_secret(), "sk-abc123");
    }

    #[tokio::test]
    async fn test_secret_is_trimmed_and_stored_encrypted() {
        let (svc, store) = service();

        svc.set_secret(ALICE, Some("  sk-abc123\n")).await.unwrap();

        let stored = store.inner.get(&CallerIdentity::new("alice")).await.unwrap().unwrap();
        assert!(!stored.as_str().contains("sk-abc123"));
        assert_eq!(svc.get_secret(ALICE).await.unwrap().unwrap().expose_secret(), "sk-abc123");
    }

    #[tokio::test]
    async fn test_clear_with_empty_string() {
        let (svc, _) = service();

        svc.set_secret(ALICE, Some("sk-abc123")).await.unwrap();
        let outcome = svc.set_secret(ALICE, Some("")).await.unwrap();

        assert!(outcome.cleared());
        assert!(svc.get_secret(ALICE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_with_absent_or_whitespace() {
        let (svc, store) = service();

        svc.set_secret(ALICE, Some("sk-abc123")).await.unwrap();
        assert_eq!(svc.set_secret(ALICE, None).await.unwrap(), SetOutcome::Cleared);
        assert!(svc.get_secret(ALICE).await.unwrap().is_none());

        svc.set_secret(ALICE, Some("sk-abc123")).await.unwrap();
        assert_eq!(svc.set_secret(ALICE, Some(" \t ")).await.unwrap(), SetOutcome::Cleared);
        assert!(svc.get_secret(ALICE).await.unwrap().is_none());

        // Clearing keeps the record
        assert!(store.inner.record(&CallerIdentity::new("alice")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_uses_new_envelope() {
        let (svc, store) = service();
        let alice = CallerIdentity::new("alice");

        svc.set_secret(ALICE, Some("sk-same")).await.unwrap();
        let first = store.inner.get(&alice).await.unwrap().unwrap();
        svc.set_secret(ALICE, Some("sk-same")).await.unwrap();
        let second = store.inner.get(&alice).await.unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(svc.get_secret(ALICE).await.unwrap().unwrap().expose_secret(), "sk-same");
    }

    #[tokio::test]
    async fn test_unauthenticated_never_touches_store() {
        let (svc, store) = service();

        for credential in [None, Some("Bearer unknown"), Some("Basic abc")] {
            let err = svc.get_secret(credential).await.unwrap_err();
            assert!(matches!(err, VaultError::Unauthenticated(_)));
            assert_eq!(err.code(), "unauthenticated");

            let err = svc.set_secret(credential, Some("sk-abc")).await.unwrap_err();
            assert!(matches!(err, VaultError::Unauthenticated(_)));
        }

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fresh_identity_has_no_secret() {
        let (svc, _) = service();
        assert!(svc.get_secret(BOB).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_callers_are_isolated() {
        let (svc, _) = service();

        svc.set_secret(ALICE, Some("alice-key")).await.unwrap();
        svc.set_secret(BOB, Some("bob-key")).await.unwrap();
        svc.set_secret(ALICE, None).await.unwrap();

        assert!(svc.get_secret(ALICE).await.unwrap().is_none());
        assert_eq!(svc.get_secret(BOB).await.unwrap().unwrap().expose_secret(), "bob-key");
    }

    #[tokio::test]
    async fn test_undecryptable_secret_is_an_error_not_absence() {
        let store = Arc::new(CountingStore::default());
        let writer = service_with(Arc::clone(&store));
        let reader = service_with(Arc::clone(&store)); // different key

        writer.set_secret(ALICE, Some("sk-abc123")).await.unwrap();

        let err = reader.get_secret(ALICE).await.unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailure(_)));
        assert_eq!(err.code(), "decryption_failed");
    }

    #[tokio::test]
    async fn test_corrupted_envelope_is_decryption_failure() {
        let (svc, store) = service();
        store
            .inner
            .put(&CallerIdentity::new("alice"), Some(&SecretEnvelope::from_encoded("not base64!")))
            .await
            .unwrap();

        let err = svc.get_secret(ALICE).await.unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailure(_)));
    }

    #[tokio::test]
    async fn test_empty_stored_envelope_is_decryption_failure() {
        let (svc, store) = service();
        store
            .inner
            .put(&CallerIdentity::new("alice"), Some(&SecretEnvelope::from_encoded("")))
            .await
            .unwrap();

        let err = svc.get_secret(ALICE).await.unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailure(_)));
        assert_eq!(err.code(), "decryption_failed");
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_unavailable() {
        let store = Arc::new(CountingStore {
            fail: true,
            ..Default::default()
        });
        let svc = service_with(Arc::clone(&store));

        let err = svc.set_secret(ALICE, Some("sk-abc123")).await.unwrap_err();
        assert!(matches!(err, VaultError::StoreUnavailable(_)));
        assert!(!err.to_string().contains("sk-abc123"));

        let err = svc.get_secret(ALICE).await.unwrap_err();
        assert_eq!(err.code(), "store_unavailable");
    }
}
