//! Vault key management.
//!
//! The key lives in the platform credential store under a
//! `(app_id, account_id)` pair and is created the first time any component
//! asks for it.

use crate::error::{CryptoError, Result};
use aes_gcm::aead::{KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key};
use bridge_traits::storage::SecureStore;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

pub const KEY_LEN: usize = 32;

/// Serializes get-or-create across every provider in the process, so two
/// callers can never both observe "no key" and each store a different one.
static KEY_CREATION_LOCK: Mutex<()> = Mutex::const_new(());

/// AES-256 key bytes. Zeroed on drop; `Debug` never prints them.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultKey {
    bytes: [u8; KEY_LEN],
}

impl VaultKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut generated = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(generated.as_slice());
        generated.as_mut_slice().zeroize();
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Short non-secret identifier, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes);
        hex::encode(&digest[..8])
    }

    pub(crate) fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes))
    }
}

impl Drop for VaultKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Where the key lives in the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIdentity {
    pub app_id: String,
    pub account_id: String,
}

impl KeyIdentity {
    pub fn new(app_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            account_id: account_id.into(),
        }
    }
}

impl Default for KeyIdentity {
    fn default() -> Self {
        Self::new("VideoVault", "Winipedia")
    }
}

/// Hands out the vault key, creating it on first use.
pub struct KeyProvider {
    store: Arc<dyn SecureStore>,
    identity: KeyIdentity,
    cached: OnceCell<VaultKey>,
}

impl KeyProvider {
    pub fn new(store: Arc<dyn SecureStore>, identity: KeyIdentity) -> Self {
        Self {
            store,
            identity,
            cached: OnceCell::new(),
        }
    }

    pub fn identity(&self) -> &KeyIdentity {
        &self.identity
    }

    /// Return the vault key, generating and storing it if none exists.
    ///
    /// Idempotent across calls, providers and process runs. Fails with
    /// [`CryptoError::KeyUnavailable`] when the store cannot be read or
    /// written, or when it holds no key right after one was stored. A second
    /// key is never generated to paper over that.
    pub async fn get_or_create_key(&self) -> Result<VaultKey> {
        let key = self.cached.get_or_try_init(|| self.load_or_create()).await?;
        Ok(key.clone())
    }

    async fn load_or_create(&self) -> Result<VaultKey> {
        let _guard = KEY_CREATION_LOCK.lock().await;

        if let Some(existing) = self.read_stored().await? {
            debug!(fingerprint = %existing.fingerprint(), "Loaded vault key");
            return Ok(existing);
        }

        let generated = VaultKey::generate();
        self.store
            .set_secret(
                &self.identity.app_id,
                &self.identity.account_id,
                generated.as_bytes(),
            )
            .await
            .map_err(|e| CryptoError::KeyUnavailable(format!("failed to store key: {}", e)))?;

        // Read back instead of trusting the write.
        match self.read_stored().await? {
            Some(stored) => {
                if stored != generated {
                    warn!("Credential store returned a different key than the one written");
                }
                info!(fingerprint = %stored.fingerprint(), "Created vault key");
                Ok(stored)
            }
            None => Err(CryptoError::KeyUnavailable(
                "credential store returned no key after creation".to_string(),
            )),
        }
    }

    async fn read_stored(&self) -> Result<Option<VaultKey>> {
        let stored = self
            .store
            .get_secret(&self.identity.app_id, &self.identity.account_id)
            .await
            .map_err(|e| CryptoError::KeyUnavailable(format!("failed to read key: {}", e)))?;

        match stored.map(Zeroizing::new) {
            Some(bytes) => VaultKey::from_slice(&bytes).map(Some).map_err(|_| {
                CryptoError::KeyUnavailable(format!(
                    "stored key has invalid length {}",
                    bytes.len()
                ))
            }),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyProvider")
            .field("identity", &self.identity)
            .field("cached", &self.cached.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    mock! {
        pub Store {}

        #[async_trait]
        impl SecureStore for Store {
            async fn set_secret(&self, service: &str, account: &str, value: &[u8]) -> BridgeResult<()>;
            async fn get_secret(&self, service: &str, account: &str) -> BridgeResult<Option<Vec<u8>>>;
            async fn delete_secret(&self, service: &str, account: &str) -> BridgeResult<()>;
        }
    }

    /// In-memory store that counts writes.
    #[derive(Default)]
    struct CountingStore {
        secrets: StdMutex<HashMap<(String, String), Vec<u8>>>,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl SecureStore for CountingStore {
        async fn set_secret(&self, service: &str, account: &str, value: &[u8]) -> BridgeResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.secrets
                .lock()
                .unwrap()
                .insert((service.to_string(), account.to_string()), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, service: &str, account: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self
                .secrets
                .lock()
                .unwrap()
                .get(&(service.to_string(), account.to_string()))
                .cloned())
        }

        async fn delete_secret(&self, service: &str, account: &str) -> BridgeResult<()> {
            self.secrets
                .lock()
                .unwrap()
                .remove(&(service.to_string(), account.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = VaultKey::from_slice(&[0x42; KEY_LEN]).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("42"));
        assert_eq!(key.fingerprint().len(), 16);
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(VaultKey::generate(), VaultKey::generate());
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(matches!(
            VaultKey::from_slice(&[0u8; 16]),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_creates_once_then_reuses() {
        let store = Arc::new(CountingStore::default());
        let provider = KeyProvider::new(store.clone(), KeyIdentity::new("app", "first-use"));

        let first = provider.get_or_create_key().await.unwrap();
        let second = provider.get_or_create_key().await.unwrap();
        assert_eq!(first, second);

        // A fresh provider (next process run) sees the stored key.
        let other = KeyProvider::new(store.clone(), KeyIdentity::new("app", "first-use"));
        assert_eq!(other.get_or_create_key().await.unwrap(), first);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_creates_one_key() {
        let store = Arc::new(CountingStore::default());
        let identity = KeyIdentity::new("app", "concurrent");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let provider = KeyProvider::new(store.clone(), identity.clone());
            handles.push(tokio::spawn(async move {
                provider.get_or_create_key().await.unwrap()
            }));
        }

        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.unwrap());
        }

        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn test_missing_after_write_is_key_unavailable() {
        let mut store = MockStore::new();
        store.expect_get_secret().times(2).returning(|_, _| Ok(None));
        store.expect_set_secret().times(1).returning(|_, _, _| Ok(()));

        let provider = KeyProvider::new(Arc::new(store), KeyIdentity::default());
        let err = provider.get_or_create_key().await.unwrap_err();
        assert!(matches!(err, CryptoError::KeyUnavailable(_)));
    }

    #[tokio::test]
    async fn test_inaccessible_store_is_key_unavailable() {
        let mut store = MockStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Err(BridgeError::NotAvailable("keychain locked".into())));
        store.expect_set_secret().never();

        let provider = KeyProvider::new(Arc::new(store), KeyIdentity::default());
        let err = provider.get_or_create_key().await.unwrap_err();
        assert!(matches!(err, CryptoError::KeyUnavailable(_)));
    }

    #[tokio::test]
    async fn test_malformed_stored_key_is_not_overwritten() {
        let mut store = MockStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Ok(Some(vec![1, 2, 3])));
        store.expect_set_secret().never();

        let provider = KeyProvider::new(Arc::new(store), KeyIdentity::default());
        assert!(matches!(
            provider.get_or_create_key().await,
            Err(CryptoError::KeyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_uses_identity_as_service_and_account() {
        let mut store = MockStore::new();
        store
            .expect_get_secret()
            .withf(|service, account| service == "VideoVault" && account == "Winipedia")
            .returning(|_, _| Ok(Some(vec![9u8; KEY_LEN])));

        let provider = KeyProvider::new(Arc::new(store), KeyIdentity::default());
        let key = provider.get_or_create_key().await.unwrap();
        assert_eq!(key.as_bytes(), &[9u8; KEY_LEN]);
    }
}
