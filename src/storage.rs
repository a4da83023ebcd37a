// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The persistence contract the server engine relies on.
//!
//! Every record is scoped by `(app_token, username)`. The engine never
//! retries a failed storage call; transient failures surface as
//! [`StorageError::Fault`] and retry policy lives with the caller.
//! Operations are async so a networked backend can suspend; cancelling the
//! calling future mid-flow leaves at most an orphaned [`UserRequest`] or an
//! unused auth nonce, both of which are bounded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::ciphersuite::{AUTH_NONCE_LEN, ENVELOPE_NONCE_LEN, KEY_LEN, RWD_SALT_LEN};
use crate::errors::StorageError;

/// Upper bound on outstanding auth nonces per user.
///
/// Inserting past the cap evicts the oldest nonce, so a challenge is only
/// verifiable while it is among the newest `AUTH_NONCE_LIST_CAP` issued for
/// that user. Eviction is deterministic on every insert.
pub const AUTH_NONCE_LIST_CAP: usize = 20;

/// The staging record written when a registration begins.
///
/// Holds the per-user OPRF private key until the client returns with an
/// envelope; [`UserEnvelope`] then becomes the authoritative home of the
/// key. Backends may expire orphaned requests after a TTL of their
/// choosing.
#[derive(Clone, Deserialize, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct UserRequest {
    /// Serialized per-user OPRF private key (kU).
    #[serde(rename = "client_oprf_priv_key")]
    pub oprf_private_key: Vec<u8>,
}

/// The long-lived record describing a registered user.
///
/// Field names are pinned for compatibility with previously persisted
/// records.
#[derive(Clone, Deserialize, Serialize)]
pub struct UserEnvelope {
    /// The user's long-term X25519 public key.
    #[serde(rename = "user_pub_key")]
    pub pub_u: [u8; KEY_LEN],
    /// AES-GCM ciphertext plus tag.
    #[serde(rename = "envu")]
    pub env_u: Vec<u8>,
    /// Nonce the envelope was sealed under.
    #[serde(rename = "envu_nonce")]
    pub env_u_nonce: [u8; ENVELOPE_NONCE_LEN],
    /// Argon2 salt for re-deriving `rwd_u`.
    #[serde(rename = "user_key_salt")]
    pub rwd_u_salt: [u8; RWD_SALT_LEN],
    /// Serialized per-user OPRF private key the envelope was built against.
    #[serde(rename = "oprf_priv_key")]
    pub oprf_private_key: Vec<u8>,
}

/// Abstract persistence used by the server engine.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes (or overwrites) the registration staging record.
    async fn store_user_request(
        &self,
        app_token: &str,
        username: &str,
        request: &UserRequest,
    ) -> Result<(), StorageError>;

    /// Loads the registration staging record.
    async fn load_user_request(
        &self,
        app_token: &str,
        username: &str,
    ) -> Result<UserRequest, StorageError>;

    /// Whether a registration staging record exists.
    async fn has_user_request(&self, app_token: &str, username: &str)
        -> Result<bool, StorageError>;

    /// Writes (or overwrites) the user envelope. The write must be atomic:
    /// a reader observes either the old record or the new one.
    async fn store_user_envelope(
        &self,
        app_token: &str,
        username: &str,
        envelope: &UserEnvelope,
    ) -> Result<(), StorageError>;

    /// Loads the user envelope.
    async fn load_user_envelope(
        &self,
        app_token: &str,
        username: &str,
    ) -> Result<UserEnvelope, StorageError>;

    /// Appends a nonce to the user's outstanding list, evicting the oldest
    /// entries beyond [`AUTH_NONCE_LIST_CAP`].
    async fn store_auth_nonce(
        &self,
        app_token: &str,
        username: &str,
        nonce: &[u8; AUTH_NONCE_LEN],
    ) -> Result<(), StorageError>;

    /// Byte-equal membership test over the user's outstanding nonce list.
    async fn has_auth_nonce(
        &self,
        app_token: &str,
        username: &str,
        nonce: &[u8; AUTH_NONCE_LEN],
    ) -> Result<bool, StorageError>;
}

type Key = (String, String);

fn key(app_token: &str, username: &str) -> Key {
    (app_token.to_owned(), username.to_owned())
}

/// An in-process [`Storage`] backend.
///
/// This is the reference implementation used by the test suite and small
/// deployments; a production server fronts a real key–value store with the
/// same contract.
#[derive(Default)]
pub struct MemoryStorage {
    requests: Mutex<HashMap<Key, UserRequest>>,
    envelopes: Mutex<HashMap<Key, UserEnvelope>>,
    nonces: Mutex<HashMap<Key, VecDeque<[u8; AUTH_NONCE_LEN]>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|_| StorageError::Fault("lock poisoned".into()))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store_user_request(
        &self,
        app_token: &str,
        username: &str,
        request: &UserRequest,
    ) -> Result<(), StorageError> {
        lock(&self.requests)?.insert(key(app_token, username), request.clone());
        Ok(())
    }

    async fn load_user_request(
        &self,
        app_token: &str,
        username: &str,
    ) -> Result<UserRequest, StorageError> {
        lock(&self.requests)?
            .get(&key(app_token, username))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn has_user_request(
        &self,
        app_token: &str,
        username: &str,
    ) -> Result<bool, StorageError> {
        Ok(lock(&self.requests)?.contains_key(&key(app_token, username)))
    }

    async fn store_user_envelope(
        &self,
        app_token: &str,
        username: &str,
        envelope: &UserEnvelope,
    ) -> Result<(), StorageError> {
        lock(&self.envelopes)?.insert(key(app_token, username), envelope.clone());
        Ok(())
    }

    async fn load_user_envelope(
        &self,
        app_token: &str,
        username: &str,
    ) -> Result<UserEnvelope, StorageError> {
        lock(&self.envelopes)?
            .get(&key(app_token, username))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn store_auth_nonce(
        &self,
        app_token: &str,
        username: &str,
        nonce: &[u8; AUTH_NONCE_LEN],
    ) -> Result<(), StorageError> {
        let mut nonces = lock(&self.nonces)?;
        let list = nonces.entry(key(app_token, username)).or_default();
        list.push_front(*nonce);
        list.truncate(AUTH_NONCE_LIST_CAP);
        Ok(())
    }

    async fn has_auth_nonce(
        &self,
        app_token: &str,
        username: &str,
        nonce: &[u8; AUTH_NONCE_LEN],
    ) -> Result<bool, StorageError> {
        Ok(lock(&self.nonces)?
            .get(&key(app_token, username))
            .is_some_and(|list| list.contains(nonce)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonce(tag: u8) -> [u8; AUTH_NONCE_LEN] {
        [tag; AUTH_NONCE_LEN]
    }

    #[tokio::test]
    async fn request_store_is_overwriting() {
        let storage = MemoryStorage::new();
        assert!(!storage.has_user_request("app", "user").await.unwrap());

        let first = UserRequest {
            oprf_private_key: vec![1; 32],
        };
        let second = UserRequest {
            oprf_private_key: vec![2; 32],
        };
        storage.store_user_request("app", "user", &first).await.unwrap();
        storage.store_user_request("app", "user", &second).await.unwrap();

        let loaded = storage.load_user_request("app", "user").await.unwrap();
        assert_eq!(loaded.oprf_private_key, vec![2; 32]);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.load_user_request("app", "user").await,
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            storage.load_user_envelope("app", "user").await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn nonce_list_is_bounded() {
        let storage = MemoryStorage::new();
        storage.store_auth_nonce("app", "user", &nonce(0)).await.unwrap();

        for tag in 1..=AUTH_NONCE_LIST_CAP as u8 {
            storage.store_auth_nonce("app", "user", &nonce(tag)).await.unwrap();
        }

        // The first insert has been evicted; the newest cap-many survive.
        assert!(!storage.has_auth_nonce("app", "user", &nonce(0)).await.unwrap());
        assert!(storage.has_auth_nonce("app", "user", &nonce(1)).await.unwrap());
        assert!(storage
            .has_auth_nonce("app", "user", &nonce(AUTH_NONCE_LIST_CAP as u8))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn nonce_scope_is_per_user() {
        let storage = MemoryStorage::new();
        storage.store_auth_nonce("app", "alice", &nonce(1)).await.unwrap();
        assert!(!storage.has_auth_nonce("app", "bob", &nonce(1)).await.unwrap());
        assert!(!storage.has_auth_nonce("other", "alice", &nonce(1)).await.unwrap());
    }
}
