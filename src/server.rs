// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The server half of the protocol, driven over an abstract [`Storage`]
//! collaborator.
//!
//! Registration walks `Fresh → Requested → Registered`:
//! [`Server::handle_new_user_request`] mints the per-user OPRF key and
//! stages it, [`Server::store_user_data`] commits the envelope. Restarting
//! a registration overwrites the staged key, which invalidates any envelope
//! built against the old one until the new envelope is committed.
//!
//! Authentication walks `Fresh → Challenged → Verified | Failed`:
//! [`Server::handle_new_user_authentication`] re-evaluates the OPRF under
//! the committed key and mints a challenge nonce;
//! [`Server::is_authenticated`] verifies a returned token. The server
//! answers the challenge before the client proves anything — an attacker
//! holding the response still cannot open the envelope, and responding
//! uniformly avoids an account-enumeration oracle.

use rand::{CryptoRng, RngCore};
use tracing::{debug, instrument};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::ciphersuite::{
    AUTH_NONCE_LEN, ENVELOPE_NONCE_LEN, KEY_LEN, RWD_SALT_LEN, SESSION_TOKEN_LEN,
};
use crate::errors::{ProtocolError, StorageError};
use crate::keypair;
use crate::oprf::{Evaluation, EvaluationRequest, OprfPrivateKey};
use crate::session;
use crate::storage::{Storage, UserEnvelope, UserRequest};

/// Where a user currently stands in the registration state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegistrationState {
    /// No record of the user.
    Fresh,
    /// An OPRF key is staged; no envelope committed yet.
    Requested,
    /// An envelope is committed.
    Registered,
}

/// The server's answer to an authentication start.
pub struct AuthChallenge {
    /// OPRF evaluation under the user's committed key.
    pub evaluation: Evaluation,
    /// The stored envelope.
    pub env_u: Vec<u8>,
    /// Nonce the envelope was sealed under.
    pub env_u_nonce: [u8; ENVELOPE_NONCE_LEN],
    /// Argon2 salt for re-deriving `rwd_u`.
    pub rwd_u_salt: [u8; RWD_SALT_LEN],
    /// Fresh challenge nonce this attempt must answer.
    pub auth_nonce: [u8; AUTH_NONCE_LEN],
}

/// The server protocol engine.
///
/// Holds the immutable X25519 keypair and a storage handle; everything else
/// lives in storage, so one instance serves any number of concurrent
/// flows.
pub struct Server<S> {
    storage: S,
    secret: StaticSecret,
    public: PublicKey,
}

fn missing_as_unknown(err: StorageError) -> ProtocolError {
    match err {
        StorageError::NotFound => ProtocolError::UnknownCredentials,
        other => ProtocolError::Storage(other),
    }
}

impl<S: Storage> Server<S> {
    /// Builds a server around a raw 32-byte X25519 private key; the public
    /// key is derived, never stored.
    pub fn new(storage: S, private_key: [u8; KEY_LEN]) -> Self {
        let secret = StaticSecret::from(private_key);
        let public = PublicKey::from(&secret);
        debug!(public_key = %hex::encode(public.as_bytes()), "server keypair ready");
        Self {
            storage,
            secret,
            public,
        }
    }

    /// Builds a server with a freshly generated private key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, storage: S) -> Self {
        let mut private_key = [0u8; KEY_LEN];
        rng.fill_bytes(&mut private_key);
        Self::new(storage, private_key)
    }

    /// The server's static X25519 public key, sealed into every envelope.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Starts (or restarts) a registration: mints a per-user OPRF key,
    /// evaluates the request under it and stages the key.
    #[instrument(level = "debug", skip_all, fields(app_token = %app_token, username = %username))]
    pub async fn handle_new_user_request<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        app_token: &str,
        username: &str,
        eval_req: &EvaluationRequest,
    ) -> Result<Evaluation, ProtocolError> {
        let oprf_key = OprfPrivateKey::generate(rng);
        let evaluation = oprf_key.evaluate(eval_req)?;

        self.storage
            .store_user_request(
                app_token,
                username,
                &UserRequest {
                    oprf_private_key: oprf_key.serialize().to_vec(),
                },
            )
            .await?;
        debug!("registration request staged");
        Ok(evaluation)
    }

    /// Commits a registration: copies the staged OPRF key into the new
    /// envelope record and persists it.
    #[instrument(level = "debug", skip_all, fields(app_token = %app_token, username = %username))]
    pub async fn store_user_data(
        &self,
        app_token: &str,
        username: &str,
        pub_u: &[u8; KEY_LEN],
        env_u: &[u8],
        env_u_nonce: &[u8; ENVELOPE_NONCE_LEN],
        rwd_u_salt: &[u8; RWD_SALT_LEN],
    ) -> Result<(), ProtocolError> {
        let request = self
            .storage
            .load_user_request(app_token, username)
            .await
            .map_err(missing_as_unknown)?;

        self.storage
            .store_user_envelope(
                app_token,
                username,
                &UserEnvelope {
                    pub_u: *pub_u,
                    env_u: env_u.to_vec(),
                    env_u_nonce: *env_u_nonce,
                    rwd_u_salt: *rwd_u_salt,
                    oprf_private_key: request.oprf_private_key.clone(),
                },
            )
            .await?;
        debug!("user envelope committed");
        Ok(())
    }

    /// Starts an authentication: re-evaluates the OPRF under the committed
    /// key and mints a fresh challenge nonce.
    #[instrument(level = "debug", skip_all, fields(app_token = %app_token, username = %username))]
    pub async fn handle_new_user_authentication<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        app_token: &str,
        username: &str,
        eval_req: &EvaluationRequest,
    ) -> Result<AuthChallenge, ProtocolError> {
        let envelope = self
            .storage
            .load_user_envelope(app_token, username)
            .await
            .map_err(missing_as_unknown)?;

        let oprf_key = OprfPrivateKey::deserialize(&envelope.oprf_private_key)?;
        let evaluation = oprf_key.evaluate(eval_req)?;

        let mut auth_nonce = [0u8; AUTH_NONCE_LEN];
        rng.fill_bytes(&mut auth_nonce);
        self.storage
            .store_auth_nonce(app_token, username, &auth_nonce)
            .await?;

        Ok(AuthChallenge {
            evaluation,
            env_u: envelope.env_u.clone(),
            env_u_nonce: envelope.env_u_nonce,
            rwd_u_salt: envelope.rwd_u_salt,
            auth_nonce,
        })
    }

    /// Verifies a session token.
    ///
    /// Every failure on the authentication path — bad length, unknown
    /// nonce, unknown user, non-contributory key exchange, trailer
    /// mismatch — collapses into `Ok(false)`; only storage faults surface
    /// as errors. The trailer comparison is constant-time.
    #[instrument(level = "debug", skip_all, fields(app_token = %app_token, username = %username))]
    pub async fn is_authenticated(
        &self,
        app_token: &str,
        username: &str,
        session_token: &[u8],
    ) -> Result<bool, ProtocolError> {
        if session_token.len() != SESSION_TOKEN_LEN {
            return Ok(false);
        }
        let (nonce_bytes, provided_trailer) = session_token.split_at(AUTH_NONCE_LEN);
        let auth_nonce: [u8; AUTH_NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| ProtocolError::MalformedInput)?;

        if !self
            .storage
            .has_auth_nonce(app_token, username, &auth_nonce)
            .await?
        {
            return Ok(false);
        }

        let envelope = match self.storage.load_user_envelope(app_token, username).await {
            Ok(envelope) => envelope,
            Err(StorageError::NotFound) => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let shared = match keypair::shared_secret(&self.secret, &PublicKey::from(envelope.pub_u)) {
            Ok(shared) => shared,
            Err(_) => return Ok(false),
        };
        let expected = session::derive_trailer(&shared[..], &auth_nonce)?;
        Ok(session::trailer_matches(&expected, provided_trailer))
    }

    /// Whether a registration has at least been requested for this user.
    pub async fn is_registered(
        &self,
        app_token: &str,
        username: &str,
    ) -> Result<bool, ProtocolError> {
        Ok(self.storage.has_user_request(app_token, username).await?)
    }

    /// Reads the user's position in the registration state machine off the
    /// stored records.
    pub async fn registration_state(
        &self,
        app_token: &str,
        username: &str,
    ) -> Result<RegistrationState, ProtocolError> {
        match self.storage.load_user_envelope(app_token, username).await {
            Ok(_) => return Ok(RegistrationState::Registered),
            Err(StorageError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        if self.storage.has_user_request(app_token, username).await? {
            Ok(RegistrationState::Requested)
        } else {
            Ok(RegistrationState::Fresh)
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::client;
    use crate::storage::MemoryStorage;

    fn eval_req() -> EvaluationRequest {
        client::make_oprf_request(&mut OsRng, "truebeef", "app", "bunnyfoofoo")
            .unwrap()
            .eval_req
    }

    #[tokio::test]
    async fn store_user_data_without_request_is_unknown() {
        let server = Server::generate(&mut OsRng, MemoryStorage::new());
        let result = server
            .store_user_data("app", "truebeef", &[0; KEY_LEN], &[0; 80], &[0; 12], &[0; 32])
            .await;
        assert!(matches!(result, Err(ProtocolError::UnknownCredentials)));
    }

    #[tokio::test]
    async fn authentication_without_envelope_is_unknown() {
        let server = Server::generate(&mut OsRng, MemoryStorage::new());
        let result = server
            .handle_new_user_authentication(&mut OsRng, "app", "truebeef", &eval_req())
            .await;
        assert!(matches!(result, Err(ProtocolError::UnknownCredentials)));
    }

    #[tokio::test]
    async fn registration_state_progresses() {
        let server = Server::generate(&mut OsRng, MemoryStorage::new());
        assert_eq!(
            server.registration_state("app", "truebeef").await.unwrap(),
            RegistrationState::Fresh
        );
        assert!(!server.is_registered("app", "truebeef").await.unwrap());

        server
            .handle_new_user_request(&mut OsRng, "app", "truebeef", &eval_req())
            .await
            .unwrap();
        assert_eq!(
            server.registration_state("app", "truebeef").await.unwrap(),
            RegistrationState::Requested
        );
        assert!(server.is_registered("app", "truebeef").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_token_is_rejected_without_error() {
        let server = Server::generate(&mut OsRng, MemoryStorage::new());
        let verdict = server
            .is_authenticated("app", "truebeef", &[0u8; SESSION_TOKEN_LEN])
            .await
            .unwrap();
        assert!(!verdict);
    }
}
