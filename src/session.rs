// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Session tokens: `auth_nonce ‖ HKDF(x25519_shared, salt=auth_nonce)`.
//!
//! Both sides derive the trailer from their own copy of the X25519 shared
//! secret; only the server's verdict matters, and it compares in constant
//! time.

use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::ciphersuite::{AUTH_NONCE_LEN, SESSION_TOKEN_LEN, TOKEN_TRAILER_LEN};
use crate::errors::ProtocolError;

/// A 44-byte bearer token proving a completed authentication.
#[derive(Clone, Eq, PartialEq)]
pub struct SessionToken([u8; SESSION_TOKEN_LEN]);

impl SessionToken {
    pub(crate) fn assemble(
        auth_nonce: &[u8; AUTH_NONCE_LEN],
        trailer: &[u8; TOKEN_TRAILER_LEN],
    ) -> Self {
        let mut token = [0u8; SESSION_TOKEN_LEN];
        token[..AUTH_NONCE_LEN].copy_from_slice(auth_nonce);
        token[AUTH_NONCE_LEN..].copy_from_slice(trailer);
        Self(token)
    }

    /// Raw token bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_TOKEN_LEN] {
        &self.0
    }

    /// Parses a token, enforcing the 44-byte length discipline.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let token: [u8; SESSION_TOKEN_LEN] =
            bytes.try_into().map_err(|_| ProtocolError::MalformedInput)?;
        Ok(Self(token))
    }

    /// The auth nonce this token answers.
    pub fn auth_nonce(&self) -> &[u8] {
        &self.0[..AUTH_NONCE_LEN]
    }
}

/// Derives the 32-byte token trailer from a shared secret and the auth
/// nonce acting as HKDF salt.
pub(crate) fn derive_trailer(
    shared: &[u8],
    auth_nonce: &[u8],
) -> Result<[u8; TOKEN_TRAILER_LEN], ProtocolError> {
    let hkdf = Hkdf::<Sha256>::new(Some(auth_nonce), shared);
    let mut trailer = [0u8; TOKEN_TRAILER_LEN];
    hkdf.expand(&[], &mut trailer)
        .map_err(|_| ProtocolError::CryptoFault)?;
    Ok(trailer)
}

/// Constant-time equality over the trailer bytes.
pub(crate) fn trailer_matches(expected: &[u8], provided: &[u8]) -> bool {
    expected.ct_eq(provided).into()
}
