// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! X25519 static keys: the user keypair sealed into the envelope and the
//! server keypair the session token is bound to.

use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::ciphersuite::KEY_LEN;
use crate::errors::ProtocolError;

/// Generates a fresh X25519 keypair.
pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> (StaticSecret, PublicKey) {
    let secret = StaticSecret::random_from_rng(&mut *rng);
    let public = PublicKey::from(&secret);
    (secret, public)
}

/// Derives the public key for a raw 32-byte private key.
pub fn public_key_from_private(private_key: [u8; KEY_LEN]) -> PublicKey {
    PublicKey::from(&StaticSecret::from(private_key))
}

/// Computes the X25519 shared secret.
///
/// A non-contributory result (all-zero output from a small-order public
/// key) is folded into the unified authentication failure.
pub fn shared_secret(
    secret: &StaticSecret,
    public: &PublicKey,
) -> Result<Zeroizing<[u8; KEY_LEN]>, ProtocolError> {
    let shared = secret.diffie_hellman(public);
    if !shared.was_contributory() {
        return Err(ProtocolError::AuthFailure);
    }
    Ok(Zeroizing::new(*shared.as_bytes()))
}
