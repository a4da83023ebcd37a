// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The user envelope: an AES-128-GCM ciphertext holding the client's
//! long-term X25519 private key and the server's public key, keyed by a
//! derivative of `rwd_u`.
//!
//! The plaintext layout is exactly `priv_u ‖ pub_s` with no framing; both
//! sides of the protocol rely on the fixed offsets. The GCM tag is the only
//! password check in the whole protocol: opening with a key derived from
//! the wrong password fails here and nowhere else.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::ciphersuite::{ENVELOPE_KEY_LEN, ENVELOPE_NONCE_LEN, ENVELOPE_PLAINTEXT_LEN, KEY_LEN};
use crate::errors::ProtocolError;

/// A freshly sealed envelope and the nonce it was sealed under.
pub(crate) struct SealedEnvelope {
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) nonce: [u8; ENVELOPE_NONCE_LEN],
}

/// The keys recovered from a successfully opened envelope.
pub(crate) struct OpenedEnvelope {
    pub(crate) priv_u: StaticSecret,
    pub(crate) pub_s: PublicKey,
}

/// Expands `rwd_u` into the AES-128 envelope key. Empty salt and info, per
/// the interoperable construction.
fn derive_envelope_key(rwd_u: &[u8]) -> Result<Zeroizing<[u8; ENVELOPE_KEY_LEN]>, ProtocolError> {
    let hkdf = Hkdf::<Sha256>::new(None, rwd_u);
    let mut key = Zeroizing::new([0u8; ENVELOPE_KEY_LEN]);
    hkdf.expand(&[], &mut key[..])
        .map_err(|_| ProtocolError::CryptoFault)?;
    Ok(key)
}

/// Seals `priv_u ‖ pub_s` under a key derived from `rwd_u`, sampling a
/// fresh nonce.
pub(crate) fn seal<R: RngCore + CryptoRng>(
    rng: &mut R,
    rwd_u: &[u8],
    priv_u: &StaticSecret,
    pub_s: &PublicKey,
) -> Result<SealedEnvelope, ProtocolError> {
    let key = derive_envelope_key(rwd_u)?;
    let cipher = Aes128Gcm::new_from_slice(&key[..]).map_err(|_| ProtocolError::CryptoFault)?;

    let mut nonce = [0u8; ENVELOPE_NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let mut plaintext = Zeroizing::new([0u8; ENVELOPE_PLAINTEXT_LEN]);
    plaintext[..KEY_LEN].copy_from_slice(&priv_u.to_bytes());
    plaintext[KEY_LEN..].copy_from_slice(pub_s.as_bytes());

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), &plaintext[..])
        .map_err(|_| ProtocolError::CryptoFault)?;

    Ok(SealedEnvelope { ciphertext, nonce })
}

/// Opens an envelope with a key derived from `rwd_u`.
///
/// A tag failure means the key was wrong, which in this protocol means the
/// password was wrong.
pub(crate) fn open(
    rwd_u: &[u8],
    ciphertext: &[u8],
    nonce: &[u8; ENVELOPE_NONCE_LEN],
) -> Result<OpenedEnvelope, ProtocolError> {
    let key = derive_envelope_key(rwd_u)?;
    let cipher = Aes128Gcm::new_from_slice(&key[..]).map_err(|_| ProtocolError::CryptoFault)?;

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| ProtocolError::AuthFailure)?,
    );

    // The tag verified but the contents do not fit the fixed layout; the
    // record was corrupted before sealing.
    if plaintext.len() != ENVELOPE_PLAINTEXT_LEN {
        return Err(ProtocolError::MalformedInput);
    }

    let mut priv_bytes = Zeroizing::new([0u8; KEY_LEN]);
    priv_bytes.copy_from_slice(&plaintext[..KEY_LEN]);
    let mut pub_bytes = [0u8; KEY_LEN];
    pub_bytes.copy_from_slice(&plaintext[KEY_LEN..]);

    Ok(OpenedEnvelope {
        priv_u: StaticSecret::from(*priv_bytes),
        pub_s: PublicKey::from(pub_bytes),
    })
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::ciphersuite::ENVELOPE_LEN;
    use crate::keypair;

    #[test]
    fn seal_open_round_trip() {
        let (priv_u, _) = keypair::generate(&mut OsRng);
        let (_, pub_s) = keypair::generate(&mut OsRng);
        let rwd_u = [42u8; 32];

        let sealed = seal(&mut OsRng, &rwd_u, &priv_u, &pub_s).unwrap();
        assert_eq!(sealed.ciphertext.len(), ENVELOPE_LEN);

        let opened = open(&rwd_u, &sealed.ciphertext, &sealed.nonce).unwrap();
        assert_eq!(opened.priv_u.to_bytes(), priv_u.to_bytes());
        assert_eq!(opened.pub_s.as_bytes(), pub_s.as_bytes());
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let (priv_u, _) = keypair::generate(&mut OsRng);
        let (_, pub_s) = keypair::generate(&mut OsRng);

        let sealed = seal(&mut OsRng, &[42u8; 32], &priv_u, &pub_s).unwrap();
        assert!(matches!(
            open(&[43u8; 32], &sealed.ciphertext, &sealed.nonce),
            Err(ProtocolError::AuthFailure)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let (priv_u, _) = keypair::generate(&mut OsRng);
        let (_, pub_s) = keypair::generate(&mut OsRng);
        let rwd_u = [42u8; 32];

        let sealed = seal(&mut OsRng, &rwd_u, &priv_u, &pub_s).unwrap();
        for index in [0, ENVELOPE_LEN / 2, ENVELOPE_LEN - 1] {
            let mut tampered = sealed.ciphertext.clone();
            tampered[index] ^= 0x01;
            assert!(matches!(
                open(&rwd_u, &tampered, &sealed.nonce),
                Err(ProtocolError::AuthFailure)
            ));
        }
    }

    #[test]
    fn nonce_is_fresh_per_seal() {
        let (priv_u, _) = keypair::generate(&mut OsRng);
        let (_, pub_s) = keypair::generate(&mut OsRng);
        let rwd_u = [42u8; 32];

        let first = seal(&mut OsRng, &rwd_u, &priv_u, &pub_s).unwrap();
        let second = seal(&mut OsRng, &rwd_u, &priv_u, &pub_s).unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }
}
