// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Defines the concrete cipher suite the engine runs on: OPRF(P-256,
//! SHA-256) for the blinded password evaluation, X25519 for the static
//! key exchange, AES-128-GCM for the envelope, and HKDF-SHA256 everywhere a
//! key is stretched.

/// The prime-order group underlying the OPRF, as a [`voprf::CipherSuite`].
pub type OprfSuite = p256::NistP256;

/// Domain separation tag for hashing a password into the OPRF group.
///
/// Interoperability depends on this exact tag: the password is mapped to a
/// group element and the element's compressed encoding becomes the OPRF
/// input, so every client implementation must agree on it.
pub const HASH_TO_GROUP_DST: &[u8] = b"QUUX-V01-CS02-with-P256_XMD:SHA-256_SSWU_RO_";

/// Length of a compressed P-256 group element encoding.
pub const ELEMENT_LEN: usize = 33;

/// Length of a P-256 scalar encoding (big-endian).
pub const SCALAR_LEN: usize = 32;

/// Length of an X25519 private or public key.
pub const KEY_LEN: usize = 32;

/// Length of the AES-128-GCM envelope key derived from `rwd_u`.
pub const ENVELOPE_KEY_LEN: usize = 16;

/// Length of the AES-GCM nonce protecting the envelope.
pub const ENVELOPE_NONCE_LEN: usize = 12;

/// Length of the AES-GCM authentication tag appended to the envelope.
pub const ENVELOPE_TAG_LEN: usize = 16;

/// Length of the envelope plaintext: `priv_u ‖ pub_s`, no framing.
pub const ENVELOPE_PLAINTEXT_LEN: usize = 2 * KEY_LEN;

/// Length of the sealed envelope: plaintext plus the GCM tag.
pub const ENVELOPE_LEN: usize = ENVELOPE_PLAINTEXT_LEN + ENVELOPE_TAG_LEN;

/// Length of the Argon2 salt mixed into `rwd_u`.
pub const RWD_SALT_LEN: usize = 32;

/// Length of the nonce minted per authentication attempt.
pub const AUTH_NONCE_LEN: usize = 12;

/// Length of the HKDF output appended to the auth nonce in a session token.
pub const TOKEN_TRAILER_LEN: usize = KEY_LEN;

/// Length of a complete session token: `auth_nonce ‖ trailer`.
pub const SESSION_TOKEN_LEN: usize = AUTH_NONCE_LEN + TOKEN_TRAILER_LEN;
