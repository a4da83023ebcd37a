// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The client half of the protocol: three pure operations over explicit
//! inputs.
//!
//! 1. [`make_oprf_request`] blinds the password and opens a flow.
//! 2. [`make_envelope`] finalizes a registration from the server's
//!    evaluation and public key.
//! 3. [`derive_session_token`] finalizes an authentication: it re-derives
//!    the envelope key from the password, opens the envelope, and binds the
//!    recovered keys to the server's challenge nonce.
//!
//! Nothing here touches storage or the network; the caller moves the
//! messages.

use rand::{CryptoRng, RngCore};
use x25519_dalek::PublicKey;

use crate::ciphersuite::{AUTH_NONCE_LEN, ENVELOPE_NONCE_LEN, RWD_SALT_LEN};
use crate::envelope;
use crate::errors::ProtocolError;
use crate::group;
use crate::keypair;
use crate::oprf::{self, Evaluation, EvaluationRequest, FinalizeData};
use crate::session::{self, SessionToken};
use crate::slow_hash::{slow_hash, SlowHashParams};

/// Client state opening one registration or authentication flow.
///
/// `fin_data` is the secret half (pre-images and blinds) and never leaves
/// the client except inside the hex wire form that the client itself
/// round-trips through; `eval_req` is what the server sees.
pub struct OprfRequest {
    /// User the flow is for.
    pub username: String,
    /// Tenant the flow is scoped to.
    pub app_token: String,
    /// Finalization state: pre-images plus blinds.
    pub fin_data: FinalizeData,
    /// Blinded elements for the server to evaluate.
    pub eval_req: EvaluationRequest,
}

/// Everything the client uploads to commit a registration.
pub struct RegistrationFinish {
    /// Sealed envelope, tag included.
    pub env_u: Vec<u8>,
    /// Nonce the envelope was sealed under.
    pub env_u_nonce: [u8; ENVELOPE_NONCE_LEN],
    /// The user's long-term X25519 public key.
    pub pub_u: PublicKey,
    /// Argon2 salt used to derive `rwd_u`.
    pub salt: [u8; RWD_SALT_LEN],
}

/// Hashes the password into the group and blinds it, opening a new flow.
pub fn make_oprf_request<R: RngCore + CryptoRng>(
    rng: &mut R,
    username: &str,
    app_token: &str,
    password: &str,
) -> Result<OprfRequest, ProtocolError> {
    if password.is_empty() {
        return Err(ProtocolError::MalformedInput);
    }

    let element = group::hash_to_element(password.as_bytes())?;
    let input = group::serialize_element(&element)?.to_vec();
    let (fin_data, eval_req) = oprf::blind(rng, &[input])?;

    Ok(OprfRequest {
        username: username.to_owned(),
        app_token: app_token.to_owned(),
        fin_data,
        eval_req,
    })
}

/// Builds the envelope from the server's evaluation and static public key.
///
/// Finalizes the OPRF, hardens the output into `rwd_u` under a fresh salt,
/// mints the user's long-term keypair and seals `priv_u ‖ pub_s`.
pub fn make_envelope<R: RngCore + CryptoRng>(
    rng: &mut R,
    fin_data: &FinalizeData,
    evaluation: &Evaluation,
    server_public: &PublicKey,
    params: &SlowHashParams,
) -> Result<RegistrationFinish, ProtocolError> {
    let outputs = fin_data.finalize(evaluation)?;

    let mut salt = [0u8; RWD_SALT_LEN];
    rng.fill_bytes(&mut salt);
    let rwd_u = slow_hash(&outputs[0], &salt, params)?;

    let (priv_u, pub_u) = keypair::generate(rng);
    let sealed = envelope::seal(rng, &rwd_u, &priv_u, server_public)?;

    Ok(RegistrationFinish {
        env_u: sealed.ciphertext,
        env_u_nonce: sealed.nonce,
        pub_u,
        salt,
    })
}

/// Re-derives the envelope key for this password, opens the envelope and
/// produces the session token answering `auth_nonce`.
///
/// The envelope's GCM tag is the only password check in the protocol: a
/// wrong password surfaces here as [`ProtocolError::AuthFailure`] and in no
/// other way.
pub fn derive_session_token(
    fin_data: &FinalizeData,
    evaluation: &Evaluation,
    env_u: &[u8],
    env_u_nonce: &[u8; ENVELOPE_NONCE_LEN],
    rwd_u_salt: &[u8; RWD_SALT_LEN],
    auth_nonce: &[u8; AUTH_NONCE_LEN],
    params: &SlowHashParams,
) -> Result<SessionToken, ProtocolError> {
    let outputs = fin_data.finalize(evaluation)?;
    let rwd_u = slow_hash(&outputs[0], rwd_u_salt, params)?;

    let opened = envelope::open(&rwd_u, env_u, env_u_nonce)?;
    let shared = keypair::shared_secret(&opened.priv_u, &opened.pub_s)?;
    let trailer = session::derive_trailer(&shared[..], auth_nonce)?;

    Ok(SessionToken::assemble(auth_nonce, &trailer))
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn empty_password_is_rejected() {
        assert!(matches!(
            make_oprf_request(&mut OsRng, "truebeef", "app", ""),
            Err(ProtocolError::MalformedInput)
        ));
    }

    #[test]
    fn request_carries_one_input_per_password() {
        let request = make_oprf_request(&mut OsRng, "truebeef", "app", "bunnyfoofoo").unwrap();
        assert_eq!(request.fin_data.inputs().len(), 1);
        assert_eq!(request.eval_req.len(), 1);
        assert_eq!(request.username, "truebeef");
        assert_eq!(request.app_token, "app");
    }

    #[test]
    fn blinding_randomizes_the_wire_element() {
        let a = make_oprf_request(&mut OsRng, "truebeef", "app", "bunnyfoofoo").unwrap();
        let b = make_oprf_request(&mut OsRng, "truebeef", "app", "bunnyfoofoo").unwrap();
        assert_eq!(a.fin_data.inputs(), b.fin_data.inputs());
        assert_ne!(
            a.eval_req.elements[0].serialize(),
            b.eval_req.elements[0].serialize()
        );
    }
}
