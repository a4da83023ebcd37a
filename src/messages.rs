// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Wire forms of everything that crosses a process boundary.
//!
//! Each message is a single flat serde struct of hex strings plus pure
//! `encode`/`decode` converters to and from runtime state; there is no
//! second shadow struct behind it. Decoding rebuilds opaque client OPRF
//! state from its persisted `(inputs, blinds)` pieces via deterministic
//! blinding, so a flow can hop across browser, native and server processes
//! and resume exactly where it stopped.
//!
//! Any hex error, length mismatch or off-curve element is a
//! malformed-input error; nothing decodes to a silent zero.

use serde::{Deserialize, Serialize};
use voprf::{BlindedElement, EvaluationElement};

use crate::ciphersuite::{ENVELOPE_LEN, ENVELOPE_NONCE_LEN, KEY_LEN, OprfSuite, RWD_SALT_LEN};
use crate::client::OprfRequest;
use crate::errors::ProtocolError;
use crate::group;
use crate::oprf::{self, Evaluation, EvaluationRequest};
use crate::server::AuthChallenge;
use crate::session::SessionToken;

fn decode_hex(hex_str: &str) -> Result<Vec<u8>, ProtocolError> {
    hex::decode(hex_str).map_err(|_| ProtocolError::MalformedInput)
}

fn decode_hex_array<const N: usize>(hex_str: &str) -> Result<[u8; N], ProtocolError> {
    decode_hex(hex_str)?
        .try_into()
        .map_err(|_| ProtocolError::MalformedInput)
}

fn decode_evaluation_elements(
    hex_elements: &[String],
) -> Result<Vec<EvaluationElement<OprfSuite>>, ProtocolError> {
    hex_elements
        .iter()
        .map(|hex_str| {
            EvaluationElement::<OprfSuite>::deserialize(&decode_hex(hex_str)?)
                .map_err(|_| ProtocolError::MalformedInput)
        })
        .collect()
}

/// Wire form of a client OPRF request, carrying enough to rebuild the
/// client's finalization state anywhere.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OprfRequestWire {
    /// User the flow is for.
    pub username: String,
    /// Tenant the flow is scoped to.
    #[serde(rename = "apptoken")]
    pub app_token: String,
    /// Hash-to-curve pre-images, hex.
    pub inputs: Vec<String>,
    /// Blinding scalars, hex. Client secret; only ever round-tripped by
    /// the client itself.
    pub blinds: Vec<String>,
    /// Blinded elements, hex compressed.
    pub eval_req_elements: Vec<String>,
}

impl OprfRequestWire {
    /// Flattens runtime state into hex fields.
    pub fn encode(request: &OprfRequest) -> Self {
        Self {
            username: request.username.clone(),
            app_token: request.app_token.clone(),
            inputs: request.fin_data.inputs.iter().map(hex::encode).collect(),
            blinds: request
                .fin_data
                .blinds
                .iter()
                .map(|blind| hex::encode(group::serialize_scalar(blind)))
                .collect(),
            eval_req_elements: request
                .eval_req
                .elements
                .iter()
                .map(|element| hex::encode(element.serialize()))
                .collect(),
        }
    }

    /// Reconstitutes runtime state, re-deriving the blinded elements from
    /// `(inputs, blinds)`.
    ///
    /// The carried elements are still decoded so a request with off-curve
    /// or truncated elements is rejected, but the deterministically
    /// re-blinded ones are authoritative: state and request can never
    /// disagree.
    pub fn decode(&self) -> Result<OprfRequest, ProtocolError> {
        if self.eval_req_elements.len() != self.inputs.len() {
            return Err(ProtocolError::MalformedInput);
        }
        for hex_str in &self.eval_req_elements {
            BlindedElement::<OprfSuite>::deserialize(&decode_hex(hex_str)?)
                .map_err(|_| ProtocolError::MalformedInput)?;
        }

        let inputs = self
            .inputs
            .iter()
            .map(|hex_str| decode_hex(hex_str))
            .collect::<Result<Vec<_>, _>>()?;
        let blinds = self
            .blinds
            .iter()
            .map(|hex_str| group::deserialize_scalar(&decode_hex(hex_str)?))
            .collect::<Result<Vec<_>, _>>()?;

        let (fin_data, eval_req) = oprf::deterministic_blind(inputs, blinds)?;
        Ok(OprfRequest {
            username: self.username.clone(),
            app_token: self.app_token.clone(),
            fin_data,
            eval_req,
        })
    }
}

/// Wire form of a server OPRF evaluation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EvaluationWire {
    /// Evaluated elements, hex compressed.
    pub elements: Vec<String>,
}

impl EvaluationWire {
    /// Flattens an evaluation into hex fields.
    pub fn encode(evaluation: &Evaluation) -> Self {
        Self {
            elements: evaluation
                .elements
                .iter()
                .map(|element| hex::encode(element.serialize()))
                .collect(),
        }
    }

    /// Reconstitutes the evaluation.
    pub fn decode(&self) -> Result<Evaluation, ProtocolError> {
        Ok(Evaluation {
            elements: decode_evaluation_elements(&self.elements)?,
        })
    }
}

/// Runtime form of a registration upload.
pub struct RegistrationData {
    /// User the registration is for.
    pub username: String,
    /// Tenant the registration is scoped to.
    pub app_token: String,
    /// Sealed envelope, tag included.
    pub env_u: Vec<u8>,
    /// Nonce the envelope was sealed under.
    pub env_u_nonce: [u8; ENVELOPE_NONCE_LEN],
    /// The user's long-term X25519 public key.
    pub pub_u: [u8; KEY_LEN],
    /// Argon2 salt used to derive `rwd_u`.
    pub salt: [u8; RWD_SALT_LEN],
}

/// Wire form of a registration upload.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegistrationDataWire {
    /// User the registration is for.
    pub username: String,
    /// Tenant the registration is scoped to.
    #[serde(rename = "apptoken")]
    pub app_token: String,
    /// Sealed envelope, hex.
    #[serde(rename = "envu")]
    pub env_u: String,
    /// Envelope nonce, hex.
    #[serde(rename = "envu_nonce")]
    pub env_u_nonce: String,
    /// User public key, hex.
    #[serde(rename = "pubu")]
    pub pub_u: String,
    /// Argon2 salt, hex.
    pub salt: String,
}

impl RegistrationDataWire {
    /// Flattens a registration upload into hex fields.
    pub fn encode(data: &RegistrationData) -> Self {
        Self {
            username: data.username.clone(),
            app_token: data.app_token.clone(),
            env_u: hex::encode(&data.env_u),
            env_u_nonce: hex::encode(data.env_u_nonce),
            pub_u: hex::encode(data.pub_u),
            salt: hex::encode(data.salt),
        }
    }

    /// Reconstitutes the upload, enforcing every length.
    pub fn decode(&self) -> Result<RegistrationData, ProtocolError> {
        let env_u = decode_hex(&self.env_u)?;
        if env_u.len() != ENVELOPE_LEN {
            return Err(ProtocolError::MalformedInput);
        }
        Ok(RegistrationData {
            username: self.username.clone(),
            app_token: self.app_token.clone(),
            env_u,
            env_u_nonce: decode_hex_array(&self.env_u_nonce)?,
            pub_u: decode_hex_array(&self.pub_u)?,
            salt: decode_hex_array(&self.salt)?,
        })
    }
}

/// Wire form of the server's authentication challenge.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AuthChallengeWire {
    /// Evaluated elements, hex compressed.
    pub elements: Vec<String>,
    /// Sealed envelope, hex.
    #[serde(rename = "envu")]
    pub env_u: String,
    /// Envelope nonce, hex.
    #[serde(rename = "envu_nonce")]
    pub env_u_nonce: String,
    /// Argon2 salt, hex.
    pub rwdu_salt: String,
    /// Challenge nonce, hex.
    pub auth_nonce: String,
}

impl AuthChallengeWire {
    /// Flattens a challenge into hex fields.
    pub fn encode(challenge: &AuthChallenge) -> Self {
        Self {
            elements: challenge
                .evaluation
                .elements
                .iter()
                .map(|element| hex::encode(element.serialize()))
                .collect(),
            env_u: hex::encode(&challenge.env_u),
            env_u_nonce: hex::encode(challenge.env_u_nonce),
            rwdu_salt: hex::encode(challenge.rwd_u_salt),
            auth_nonce: hex::encode(challenge.auth_nonce),
        }
    }

    /// Reconstitutes the challenge, enforcing every length.
    pub fn decode(&self) -> Result<AuthChallenge, ProtocolError> {
        let env_u = decode_hex(&self.env_u)?;
        if env_u.len() != ENVELOPE_LEN {
            return Err(ProtocolError::MalformedInput);
        }
        Ok(AuthChallenge {
            evaluation: Evaluation {
                elements: decode_evaluation_elements(&self.elements)?,
            },
            env_u,
            env_u_nonce: decode_hex_array(&self.env_u_nonce)?,
            rwd_u_salt: decode_hex_array(&self.rwdu_salt)?,
            auth_nonce: decode_hex_array(&self.auth_nonce)?,
        })
    }
}

/// Runtime form of the authentication finalization.
pub struct AuthFinalizeData {
    /// User the token was minted for.
    pub username: String,
    /// Tenant scope.
    pub app_token: String,
    /// The 44-byte session token.
    pub session_token: SessionToken,
}

/// Wire form of the authentication finalization.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AuthFinalizeWire {
    /// User the token was minted for.
    pub username: String,
    /// Tenant scope.
    #[serde(rename = "apptoken")]
    pub app_token: String,
    /// Session token, hex.
    pub session_token: String,
}

impl AuthFinalizeWire {
    /// Flattens the finalization into hex fields.
    pub fn encode(data: &AuthFinalizeData) -> Self {
        Self {
            username: data.username.clone(),
            app_token: data.app_token.clone(),
            session_token: hex::encode(data.session_token.as_bytes()),
        }
    }

    /// Reconstitutes the finalization, enforcing the token length.
    pub fn decode(&self) -> Result<AuthFinalizeData, ProtocolError> {
        Ok(AuthFinalizeData {
            username: self.username.clone(),
            app_token: self.app_token.clone(),
            session_token: SessionToken::deserialize(&decode_hex(&self.session_token)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::client;
    use crate::oprf::OprfPrivateKey;

    fn request() -> OprfRequest {
        client::make_oprf_request(&mut OsRng, "truebeef", "testAppToken", "bunnyfoofoo").unwrap()
    }

    #[test]
    fn oprf_request_round_trip() {
        let original = request();
        let wire = OprfRequestWire::encode(&original);
        let decoded = wire.decode().unwrap();

        assert_eq!(decoded.username, original.username);
        assert_eq!(decoded.app_token, original.app_token);
        assert_eq!(decoded.fin_data.inputs(), original.fin_data.inputs());
        // Deterministic re-blinding lands on the same wire elements.
        assert_eq!(OprfRequestWire::encode(&decoded), wire);
    }

    #[test]
    fn oprf_request_survives_json() {
        let wire = OprfRequestWire::encode(&request());
        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains("\"apptoken\""));
        assert!(json.contains("\"eval_req_elements\""));

        let parsed: OprfRequestWire = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, wire);
        parsed.decode().unwrap();
    }

    #[test]
    fn oprf_request_rejects_bad_hex_and_bad_elements() {
        let mut wire = OprfRequestWire::encode(&request());
        wire.blinds[0] = "zz".into();
        assert!(matches!(wire.decode(), Err(ProtocolError::MalformedInput)));

        let mut wire = OprfRequestWire::encode(&request());
        wire.eval_req_elements[0] = hex::encode([0xffu8; 33]);
        assert!(matches!(wire.decode(), Err(ProtocolError::MalformedInput)));

        let mut wire = OprfRequestWire::encode(&request());
        wire.eval_req_elements.clear();
        assert!(matches!(wire.decode(), Err(ProtocolError::MalformedInput)));
    }

    #[test]
    fn evaluation_round_trip() {
        let req = request();
        let key = OprfPrivateKey::generate(&mut OsRng);
        let evaluation = key.evaluate(&req.eval_req).unwrap();

        let wire = EvaluationWire::encode(&evaluation);
        let decoded = wire.decode().unwrap();
        assert_eq!(EvaluationWire::encode(&decoded), wire);

        // And the decoded evaluation still finalizes to the same output.
        assert_eq!(
            req.fin_data.finalize(&evaluation).unwrap(),
            req.fin_data.finalize(&decoded).unwrap()
        );
    }

    #[test]
    fn registration_data_round_trip_and_lengths() {
        let data = RegistrationData {
            username: "truebeef".into(),
            app_token: "testAppToken".into(),
            env_u: vec![7u8; ENVELOPE_LEN],
            env_u_nonce: [1u8; ENVELOPE_NONCE_LEN],
            pub_u: [2u8; KEY_LEN],
            salt: [3u8; RWD_SALT_LEN],
        };
        let wire = RegistrationDataWire::encode(&data);
        let decoded = wire.decode().unwrap();
        assert_eq!(decoded.env_u, data.env_u);
        assert_eq!(decoded.pub_u, data.pub_u);

        let mut short_envelope = wire.clone();
        short_envelope.env_u = hex::encode(vec![7u8; ENVELOPE_LEN - 1]);
        assert!(matches!(
            short_envelope.decode(),
            Err(ProtocolError::MalformedInput)
        ));

        let mut short_nonce = wire;
        short_nonce.env_u_nonce = hex::encode([1u8; ENVELOPE_NONCE_LEN - 1]);
        assert!(matches!(
            short_nonce.decode(),
            Err(ProtocolError::MalformedInput)
        ));
    }

    #[test]
    fn auth_finalize_round_trip() {
        let wire = AuthFinalizeWire {
            username: "truebeef".into(),
            app_token: "testAppToken".into(),
            session_token: hex::encode([5u8; 44]),
        };
        let decoded = wire.decode().unwrap();
        assert_eq!(AuthFinalizeWire::encode(&decoded), wire);
    }

    #[test]
    fn auth_finalize_rejects_short_tokens() {
        let wire = AuthFinalizeWire {
            username: "truebeef".into(),
            app_token: "testAppToken".into(),
            session_token: hex::encode([0u8; 43]),
        };
        assert!(matches!(wire.decode(), Err(ProtocolError::MalformedInput)));
    }
}
