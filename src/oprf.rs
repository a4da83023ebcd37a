// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A thin wrapper around the base-mode OPRF(P-256, SHA-256) suite.
//!
//! Client state is held as `(inputs, blinds)` rather than as an opaque
//! in-memory object: blinding is always performed through
//! [`OprfClient::deterministic_blind_unchecked`], so the exact same state
//! can be reconstructed after crossing an arbitrary serialization boundary
//! (browser ↔ native ↔ server). A fresh blind simply draws the scalar first.

use generic_array::typenum::U32;
use generic_array::GenericArray;
use p256::Scalar;
use rand::{CryptoRng, RngCore};
use voprf::{BlindedElement, EvaluationElement, OprfClient, OprfServer};

use crate::ciphersuite::{OprfSuite, SCALAR_LEN};
use crate::errors::ProtocolError;
use crate::group;

/// Output of one finalized OPRF evaluation (SHA-256 sized).
pub type OprfOutput = GenericArray<u8, U32>;

/// The blinded elements sent to the evaluator.
#[derive(Clone)]
pub struct EvaluationRequest {
    pub(crate) elements: Vec<BlindedElement<OprfSuite>>,
}

impl EvaluationRequest {
    /// Number of blinded elements carried by this request.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the request carries no elements at all.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// The evaluated elements returned by the key holder.
#[derive(Clone)]
pub struct Evaluation {
    pub(crate) elements: Vec<EvaluationElement<OprfSuite>>,
}

impl Evaluation {
    /// Number of evaluated elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the evaluation carries no elements at all.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Client-side state required to finalize an evaluation.
///
/// Holds the pre-images and their blinds; the voprf client objects are
/// rebuilt deterministically on demand.
#[derive(Clone)]
pub struct FinalizeData {
    pub(crate) inputs: Vec<Vec<u8>>,
    pub(crate) blinds: Vec<Scalar>,
}

impl FinalizeData {
    /// The hash-to-curve pre-images this state was built over.
    pub fn inputs(&self) -> &[Vec<u8>] {
        &self.inputs
    }

    /// Unblinds and hashes the server's evaluation, yielding one output per
    /// input.
    ///
    /// An empty evaluation is rejected outright; a count mismatch against
    /// the held inputs is malformed input.
    pub fn finalize(&self, evaluation: &Evaluation) -> Result<Vec<OprfOutput>, ProtocolError> {
        if evaluation.elements.is_empty() {
            return Err(ProtocolError::CryptoFault);
        }
        if evaluation.elements.len() != self.inputs.len() {
            return Err(ProtocolError::MalformedInput);
        }

        let mut outputs = Vec::with_capacity(self.inputs.len());
        for ((input, blind), element) in self
            .inputs
            .iter()
            .zip(self.blinds.iter())
            .zip(evaluation.elements.iter())
        {
            let restored = OprfClient::<OprfSuite>::deterministic_blind_unchecked(input, *blind)
                .map_err(|_| ProtocolError::CryptoFault)?;
            let output = restored
                .state
                .finalize(input, element)
                .map_err(|_| ProtocolError::CryptoFault)?;
            outputs.push(output);
        }
        Ok(outputs)
    }
}

/// Blinds `inputs` with freshly drawn scalars.
pub fn blind<R: RngCore + CryptoRng>(
    rng: &mut R,
    inputs: &[Vec<u8>],
) -> Result<(FinalizeData, EvaluationRequest), ProtocolError> {
    let blinds = inputs
        .iter()
        .map(|_| group::random_scalar(&mut *rng))
        .collect();
    deterministic_blind(inputs.to_vec(), blinds)
}

/// Re-blinds `inputs` with caller-supplied scalars, reconstructing the
/// exact client state a previous [`blind`] produced.
pub fn deterministic_blind(
    inputs: Vec<Vec<u8>>,
    blinds: Vec<Scalar>,
) -> Result<(FinalizeData, EvaluationRequest), ProtocolError> {
    if inputs.is_empty() || inputs.len() != blinds.len() {
        return Err(ProtocolError::MalformedInput);
    }

    let mut elements = Vec::with_capacity(inputs.len());
    for (input, blind) in inputs.iter().zip(blinds.iter()) {
        let result = OprfClient::<OprfSuite>::deterministic_blind_unchecked(input, *blind)
            .map_err(|_| ProtocolError::CryptoFault)?;
        elements.push(result.message);
    }

    Ok((FinalizeData { inputs, blinds }, EvaluationRequest { elements }))
}

/// A per-user OPRF private key held by the server.
pub struct OprfPrivateKey(Scalar);

impl OprfPrivateKey {
    /// Mints a fresh key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(group::random_scalar(rng))
    }

    /// Canonical 32-byte encoding of the key.
    pub fn serialize(&self) -> [u8; SCALAR_LEN] {
        group::serialize_scalar(&self.0)
    }

    /// Restores a key from its canonical encoding.
    ///
    /// A key that fails to decode was persisted corrupt; that is a crypto
    /// fault rather than a caller mistake.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let scalar = group::deserialize_scalar(bytes).map_err(|_| ProtocolError::CryptoFault)?;
        if bool::from(elliptic_curve::Field::is_zero(&scalar)) {
            return Err(ProtocolError::CryptoFault);
        }
        Ok(Self(scalar))
    }

    /// Evaluates every element of the request under this key.
    pub fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, ProtocolError> {
        if request.elements.is_empty() {
            return Err(ProtocolError::MalformedInput);
        }
        let server = OprfServer::<OprfSuite>::new_with_key(&self.serialize())
            .map_err(|_| ProtocolError::CryptoFault)?;
        let elements = request
            .elements
            .iter()
            .map(|element| server.blind_evaluate(element))
            .collect();
        Ok(Evaluation { elements })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    fn test_input() -> Vec<Vec<u8>> {
        let element = group::hash_to_element(b"bunnyfoofoo").unwrap();
        vec![group::serialize_element(&element).unwrap().to_vec()]
    }

    #[test]
    fn deterministic_blind_reproduces_fresh_blind() {
        let inputs = test_input();
        let (fin_data, eval_req) = blind(&mut OsRng, &inputs).unwrap();
        let (_, restored_req) =
            deterministic_blind(fin_data.inputs.clone(), fin_data.blinds.clone()).unwrap();

        assert_eq!(
            eval_req.elements[0].serialize(),
            restored_req.elements[0].serialize()
        );
    }

    #[test]
    fn finalize_is_independent_of_the_blind() {
        // The whole point of an OPRF: different blinds, same key, same
        // final output.
        let inputs = test_input();
        let key = OprfPrivateKey::generate(&mut OsRng);

        let (fin_a, req_a) = blind(&mut OsRng, &inputs).unwrap();
        let (fin_b, req_b) = blind(&mut OsRng, &inputs).unwrap();
        assert_ne!(
            req_a.elements[0].serialize(),
            req_b.elements[0].serialize()
        );

        let out_a = fin_a.finalize(&key.evaluate(&req_a).unwrap()).unwrap();
        let out_b = fin_b.finalize(&key.evaluate(&req_b).unwrap()).unwrap();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn different_keys_give_different_outputs() {
        let inputs = test_input();
        let (fin_data, eval_req) = blind(&mut OsRng, &inputs).unwrap();

        let key_a = OprfPrivateKey::generate(&mut OsRng);
        let key_b = OprfPrivateKey::generate(&mut OsRng);
        let out_a = fin_data.finalize(&key_a.evaluate(&eval_req).unwrap()).unwrap();
        let out_b = fin_data.finalize(&key_b.evaluate(&eval_req).unwrap()).unwrap();
        assert_ne!(out_a, out_b);
    }

    #[test]
    fn finalize_rejects_empty_evaluation() {
        let (fin_data, _) = blind(&mut OsRng, &test_input()).unwrap();
        let empty = Evaluation { elements: vec![] };
        assert!(matches!(
            fin_data.finalize(&empty),
            Err(ProtocolError::CryptoFault)
        ));
    }

    #[test]
    fn evaluate_rejects_empty_request() {
        let key = OprfPrivateKey::generate(&mut OsRng);
        let empty = EvaluationRequest { elements: vec![] };
        assert!(matches!(
            key.evaluate(&empty),
            Err(ProtocolError::MalformedInput)
        ));
    }

    #[test]
    fn private_key_round_trip() {
        let key = OprfPrivateKey::generate(&mut OsRng);
        let restored = OprfPrivateKey::deserialize(&key.serialize()).unwrap();
        assert_eq!(key.serialize(), restored.serialize());
    }
}
