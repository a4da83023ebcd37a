// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Canonical (un)marshalling of P-256 elements and scalars, plus the
//! hash-to-curve step applied to passwords before blinding.
//!
//! Encodings are KAT-stable: elements are 33-byte compressed SEC1 points,
//! scalars are 32-byte big-endian. Anything else coming off the wire is a
//! malformed-input error, never a silent zero.

use elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest};
use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use elliptic_curve::{Field, PrimeField};
use p256::{AffinePoint, EncodedPoint, NistP256, ProjectivePoint, Scalar};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use crate::ciphersuite::{ELEMENT_LEN, HASH_TO_GROUP_DST, SCALAR_LEN};
use crate::errors::ProtocolError;

/// Maps arbitrary input into the group with the suite's domain separation
/// tag.
pub fn hash_to_element(msg: &[u8]) -> Result<ProjectivePoint, ProtocolError> {
    NistP256::hash_from_bytes::<ExpandMsgXmd<Sha256>>(&[msg], &[HASH_TO_GROUP_DST])
        .map_err(|_| ProtocolError::CryptoFault)
}

/// Serializes an element into its 33-byte compressed form.
pub fn serialize_element(element: &ProjectivePoint) -> Result<[u8; ELEMENT_LEN], ProtocolError> {
    let encoded = element.to_affine().to_encoded_point(true);
    // The identity encodes as a single zero byte and has no place on the
    // wire.
    if encoded.as_bytes().len() != ELEMENT_LEN {
        return Err(ProtocolError::CryptoFault);
    }
    let mut out = [0u8; ELEMENT_LEN];
    out.copy_from_slice(encoded.as_bytes());
    Ok(out)
}

/// Deserializes a 33-byte compressed encoding back into an element.
pub fn deserialize_element(bytes: &[u8]) -> Result<ProjectivePoint, ProtocolError> {
    if bytes.len() != ELEMENT_LEN {
        return Err(ProtocolError::MalformedInput);
    }
    let encoded = EncodedPoint::from_bytes(bytes).map_err(|_| ProtocolError::MalformedInput)?;
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .map(ProjectivePoint::from)
        .ok_or(ProtocolError::MalformedInput)
}

/// Serializes a scalar as 32 big-endian bytes.
pub fn serialize_scalar(scalar: &Scalar) -> [u8; SCALAR_LEN] {
    scalar.to_bytes().into()
}

/// Deserializes 32 big-endian bytes into a scalar, rejecting non-canonical
/// encodings.
pub fn deserialize_scalar(bytes: &[u8]) -> Result<Scalar, ProtocolError> {
    let array: [u8; SCALAR_LEN] = bytes.try_into().map_err(|_| ProtocolError::MalformedInput)?;
    Option::<Scalar>::from(Scalar::from_repr(array.into())).ok_or(ProtocolError::MalformedInput)
}

/// Draws a uniformly random nonzero scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    loop {
        let scalar = Scalar::random(&mut *rng);
        if !bool::from(scalar.is_zero()) {
            return scalar;
        }
    }
}
