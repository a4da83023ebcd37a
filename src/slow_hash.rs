// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Memory-hard stretching of the OPRF output into `rwd_u`.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::errors::ProtocolError;

/// Argon2id tuning parameters for hardening the OPRF output.
///
/// The [`Default`] values mirror what a slow in-browser client can tolerate
/// and are **unsuitable for production**: a native deployment should raise
/// `memory_kib` to the tens of megabytes. The salt the parameters are
/// applied with is persisted next to the envelope, so changing parameters
/// only takes effect on re-registration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SlowHashParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub time_cost: u32,
    /// Lanes.
    pub parallelism: u32,
    /// Output length in bytes.
    pub output_len: usize,
}

impl Default for SlowHashParams {
    fn default() -> Self {
        Self {
            memory_kib: 128,
            time_cost: 1,
            parallelism: 4,
            output_len: 32,
        }
    }
}

/// Computes `rwd_u = Argon2id(input, salt)` under the given parameters.
pub fn slow_hash(
    input: &[u8],
    salt: &[u8],
    params: &SlowHashParams,
) -> Result<Zeroizing<Vec<u8>>, ProtocolError> {
    let argon_params = Params::new(
        params.memory_kib,
        params.time_cost,
        params.parallelism,
        Some(params.output_len),
    )
    .map_err(|_| ProtocolError::CryptoFault)?;
    let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = Zeroizing::new(vec![0u8; params.output_len]);
    hasher
        .hash_password_into(input, salt, &mut output)
        .map_err(|_| ProtocolError::CryptoFault)?;
    Ok(output)
}
