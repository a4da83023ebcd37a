// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A list of error types which are produced during an execution of the
//! protocol

use displaydoc::Display;

/// Represents an error occurring in the storage collaborator.
///
/// `Fault` is transient: the caller may retry the whole operation. The
/// engine itself never retries.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum StorageError {
    /// record not found
    NotFound,
    /// conflicting write
    Conflict,
    /// storage backend failure: {0}
    Fault(String),
}

impl std::error::Error for StorageError {}

/// Represents an error occurring during an execution of the protocol.
///
/// `UnknownCredentials` and `AuthFailure` deliberately share one Display
/// string. A transport relaying messages from this enum cannot be used as an
/// account-enumeration oracle.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum ProtocolError {
    /// malformed protocol input
    MalformedInput,
    /// invalid credentials
    UnknownCredentials,
    /// cryptographic operation failed
    CryptoFault,
    /// invalid credentials
    AuthFailure,
    /// {0}
    Storage(StorageError),
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for ProtocolError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}
