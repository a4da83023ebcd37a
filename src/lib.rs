// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! An implementation of an OPRF-based augmented password-authenticated key
//! exchange.
//!
//! A client proves knowledge of a password to a server and both sides end
//! up with a shared session token, while the server never sees the
//! password, a password hash, or anything it could grind offline more
//! cheaply than online. What the server stores is a blinded OPRF key per
//! user and an *envelope*: an AEAD ciphertext only decryptable with a key
//! the client re-derives from the password each session.
//!
//! # Protocol flows
//!
//! Registration:
//!
//! 1. Client: [`client::make_oprf_request`] hashes the password to the
//!    group and blinds it.
//! 2. Server: [`server::Server::handle_new_user_request`] mints a per-user
//!    OPRF key, evaluates, and stages the key.
//! 3. Client: [`client::make_envelope`] finalizes the OPRF, hardens the
//!    output with Argon2id into `rwd_u`, mints an X25519 keypair and seals
//!    `priv_u ‖ pub_s` under a key derived from `rwd_u`.
//! 4. Server: [`server::Server::store_user_data`] commits the envelope.
//!
//! Authentication:
//!
//! 1. Client: [`client::make_oprf_request`] again, with the password as
//!    typed now.
//! 2. Server: [`server::Server::handle_new_user_authentication`]
//!    re-evaluates under the committed key and mints a challenge nonce.
//! 3. Client: [`client::derive_session_token`] re-derives `rwd_u`, opens
//!    the envelope (the GCM tag is the password check), computes the X25519
//!    shared secret and answers the challenge with a 44-byte token.
//! 4. Server: [`server::Server::is_authenticated`] recomputes the token
//!    trailer from its own half of the exchange and compares in constant
//!    time.
//!
//! The engine is transport-agnostic: messages move as the hex-wrapped
//! serde structs in [`messages`], persistence goes through the async
//! [`storage::Storage`] contract, and all randomness is drawn from a
//! caller-supplied CSPRNG.

#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod ciphersuite;
pub mod client;
mod envelope;
pub mod errors;
pub mod group;
pub mod keypair;
pub mod messages;
pub mod oprf;
pub mod server;
pub mod session;
pub mod slow_hash;
pub mod storage;

pub use crate::errors::{ProtocolError, StorageError};
pub use crate::server::{AuthChallenge, RegistrationState, Server};
pub use crate::session::SessionToken;
pub use crate::slow_hash::SlowHashParams;
pub use crate::storage::{MemoryStorage, Storage, UserEnvelope, UserRequest};
