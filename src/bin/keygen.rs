// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Mints and inspects the server's X25519 private key file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use rand::RngCore;

use opaque_auth::ciphersuite::KEY_LEN;
use opaque_auth::keypair;

#[derive(Parser)]
#[command(about = "Manage the server's X25519 private key")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new private key and write it to a file.
    Keygen {
        /// Where to store the raw 32-byte key.
        #[arg(long)]
        key_path: PathBuf,
    },
    /// Print the hex-encoded public key of an existing private key file.
    PrintPubkey {
        /// Path to the raw 32-byte key.
        #[arg(long)]
        key_path: PathBuf,
    },
}

fn read_key(path: &PathBuf) -> Result<[u8; KEY_LEN], Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let key: [u8; KEY_LEN] = bytes
        .try_into()
        .map_err(|_| format!("key file must hold exactly {KEY_LEN} bytes"))?;
    Ok(key)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Keygen { key_path } => {
            let mut private_key = [0u8; KEY_LEN];
            OsRng.fill_bytes(&mut private_key);
            std::fs::write(&key_path, private_key)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
            }
            let public = keypair::public_key_from_private(private_key);
            println!("private key written to {}", key_path.display());
            println!("public key: {}", hex::encode(public.as_bytes()));
        }
        Command::PrintPubkey { key_path } => {
            let public = keypair::public_key_from_private(read_key(&key_path)?);
            println!("public key: {}", hex::encode(public.as_bytes()));
        }
    }
    Ok(())
}
