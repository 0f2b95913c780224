// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

#![doc = include_str!("../README.md")]

use bitcoin::secp256k1::{All, Secp256k1};
use once_cell::sync::Lazy;

pub use bitcoin;
pub use bitcoin::hashes;
pub use bitcoin::secp256k1;
pub use miniscript;

pub mod bips;
pub mod command;
pub mod descriptor;
pub mod error;
pub mod keys;
pub mod psbt;
pub mod report;
pub mod signer;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod fixtures;

pub use self::descriptor::Descriptor;
pub use self::error::{Error, Result};
pub use self::keys::MasterKey;
pub use self::psbt::{PartiallySignedTransaction, Psbt};
pub use self::report::SigningReport;
pub use self::signer::{SignOptions, Signer};

/// Shared verification and signing context. It holds no secret material.
pub static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);
