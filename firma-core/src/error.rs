// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use std::fmt;

use crate::bips::bip32;
use crate::signer::Abort;
use crate::{descriptor, keys, psbt, signer, types};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// Wallet descriptor error
    Descriptor(descriptor::Error),
    /// Master key file error
    KeyLoad(keys::Error),
    /// Key derivation error
    Derivation(bip32::Error),
    /// PSBT encoding error
    PsbtFormat(psbt::Error),
    /// An input we should sign has no UTXO data
    MissingUtxoData { index: usize },
    /// The PSBT can't be signed with this key and wallet
    SigningAbort(Abort),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor(err) => write!(f, "descriptor: {err}"),
            Self::KeyLoad(err) => write!(f, "key: {err}"),
            Self::Derivation(err) => write!(f, "derivation: {err}"),
            Self::PsbtFormat(err) => write!(f, "psbt: {err}"),
            Self::MissingUtxoData { index } => write!(f, "missing UTXO data for input {index}"),
            Self::SigningAbort(err) => write!(f, "signing aborted: {err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<descriptor::Error> for Error {
    fn from(err: descriptor::Error) -> Self {
        Self::Descriptor(err)
    }
}

impl From<keys::Error> for Error {
    fn from(err: keys::Error) -> Self {
        match err {
            keys::Error::IO(err) => Self::Io(err),
            err => Self::KeyLoad(err),
        }
    }
}

impl From<bip32::Error> for Error {
    fn from(err: bip32::Error) -> Self {
        Self::Derivation(err)
    }
}

impl From<psbt::Error> for Error {
    fn from(err: psbt::Error) -> Self {
        Self::PsbtFormat(err)
    }
}

impl From<types::psbt_file::Error> for Error {
    fn from(err: types::psbt_file::Error) -> Self {
        match err {
            types::psbt_file::Error::IO(err) => Self::Io(err),
            types::psbt_file::Error::Psbt(err) => Self::PsbtFormat(err),
        }
    }
}

impl From<Abort> for Error {
    fn from(err: Abort) -> Self {
        Self::SigningAbort(err)
    }
}

impl From<signer::Error> for Error {
    fn from(err: signer::Error) -> Self {
        match err {
            signer::Error::MissingUtxoData { index } => Self::MissingUtxoData { index },
            signer::Error::Derivation(err) => Self::Derivation(err),
            signer::Error::Descriptor(err) => Self::Descriptor(err),
            signer::Error::Abort(err) => Self::SigningAbort(err),
        }
    }
}
