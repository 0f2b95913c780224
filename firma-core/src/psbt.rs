// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

//! PSBT

use bitcoin::consensus::encode::{self, deserialize, serialize};
pub use bitcoin::psbt::{Input, Output, PartiallySignedTransaction};

use crate::util::base64;

/// `psbt` followed by `0xff`
pub const PSBT_MAGIC: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xFF];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Encoding(#[from] encode::Error),
    #[error(transparent)]
    Psbt(#[from] bitcoin::psbt::Error),
    #[error(transparent)]
    JSON(#[from] serde_json::Error),
    /// Negative fee
    #[error("negative fee")]
    NegativeFee,
    /// Integer overflow in fee calculation
    #[error("fee overflow")]
    FeeOverflow,
}

pub trait Psbt: Sized {
    fn from_bytes<T>(data: T) -> Result<Self, Error>
    where
        T: AsRef<[u8]>;

    fn from_base64<S>(psbt: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
    {
        let data: Vec<u8> = base64::decode(psbt.as_ref().trim())?;
        Self::from_bytes(data)
    }

    fn as_bytes(&self) -> Vec<u8>;

    fn as_base64(&self) -> String {
        base64::encode(self.as_bytes())
    }

    /// Calculates transaction fee.
    ///
    /// ## Errors
    ///
    /// - [`Error::Psbt`] when UTXO information for any input is not present or is invalid.
    /// - [`Error::NegativeFee`] if calculated value is negative.
    /// - [`Error::FeeOverflow`] if an integer overflow occurs.
    fn fee(&self) -> Result<u64, Error>;

    /// Every input carries a final scriptSig or witness
    fn is_finalized(&self) -> bool;
}

impl Psbt for PartiallySignedTransaction {
    fn from_bytes<T>(data: T) -> Result<Self, Error>
    where
        T: AsRef<[u8]>,
    {
        Ok(deserialize(data.as_ref())?)
    }

    fn as_bytes(&self) -> Vec<u8> {
        serialize(self)
    }

    fn fee(&self) -> Result<u64, Error> {
        if self.inputs.len() != self.unsigned_tx.input.len() {
            return Err(bitcoin::psbt::Error::MissingUtxo.into());
        }
        let mut inputs: u64 = 0;
        for utxo in self.iter_funding_utxos() {
            inputs = inputs.checked_add(utxo?.value).ok_or(Error::FeeOverflow)?;
        }
        let mut outputs: u64 = 0;
        for out in &self.unsigned_tx.output {
            outputs = outputs.checked_add(out.value).ok_or(Error::FeeOverflow)?;
        }
        inputs.checked_sub(outputs).ok_or(Error::NegativeFee)
    }

    fn is_finalized(&self) -> bool {
        self.inputs.iter().all(|input| input.is_finalized())
    }
}

/// Per-input state
pub trait PsbtInput {
    fn is_finalized(&self) -> bool;
}

impl PsbtInput for Input {
    fn is_finalized(&self) -> bool {
        self.final_script_sig.is_some() || self.final_script_witness.is_some()
    }
}
