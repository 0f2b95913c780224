// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

//! Signing report

use core::fmt;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No derivation of ours matching the descriptor
    NotApplicable,
    /// Descriptor scripts don't produce the spent script pubkey
    ScriptMismatch,
    /// Derived key not found in the input or in the script
    KeyMismatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplicable => write!(f, "not applicable"),
            Self::ScriptMismatch => write!(f, "script mismatch"),
            Self::KeyMismatch => write!(f, "key mismatch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum InputStatus {
    Signed,
    AlreadySigned,
    AlreadyFinalized,
    Skipped(SkipReason),
}

impl fmt::Display for InputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signed => write!(f, "signed"),
            Self::AlreadySigned => write!(f, "already signed"),
            Self::AlreadyFinalized => write!(f, "already finalized"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputReport {
    pub index: usize,
    #[serde(flatten)]
    pub status: InputStatus,
    pub finalized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SigningReport {
    pub inputs: Vec<InputReport>,
    pub signed: usize,
    pub already_signed: usize,
    pub skipped: usize,
    /// Every input is final
    pub finalized: bool,
    /// Fee in satoshi, when every spent UTXO is known
    pub fee: Option<u64>,
    /// PSBT bytes changed
    pub modified: bool,
}

impl SigningReport {
    pub(crate) fn push(&mut self, index: usize, status: InputStatus, finalized: bool) {
        match status {
            InputStatus::Signed => self.signed += 1,
            InputStatus::AlreadySigned | InputStatus::AlreadyFinalized => {
                self.already_signed += 1
            }
            InputStatus::Skipped(_) => self.skipped += 1,
        }
        self.inputs.push(InputReport {
            index,
            status,
            finalized,
        });
    }

    pub fn status(&self, index: usize) -> Option<InputStatus> {
        self.inputs
            .iter()
            .find(|i| i.index == index)
            .map(|i| i.status)
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl fmt::Display for SigningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in self.inputs.iter() {
            write!(f, "input #{}: {}", input.index, input.status)?;
            if input.finalized {
                write!(f, ", finalized")?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "signed: {}, already signed: {}, skipped: {}",
            self.signed, self.already_signed, self.skipped
        )?;
        writeln!(f, "finalized: {}", self.finalized)?;
        match self.fee {
            Some(fee) => writeln!(f, "fee: {fee} sat")?,
            None => writeln!(f, "fee: unknown")?,
        }
        write!(f, "modified: {}", self.modified)
    }
}
