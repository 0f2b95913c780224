// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::psbt::{self, PartiallySignedTransaction, Psbt, PSBT_MAGIC};
use crate::util::dir;

/// `psbt.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsbtJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub psbt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_psbt: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PsbtFormat {
    Binary,
    Base64,
    Json(PsbtJson),
}

/// A PSBT together with the container it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsbtFile {
    pub format: PsbtFormat,
    pub psbt: PartiallySignedTransaction,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Psbt(#[from] psbt::Error),
}

impl PsbtFile {
    /// Detect the container from the content: raw bytes, base64 text or JSON
    pub fn decode(data: &[u8]) -> Result<Self, psbt::Error> {
        if data.starts_with(&PSBT_MAGIC) {
            return Ok(Self {
                format: PsbtFormat::Binary,
                psbt: PartiallySignedTransaction::from_bytes(data)?,
            });
        }

        let text = String::from_utf8_lossy(data);
        let text = text.trim();
        if text.starts_with('{') {
            let json: PsbtJson = serde_json::from_str(text)?;
            let latest: &str = json.signed_psbt.as_deref().unwrap_or(&json.psbt);
            let psbt = PartiallySignedTransaction::from_base64(latest)?;
            Ok(Self {
                format: PsbtFormat::Json(json),
                psbt,
            })
        } else {
            Ok(Self {
                format: PsbtFormat::Base64,
                psbt: PartiallySignedTransaction::from_base64(text)?,
            })
        }
    }

    pub fn open<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let data = fs::read(path)?;
        Ok(Self::decode(&data)?)
    }

    /// Serialize in the original container
    pub fn encode(&self) -> Result<Vec<u8>, psbt::Error> {
        match &self.format {
            PsbtFormat::Binary => Ok(self.psbt.as_bytes()),
            PsbtFormat::Base64 => Ok(self.psbt.as_base64().into_bytes()),
            PsbtFormat::Json(json) => {
                let mut json = json.clone();
                json.signed_psbt = Some(self.psbt.as_base64());
                Ok(serde_json::to_vec_pretty(&json)?)
            }
        }
    }

    pub fn save<P>(&self, path: P) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        let data = self.encode()?;
        dir::write_atomic(path, &data)?;
        Ok(())
    }
}
