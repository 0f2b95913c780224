// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::descriptor::{self, Descriptor};

/// `descriptor.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletJson {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "descriptor")]
    pub main_descriptor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_descriptor: Option<String>,
}

impl WalletJson {
    pub fn from_json<S>(json: S) -> Result<Self, descriptor::Error>
    where
        S: AsRef<str>,
    {
        Ok(serde_json::from_str(json.as_ref())?)
    }

    /// Parsed descriptors, main first
    pub fn descriptors(&self) -> Result<Vec<Descriptor>, descriptor::Error> {
        let mut descriptors = vec![Descriptor::from_str(&self.main_descriptor)?];
        if let Some(change) = &self.change_descriptor {
            descriptors.push(Descriptor::from_str(change)?);
        }
        Ok(descriptors)
    }
}
