// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use serde::{Deserialize, Serialize};

/// `PRIVATE.json`
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterKeyJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(alias = "xpriv", default, skip_serializing_if = "Option::is_none")]
    pub xprv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl std::fmt::Debug for MasterKeyJson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKeyJson")
            .field("name", &self.name)
            .field("xpub", &self.xpub)
            .field("network", &self.network)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl MasterKeyJson {
    pub fn from_json<S>(json: S) -> Result<Self, serde_json::Error>
    where
        S: AsRef<str>,
    {
        serde_json::from_str(json.as_ref())
    }
}
