// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

//! Master key files

use std::fs;
use std::path::Path;
use std::str::FromStr;

use bip39::Mnemonic;
use bitcoin::secp256k1::{Secp256k1, Signing};
use bitcoin::Network;

use crate::bips::bip32::{
    self, same_chain, same_xpub, Bip32, ExtendedKey, ExtendedPubKey, Fingerprint,
};
use crate::types::{MasterKeyJson, Seed};
use crate::SECP256K1;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    JSON(#[from] serde_json::Error),
    #[error(transparent)]
    BIP32(#[from] bip32::Error),
    #[error(transparent)]
    BIP39(#[from] bip39::Error),
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    #[error("invalid fingerprint `{0}`")]
    InvalidFingerprint(String),
    #[error("wrong network: expected {expected}, found {found}")]
    WrongNetwork { expected: Network, found: Network },
    #[error("fingerprint mismatch: expected {expected}, found {found}")]
    FingerprintMismatch {
        expected: Fingerprint,
        found: Fingerprint,
    },
    #[error("xpub doesn't match the private key")]
    XpubMismatch,
    #[error("not a master key (depth {0})")]
    NotMasterKey(u8),
    #[error("key file contains neither `xprv` nor `mnemonic`")]
    MissingKey,
}

/// A loaded and validated master key
#[derive(Debug, Clone)]
pub struct MasterKey {
    key: ExtendedKey,
    network: Network,
    fingerprint: Fingerprint,
    name: Option<String>,
}

fn parse_network(network: &str) -> Result<Network, Error> {
    match network {
        "mainnet" => Ok(Network::Bitcoin),
        _ => Network::from_str(network).map_err(|_| Error::UnknownNetwork(network.to_string())),
    }
}

impl MasterKey {
    /// Build from an extended key, which must be at depth 0
    pub fn new<C>(secp: &Secp256k1<C>, key: ExtendedKey, network: Network) -> Result<Self, Error>
    where
        C: Signing,
    {
        if key.depth() != 0 {
            return Err(Error::NotMasterKey(key.depth()));
        }
        if !same_chain(key.network(), network) {
            return Err(Error::WrongNetwork {
                expected: network,
                found: key.network(),
            });
        }
        Ok(Self {
            fingerprint: key.fingerprint(secp),
            key,
            network,
            name: None,
        })
    }

    pub fn from_file<P>(path: P, expected: Option<Network>) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let json = fs::read_to_string(path)?;
        Self::from_json(json, expected)
    }

    pub fn from_json<S>(json: S, expected: Option<Network>) -> Result<Self, Error>
    where
        S: AsRef<str>,
    {
        let json = MasterKeyJson::from_json(json)?;
        Self::from_key_json(&json, expected)
    }

    pub fn from_key_json(json: &MasterKeyJson, expected: Option<Network>) -> Result<Self, Error> {
        let secp = &SECP256K1;

        let declared: Option<Network> = json.network.as_deref().map(parse_network).transpose()?;
        let network: Network = match (declared, expected) {
            (Some(declared), Some(expected)) if declared != expected => {
                return Err(Error::WrongNetwork {
                    expected,
                    found: declared,
                })
            }
            (Some(network), _) | (None, Some(network)) => network,
            (None, None) => return Err(Error::UnknownNetwork(String::from("missing"))),
        };

        let key: ExtendedKey = match (&json.xprv, &json.mnemonic, &json.xpub) {
            (Some(xprv), _, _) => ExtendedKey::from_str(xprv)?,
            (None, Some(mnemonic), _) => {
                let seed = Seed::new(Mnemonic::from_str(mnemonic)?, json.passphrase.as_deref());
                ExtendedKey::Private(seed.to_bip32_root_key(network)?)
            }
            (None, None, Some(xpub)) => ExtendedKey::Public(
                ExtendedPubKey::from_str(xpub).map_err(bip32::Error::from)?,
            ),
            (None, None, None) => return Err(Error::MissingKey),
        };

        let mut master = Self::new(secp, key, network)?;
        master.name = json.name.clone();

        if let Some(fingerprint) = &json.fingerprint {
            let expected = Fingerprint::from_str(fingerprint)
                .map_err(|_| Error::InvalidFingerprint(fingerprint.clone()))?;
            if expected != master.fingerprint {
                return Err(Error::FingerprintMismatch {
                    expected,
                    found: master.fingerprint,
                });
            }
        }

        if let Some(xpub) = &json.xpub {
            let xpub = ExtendedPubKey::from_str(xpub).map_err(bip32::Error::from)?;
            if !same_xpub(&xpub, &master.key.xpub(secp)) || !same_chain(xpub.network, network) {
                return Err(Error::XpubMismatch);
            }
        }

        log::debug!(
            "Loaded master key {} for {}",
            master.fingerprint,
            master.network
        );

        Ok(master)
    }

    pub fn key(&self) -> &ExtendedKey {
        &self.key
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_watch_only(&self) -> bool {
        !self.key.is_private()
    }
}
