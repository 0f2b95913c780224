// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use core::fmt;

use bip39::Mnemonic;
use bitcoin::Network;

use crate::bips::bip32::{self, Bip32, ExtendedPrivKey};

/// BIP39 mnemonic with its optional passphrase
#[derive(Clone, Eq, PartialEq)]
pub struct Seed {
    mnemonic: Mnemonic,
    passphrase: Option<String>,
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<sensitive>")
    }
}

impl Drop for Seed {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl Seed {
    pub fn new<S>(mnemonic: Mnemonic, passphrase: Option<S>) -> Self
    where
        S: Into<String>,
    {
        Self {
            mnemonic,
            passphrase: passphrase.map(|p| p.into()),
        }
    }

    pub fn from_mnemonic(mnemonic: Mnemonic) -> Self {
        Self {
            mnemonic,
            passphrase: None,
        }
    }

    /// Overwrite the mnemonic and the passphrase in place
    fn wipe(&mut self) {
        if let Ok(blank) = Mnemonic::from_entropy(&[0u8; 16]) {
            self.mnemonic = blank;
        }
        if let Some(passphrase) = self.passphrase.as_mut() {
            let len: usize = passphrase.len();
            passphrase.clear();
            passphrase.extend(std::iter::repeat('\0').take(len));
        }
        self.passphrase = None;
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.mnemonic
            .to_seed(self.passphrase.as_deref().unwrap_or_default())
    }
}

impl Bip32 for Seed {
    type Err = bip32::Error;

    /// Master keys only encode mainnet or testnet, so any test network maps to `Testnet`
    fn to_bip32_root_key(&self, network: Network) -> Result<ExtendedPrivKey, Self::Err> {
        let network = match network {
            Network::Bitcoin => Network::Bitcoin,
            _ => Network::Testnet,
        };
        Ok(ExtendedPrivKey::new_master(network, &self.to_bytes())?)
    }
}
