// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

//! BIP32 extended keys and key origins

use core::fmt;
use std::str::FromStr;

use bitcoin::secp256k1::{self, Secp256k1, SecretKey, Signing, Verification};
pub use bitcoin::util::bip32::{
    ChildNumber, DerivationPath, ExtendedPrivKey, ExtendedPubKey, Fingerprint,
};
use bitcoin::{Network, PublicKey};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    BIP32(#[from] bitcoin::util::bip32::Error),
    #[error("hardened step {0} can't be derived from a public key")]
    HardenedFromPublic(ChildNumber),
    #[error("private key not available")]
    NotPrivate,
    #[error("derivation index missing for a wildcard key")]
    MissingIndex,
    #[error("hardened wildcard can't be derived from a public key")]
    HardenedWildcard,
    #[error("invalid key origin: {0}")]
    InvalidOrigin(String),
}

/// Anything that can produce a BIP32 master key
pub trait Bip32 {
    type Err;

    fn to_bip32_root_key(&self, network: Network) -> Result<ExtendedPrivKey, Self::Err>;

    fn fingerprint<C>(
        &self,
        network: Network,
        secp: &Secp256k1<C>,
    ) -> Result<Fingerprint, Self::Err>
    where
        C: Signing,
    {
        let root: ExtendedPrivKey = self.to_bip32_root_key(network)?;
        Ok(root.fingerprint(secp))
    }
}

/// Extended key, with or without its private part
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKey {
    Private(ExtendedPrivKey),
    Public(ExtendedPubKey),
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private(_) => write!(f, "ExtendedKey::Private(<sensitive>)"),
            Self::Public(xpub) => write!(f, "ExtendedKey::Public({xpub})"),
        }
    }
}

impl ExtendedKey {
    /// Network encoded in the version bytes (`Bitcoin` or `Testnet`)
    pub fn network(&self) -> Network {
        match self {
            Self::Private(xprv) => xprv.network,
            Self::Public(xpub) => xpub.network,
        }
    }

    pub fn depth(&self) -> u8 {
        match self {
            Self::Private(xprv) => xprv.depth,
            Self::Public(xpub) => xpub.depth,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }

    pub fn xpub<C>(&self, secp: &Secp256k1<C>) -> ExtendedPubKey
    where
        C: Signing,
    {
        match self {
            Self::Private(xprv) => ExtendedPubKey::from_priv(secp, xprv),
            Self::Public(xpub) => *xpub,
        }
    }

    pub fn fingerprint<C>(&self, secp: &Secp256k1<C>) -> Fingerprint
    where
        C: Signing,
    {
        self.xpub(secp).fingerprint()
    }

    pub fn public_key<C>(&self, secp: &Secp256k1<C>) -> PublicKey
    where
        C: Signing,
    {
        self.xpub(secp).to_pub()
    }

    pub fn private_key(&self) -> Result<SecretKey, Error> {
        match self {
            Self::Private(xprv) => Ok(xprv.private_key),
            Self::Public(_) => Err(Error::NotPrivate),
        }
    }

    /// Derive a descendant key.
    ///
    /// Private keys derive both kinds of steps. Public keys fail on the first hardened step.
    pub fn derive<C>(&self, secp: &Secp256k1<C>, path: &DerivationPath) -> Result<Self, Error>
    where
        C: Signing + Verification,
    {
        match self {
            Self::Private(xprv) => Ok(Self::Private(xprv.derive_priv(secp, path)?)),
            Self::Public(xpub) => {
                let children: &[ChildNumber] = path.as_ref();
                if let Some(step) = children.iter().find(|child| child.is_hardened()) {
                    return Err(Error::HardenedFromPublic(*step));
                }
                Ok(Self::Public(xpub.derive_pub(secp, path)?))
            }
        }
    }
}

impl FromStr for ExtendedKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ExtendedPrivKey::from_str(s) {
            Ok(xprv) => Ok(Self::Private(xprv)),
            Err(_) => Ok(Self::Public(ExtendedPubKey::from_str(s)?)),
        }
    }
}

/// Master key fingerprint plus the path walked from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOrigin {
    pub fingerprint: Fingerprint,
    pub path: DerivationPath,
}

impl KeyOrigin {
    pub fn new(fingerprint: Fingerprint, path: DerivationPath) -> Self {
        Self { fingerprint, path }
    }
}

impl fmt::Display for KeyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fingerprint)?;
        let children: &[ChildNumber] = self.path.as_ref();
        for child in children.iter() {
            write!(f, "/{child}")?;
        }
        Ok(())
    }
}

impl FromStr for KeyOrigin {
    type Err = Error;

    /// Parse `d34db33f/48'/1'/0'/2'`, `h` is accepted as hardened marker
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let fingerprint: &str = parts.next().unwrap_or_default();
        if fingerprint.len() != 8 {
            return Err(Error::InvalidOrigin(s.to_string()));
        }
        let fingerprint =
            Fingerprint::from_str(fingerprint).map_err(|_| Error::InvalidOrigin(s.to_string()))?;
        let path: Vec<ChildNumber> = parts
            .map(ChildNumber::from_str)
            .collect::<Result<_, _>>()?;
        Ok(Self::new(fingerprint, DerivationPath::from(path)))
    }
}

/// Same chain family: mainnet on one side, any test network on the other
pub fn same_chain(a: Network, b: Network) -> bool {
    a.eq(&Network::Bitcoin) == b.eq(&Network::Bitcoin)
}

/// Compare two xpubs ignoring version bytes and position metadata
pub fn same_xpub(a: &ExtendedPubKey, b: &ExtendedPubKey) -> bool {
    a.public_key == b.public_key && a.chain_code == b.chain_code
}

pub(crate) fn public_from_secret<C>(secp: &Secp256k1<C>, secret_key: &SecretKey) -> PublicKey
where
    C: Signing,
{
    PublicKey::new(secp256k1::PublicKey::from_secret_key(secp, secret_key))
}
