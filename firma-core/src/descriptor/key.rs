// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::PublicKey;
pub use miniscript::descriptor::{DescriptorPublicKey, DescriptorXKey, Wildcard};

use super::Error;
use crate::bips::bip32::{self, ChildNumber, DerivationPath, ExtendedPubKey, Fingerprint};

/// `[fingerprint/path]xpub/steps/*`
pub type DescriptorKey = DescriptorXKey<ExtendedPubKey>;

/// Position of a derived key inside a descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyMatch {
    /// Wildcard index
    pub index: Option<u32>,
}

impl KeyMatch {
    pub fn new(index: Option<u32>) -> Self {
        Self { index }
    }
}

/// Origin and derivation of a descriptor xpub
pub trait KeyDerivation {
    /// Fingerprint of the master key this xpub comes from
    fn origin_fingerprint(&self) -> Fingerprint;

    /// Path from the master key to the xpub
    fn origin_path(&self) -> DerivationPath;

    /// Check if a full derivation path (as found in a PSBT) was produced by this key
    fn match_path(&self, fingerprint: &Fingerprint, path: &DerivationPath) -> Option<KeyMatch>;

    /// Path from the master key for a given match
    fn full_path(&self, key_match: &KeyMatch) -> Result<DerivationPath, bip32::Error>;

    fn derive_public<C>(
        &self,
        secp: &Secp256k1<C>,
        key_match: &KeyMatch,
    ) -> Result<PublicKey, bip32::Error>
    where
        C: Verification;
}

impl KeyDerivation for DescriptorKey {
    fn origin_fingerprint(&self) -> Fingerprint {
        match &self.origin {
            Some((fingerprint, _)) => *fingerprint,
            None => self.xkey.fingerprint(),
        }
    }

    fn origin_path(&self) -> DerivationPath {
        match &self.origin {
            Some((_, path)) => path.clone(),
            None => DerivationPath::master(),
        }
    }

    fn match_path(&self, fingerprint: &Fingerprint, path: &DerivationPath) -> Option<KeyMatch> {
        if self.origin_fingerprint().ne(fingerprint) {
            return None;
        }

        let origin_path = self.origin_path();
        let prefix: &[ChildNumber] = origin_path.as_ref();
        let steps: &[ChildNumber] = self.derivation_path.as_ref();
        let children: &[ChildNumber] = path.as_ref();
        let rest: &[ChildNumber] = children.strip_prefix(prefix)?.strip_prefix(steps)?;

        match (self.wildcard, rest) {
            (Wildcard::None, []) => Some(KeyMatch::new(None)),
            (Wildcard::Unhardened, [ChildNumber::Normal { index }]) => {
                Some(KeyMatch::new(Some(*index)))
            }
            _ => None,
        }
    }

    fn full_path(&self, key_match: &KeyMatch) -> Result<DerivationPath, bip32::Error> {
        let path: DerivationPath = self.origin_path().extend(&self.derivation_path);
        match self.wildcard {
            Wildcard::None => Ok(path),
            Wildcard::Unhardened => {
                let index: u32 = key_match.index.ok_or(bip32::Error::MissingIndex)?;
                Ok(path.child(ChildNumber::from_normal_idx(index)?))
            }
            Wildcard::Hardened => Err(bip32::Error::HardenedWildcard),
        }
    }

    fn derive_public<C>(
        &self,
        secp: &Secp256k1<C>,
        key_match: &KeyMatch,
    ) -> Result<PublicKey, bip32::Error>
    where
        C: Verification,
    {
        let mut path: DerivationPath = self.derivation_path.clone();
        match self.wildcard {
            Wildcard::None => (),
            Wildcard::Unhardened => {
                let index: u32 = key_match.index.ok_or(bip32::Error::MissingIndex)?;
                path = path.child(ChildNumber::from_normal_idx(index)?);
            }
            Wildcard::Hardened => return Err(bip32::Error::HardenedWildcard),
        }
        Ok(self.xkey.derive_pub(secp, &path)?.to_pub())
    }
}

/// Only xpubs with unhardened steps can be derived without the master key
pub(crate) fn check_key(key: DescriptorPublicKey) -> Result<DescriptorKey, Error> {
    let xkey: DescriptorKey = match key {
        DescriptorPublicKey::XPub(xkey) => xkey,
        other => {
            return Err(Error::InvalidKey(format!(
                "`{other}` is not an extended public key"
            )))
        }
    };
    if xkey.wildcard == Wildcard::Hardened {
        return Err(Error::InvalidKey(String::from(
            "hardened wildcard can't be derived from an xpub",
        )));
    }
    let steps: &[ChildNumber] = xkey.derivation_path.as_ref();
    if let Some(step) = steps.iter().find(|child| child.is_hardened()) {
        return Err(Error::InvalidKey(format!(
            "hardened step `{step}` can't be derived from an xpub"
        )));
    }
    Ok(xkey)
}
