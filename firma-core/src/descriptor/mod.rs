// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

//! Wallet descriptors
//!
//! Supported: `pkh`, `wpkh`, `sh(wpkh)`, `sh(multi)`, `wsh(multi)` and `sh(wsh(multi))`,
//! with `sortedmulti` accepted wherever `multi` is.

use core::fmt;
use std::collections::HashMap;
use std::str::FromStr;

use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::{EcdsaSig, Network, PublicKey, Script};
use miniscript::descriptor::{ShInner, WshInner};
use miniscript::expression::Tree;
use miniscript::{MiniscriptKey, Terminal};

pub mod key;

pub use self::key::{DescriptorKey, DescriptorPublicKey, KeyDerivation, KeyMatch, Wildcard};
use crate::bips::bip32::{self, same_chain, DerivationPath, Fingerprint};

/// Max keys in a P2SH multisig (redeem script limited to 520 bytes)
pub const MAX_PUBKEYS_LEGACY: usize = 15;
/// Max keys in a segwit multisig
pub const MAX_PUBKEYS_SEGWIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported script: {0}")]
    UnsupportedScript(String),
    #[error("invalid threshold {threshold} for {keys} keys")]
    InvalidThreshold { threshold: usize, keys: usize },
    #[error("too many keys: {keys} (max {max})")]
    TooManyKeys { keys: usize, max: usize },
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("keys from different networks")]
    MixedNetworks,
    #[error(transparent)]
    Miniscript(#[from] miniscript::Error),
    #[error(transparent)]
    Derivation(#[from] bip32::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    /// `pkh` or `sh(multi)`
    Legacy,
    /// `sh(wpkh)` or `sh(wsh(multi))`
    NestedSegwit,
    /// `wpkh` or `wsh(multi)`
    NativeSegwit,
}

impl ScriptType {
    pub fn is_segwit(&self) -> bool {
        !matches!(self, Self::Legacy)
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::NestedSegwit => write!(f, "nested segwit"),
            Self::NativeSegwit => write!(f, "native segwit"),
        }
    }
}

/// Script family, threshold and keys (in descriptor order) of a supported descriptor
struct Shape<Pk> {
    script_type: ScriptType,
    threshold: usize,
    keys: Vec<Pk>,
    multi: bool,
    sorted: bool,
}

impl<Pk> Shape<Pk> {
    fn single(script_type: ScriptType, key: Pk) -> Self {
        Self {
            script_type,
            threshold: 1,
            keys: vec![key],
            multi: false,
            sorted: false,
        }
    }

    fn multi(script_type: ScriptType, threshold: usize, keys: Vec<Pk>, sorted: bool) -> Self {
        Self {
            script_type,
            threshold,
            keys,
            multi: true,
            sorted,
        }
    }
}

fn multi_shape<Pk, Ctx>(
    script_type: ScriptType,
    ms: &miniscript::Miniscript<Pk, Ctx>,
) -> Result<Shape<Pk>, Error>
where
    Pk: MiniscriptKey,
    Ctx: miniscript::ScriptContext,
{
    match &ms.node {
        Terminal::Multi(threshold, keys) => {
            Ok(Shape::multi(script_type, *threshold, keys.clone(), false))
        }
        _ => Err(Error::UnsupportedScript(ms.to_string())),
    }
}

/// Walk the descriptor tree, keys are returned in descriptor order
fn shape<Pk>(desc: &miniscript::Descriptor<Pk>) -> Result<Shape<Pk>, Error>
where
    Pk: MiniscriptKey,
{
    use miniscript::Descriptor as D;

    match desc {
        D::Pkh(pkh) => Ok(Shape::single(ScriptType::Legacy, pkh.as_inner().clone())),
        D::Wpkh(wpkh) => Ok(Shape::single(
            ScriptType::NativeSegwit,
            wpkh.as_inner().clone(),
        )),
        D::Wsh(wsh) => match wsh.as_inner() {
            WshInner::SortedMulti(smv) => Ok(Shape::multi(
                ScriptType::NativeSegwit,
                smv.k,
                smv.pks.clone(),
                true,
            )),
            WshInner::Ms(ms) => multi_shape(ScriptType::NativeSegwit, ms),
        },
        D::Sh(sh) => match sh.as_inner() {
            ShInner::Wpkh(wpkh) => Ok(Shape::single(
                ScriptType::NestedSegwit,
                wpkh.as_inner().clone(),
            )),
            ShInner::Wsh(wsh) => match wsh.as_inner() {
                WshInner::SortedMulti(smv) => Ok(Shape::multi(
                    ScriptType::NestedSegwit,
                    smv.k,
                    smv.pks.clone(),
                    true,
                )),
                WshInner::Ms(ms) => multi_shape(ScriptType::NestedSegwit, ms),
            },
            ShInner::SortedMulti(smv) => {
                Ok(Shape::multi(ScriptType::Legacy, smv.k, smv.pks.clone(), true))
            }
            ShInner::Ms(ms) => multi_shape(ScriptType::Legacy, ms),
        },
        other => Err(Error::UnsupportedScript(format!("{:?}", other.desc_type()))),
    }
}

/// Key count and threshold limits, checked on the expression tree so the
/// error names the limit that was hit
fn check_multi(tree: &Tree, legacy: bool) -> Result<(), Error> {
    match tree.name {
        "multi" | "sortedmulti" => {
            let keys: usize = tree.args.len().saturating_sub(1);
            let max: usize = if legacy {
                MAX_PUBKEYS_LEGACY
            } else {
                MAX_PUBKEYS_SEGWIT
            };
            if keys > max {
                return Err(Error::TooManyKeys { keys, max });
            }
            if let Some(threshold) = tree.args.first() {
                if let Ok(threshold) = threshold.name.parse::<usize>() {
                    if threshold == 0 || threshold > keys {
                        return Err(Error::InvalidThreshold { threshold, keys });
                    }
                }
            }
            Ok(())
        }
        "sh" => tree.args.iter().try_for_each(|arg| check_multi(arg, true)),
        "wsh" => tree.args.iter().try_for_each(|arg| check_multi(arg, false)),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    inner: miniscript::Descriptor<DescriptorPublicKey>,
    script_type: ScriptType,
    threshold: usize,
    keys: Vec<DescriptorKey>,
    multisig: bool,
}

/// Scripts produced by a descriptor at one derivation index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedScripts {
    pub descriptor: miniscript::Descriptor<PublicKey>,
    pub script_pubkey: Script,
    pub redeem_script: Option<Script>,
    pub witness_script: Option<Script>,
    /// Keys in script order
    pub pubkeys: Vec<PublicKey>,
}

impl DerivedScripts {
    /// Script committed to by the signature hash
    pub fn script_code(&self) -> Result<Script, Error> {
        Ok(self.descriptor.script_code()?)
    }

    /// Witness and script sig satisfying the script with `sigs`
    pub fn satisfy(
        &self,
        sigs: &HashMap<PublicKey, EcdsaSig>,
    ) -> Result<(Vec<Vec<u8>>, Script), Error> {
        Ok(self.descriptor.get_satisfaction(sigs)?)
    }
}

impl Descriptor {
    pub fn script_type(&self) -> ScriptType {
        self.script_type
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn keys(&self) -> &[DescriptorKey] {
        &self.keys
    }

    pub fn is_multisig(&self) -> bool {
        self.multisig
    }

    /// `Bitcoin` or `Testnet`, as encoded in the xpubs
    pub fn network(&self) -> Network {
        self.keys
            .first()
            .map(|k| k.xkey.network)
            .unwrap_or(Network::Bitcoin)
    }

    pub fn has_wildcard(&self) -> bool {
        self.keys.iter().any(|k| k.wildcard != Wildcard::None)
    }

    /// Find the descriptor key that produced `path`
    pub fn match_key(&self, fingerprint: &Fingerprint, path: &DerivationPath) -> Option<KeyMatch> {
        self.keys
            .iter()
            .find_map(|key| key.match_path(fingerprint, path))
    }

    pub fn derive<C>(
        &self,
        secp: &Secp256k1<C>,
        key_match: &KeyMatch,
    ) -> Result<DerivedScripts, Error>
    where
        C: Verification,
    {
        let index: u32 = match key_match.index {
            Some(index) => index,
            None if self.has_wildcard() => return Err(bip32::Error::MissingIndex.into()),
            None => 0,
        };
        let descriptor: miniscript::Descriptor<PublicKey> = self
            .inner
            .derived_descriptor(secp, index)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        let script_pubkey: Script = descriptor.script_pubkey();

        let (redeem_script, witness_script) = match (self.script_type, self.multisig) {
            (ScriptType::Legacy, false) | (ScriptType::NativeSegwit, false) => (None, None),
            (ScriptType::Legacy, true) | (ScriptType::NestedSegwit, false) => {
                (Some(descriptor.explicit_script()?), None)
            }
            (ScriptType::NestedSegwit, true) => {
                let script: Script = descriptor.explicit_script()?;
                (Some(script.to_v0_p2wsh()), Some(script))
            }
            (ScriptType::NativeSegwit, true) => (None, Some(descriptor.explicit_script()?)),
        };

        let Shape {
            keys: mut pubkeys,
            sorted,
            ..
        } = shape(&descriptor)?;
        if sorted {
            pubkeys.sort_by_key(|pk| pk.to_bytes());
        }

        Ok(DerivedScripts {
            descriptor,
            script_pubkey,
            redeem_script,
            witness_script,
            pubkeys,
        })
    }
}

impl FromStr for Descriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: &str = s.trim();
        let body: &str = s.split('#').next().unwrap_or_default();
        check_multi(&Tree::from_str(body)?, false)?;

        let inner = miniscript::Descriptor::<DescriptorPublicKey>::from_str(s)?;
        let Shape {
            script_type,
            threshold,
            keys,
            multi,
            ..
        } = shape(&inner)?;
        let keys: Vec<DescriptorKey> = keys
            .into_iter()
            .map(key::check_key)
            .collect::<Result<_, _>>()?;

        if let Some(first) = keys.first() {
            if keys
                .iter()
                .any(|k| !same_chain(k.xkey.network, first.xkey.network))
            {
                return Err(Error::MixedNetworks);
            }
        }

        Ok(Self {
            inner,
            script_type,
            threshold,
            keys,
            multisig: multi,
        })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::util::bip32::ExtendedPubKey;
    use bitcoin::Address;

    use super::*;
    use crate::fixtures;
    use crate::SECP256K1;

    const WPKH: &str = "wpkh([91ef223d/84'/1'/2345']tpubDCgYuiX1p1eecECkhNc2bLSktmSDoMTj5J3v184ErUXqHTywQ7X5afv51UGfDVSaYzDWvdHhVyJ6UK8fM27EwGByWdczEERfAA9j2nzHUAj/1/*)";

    #[test]
    fn test_parse_single() {
        let desc = Descriptor::from_str(WPKH).unwrap();
        assert_eq!(desc.script_type(), ScriptType::NativeSegwit);
        assert_eq!(desc.threshold(), 1);
        assert!(!desc.is_multisig());
        assert!(desc.has_wildcard());
        assert_eq!(desc.network(), Network::Testnet);
        assert_eq!(desc.to_string(), format!("{WPKH}#tj43jnd8"));

        let with_checksum = Descriptor::from_str(&format!("{WPKH}#tj43jnd8")).unwrap();
        assert_eq!(with_checksum, desc);

        assert!(matches!(
            Descriptor::from_str(&format!("{WPKH}#tj43jnd9")),
            Err(Error::Miniscript(_))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        let keys = fixtures::cosigner_keys(3);
        for desc in [
            format!("pkh({})", keys[0]),
            format!("sh(wpkh({}))", keys[1]),
            format!("sh(multi(2,{},{},{}))", keys[0], keys[1], keys[2]),
            format!("wsh(sortedmulti(2,{},{},{}))", keys[0], keys[1], keys[2]),
            format!("sh(wsh(multi(1,{},{})))", keys[0], keys[2]),
        ] {
            let parsed = Descriptor::from_str(&desc).unwrap();
            assert_eq!(Descriptor::from_str(&parsed.to_string()).unwrap(), parsed);
            assert!(parsed.to_string().starts_with(&desc));
        }
    }

    #[test]
    fn test_invalid_descriptors() {
        let keys = fixtures::cosigner_keys(2);
        let cases = [
            format!("tr({})", keys[0]),
            format!("wsh(pkh({}))", keys[0]),
            format!("wsh(multi(3,{},{}))", keys[0], keys[1]),
            format!("wsh(multi(0,{},{}))", keys[0], keys[1]),
            format!("wsh(multi(x,{},{}))", keys[0], keys[1]),
            format!("wpkh({})", keys[0]).replace(')', ""),
            format!("wpkh({}))", keys[0]),
            format!("wpkh({})extra", keys[0]),
        ];
        for desc in cases {
            assert!(Descriptor::from_str(&desc).is_err(), "{desc}");
        }

        let err = Descriptor::from_str(&format!("wsh(multi(3,{},{}))", keys[0], keys[1]));
        assert!(matches!(
            err,
            Err(Error::InvalidThreshold {
                threshold: 3,
                keys: 2
            })
        ));
    }

    #[test]
    fn test_single_key_required_to_be_xpub() {
        let desc =
            "wpkh(02e6642fd69bd211f93f7f1f36ca51a26a5290eb2dd1b0d8279a87bb0d480c8443)";
        assert!(matches!(
            Descriptor::from_str(desc),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_too_many_keys() {
        let keys: Vec<String> = fixtures::cosigner_keys(16)
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        let legacy = format!("sh(multi(2,{}))", keys.join(","));
        assert!(matches!(
            Descriptor::from_str(&legacy),
            Err(Error::TooManyKeys { keys: 16, max: 15 })
        ));
        let segwit = format!("wsh(multi(2,{}))", keys.join(","));
        assert!(Descriptor::from_str(&segwit).is_ok());
    }

    #[test]
    fn test_mixed_networks() {
        let testnet = fixtures::cosigner_keys(1).remove(0);
        let mainnet = match testnet.clone() {
            DescriptorPublicKey::XPub(mut xkey) => {
                xkey.xkey = ExtendedPubKey {
                    network: Network::Bitcoin,
                    ..xkey.xkey
                };
                DescriptorPublicKey::XPub(xkey)
            }
            other => other,
        };
        let desc = format!("wsh(multi(1,{testnet},{mainnet}))");
        assert!(matches!(
            Descriptor::from_str(&desc),
            Err(Error::MixedNetworks)
        ));
    }

    #[test]
    fn test_derive_single() {
        let desc = Descriptor::from_str(WPKH).unwrap();
        let derived = desc.derive(&SECP256K1, &KeyMatch::new(Some(0))).unwrap();
        assert!(derived.script_pubkey.is_v0_p2wpkh());
        assert!(derived.redeem_script.is_none());
        assert_eq!(derived.pubkeys.len(), 1);

        let nested = Descriptor::from_str(&format!("sh({WPKH})")).unwrap();
        let nested = nested.derive(&SECP256K1, &KeyMatch::new(Some(0))).unwrap();
        assert!(nested.script_pubkey.is_p2sh());
        assert_eq!(nested.redeem_script, Some(derived.script_pubkey));

        let address = Address::from_script(&nested.script_pubkey, Network::Testnet).unwrap();
        assert!(address.to_string().starts_with('2'));

        assert!(matches!(
            desc.derive(&SECP256K1, &KeyMatch::default()),
            Err(Error::Derivation(bip32::Error::MissingIndex))
        ));
    }

    #[test]
    fn test_derive_sortedmulti() {
        let keys = fixtures::cosigner_keys(3);
        let multi = format!("wsh(multi(2,{},{},{}))", keys[2], keys[0], keys[1]);
        let sorted = multi.replace("multi(", "sortedmulti(");

        let key_match = KeyMatch::new(Some(5));
        let multi = Descriptor::from_str(&multi).unwrap().derive(&SECP256K1, &key_match).unwrap();
        let sorted = Descriptor::from_str(&sorted).unwrap().derive(&SECP256K1, &key_match).unwrap();

        let mut expected = multi.pubkeys.clone();
        expected.sort_by_key(|pk| pk.to_bytes());
        assert_eq!(sorted.pubkeys, expected);
        assert!(sorted.script_pubkey.is_v0_p2wsh());
        assert_eq!(
            sorted.witness_script.as_ref().map(|s| s.to_v0_p2wsh()),
            Some(sorted.script_pubkey.clone())
        );
        assert_eq!(sorted.script_code().unwrap(), sorted.witness_script.unwrap());
    }

    #[test]
    fn test_derive_nested_multi() {
        let keys = fixtures::cosigner_keys(2);
        let desc = Descriptor::from_str(&format!("sh(wsh(multi(1,{},{})))", keys[0], keys[1]))
            .unwrap()
            .derive(&SECP256K1, &KeyMatch::new(Some(1)))
            .unwrap();
        let witness_script = desc.witness_script.clone().unwrap();
        assert_eq!(desc.redeem_script, Some(witness_script.to_v0_p2wsh()));
        assert_eq!(desc.script_pubkey, witness_script.to_v0_p2wsh().to_p2sh());
    }

    #[test]
    fn test_match_key() {
        let keys = fixtures::cosigner_keys(2);
        let desc = Descriptor::from_str(&format!("wsh(multi(1,{},{}))", keys[0], keys[1])).unwrap();
        let second: &DescriptorKey = &desc.keys()[1];
        let fingerprint = second.origin_fingerprint();
        let path = second.full_path(&KeyMatch::new(Some(9))).unwrap();
        assert_eq!(
            desc.match_key(&fingerprint, &path),
            Some(KeyMatch::new(Some(9)))
        );

        // Unknown master key
        let unknown = Fingerprint::from_str("deadbeef").unwrap();
        assert_eq!(desc.match_key(&unknown, &path), None);

        // Right master key, path outside every descriptor branch
        let change = second.origin_path().child(bip32::ChildNumber::from_normal_idx(1).unwrap());
        let change = change.child(bip32::ChildNumber::from_normal_idx(9).unwrap());
        assert_eq!(desc.match_key(&fingerprint, &change), None);
    }
}
