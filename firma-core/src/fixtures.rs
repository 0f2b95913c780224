// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

//! Deterministic keys, descriptors and PSBTs for unit tests

use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::util::bip32::{DerivationPath, ExtendedPrivKey, ExtendedPubKey};
use bitcoin::{
    Network, OutPoint, PackedLockTime, Script, Sequence, Transaction, TxIn, TxOut, WPubkeyHash,
    Witness,
};
use serde_json::json;

use crate::bips::bip32::{ExtendedKey, KeyOrigin};
use crate::descriptor::{Descriptor, DescriptorPublicKey, KeyDerivation, KeyMatch};
use crate::keys::MasterKey;
use crate::psbt::PartiallySignedTransaction;
use crate::SECP256K1;

/// Single input wpkh PSBT, key at `9bf4354b/84'/1'/0'/0/0` of [`WPKH_MNEMONIC`]
pub const WPKH_VECTOR: &str = "cHNidP8BAFICAAAAATjFB9Xkau6+MTmNTT9GN6i299X9n9MSQhVVMVegw8qOAAAAAAD9////AcAHAAAAAAAAFgAUAhYIdK3p2Bvf/ZnzIYQcWWZkxCJ4HiUATwEENYfPA+UBpeaAAAAAVd9MbQ78ZD7Ie5K8FXctxNRCrS4DNFhPiSzC2CpygWICsOropyXycdL0H0uI5TUbJL1w8/detLdnP5WxGGUZ+5UQm/Q1S1QAAIABAACAAAAAgAABAHECAAAAAYqdaqOD/k1QaGShhL4ilryMhXgOJu+cFcKFAUMZQ+wrAAAAAAD9////Ai4IAAAAAAAAFgAUqjLdU2PqfvD/lSvnNLJZ0ab4kUPxCQAAAAAAABYAFO9WcMNPGiI5MjypE7Ku0dT1LOgRI9wkAAEBHy4IAAAAAAAAFgAUqjLdU2PqfvD/lSvnNLJZ0ab4kUMBAwQBAAAAIgYCyh1DqpGE/SatxQ86lKeUBXZ1BGpZuwNnGiGq9pDdTbkYm/Q1S1QAAIABAACAAAAAgAAAAAAAAAAAAAA=";

pub const WPKH_MNEMONIC: &str = "easy uncover favorite crystal bless differ energy seat ecology match carry group refuse together chat observe hidden glad brave month diesel sustain depth salt";

pub const MULTISIG_PATH: &str = "m/48'/1'/0'/2'";

pub const UTXO_VALUE: u64 = 10_000;
pub const FEE: u64 = 1_000;

pub fn master(seed: u8) -> ExtendedPrivKey {
    ExtendedPrivKey::new_master(Network::Testnet, &[seed; 32]).unwrap()
}

pub fn master_key(seed: u8) -> MasterKey {
    MasterKey::new(
        &SECP256K1,
        ExtendedKey::Private(master(seed)),
        Network::Testnet,
    )
    .unwrap()
}

/// `PRIVATE.json` content
pub fn key_json(seed: u8) -> String {
    let xprv = master(seed);
    json!({
        "xprv": xprv.to_string(),
        "network": "testnet",
        "fingerprint": xprv.fingerprint(&SECP256K1).to_string(),
    })
    .to_string()
}

/// Origin and account xpub at `path` for the master built from `seed`
pub fn account_xpub(seed: u8, path: &str) -> (KeyOrigin, ExtendedPubKey) {
    let xprv = master(seed);
    let path = DerivationPath::from_str(path).unwrap();
    let account = xprv.derive_priv(&SECP256K1, &path).unwrap();
    let xpub = ExtendedPubKey::from_priv(&SECP256K1, &account);
    (KeyOrigin::new(xprv.fingerprint(&SECP256K1), path), xpub)
}

/// `[fingerprint/path]xpub/0/*` for the master built from `seed`
pub fn account_key(seed: u8, path: &str) -> DescriptorPublicKey {
    let (origin, xpub) = account_xpub(seed, path);
    DescriptorPublicKey::from_str(&format!("[{origin}]{xpub}/0/*")).unwrap()
}

/// Multisig keys of masters built from seeds `1..=n`
pub fn cosigner_keys(n: usize) -> Vec<DescriptorPublicKey> {
    (1..=n as u8)
        .map(|seed| account_key(seed, MULTISIG_PATH))
        .collect()
}

pub fn multisig(threshold: usize, n: usize) -> Descriptor {
    let keys: Vec<String> = cosigner_keys(n).iter().map(|k| k.to_string()).collect();
    Descriptor::from_str(&format!("wsh(sortedmulti({threshold},{}))", keys.join(","))).unwrap()
}

pub fn single(script: &str, seed: u8) -> Descriptor {
    let key = account_key(seed, "m/84'/1'/0'");
    Descriptor::from_str(&script.replace("KEY", &key.to_string())).unwrap()
}

fn txin(previous_output: OutPoint) -> TxIn {
    TxIn {
        previous_output,
        script_sig: Script::new(),
        sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
        witness: Witness::default(),
    }
}

pub fn empty_psbt(inputs: usize, outputs: usize) -> PartiallySignedTransaction {
    let tx = Transaction {
        version: 2,
        lock_time: PackedLockTime::ZERO,
        input: (0..inputs)
            .map(|i| {
                txin(OutPoint {
                    vout: i as u32,
                    ..OutPoint::null()
                })
            })
            .collect(),
        output: (0..outputs)
            .map(|_| TxOut {
                value: 1_000,
                script_pubkey: Script::new(),
            })
            .collect(),
    };
    PartiallySignedTransaction::from_unsigned_tx(tx).unwrap()
}

/// PSBT spending one UTXO per `(descriptor, index)` pair, with full updater data
pub fn funded_psbt(spends: &[(&Descriptor, u32)]) -> PartiallySignedTransaction {
    let mut funding: Vec<Transaction> = Vec::new();
    for (i, (descriptor, index)) in spends.iter().enumerate() {
        let derived = descriptor
            .derive(&SECP256K1, &KeyMatch::new(Some(*index)))
            .unwrap();
        funding.push(Transaction {
            version: 2,
            lock_time: PackedLockTime(i as u32),
            input: vec![txin(OutPoint::null())],
            output: vec![TxOut {
                value: UTXO_VALUE,
                script_pubkey: derived.script_pubkey,
            }],
        });
    }

    let tx = Transaction {
        version: 2,
        lock_time: PackedLockTime::ZERO,
        input: funding
            .iter()
            .map(|prev| txin(OutPoint::new(prev.txid(), 0)))
            .collect(),
        output: vec![TxOut {
            value: UTXO_VALUE * spends.len() as u64 - FEE,
            script_pubkey: Script::new_v0_p2wpkh(&WPubkeyHash::hash(b"destination")),
        }],
    };
    let mut psbt = PartiallySignedTransaction::from_unsigned_tx(tx).unwrap();

    for ((input, (descriptor, index)), prev) in psbt
        .inputs
        .iter_mut()
        .zip(spends.iter())
        .zip(funding.into_iter())
    {
        let key_match = KeyMatch::new(Some(*index));
        let derived = descriptor.derive(&SECP256K1, &key_match).unwrap();
        if descriptor.script_type().is_segwit() {
            input.witness_utxo = Some(prev.output[0].clone());
        }
        input.non_witness_utxo = Some(prev);
        input.redeem_script = derived.redeem_script;
        input.witness_script = derived.witness_script;
        for key in descriptor.keys() {
            let pubkey = key.derive_public(&SECP256K1, &key_match).unwrap();
            let source = (
                key.origin_fingerprint(),
                key.full_path(&key_match).unwrap(),
            );
            input.bip32_derivation.insert(pubkey.inner, source);
        }
    }

    psbt
}
