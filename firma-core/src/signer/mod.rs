// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

//! PSBT signer

use bitcoin::secp256k1::{self, All, Message, Secp256k1, SecretKey};
use bitcoin::util::sighash::{self, SighashCache};
use bitcoin::{EcdsaSig, EcdsaSighashType, Network, OutPoint, PublicKey, Transaction, TxOut};

mod finalize;

use self::finalize::finalize_input;
use crate::bips::bip32::{
    self, public_from_secret, same_chain, same_xpub, Fingerprint, KeyOrigin,
};
use crate::descriptor::{self, DerivedScripts, Descriptor, KeyDerivation, KeyMatch, ScriptType};
use crate::keys::MasterKey;
use crate::psbt::{Input, PartiallySignedTransaction, Psbt, PsbtInput};
use crate::report::{InputStatus, SigningReport, SkipReason};
use crate::SECP256K1;

/// Conditions that make the whole PSBT unsignable with the given key and descriptors
#[derive(Debug, thiserror::Error)]
pub enum Abort {
    #[error("key network {key} doesn't match descriptor network {descriptor}")]
    NetworkMismatch { key: Network, descriptor: Network },
    #[error("no descriptor key belongs to master key {0}")]
    KeyNotInDescriptor(Fingerprint),
    #[error("descriptor xpub at [{0}] doesn't match the master key")]
    XpubMismatch(KeyOrigin),
    #[error("nothing to sign: no input has a derivation from {0}")]
    NothingToSign(Fingerprint),
    #[error("no descriptor provided")]
    NoDescriptor,
    #[error("non_witness_utxo of input {0} doesn't match its prevout")]
    InvalidUtxo(usize),
    #[error("non-standard sighash type {0:#x}")]
    NonStandardSighash(u32),
    #[error(transparent)]
    Sighash(#[from] sighash::Error),
    #[error(transparent)]
    Secp256k1(#[from] secp256k1::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing UTXO data for input {index}")]
    MissingUtxoData { index: usize },
    #[error(transparent)]
    Derivation(#[from] bip32::Error),
    #[error(transparent)]
    Descriptor(#[from] descriptor::Error),
    #[error(transparent)]
    Abort(#[from] Abort),
}

impl From<sighash::Error> for Error {
    fn from(e: sighash::Error) -> Self {
        Self::Abort(Abort::Sighash(e))
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Self::Abort(Abort::Secp256k1(e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOptions {
    /// Finalize inputs that reach the descriptor threshold
    pub finalize: bool,
    /// For inputs without a derivation of ours, look for the spent script
    /// among the descriptor addresses `0..=limit`
    pub derivation_scan: Option<u32>,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            finalize: true,
            derivation_scan: None,
        }
    }
}

/// Input-level view of a descriptor match
struct Candidate<'a> {
    pubkey: PublicKey,
    origin: KeyOrigin,
    descriptor: &'a Descriptor,
    key_match: KeyMatch,
}

pub struct Signer<'a> {
    master: &'a MasterKey,
    descriptors: Vec<&'a Descriptor>,
    options: SignOptions,
}

impl<'a> Signer<'a> {
    pub fn new(master: &'a MasterKey, descriptor: &'a Descriptor, options: SignOptions) -> Self {
        Self {
            master,
            descriptors: vec![descriptor],
            options,
        }
    }

    /// Signer for a wallet with more than one descriptor (ex. receive and change)
    pub fn from_descriptors(
        master: &'a MasterKey,
        descriptors: &'a [Descriptor],
        options: SignOptions,
    ) -> Self {
        Self {
            master,
            descriptors: descriptors.iter().collect(),
            options,
        }
    }

    fn fingerprint(&self) -> Fingerprint {
        self.master.fingerprint()
    }

    /// Checks that make the whole PSBT out of scope for this key
    fn pre_check(&self, psbt: &PartiallySignedTransaction) -> Result<(), Error> {
        let secp: &Secp256k1<All> = &SECP256K1;
        let fingerprint = self.fingerprint();

        if self.descriptors.is_empty() {
            return Err(Abort::NoDescriptor.into());
        }

        if self.master.is_watch_only() {
            return Err(bip32::Error::NotPrivate.into());
        }

        for descriptor in self.descriptors.iter() {
            if !same_chain(self.master.network(), descriptor.network()) {
                return Err(Abort::NetworkMismatch {
                    key: self.master.network(),
                    descriptor: descriptor.network(),
                }
                .into());
            }
        }

        let mut found: bool = false;
        for key in self
            .descriptors
            .iter()
            .flat_map(|d| d.keys())
            .filter(|k| k.origin_fingerprint() == fingerprint)
        {
            found = true;
            let origin_path = key.origin_path();
            let xpub = self.master.key().derive(secp, &origin_path)?.xpub(secp);
            if !same_xpub(&xpub, &key.xkey) {
                return Err(Abort::XpubMismatch(KeyOrigin::new(fingerprint, origin_path)).into());
            }
        }
        if !found {
            return Err(Abort::KeyNotInDescriptor(fingerprint).into());
        }

        let has_work = self.options.derivation_scan.is_some()
            || psbt.inputs.iter().any(|input| {
                input.is_finalized()
                    || input
                        .bip32_derivation
                        .values()
                        .any(|(fp, _)| *fp == fingerprint)
            });
        if !has_work {
            return Err(Abort::NothingToSign(fingerprint).into());
        }

        Ok(())
    }

    /// Sign every input of `psbt` we are responsible for.
    ///
    /// On error the PSBT may contain signatures added before the failure:
    /// callers that persist it must work on a copy.
    pub fn sign(&self, psbt: &mut PartiallySignedTransaction) -> Result<SigningReport, Error> {
        self.pre_check(psbt)?;

        let before: Vec<u8> = psbt.as_bytes();
        let tx: Transaction = psbt.unsigned_tx.clone();
        let mut cache = SighashCache::new(&tx);
        let mut report = SigningReport::default();

        for (index, input) in psbt.inputs.iter_mut().enumerate() {
            let (status, finalized) = self.sign_input(&tx, &mut cache, index, input)?;
            report.push(index, status, finalized);
        }

        report.finalized = psbt.is_finalized();
        report.fee = psbt.fee().ok();
        report.modified = psbt.as_bytes() != before;

        log::info!(
            "Signed {} inputs, {} already signed, {} skipped",
            report.signed,
            report.already_signed,
            report.skipped
        );

        Ok(report)
    }

    fn candidates<'d>(&'d self, input: &Input) -> Vec<Candidate<'d>> {
        let fingerprint = self.fingerprint();
        input
            .bip32_derivation
            .iter()
            .filter(|(_, (fp, _))| *fp == fingerprint)
            .filter_map(|(pubkey, (_, path))| {
                self.descriptors.iter().find_map(|descriptor| {
                    descriptor
                        .match_key(&fingerprint, path)
                        .map(|key_match| Candidate {
                            pubkey: PublicKey::new(*pubkey),
                            origin: KeyOrigin::new(fingerprint, path.clone()),
                            descriptor: *descriptor,
                            key_match,
                        })
                })
            })
            .collect()
    }

    /// Candidates found deriving the descriptors up to `limit`, for inputs
    /// whose updater left out our derivations
    fn scan_candidates<'d>(
        &'d self,
        input: &Input,
        index: usize,
        prevout: OutPoint,
        limit: u32,
    ) -> Result<Vec<Candidate<'d>>, Error> {
        let secp: &Secp256k1<All> = &SECP256K1;
        let fingerprint = self.fingerprint();

        for descriptor in self.descriptors.iter() {
            let utxo: TxOut = match spent_utxo(input, index, prevout, descriptor.script_type()) {
                Ok(utxo) => utxo,
                Err(Error::MissingUtxoData { .. }) => continue,
                Err(e) => return Err(e),
            };
            let last: u32 = if descriptor.has_wildcard() { limit } else { 0 };
            for i in 0..=last {
                let key_match = KeyMatch::new(descriptor.has_wildcard().then_some(i));
                let derived = descriptor.derive(secp, &key_match)?;
                if derived.script_pubkey != utxo.script_pubkey {
                    continue;
                }
                log::debug!("Input #{index} found at index {i} of {descriptor}");
                return descriptor
                    .keys()
                    .iter()
                    .filter(|key| key.origin_fingerprint() == fingerprint)
                    .map(|key| -> Result<Candidate<'d>, Error> {
                        Ok(Candidate {
                            pubkey: key.derive_public(secp, &key_match)?,
                            origin: KeyOrigin::new(fingerprint, key.full_path(&key_match)?),
                            descriptor: *descriptor,
                            key_match,
                        })
                    })
                    .collect();
            }
        }

        Ok(Vec::new())
    }

    fn sign_input(
        &self,
        tx: &Transaction,
        cache: &mut SighashCache<&Transaction>,
        index: usize,
        input: &mut Input,
    ) -> Result<(InputStatus, bool), Error> {
        let secp: &Secp256k1<All> = &SECP256K1;

        if input.is_finalized() {
            log::debug!("Input #{index} already finalized");
            return Ok((InputStatus::AlreadyFinalized, true));
        }

        let prevout: OutPoint = tx
            .input
            .get(index)
            .map(|txin| txin.previous_output)
            .ok_or(Error::MissingUtxoData { index })?;

        let mut candidates = self.candidates(input);
        if let (true, Some(limit)) = (candidates.is_empty(), self.options.derivation_scan) {
            candidates = self.scan_candidates(input, index, prevout, limit)?;
        }
        let script_type: ScriptType = match candidates.first() {
            Some(candidate) => candidate.descriptor.script_type(),
            None => {
                log::debug!("Input #{index} not applicable to {}", self.fingerprint());
                return Ok((InputStatus::Skipped(SkipReason::NotApplicable), false));
            }
        };

        let utxo: TxOut = spent_utxo(input, index, prevout, script_type)?;

        let mut status: Option<InputStatus> = None;
        let mut matched: Option<(&Descriptor, DerivedScripts)> = None;

        for candidate in candidates.iter() {
            let derived = candidate.descriptor.derive(secp, &candidate.key_match)?;
            if derived.script_pubkey != utxo.script_pubkey {
                log::warn!(
                    "Input #{index}: descriptor script at [{}] doesn't match the spent output",
                    candidate.origin
                );
                status = status.or(Some(InputStatus::Skipped(SkipReason::ScriptMismatch)));
                continue;
            }

            let secret_key: SecretKey = self
                .master
                .key()
                .derive(secp, &candidate.origin.path)?
                .private_key()?;
            if public_from_secret(secp, &secret_key) != candidate.pubkey
                || !derived.pubkeys.contains(&candidate.pubkey)
            {
                log::warn!(
                    "Input #{index}: key at [{}] doesn't match the recorded public key",
                    candidate.origin
                );
                if !matches!(status, Some(InputStatus::Signed | InputStatus::AlreadySigned)) {
                    status = Some(InputStatus::Skipped(SkipReason::KeyMismatch));
                }
                continue;
            }

            if input.partial_sigs.contains_key(&candidate.pubkey) {
                log::debug!("Input #{index} already signed by [{}]", candidate.origin);
                if !matches!(status, Some(InputStatus::Signed)) {
                    status = Some(InputStatus::AlreadySigned);
                }
            } else {
                let hash_ty: EcdsaSighashType = match input.sighash_type {
                    Some(sighash_type) => sighash_type
                        .ecdsa_hash_ty()
                        .map_err(|_| Abort::NonStandardSighash(sighash_type.to_u32()))?,
                    None => EcdsaSighashType::All,
                };
                let msg = digest(cache, index, script_type, &derived, utxo.value, hash_ty)?;
                let sig = secp.sign_ecdsa(&msg, &secret_key);
                input
                    .partial_sigs
                    .insert(candidate.pubkey, EcdsaSig { sig, hash_ty });
                log::info!("Input #{index} signed with [{}]", candidate.origin);
                status = Some(InputStatus::Signed);
            }

            if matched.is_none() {
                matched = Some((candidate.descriptor, derived));
            }
        }

        let status = status.unwrap_or(InputStatus::Skipped(SkipReason::NotApplicable));

        let mut finalized: bool = false;
        if let Some((descriptor, derived)) = matched {
            let sigs = valid_signatures(cache, index, input, script_type, &derived, utxo.value)?;
            log::debug!(
                "Input #{index} has {}/{} valid signatures",
                sigs.len(),
                descriptor.threshold()
            );
            if self.options.finalize && sigs.len() >= descriptor.threshold() {
                finalize_input(input, &derived, &sigs[..descriptor.threshold()])?;
                log::info!("Input #{index} finalized");
                finalized = true;
            }
        }

        Ok((status, finalized))
    }
}

fn spent_utxo(
    input: &Input,
    index: usize,
    prevout: OutPoint,
    script_type: ScriptType,
) -> Result<TxOut, Error> {
    match (&input.non_witness_utxo, &input.witness_utxo) {
        (Some(prev_tx), _) => {
            if prev_tx.txid() != prevout.txid {
                return Err(Abort::InvalidUtxo(index).into());
            }
            prev_tx
                .output
                .get(prevout.vout as usize)
                .cloned()
                .ok_or_else(|| Abort::InvalidUtxo(index).into())
        }
        (None, Some(txout)) if script_type.is_segwit() => Ok(txout.clone()),
        _ => Err(Error::MissingUtxoData { index }),
    }
}

/// Message committed to by a signature over the derived script
fn digest(
    cache: &mut SighashCache<&Transaction>,
    index: usize,
    script_type: ScriptType,
    derived: &DerivedScripts,
    value: u64,
    hash_ty: EcdsaSighashType,
) -> Result<Message, Error> {
    let script_code = derived.script_code()?;
    let sighash = if script_type.is_segwit() {
        cache.segwit_signature_hash(index, &script_code, value, hash_ty)?
    } else {
        cache.legacy_signature_hash(index, &script_code, hash_ty.to_u32())?
    };
    Ok(Message::from_slice(&sighash[..])?)
}

/// Signatures of script keys that verify, in script order
fn valid_signatures(
    cache: &mut SighashCache<&Transaction>,
    index: usize,
    input: &Input,
    script_type: ScriptType,
    derived: &DerivedScripts,
    value: u64,
) -> Result<Vec<(PublicKey, EcdsaSig)>, Error> {
    let secp: &Secp256k1<All> = &SECP256K1;
    let mut sigs = Vec::new();
    for pubkey in derived.pubkeys.iter() {
        if let Some(sig) = input.partial_sigs.get(pubkey) {
            let msg = digest(cache, index, script_type, derived, value, sig.hash_ty)?;
            if secp.verify_ecdsa(&msg, &sig.sig, &pubkey.inner).is_ok() {
                sigs.push((*pubkey, *sig));
            } else {
                log::warn!("Input #{index}: invalid signature for {pubkey}");
            }
        }
    }
    Ok(sigs)
}
