// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use std::fs;
use std::path::{Path, PathBuf};

use bitcoin::Network;
use serde_json::{json, Value};

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::keys::MasterKey;
use crate::report::SigningReport;
use crate::signer::{SignOptions, Signer};
use crate::types::{PsbtFile, WalletJson};
use crate::util::dir;

/// Key, wallet and PSBT files to sign with. Relative paths are resolved against `datadir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub datadir: PathBuf,
    pub key_file: PathBuf,
    pub wallet_file: PathBuf,
    pub psbt_file: PathBuf,
    /// Network the key file must declare
    pub network: Option<Network>,
    pub options: SignOptions,
}

impl SignRequest {
    pub fn new<D, K, W, P>(datadir: D, key_file: K, wallet_file: W, psbt_file: P) -> Self
    where
        D: AsRef<Path>,
        K: AsRef<Path>,
        W: AsRef<Path>,
        P: AsRef<Path>,
    {
        Self {
            datadir: datadir.as_ref().to_path_buf(),
            key_file: key_file.as_ref().to_path_buf(),
            wallet_file: wallet_file.as_ref().to_path_buf(),
            psbt_file: psbt_file.as_ref().to_path_buf(),
            network: None,
            options: SignOptions::default(),
        }
    }

    pub fn network(self, network: Network) -> Self {
        Self {
            network: Some(network),
            ..self
        }
    }

    pub fn finalize(self, finalize: bool) -> Self {
        Self {
            options: SignOptions {
                finalize,
                ..self.options
            },
            ..self
        }
    }

    /// Look for unannotated inputs among the first `limit + 1` addresses
    pub fn derivation_scan(self, limit: Option<u32>) -> Self {
        Self {
            options: SignOptions {
                derivation_scan: limit,
                ..self.options
            },
            ..self
        }
    }
}

pub fn sign_files(request: &SignRequest) -> Result<SigningReport> {
    if !request.datadir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("datadir {} not found", request.datadir.display()),
        )));
    }

    let key_file = dir::resolve(&request.datadir, &request.key_file);
    let wallet_file = dir::resolve(&request.datadir, &request.wallet_file);
    let psbt_file = dir::resolve(&request.datadir, &request.psbt_file);

    let master = MasterKey::from_file(&key_file, request.network)?;
    let wallet = WalletJson::from_json(fs::read_to_string(&wallet_file)?)?;
    let descriptors: Vec<Descriptor> = wallet.descriptors()?;
    log::debug!(
        "Loaded wallet {} with {} descriptors",
        wallet.name,
        descriptors.len()
    );

    // Nothing is written back on error
    let mut file = PsbtFile::open(&psbt_file)?;
    let report = Signer::from_descriptors(&master, &descriptors, request.options)
        .sign(&mut file.psbt)?;

    if report.modified {
        file.save(&psbt_file)?;
        log::info!("PSBT saved to {}", psbt_file.display());
    } else {
        log::info!("PSBT unchanged");
    }

    Ok(report)
}

/// Same as [`sign_files`], with the outcome as JSON
pub fn sign_to_json(request: &SignRequest) -> Value {
    match sign_files(request) {
        Ok(report) => match report.to_json() {
            Ok(json) => json,
            Err(e) => json!({ "error": e.to_string() }),
        },
        Err(e) => json!({ "error": e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::fixtures;
    use crate::psbt::{PartiallySignedTransaction, Psbt};
    use crate::types::PsbtFormat;

    struct Datadir {
        dir: TempDir,
        descriptor: Descriptor,
    }

    impl Datadir {
        fn new(psbt: &[u8]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let descriptor = fixtures::single("wpkh(KEY)", 1);
            fs::write(dir.path().join("PRIVATE.json"), fixtures::key_json(1)).unwrap();
            fs::write(
                dir.path().join("descriptor.json"),
                json!({ "name": "vault", "main_descriptor": descriptor.to_string() }).to_string(),
            )
            .unwrap();
            fs::write(dir.path().join("psbt.txt"), psbt).unwrap();
            Self { dir, descriptor }
        }

        fn request(&self) -> SignRequest {
            SignRequest::new(self.dir.path(), "PRIVATE.json", "descriptor.json", "psbt.txt")
        }

        fn psbt(&self) -> Vec<u8> {
            fs::read(self.dir.path().join("psbt.txt")).unwrap()
        }
    }

    #[test]
    fn test_sign_files() {
        let descriptor = fixtures::single("wpkh(KEY)", 1);
        let psbt = fixtures::funded_psbt(&[(&descriptor, 0)]);
        let datadir = Datadir::new(psbt.as_base64().as_bytes());

        let report = sign_files(&datadir.request().network(Network::Testnet)).unwrap();
        assert_eq!(report.signed, 1);
        assert!(report.finalized);
        assert!(report.modified);

        let saved = PsbtFile::decode(&datadir.psbt()).unwrap();
        assert_eq!(saved.format, PsbtFormat::Base64);
        assert!(saved.psbt.is_finalized());
        assert_eq!(datadir.descriptor, descriptor);
    }

    #[test]
    fn test_binary_psbt_stays_binary() {
        let descriptor = fixtures::single("wpkh(KEY)", 1);
        let psbt = fixtures::funded_psbt(&[(&descriptor, 0)]);
        let datadir = Datadir::new(&psbt.as_bytes());

        let report = sign_files(&datadir.request().finalize(false)).unwrap();
        assert!(!report.finalized);

        let saved = PartiallySignedTransaction::from_bytes(datadir.psbt()).unwrap();
        assert_eq!(saved.inputs[0].partial_sigs.len(), 1);
    }

    #[test]
    fn test_failure_leaves_file_untouched() {
        let descriptor = fixtures::single("wpkh(KEY)", 1);
        let mut psbt = fixtures::funded_psbt(&[(&descriptor, 0)]);
        psbt.inputs[0].non_witness_utxo = None;
        psbt.inputs[0].witness_utxo = None;
        let datadir = Datadir::new(psbt.as_base64().as_bytes());
        let before = datadir.psbt();

        assert!(matches!(
            sign_files(&datadir.request()),
            Err(Error::MissingUtxoData { index: 0 })
        ));
        assert_eq!(datadir.psbt(), before);

        let json = sign_to_json(&datadir.request());
        assert_eq!(json["error"], "missing UTXO data for input 0");
    }

    #[test]
    fn test_json_container() {
        let descriptor = fixtures::single("wpkh(KEY)", 1);
        let psbt = fixtures::funded_psbt(&[(&descriptor, 0)]);
        let content = json!({ "name": "rent", "psbt": psbt.as_base64(), "fee": 1000 });
        let datadir = Datadir::new(content.to_string().as_bytes());

        let json = sign_to_json(&datadir.request());
        assert_eq!(json["signed"], 1);
        assert_eq!(json["finalized"], true);

        let saved: Value = serde_json::from_slice(&datadir.psbt()).unwrap();
        assert_eq!(saved["name"], "rent");
        assert_eq!(saved["fee"], 1000);
        assert_eq!(saved["psbt"], psbt.as_base64());
        let signed =
            PartiallySignedTransaction::from_base64(saved["signed_psbt"].as_str().unwrap())
                .unwrap();
        assert!(signed.is_finalized());
    }

    #[test]
    fn test_derivation_scan_request() {
        let descriptor = fixtures::single("wpkh(KEY)", 1);
        let mut psbt = fixtures::funded_psbt(&[(&descriptor, 3)]);
        psbt.inputs[0].bip32_derivation.clear();
        let datadir = Datadir::new(psbt.as_base64().as_bytes());

        assert!(matches!(
            sign_files(&datadir.request()),
            Err(Error::SigningAbort(_))
        ));

        let request = datadir.request().finalize(false).derivation_scan(Some(5));
        assert_eq!(request.options.derivation_scan, Some(5));
        assert!(!request.options.finalize);
        let report = sign_files(&request).unwrap();
        assert_eq!(report.signed, 1);
        assert!(!report.finalized);
    }

    #[test]
    fn test_unchanged_psbt_is_not_rewritten() {
        let descriptor = fixtures::single("wpkh(KEY)", 1);
        let theirs = fixtures::single("wpkh(KEY)", 9);
        let psbt = fixtures::funded_psbt(&[(&descriptor, 0), (&theirs, 0)]);
        let datadir = Datadir::new(psbt.as_base64().as_bytes());

        let report = sign_files(&datadir.request()).unwrap();
        assert!(report.modified);
        let once = datadir.psbt();

        let report = sign_files(&datadir.request()).unwrap();
        assert!(!report.modified);
        assert_eq!(report.status(0), Some(crate::report::InputStatus::AlreadyFinalized));
        assert_eq!(datadir.psbt(), once);
    }

    #[test]
    fn test_wrong_network_and_missing_datadir() {
        let descriptor = fixtures::single("wpkh(KEY)", 1);
        let psbt = fixtures::funded_psbt(&[(&descriptor, 0)]);
        let datadir = Datadir::new(psbt.as_base64().as_bytes());

        assert!(matches!(
            sign_files(&datadir.request().network(Network::Bitcoin)),
            Err(Error::KeyLoad(_))
        ));

        let request = SignRequest::new(
            datadir.dir.path().join("missing"),
            "PRIVATE.json",
            "descriptor.json",
            "psbt.txt",
        );
        assert!(matches!(sign_files(&request), Err(Error::Io(_))));
    }
}
