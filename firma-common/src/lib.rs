// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

//! Firma data directory layout
//!
//! ```text
//! <datadir>/<network>/keys/<name>/PRIVATE.json
//! <datadir>/<network>/wallets/<name>/descriptor.json
//! <datadir>/<network>/psbts/<name>/psbt.json
//! ```

use std::io::Error;
use std::path::{Path, PathBuf};

pub const KEY_FILE: &str = "PRIVATE.json";
pub const WALLET_FILE: &str = "descriptor.json";
pub const PSBT_FILE: &str = "psbt.json";

/// Default data directory (`~/.firma`), created if missing
pub fn firma() -> Result<PathBuf, Error> {
    Ok(match dirs::home_dir() {
        Some(path) => {
            let path: PathBuf = path.join(".firma");
            if !path.exists() {
                std::fs::create_dir_all(path.as_path())?;
            }
            path
        }
        None => Path::new("./firma").to_path_buf(),
    })
}

/// `network` is the network name as printed by the bitcoin crate (ex. `testnet`)
pub fn network_dir<P>(datadir: P, network: &str) -> PathBuf
where
    P: AsRef<Path>,
{
    datadir.as_ref().join(network)
}

pub fn key_file<P>(datadir: P, network: &str, name: &str) -> PathBuf
where
    P: AsRef<Path>,
{
    network_dir(datadir, network)
        .join("keys")
        .join(name)
        .join(KEY_FILE)
}

pub fn wallet_file<P>(datadir: P, network: &str, name: &str) -> PathBuf
where
    P: AsRef<Path>,
{
    network_dir(datadir, network)
        .join("wallets")
        .join(name)
        .join(WALLET_FILE)
}

pub fn psbt_file<P>(datadir: P, network: &str, name: &str) -> PathBuf
where
    P: AsRef<Path>,
{
    network_dir(datadir, network)
        .join("psbts")
        .join(name)
        .join(PSBT_FILE)
}

/// `arg` when it names an existing file, otherwise the layout path built by `by_name`.
///
/// Files found in the current directory are returned as absolute paths.
pub fn file_or_name<P, F>(datadir: P, arg: &str, by_name: F) -> PathBuf
where
    P: AsRef<Path>,
    F: FnOnce(&Path, &str) -> PathBuf,
{
    let path = Path::new(arg);
    if path.is_file() {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    } else if datadir.as_ref().join(path).is_file() {
        datadir.as_ref().join(path)
    } else {
        by_name(datadir.as_ref(), arg)
    }
}
