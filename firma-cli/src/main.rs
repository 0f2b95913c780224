// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

#![doc = include_str!("../../README.md")]

use std::path::{Path, PathBuf};

use clap::Parser;
use firma_core::bitcoin::Network;
use firma_core::command;
use firma_core::command::sign::SignRequest;
use firma_core::error::Result;

mod cli;
mod util;

use self::cli::{Cli, Command};
use self::util::Print;

fn main() -> Result<()> {
    env_logger::init();

    let args = Cli::parse();
    let network: Network = args.network;
    let datadir: PathBuf = match args.datadir {
        Some(datadir) => datadir,
        None => firma_common::firma()?,
    };
    let network_name: String = network.to_string();

    match args.command {
        Command::Sign {
            key,
            wallet,
            psbt,
            no_finalize,
            derivation_scan,
            json,
        } => {
            let request = SignRequest::new(
                &datadir,
                firma_common::file_or_name(&datadir, &key, |d: &Path, n: &str| {
                    firma_common::key_file(d, &network_name, n)
                }),
                firma_common::file_or_name(&datadir, &wallet, |d: &Path, n: &str| {
                    firma_common::wallet_file(d, &network_name, n)
                }),
                firma_common::file_or_name(&datadir, &psbt, |d: &Path, n: &str| {
                    firma_common::psbt_file(d, &network_name, n)
                }),
            )
            .network(network)
            .finalize(!no_finalize)
            .derivation_scan(derivation_scan);
            log::debug!("{request:?}");

            if json {
                let output = command::sign::sign_to_json(&request);
                println!("{output:#}");
                if output.get("error").is_some() {
                    std::process::exit(1);
                }
                Ok(())
            } else {
                let report = command::sign::sign_files(&request)?;
                report.print();
                if report.finalized {
                    println!("PSBT finalized.");
                } else {
                    println!("PSBT signing not finalized");
                }
                Ok(())
            }
        }
        Command::Decode { psbt } => {
            let path = firma_common::file_or_name(&datadir, &psbt, |d: &Path, n: &str| {
                firma_common::psbt_file(d, &network_name, n)
            });
            let file = command::psbt::decode_file(path)?;
            util::print_psbt(&file.psbt, network);
            Ok(())
        }
    }
}
