// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use firma_core::bitcoin::Network;

#[derive(Debug, Parser)]
#[command(name = "firma", author, version, about = "Offline PSBT signer for descriptor wallets")]
pub struct Cli {
    /// Network
    #[arg(short, long, default_value_t = Network::Bitcoin)]
    pub network: Network,
    /// Data directory (default: ~/.firma)
    #[arg(short, long)]
    pub datadir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign a PSBT with a master key, for the given wallet
    Sign {
        /// Key name or path of the key file
        #[arg(short, long)]
        key: String,
        /// Wallet name or path of the descriptor file
        #[arg(short, long)]
        wallet: String,
        /// PSBT name or path of the PSBT file
        #[arg(short, long)]
        psbt: String,
        /// Only add signatures, never finalize
        #[arg(long)]
        no_finalize: bool,
        /// Find inputs without key derivations among the first N+1 descriptor addresses
        #[arg(long, value_name = "N")]
        derivation_scan: Option<u32>,
        /// Print the signing report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode PSBT
    Decode {
        /// PSBT name or path of the PSBT file
        psbt: String,
    },
}
