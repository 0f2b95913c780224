// Copyright (c) 2022 Yuki Kishimoto
// Distributed under the MIT software license

//! Bitcoin Improvement Proposals
//!
//! <https://github.com/bitcoin/bips>

pub mod bip32;
