// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

pub mod master_key;
pub mod psbt_file;
pub mod seed;
pub mod wallet;

pub use self::master_key::MasterKeyJson;
pub use self::psbt_file::{PsbtFile, PsbtFormat, PsbtJson};
pub use self::seed::Seed;
pub use self::wallet::WalletJson;
