// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::PsbtFile;

/// Read a PSBT file in any supported container
pub fn decode_file<P>(path: P) -> Result<PsbtFile>
where
    P: AsRef<Path>,
{
    let psbt_file = path.as_ref();
    if !psbt_file.is_file() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("PSBT file {} not found", psbt_file.display()),
        )));
    }
    Ok(PsbtFile::open(psbt_file)?)
}
