// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Resolve `path` against `base` when it's relative
pub fn resolve<B, P>(base: B, path: P) -> PathBuf
where
    B: AsRef<Path>,
    P: AsRef<Path>,
{
    let path: &Path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.as_ref().join(path)
    }
}

/// Write to a temp file in the same directory, then rename it over `path`
pub fn write_atomic<P>(path: P, data: &[u8]) -> std::io::Result<()>
where
    P: AsRef<Path>,
{
    let path: &Path = path.as_ref();
    let dir: &Path = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
