//! MD5 digest of a local file, printed by both binaries on completion
//! (SPEC_FULL.md §5.5 — supplemented from `examples/original_source/`,
//! which hashes the whole file with `hashlib.md5` once the transfer ends).

use anyhow::Context;
use std::path::Path;

pub fn md5_hex(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {} for digest", path.display()))?;
    let digest = md5::compute(&bytes);
    Ok(format!("{digest:x}"))
}
