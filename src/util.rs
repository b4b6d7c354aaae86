use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Directory name for a new job: the input path, the effective config and
/// the current time hashed together, so repeated runs never share a
/// directory.
pub fn job_dir_name(cfg_hash: &str, input: &Path) -> Result<String> {
    let canon = input
        .canonicalize()
        .with_context(|| format!("canonicalize {}", input.display()))?;
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    let digest = sha256_hex(format!("{cfg_hash}:{}:{nanos}", canon.display()).as_bytes());
    Ok(digest[..16].to_string())
}

pub fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
