use crate::config::Config;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
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

pub fn lower_ext(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub file_bytes: u64,
    pub sha256: String,
}

/// Size-checks and hashes an input before it is handed to the engine.
pub fn fingerprint(cfg: &Config, path: &Path) -> Result<Fingerprint> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let size = f.metadata().with_context(|| "metadata")?.len();

    if size == 0 {
        bail!("input is empty: {}", path.display());
    }
    if size > cfg.limits.max_input_file_bytes {
        bail!(
            "input exceeds max_input_file_bytes ({} > {}): {}",
            size,
            cfg.limits.max_input_file_bytes,
            path.display()
        );
    }

    let mut h = Sha256::new();
    match cfg.hashing.mode.as_str() {
        "full_sha256" => {
            let mut buf = vec![0u8; 1024 * 1024];
            loop {
                let n = f.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                h.update(&buf[..n]);
            }
        }
        "fast_2x16mb" => {
            // Head and tail windows plus the length; cheap on multi-GB scans.
            let w = cfg.hashing.fast_window_bytes.min(size);
            if w > 0 {
                let mut buf = vec![0u8; w as usize];
                f.seek(SeekFrom::Start(0))?;
                f.read_exact(&mut buf)?;
                h.update(&buf);
                if size > w {
                    f.seek(SeekFrom::Start(size - w))?;
                    f.read_exact(&mut buf)?;
                    h.update(&buf);
                }
            }
            h.update(size.to_le_bytes());
        }
        other => bail!("unknown hashing.mode: {other}"),
    }

    Ok(Fingerprint {
        file_bytes: size,
        sha256: format!("{:x}", h.finalize()),
    })
}
