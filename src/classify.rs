use crate::{config::Config, util::lower_ext};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Office,
    Image,
}

impl FileKind {
    /// Dispatch order: every pdf, then every office file, then every image.
    pub const ALL: [FileKind; 3] = [FileKind::Pdf, FileKind::Office, FileKind::Image];

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Office => "office",
            FileKind::Image => "image",
        }
    }

    pub fn from_extension(ext: &str) -> Option<FileKind> {
        match ext {
            "pdf" => Some(FileKind::Pdf),
            "doc" | "docx" | "ppt" | "pptx" | "xls" | "xlsx" => Some(FileKind::Office),
            "jpg" | "jpeg" | "png" | "bmp" | "tiff" | "gif" => Some(FileKind::Image),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    pub file_name: String,
    pub base_name: String,
    pub extension: String,
    pub kind: FileKind,
}

impl InputFile {
    pub fn from_path(path: &Path) -> Option<InputFile> {
        let ext = lower_ext(path)?;
        let kind = FileKind::from_extension(&ext)?;
        let file_name = path.file_name()?.to_str()?.to_string();
        let base_name = path.file_stem()?.to_str()?.to_string();
        Some(InputFile {
            path: path.to_path_buf(),
            file_name,
            base_name,
            extension: ext,
            kind,
        })
    }

    pub fn out_dir(&self, out_base: &Path) -> PathBuf {
        out_base.join(&self.base_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    pub pdf: Vec<InputFile>,
    pub office: Vec<InputFile>,
    pub image: Vec<InputFile>,
    pub ignored: usize,
}

impl ScanResult {
    pub fn group(&self, kind: FileKind) -> &[InputFile] {
        match kind {
            FileKind::Pdf => &self.pdf,
            FileKind::Office => &self.office,
            FileKind::Image => &self.image,
        }
    }

    fn group_mut(&mut self, kind: FileKind) -> &mut Vec<InputFile> {
        match kind {
            FileKind::Pdf => &mut self.pdf,
            FileKind::Office => &mut self.office,
            FileKind::Image => &mut self.image,
        }
    }

    pub fn total(&self) -> usize {
        self.pdf.len() + self.office.len() + self.image.len()
    }

    pub fn ordered(&self) -> impl Iterator<Item = &InputFile> {
        FileKind::ALL.into_iter().flat_map(move |k| self.group(k).iter())
    }
}

/// Non-recursive. Order within a kind follows `read_dir`.
pub fn scan_dir(cfg: &Config, dir: &Path) -> Result<ScanResult> {
    let mut out = ScanResult::default();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("read_dir entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file) = InputFile::from_path(&path) else {
            if path.file_name().and_then(|n| n.to_str()).is_none() {
                warn!("skipping non UTF-8 file name: {}", path.display());
            }
            out.ignored += 1;
            continue;
        };
        if !kind_enabled(cfg, file.kind) {
            debug!("kind {} disabled; skipping {}", file.kind, file.file_name);
            out.ignored += 1;
            continue;
        }
        out.group_mut(file.kind).push(file);
    }

    Ok(out)
}

fn kind_enabled(cfg: &Config, kind: FileKind) -> bool {
    cfg.scan
        .enabled_kinds
        .iter()
        .any(|k| k.eq_ignore_ascii_case(kind.as_str()))
}
