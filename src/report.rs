use crate::{classify::FileKind, engine::ParseMethod, util::Fingerprint};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Err { reason: String },
}

impl Outcome {
    pub fn from_error(err: &anyhow::Error) -> Self {
        Outcome::Err {
            reason: format!("{err:#}"),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Completed,
    DirectoryNotFound,
    NoSupportedFiles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub input_dir: PathBuf,
    pub out_dir: PathBuf,
    pub started: String,
    pub finished: String,
    pub status: BatchStatus,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    pub fn failed_pages(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| &f.pages)
            .filter(|p| !p.outcome.is_ok())
            .count()
    }

    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "input_dir": self.input_dir,
            "out_dir": self.out_dir,
            "files": self.files.len(),
            "succeeded": self.succeeded(),
            "failed": self.failed(),
            "failed_pages": self.failed_pages(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub kind: FileKind,
    pub out_dir: PathBuf,
    pub fingerprint: Option<Fingerprint>,
    pub outcome: Outcome,
    pub pages: Vec<PageReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    pub index: u32,
    pub name: String,
    pub parse_method: Option<ParseMethod>,
    pub artifacts: Vec<String>,
    pub outcome: Outcome,
}
