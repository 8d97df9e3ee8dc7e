use crate::classify::FileKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocDiag {
    pub python_exe: String,
    pub python_version: String,
    pub magic_pdf_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    Ocr,
    Txt,
}

impl ParseMethod {
    pub fn is_ocr(self) -> bool {
        matches!(self, ParseMethod::Ocr)
    }
}

/// PDFs and images have a single dataset; office files one per page or slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRef {
    pub input: String,
    pub kind: FileKind,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOut {
    pub ok: bool,
    #[serde(default)]
    pub datasets: u32,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyOut {
    pub ok: bool,
    #[serde(default)]
    pub method: Option<ParseMethod>,
    #[serde(default)]
    pub error: Option<String>,
}

/// File names (relative to `out_dir`) for the six artifacts of one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNames {
    pub markdown: String,
    pub content_list: String,
    pub middle_json: String,
    pub model_pdf: String,
    pub layout_pdf: String,
    pub spans_pdf: String,
}

impl ArtifactNames {
    pub fn for_stem(stem: &str) -> Self {
        Self {
            markdown: format!("{stem}.md"),
            content_list: format!("{stem}_content_list.json"),
            middle_json: format!("{stem}_middle.json"),
            model_pdf: format!("{stem}_model.pdf"),
            layout_pdf: format!("{stem}_layout.pdf"),
            spans_pdf: format!("{stem}_spans.pdf"),
        }
    }

    pub fn all(&self) -> [&str; 6] {
        [
            &self.model_pdf,
            &self.layout_pdf,
            &self.spans_pdf,
            &self.markdown,
            &self.content_list,
            &self.middle_json,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeIn {
    pub dataset: DatasetRef,
    pub ocr: bool,
    pub out_dir: String,
    pub image_dir: String,
    /// Relative dir or URL written into markdown image links.
    pub image_ref: String,
    pub artifacts: ArtifactNames,
    pub text_sample_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOut {
    pub ok: bool,
    #[serde(default)]
    pub written: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub text_sample: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}
