pub mod python;
pub mod types;

use anyhow::Result;

pub use types::{
    AnalyzeIn, AnalyzeOut, ArtifactNames, DatasetRef, DocDiag, OpenOut, ParseMethod,
};

/// Request/response view of the document pipeline. Implementations own the
/// actual parsing, OCR and rendering; callers only pass paths around.
pub trait Engine {
    fn doctor(&self) -> Result<DocDiag>;
    /// Number of datasets `input` yields.
    fn open(&self, input: &DatasetRef) -> Result<u32>;
    fn classify(&self, dataset: &DatasetRef) -> Result<ParseMethod>;
    fn analyze(&self, req: &AnalyzeIn) -> Result<AnalyzeOut>;
}
