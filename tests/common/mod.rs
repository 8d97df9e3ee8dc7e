#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use mineru_batch::{
    engine::{AnalyzeIn, AnalyzeOut, DatasetRef, DocDiag, Engine, ParseMethod},
    s3::ObjectStore,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Engine stand-in that writes placeholder artifacts and records every call.
#[derive(Default)]
pub struct FakeEngine {
    /// Datasets per office file name; missing entries open as one page.
    pub office_pages: HashMap<String, u32>,
    /// Office file names whose reader fails.
    pub open_failures: HashSet<String>,
    /// File names whose analysis fails.
    pub failing_files: HashSet<String>,
    /// (file name, dataset index) pairs whose analysis fails.
    pub failing_pages: HashSet<(String, u32)>,
    /// File names classified as needing OCR.
    pub ocr_files: HashSet<String>,
    pub calls: RefCell<Vec<String>>,
    pub requests: RefCell<Vec<AnalyzeIn>>,
}

fn file_name(input: &str) -> String {
    Path::new(input)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

impl FakeEngine {
    pub fn analyzed(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| c.strip_prefix("analyze:").map(str::to_string))
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl Engine for FakeEngine {
    fn doctor(&self) -> Result<DocDiag> {
        Ok(DocDiag {
            python_exe: "fake".into(),
            python_version: "0".into(),
            magic_pdf_version: None,
            ok: true,
            error: None,
        })
    }

    fn open(&self, input: &DatasetRef) -> Result<u32> {
        let name = file_name(&input.input);
        self.calls.borrow_mut().push(format!("open:{name}"));
        if self.open_failures.contains(&name) {
            bail!("cannot read {name}: file is corrupt");
        }
        Ok(self.office_pages.get(&name).copied().unwrap_or(1))
    }

    fn classify(&self, dataset: &DatasetRef) -> Result<ParseMethod> {
        let name = file_name(&dataset.input);
        self.calls
            .borrow_mut()
            .push(format!("classify:{name}:{}", dataset.index));
        if self.ocr_files.contains(&name) {
            Ok(ParseMethod::Ocr)
        } else {
            Ok(ParseMethod::Txt)
        }
    }

    fn analyze(&self, req: &AnalyzeIn) -> Result<AnalyzeOut> {
        let name = file_name(&req.dataset.input);
        self.calls
            .borrow_mut()
            .push(format!("analyze:{name}:{}", req.dataset.index));
        self.requests.borrow_mut().push(req.clone());

        if self.failing_files.contains(&name) {
            bail!("model crashed on {name}");
        }
        if self.failing_pages.contains(&(name.clone(), req.dataset.index)) {
            return Err(anyhow!("page {} unreadable", req.dataset.index));
        }

        let out_dir = PathBuf::from(&req.out_dir);
        for artifact in req.artifacts.all() {
            std::fs::write(out_dir.join(artifact), b"x")?;
        }
        let stem = req.artifacts.markdown.trim_end_matches(".md");
        let image = format!("{stem}_{}.png", req.dataset.index);
        std::fs::create_dir_all(&req.image_dir)?;
        std::fs::write(Path::new(&req.image_dir).join(&image), b"png")?;

        Ok(AnalyzeOut {
            ok: true,
            written: req.artifacts.all().iter().map(|s| s.to_string()).collect(),
            images: vec![image],
            text_sample: Some("sample".into()),
            warnings: Vec::new(),
            error: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub len: usize,
    pub content_type: String,
}

#[derive(Default)]
pub struct StoreState {
    pub buckets: HashSet<String>,
    pub puts: Vec<PutRecord>,
    pub checks: usize,
    pub fail_check: bool,
}

/// In-memory object store; clones share state so tests can inspect it.
#[derive(Clone, Default)]
pub struct FakeStore {
    pub state: Rc<RefCell<StoreState>>,
}

impl ObjectStore for FakeStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let mut st = self.state.borrow_mut();
        st.checks += 1;
        if st.fail_check {
            bail!("connection refused");
        }
        Ok(st.buckets.contains(bucket))
    }

    fn make_bucket(&self, bucket: &str) -> Result<()> {
        self.state.borrow_mut().buckets.insert(bucket.to_string());
        Ok(())
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Option<String>> {
        self.state.borrow_mut().puts.push(PutRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            len: body.len(),
            content_type: content_type.to_string(),
        });
        Ok(Some("etag".into()))
    }
}

pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, b"%PDF-1.7 fake").expect("write input");
    p
}
