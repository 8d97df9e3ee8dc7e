use crate::{
    classify::{FileKind, InputFile},
    config::Config,
    engine::{AnalyzeIn, ArtifactNames, DatasetRef, Engine, ParseMethod},
    report::{Outcome, PageReport},
    storage::ImageStore,
    util::{Fingerprint, ensure_dir, fingerprint},
};
use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::{debug, error, info, warn};

pub struct Pipeline<E: Engine> {
    cfg: Config,
    engine: E,
    store: ImageStore,
}

pub struct Converted {
    pub fingerprint: Fingerprint,
    pub pages: Vec<PageReport>,
}

/// `_<n>` is only appended when an input yields more than one dataset.
pub fn page_stem(base_name: &str, index: u32, count: u32) -> String {
    if count > 1 {
        format!("{base_name}_{}", index + 1)
    } else {
        base_name.to_string()
    }
}

impl<E: Engine> Pipeline<E> {
    pub fn new(cfg: &Config, engine: E, store: ImageStore) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
            store,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn convert(&self, file: &InputFile, out_dir: &Path) -> Result<Converted> {
        match file.kind {
            FileKind::Pdf => self.convert_pdf(file, out_dir),
            FileKind::Office => self.convert_office(file, out_dir),
            FileKind::Image => self.convert_image(file, out_dir),
        }
    }

    pub fn convert_pdf(&self, file: &InputFile, out_dir: &Path) -> Result<Converted> {
        info!("converting pdf: {}", file.file_name);
        let fingerprint = fingerprint(&self.cfg, &file.path)?;
        let page = self.convert_dataset(file, out_dir, 0, &file.base_name, None)?;
        info!("finished pdf: {}", file.file_name);
        Ok(Converted {
            fingerprint,
            pages: vec![page],
        })
    }

    pub fn convert_image(&self, file: &InputFile, out_dir: &Path) -> Result<Converted> {
        info!("converting image: {}", file.file_name);
        let fingerprint = fingerprint(&self.cfg, &file.path)?;
        let page =
            self.convert_dataset(file, out_dir, 0, &file.base_name, Some(ParseMethod::Ocr))?;
        info!("finished image: {}", file.file_name);
        Ok(Converted {
            fingerprint,
            pages: vec![page],
        })
    }

    /// Opens the document and converts every page or slide dataset. A failing
    /// page is recorded and the remaining pages still run.
    pub fn convert_office(&self, file: &InputFile, out_dir: &Path) -> Result<Converted> {
        info!("converting office file: {}", file.file_name);
        let fingerprint = fingerprint(&self.cfg, &file.path)?;
        let count = self
            .engine
            .open(&dataset_ref(file, 0))
            .with_context(|| format!("reading office file {}", file.file_name))?;
        if count == 0 {
            bail!("reader produced no datasets for {}", file.file_name);
        }
        info!("{} contains {count} page(s)/slide(s)", file.file_name);

        let mut pages = Vec::with_capacity(count as usize);
        for index in 0..count {
            let stem = page_stem(&file.base_name, index, count);
            info!("page {}/{count}: {stem}", index + 1);
            match self.convert_dataset(file, out_dir, index, &stem, None) {
                Ok(page) => {
                    info!("finished page {}", index + 1);
                    pages.push(page);
                }
                Err(err) => {
                    error!("page {} of {} failed: {err:#}", index + 1, file.file_name);
                    pages.push(PageReport {
                        index,
                        name: stem,
                        parse_method: None,
                        artifacts: Vec::new(),
                        outcome: Outcome::from_error(&err),
                    });
                }
            }
        }

        info!("finished office file: {}", file.file_name);
        Ok(Converted { fingerprint, pages })
    }

    fn convert_dataset(
        &self,
        file: &InputFile,
        out_dir: &Path,
        index: u32,
        stem: &str,
        forced: Option<ParseMethod>,
    ) -> Result<PageReport> {
        let dataset = dataset_ref(file, index);
        let method = match forced {
            Some(m) => m,
            None => self.engine.classify(&dataset)?,
        };
        info!(
            "analyzing {stem} in {} mode",
            if method.is_ocr() { "ocr" } else { "text" }
        );

        let staging = out_dir.join("images");
        ensure_dir(&staging)?;

        let artifacts = ArtifactNames::for_stem(stem);
        let req = AnalyzeIn {
            dataset,
            ocr: method.is_ocr(),
            out_dir: out_dir.display().to_string(),
            image_dir: staging.display().to_string(),
            image_ref: self.store.image_ref(&file.base_name),
            artifacts: artifacts.clone(),
            text_sample_chars: self.cfg.debug.text_sample_chars,
        };
        let out = self.engine.analyze(&req)?;

        if let Some(sample) = out.text_sample.as_deref().filter(|s| !s.is_empty()) {
            debug!("{stem} text sample: {sample}");
        }
        for name in artifacts.all() {
            if !out.written.iter().any(|w| w == name) || !out_dir.join(name).exists() {
                warn!("engine reported success but {name} is missing");
            }
        }
        debug!("{stem}: {} image(s) extracted", out.images.len());

        self.store.publish(&staging, &file.base_name, &out.images)?;

        Ok(PageReport {
            index,
            name: stem.to_string(),
            parse_method: Some(method),
            artifacts: out.written,
            outcome: Outcome::Ok,
        })
    }
}

fn dataset_ref(file: &InputFile, index: u32) -> DatasetRef {
    DatasetRef {
        input: file.path.display().to_string(),
        kind: file.kind,
        index,
    }
}
