use crate::{
    classify::{InputFile, scan_dir},
    config::Config,
    engine::Engine,
    pipeline::Pipeline,
    report::{BatchReport, BatchStatus, FileReport, Outcome},
    util::{ensure_dir, now_rfc3339},
};
use anyhow::Result;
use std::path::Path;
use tracing::{error, info, warn};

/// Only an unreadable directory listing is returned as an error; failing
/// files are recorded in the report.
pub fn run_batch<E: Engine>(
    cfg: &Config,
    pipeline: &Pipeline<E>,
    input_dir: &Path,
    out_base: &Path,
) -> Result<BatchReport> {
    let mut report = BatchReport {
        input_dir: input_dir.to_path_buf(),
        out_dir: out_base.to_path_buf(),
        started: now_rfc3339(),
        finished: String::new(),
        status: BatchStatus::Completed,
        files: Vec::new(),
    };

    info!("scanning {}", input_dir.display());
    if !input_dir.is_dir() {
        error!("input directory does not exist: {}", input_dir.display());
        report.status = BatchStatus::DirectoryNotFound;
        report.finished = now_rfc3339();
        return Ok(report);
    }

    let scan = scan_dir(cfg, input_dir)?;
    let total = scan.total();
    if total == 0 {
        warn!("no supported files in {}", input_dir.display());
        report.status = BatchStatus::NoSupportedFiles;
        report.finished = now_rfc3339();
        return Ok(report);
    }

    info!(
        "scan: pdf={} office={} image={} ignored={} total={}",
        scan.pdf.len(),
        scan.office.len(),
        scan.image.len(),
        scan.ignored,
        total
    );

    for (i, file) in scan.ordered().enumerate() {
        info!("[{}/{total}] {}: {}", i + 1, file.kind, file.file_name);
        report.files.push(dispatch_one(pipeline, file, out_base));
    }

    report.finished = now_rfc3339();
    info!(
        "batch done: succeeded={} failed={} failed_pages={}",
        report.succeeded(),
        report.failed(),
        report.failed_pages()
    );
    Ok(report)
}

fn dispatch_one<E: Engine>(
    pipeline: &Pipeline<E>,
    file: &InputFile,
    out_base: &Path,
) -> FileReport {
    let out_dir = file.out_dir(out_base);
    let result = ensure_dir(&out_dir).and_then(|_| pipeline.convert(file, &out_dir));
    match result {
        Ok(converted) => {
            info!("done: {}", file.file_name);
            FileReport {
                input: file.path.clone(),
                kind: file.kind,
                out_dir,
                fingerprint: Some(converted.fingerprint),
                outcome: Outcome::Ok,
                pages: converted.pages,
            }
        }
        Err(err) => {
            error!("failed {}: {err:#}", file.file_name);
            FileReport {
                input: file.path.clone(),
                kind: file.kind,
                out_dir,
                fingerprint: None,
                outcome: Outcome::from_error(&err),
                pages: Vec::new(),
            }
        }
    }
}
