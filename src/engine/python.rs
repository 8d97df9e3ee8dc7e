use super::{Engine, types::*};
use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Drives `magic_pdf` through `scripts/mineru_runner.py`, one process per call.
pub struct MineruEngine {
    cfg: Config,
    runner: PathBuf,
    python_exe: PathBuf,
}

impl MineruEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let scripts_dir = PathBuf::from(&cfg.paths.scripts_dir);
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        let runner = scripts_dir.join(&cfg.engine.runner_script);
        if !runner.exists() {
            return Err(anyhow!("missing runner script: {}", runner.display()));
        }
        let python_exe = resolve_python_exe(&cfg.engine.python_exe);
        Ok(Self {
            cfg: cfg.clone(),
            runner,
            python_exe,
        })
    }

    fn call_timeout(&self) -> Option<Duration> {
        match self.cfg.engine.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn run_json<O: for<'de> serde::Deserialize<'de>>(
        &self,
        cmd_name: &str,
        request: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<O> {
        debug!(
            "runner {} cmd={} timeout={:?}",
            self.runner.display(),
            cmd_name,
            timeout
        );
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(&self.runner);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        for (k, v) in &self.cfg.engine.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning python: {}", self.python_exe.display()))?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            let bytes = serde_json::to_vec(&serde_json::json!({
                "cmd": cmd_name,
                "req": request,
            }))?;
            stdin.write_all(&bytes)?;
            stdin.flush().ok();
        }

        let output = match timeout {
            Some(t) => wait_with_timeout(&mut child, t)?,
            None => child
                .wait_with_output()
                .with_context(|| "waiting for python")?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "runner cmd {cmd_name} failed ({}):\n{}",
                output.status,
                stderr.trim()
            ));
        }

        if self.cfg.debug.keep_python_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("runner stderr ({cmd_name}): {}", stderr.trim());
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing runner JSON output for cmd {cmd_name}"))
    }
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("MINERU_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl Engine for MineruEngine {
    fn doctor(&self) -> Result<DocDiag> {
        self.run_json(
            "doctor",
            &serde_json::json!({}),
            Some(Duration::from_secs(self.cfg.engine.doctor_timeout_seconds)),
        )
    }

    fn open(&self, input: &DatasetRef) -> Result<u32> {
        let out: OpenOut =
            self.run_json("open", &serde_json::to_value(input)?, self.call_timeout())?;
        if !out.ok {
            return Err(anyhow!(
                "open failed: {}",
                out.error.unwrap_or_else(|| "unknown error".into())
            ));
        }
        Ok(out.datasets)
    }

    fn classify(&self, dataset: &DatasetRef) -> Result<ParseMethod> {
        let out: ClassifyOut =
            self.run_json("classify", &serde_json::to_value(dataset)?, self.call_timeout())?;
        match (out.ok, out.method) {
            (true, Some(m)) => Ok(m),
            _ => Err(anyhow!(
                "classify failed: {}",
                out.error.unwrap_or_else(|| "no parse method returned".into())
            )),
        }
    }

    fn analyze(&self, req: &AnalyzeIn) -> Result<AnalyzeOut> {
        let out: AnalyzeOut =
            self.run_json("analyze", &serde_json::to_value(req)?, self.call_timeout())?;
        if !out.ok {
            return Err(anyhow!(
                "analyze failed for {} dataset {}: {}",
                req.dataset.input,
                req.dataset.index,
                out.error.as_deref().unwrap_or("unknown error")
            ));
        }
        for w in &out.warnings {
            warn!("engine: {w}");
        }
        Ok(out)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty model loader can't block on a full pipe.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || drain(stdout_reader));
    let stderr_thread = std::thread::spawn(move || drain(stderr_reader));

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            return Ok(Output {
                status,
                stdout: join_reader(stdout_thread, "stdout")?,
                stderr: join_reader(stderr_thread, "stderr")?,
            });
        }

        if start.elapsed() > timeout {
            warn!("runner process timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let _ = join_reader(stdout_thread, "stdout");
            let stderr = join_reader(stderr_thread, "stderr").unwrap_or_default();
            return Err(anyhow!(
                "runner process exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

fn join_reader(h: JoinHandle<Result<Vec<u8>>>, name: &str) -> Result<Vec<u8>> {
    h.join()
        .map_err(|_| anyhow!("{name} reader thread panicked"))?
}

fn drain<R: Read>(reader: Option<R>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut r) = reader {
        r.read_to_end(&mut buf).with_context(|| "read pipe")?;
    }
    Ok(buf)
}
