use crate::{
    config::Config,
    s3::{ObjectStore, S3Client},
    util::lower_ext,
};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageFile {
    #[serde(default)]
    pub storage_config: StorageConfig,
    #[serde(default)]
    pub bucket_info: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub image_storage: ImageStorage,
    #[serde(default = "default_true")]
    pub enable_local_backup: bool,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_storage: ImageStorage::Local,
            enable_local_backup: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStorage {
    Local,
    S3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint_host: String,
}

impl BucketInfo {
    pub fn full_bucket_name(&self) -> String {
        format!("{}-{}", self.access_key, self.bucket)
    }

    pub fn endpoint_url(&self) -> String {
        let host = self.endpoint_host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

impl StorageFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading storage config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing storage config JSON: {}", path.display()))
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("no storage config at {}; images stay local", path.display());
            Ok(Self::default())
        }
    }

    pub fn first_bucket(&self) -> Result<BucketInfo> {
        let (bucket, value) = self
            .bucket_info
            .iter()
            .next()
            .ok_or_else(|| anyhow!("bucket_info is empty"))?;
        let fields: Vec<String> = serde_json::from_value(value.clone())
            .with_context(|| {
                format!("bucket_info.{bucket} must be [access_key, secret_key, endpoint]")
            })?;
        let [access_key, secret_key, endpoint_host] = <[String; 3]>::try_from(fields)
            .map_err(|v| anyhow!("bucket_info.{bucket} has {} fields, expected 3", v.len()))?;
        Ok(BucketInfo {
            bucket: bucket.clone(),
            access_key,
            secret_key,
            endpoint_host,
        })
    }
}

pub fn encode_spaces(s: &str) -> String {
    s.replace(' ', "%20")
}

/// `Local` is the staging directory itself; images are already there.
pub enum Destination<'a> {
    Local(PathBuf),
    ObjectStore {
        client: &'a dyn ObjectStore,
        bucket: String,
        prefix: String,
    },
}

impl Destination<'_> {
    pub fn write(&self, name: &str, source: &Path) -> Result<String> {
        match self {
            Destination::Local(dir) => Ok(dir.join(name).display().to_string()),
            Destination::ObjectStore {
                client,
                bucket,
                prefix,
            } => {
                let data = std::fs::read(source)
                    .with_context(|| format!("reading staged image {}", source.display()))?;
                let key = format!("{prefix}/{name}");
                let content_type = mime_guess::from_path(source)
                    .first_raw()
                    .unwrap_or("application/octet-stream");
                let etag = client
                    .put_object(bucket, &key, data, content_type)
                    .with_context(|| format!("uploading {key}"))?;
                debug!("uploaded {bucket}/{key} etag={:?}", etag);
                Ok(format!("{bucket}/{key}"))
            }
        }
    }
}

pub struct RemoteImages {
    pub client: Box<dyn ObjectStore>,
    pub bucket: BucketInfo,
    pub keep_local: bool,
}

pub struct ImageStore {
    remote: Option<RemoteImages>,
    upload_extensions: Vec<String>,
}

impl ImageStore {
    pub fn local(cfg: &Config) -> Self {
        Self {
            remote: None,
            upload_extensions: cfg.storage.upload_extensions.clone(),
        }
    }

    pub fn with_remote(cfg: &Config, remote: RemoteImages) -> Self {
        Self {
            remote: Some(remote),
            upload_extensions: cfg.storage.upload_extensions.clone(),
        }
    }

    /// Reads the storage JSON file. For S3 the bucket is checked here, once
    /// per run.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        if cfg.paths.storage_config.is_empty() {
            return Ok(Self::local(cfg));
        }
        let file = StorageFile::load_or_default(Path::new(&cfg.paths.storage_config))?;
        if file.storage_config.image_storage == ImageStorage::Local {
            return Ok(Self::local(cfg));
        }

        let bucket = file.first_bucket()?;
        let endpoint = bucket.endpoint_url();
        info!(
            "object store endpoint={} secure={}",
            endpoint,
            endpoint.starts_with("https://")
        );
        let client = S3Client::new(
            &endpoint,
            &bucket.access_key,
            &bucket.secret_key,
            &cfg.storage.region,
            Duration::from_secs(cfg.storage.request_timeout_seconds),
        )?;
        Ok(Self::connect(
            cfg,
            RemoteImages {
                client: Box::new(client),
                bucket,
                keep_local: file.storage_config.enable_local_backup,
            },
        ))
    }

    pub fn connect(cfg: &Config, remote: RemoteImages) -> Self {
        let store = Self::with_remote(cfg, remote);
        store.ensure_bucket();
        store
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Failures are logged only; uploads are attempted regardless.
    pub fn ensure_bucket(&self) {
        let Some(remote) = &self.remote else {
            return;
        };
        let name = remote.bucket.full_bucket_name();
        info!("checking bucket {name}");
        let checked = remote.client.bucket_exists(&name).and_then(|exists| {
            if exists {
                info!("bucket exists: {name}");
                Ok(())
            } else {
                remote.client.make_bucket(&name)?;
                info!("created bucket: {name}");
                Ok(())
            }
        });
        if let Err(err) = checked {
            warn!("bucket check failed for {name}: {err:#}");
        }
    }

    pub fn image_ref(&self, base_name: &str) -> String {
        match &self.remote {
            Some(remote) => format!(
                "{}/{}/images/{}",
                remote.bucket.endpoint_url(),
                remote.bucket.full_bucket_name(),
                encode_spaces(base_name)
            ),
            None => "images".to_string(),
        }
    }

    pub fn object_prefix(base_name: &str) -> String {
        format!("images/{base_name}")
    }

    pub fn destinations(&self, staging: &Path, base_name: &str) -> Vec<Destination<'_>> {
        let mut out = Vec::new();
        match &self.remote {
            None => out.push(Destination::Local(staging.to_path_buf())),
            Some(remote) => {
                if remote.keep_local {
                    out.push(Destination::Local(staging.to_path_buf()));
                }
                out.push(Destination::ObjectStore {
                    client: remote.client.as_ref(),
                    bucket: remote.bucket.full_bucket_name(),
                    prefix: Self::object_prefix(base_name),
                });
            }
        }
        out
    }

    /// Sends the named staged images to each destination. Without a local
    /// backup the staging directory is removed once all uploads succeed.
    pub fn publish(
        &self,
        staging: &Path,
        base_name: &str,
        images: &[String],
    ) -> Result<Vec<String>> {
        let Some(remote) = &self.remote else {
            return Ok(Vec::new());
        };

        let staged: Vec<(&str, PathBuf)> = images
            .iter()
            .map(|name| (name.as_str(), staging.join(name)))
            .filter(|(_, path)| path.is_file() && self.is_uploadable(path))
            .collect();

        info!("uploading {} image(s) for {base_name}", staged.len());
        let url_base = self.image_ref(base_name);
        let mut written = Vec::new();
        for dest in self.destinations(staging, base_name) {
            for (name, path) in &staged {
                let loc = dest.write(name, path)?;
                if matches!(dest, Destination::ObjectStore { .. }) {
                    info!("image uploaded: {url_base}/{}", encode_spaces(name));
                }
                written.push(loc);
            }
        }

        if !remote.keep_local && staging.is_dir() {
            std::fs::remove_dir_all(staging)
                .with_context(|| format!("removing staging dir {}", staging.display()))?;
            debug!("removed staging dir {}", staging.display());
        }
        Ok(written)
    }

    fn is_uploadable(&self, path: &Path) -> bool {
        lower_ext(path).is_some_and(|ext| {
            self.upload_extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&ext))
        })
    }
}
