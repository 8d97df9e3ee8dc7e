//! Minimal blocking client for S3-compatible stores (MinIO, Ceph, AWS).
//!
//! Path-style addressing only, signed with AWS Signature Version 4. Covers
//! the three calls the upload path needs and nothing else.

use anyhow::{Context, Result, anyhow};
use hmac::digest::Output;
use hmac::{Hmac, Mac};
use reqwest::{Method, Url};
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub trait ObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool>;
    fn make_bucket(&self, bucket: &str) -> Result<()>;
    /// Returns the ETag reported by the store, if any.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Option<String>>;
}

pub struct S3Client {
    http: Client,
    base_url: String,
    host: String,
    access_key: String,
    secret_key: String,
    region: String,
}

impl S3Client {
    pub fn new(
        endpoint_url: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let (base_url, host) = parse_endpoint(endpoint_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self {
            http,
            base_url,
            host,
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            region: region.to_string(),
        })
    }

    fn send(
        &self,
        method: Method,
        bucket: &str,
        key: Option<&str>,
        body: Option<(Vec<u8>, &str)>,
    ) -> Result<Response> {
        let mut canonical_uri = format!("/{}", uri_encode(bucket, true));
        if let Some(key) = key {
            canonical_uri.push('/');
            canonical_uri.push_str(&uri_encode(key, false));
        }
        let payload_hash = match &body {
            Some((bytes, _)) => crate::util::sha256_hex(bytes),
            None => EMPTY_SHA256.to_string(),
        };
        let now = time::OffsetDateTime::now_utc();
        let amz_date = amz_timestamp(now);
        let authorization =
            self.authorization(method.as_str(), &canonical_uri, &payload_hash, &amz_date)?;

        let url = format!("{}{}", self.base_url, canonical_uri);
        debug!("s3 {} {}", method, url);
        let mut req = self
            .http
            .request(method, &url)
            .header("x-amz-date", &amz_date)
            .header("x-amz-content-sha256", &payload_hash)
            .header(AUTHORIZATION, authorization);
        if let Some((bytes, content_type)) = body {
            req = req.header(CONTENT_TYPE, content_type).body(bytes);
        }
        req.send().with_context(|| format!("s3 request to {url}"))
    }

    fn authorization(
        &self,
        method: &str,
        canonical_uri: &str,
        payload_hash: &str,
        amz_date: &str,
    ) -> Result<String> {
        let date = &amz_date[..8];
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";
        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n",
            self.host
        );
        let canonical_request = format!(
            "{method}\n{canonical_uri}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
        );
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            crate::util::sha256_hex(canonical_request.as_bytes())
        );
        let key = signing_key(&self.secret_key, date, &self.region, SERVICE)?;
        let signature = format!("{:x}", hmac_sha256(&key, string_to_sign.as_bytes())?);
        Ok(format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, \
             SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        ))
    }
}

impl ObjectStore for S3Client {
    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let resp = self.send(Method::HEAD, bucket, None, None)?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            code => Err(anyhow!("HEAD bucket {bucket}: HTTP {code}")),
        }
    }

    fn make_bucket(&self, bucket: &str) -> Result<()> {
        let resp = self.send(Method::PUT, bucket, None, None)?;
        if !resp.status().is_success() {
            let code = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("create bucket {bucket}: HTTP {code}: {body}"));
        }
        Ok(())
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Option<String>> {
        let resp = self.send(Method::PUT, bucket, Some(key), Some((body, content_type)))?;
        if !resp.status().is_success() {
            let code = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("put {bucket}/{key}: HTTP {code}: {body}"));
        }
        Ok(resp
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim_matches('"').to_string()))
    }
}

/// Splits an endpoint into the URL requests are sent to and the `host` value
/// that gets signed. A default port is dropped from both, the same way the
/// HTTP client leaves it out of the Host header.
pub fn parse_endpoint(endpoint_url: &str) -> Result<(String, String)> {
    let url = Url::parse(endpoint_url)
        .with_context(|| format!("invalid endpoint URL: {endpoint_url}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("endpoint URL must be http or https: {endpoint_url}"));
    }
    if url.path() != "/" || url.query().is_some() {
        return Err(anyhow!("endpoint URL must be scheme://host[:port]: {endpoint_url}"));
    }
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("endpoint URL has no host: {endpoint_url}"))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok((format!("{}://{host}", url.scheme()), host))
}

pub fn signing_key(
    secret_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Output<HmacSha256>> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Output<HmacSha256>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| anyhow!("hmac key: {e}"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes())
}

fn amz_timestamp(t: time::OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

/// RFC 3986 unreserved characters pass through; everything else is
/// percent-encoded. `/` is kept in object keys.
pub fn uri_encode(s: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
