//! Hub HTTP API
//!
//! Three calls make an upload: a preupload check deciding whether the file
//! goes inline or through LFS, the LFS transfer itself when needed, and a
//! commit referencing the file.

use crate::hub::error::HubError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

/// Default limit for one API call, and the base allowance of a transfer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Slowest throughput a transfer may sustain before it counts as stalled
const MIN_TRANSFER_BYTES_PER_SEC: u64 = 256 * 1024;

/// How the hub wants a file transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Committed inline, base64-encoded in the commit payload
    Regular,
    /// Stored through the LFS batch API, committed by hash
    Lfs,
}

/// Answer to the preupload check for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preupload {
    /// Transfer path to use
    pub mode: UploadMode,
    /// The repo's ignore rules exclude this file
    pub should_ignore: bool,
}

/// One file change in a commit
#[derive(Debug, Clone)]
pub enum CommitOperation {
    /// Small file carried in the commit itself
    Inline {
        /// Path in the repo
        path: String,
        /// File bytes
        content: Vec<u8>,
    },
    /// File already uploaded through LFS
    Lfs {
        /// Path in the repo
        path: String,
        /// Lower-case hex SHA-256 of the content
        oid: String,
        /// Size in bytes
        size: u64,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: UploadMode,
    #[serde(default)]
    should_ignore: bool,
}

#[derive(Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: u16,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

/// Client for one model repository on the hub
pub struct HubClient {
    http: reqwest::Client,
    endpoint: String,
    repo: String,
    revision: String,
    token: Option<String>,
    timeout: Duration,
}

impl HubClient {
    /// Create a client for `repo` (e.g. `user/model`) at `revision`
    pub fn new(
        endpoint: &str,
        repo: &str,
        revision: &str,
        token: Option<String>,
    ) -> Result<Self, HubError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            revision: revision.to_string(),
            token,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Limit each API call to `timeout`
    ///
    /// File transfers get `timeout` plus time for the bytes at the minimum
    /// acceptable throughput.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn transfer_timeout(&self, bytes: u64) -> Duration {
        self.timeout
            .saturating_add(Duration::from_secs(bytes / MIN_TRANSFER_BYTES_PER_SEC))
    }

    /// The repository this client uploads to
    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.timeout(self.timeout);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Ask the hub how `path` should be uploaded
    ///
    /// `sample` is the first bytes of the file (the hub inspects up to 512).
    pub async fn preupload(
        &self,
        path: &str,
        size: u64,
        sample: &[u8],
    ) -> Result<Preupload, HubError> {
        let url = format!(
            "{}/api/models/{}/preupload/{}",
            self.endpoint, self.repo, self.revision
        );
        let body = json!({
            "files": [{
                "path": path,
                "size": size,
                "sample": BASE64.encode(sample),
            }]
        });

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await?;
        let response = check_status("preupload", response).await?;
        let parsed: PreuploadResponse = response.json().await?;

        let file = parsed
            .files
            .into_iter()
            .find(|f| f.path == path)
            .ok_or_else(|| HubError::Protocol(format!("preupload did not mention {}", path)))?;

        debug!(path, mode = ?file.upload_mode, "Preupload answered");
        Ok(Preupload {
            mode: file.upload_mode,
            should_ignore: file.should_ignore,
        })
    }

    /// Transfer `file` to LFS storage under `oid`
    ///
    /// Does nothing when the hub already has the object.
    pub async fn upload_lfs_object(&self, file: &Path, oid: &str, size: u64) -> Result<(), HubError> {
        let url = format!("{}/{}.git/info/lfs/objects/batch", self.endpoint, self.repo);
        let body = json!({
            "operation": "upload",
            "transfers": ["basic", "multipart"],
            "objects": [{ "oid": oid, "size": size }],
            "hash_algo": "sha256",
            "ref": { "name": self.revision },
        });

        let response = self
            .authorized(self.http.post(&url))
            .header(reqwest::header::ACCEPT, LFS_CONTENT_TYPE)
            .header(reqwest::header::CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(body.to_string())
            .send()
            .await?;
        let response = check_status("LFS batch", response).await?;
        let batch: LfsBatchResponse = response.json().await?;

        let object = batch
            .objects
            .into_iter()
            .next()
            .ok_or_else(|| HubError::Protocol("LFS batch returned no objects".to_string()))?;

        if let Some(error) = object.error {
            return Err(HubError::Protocol(format!(
                "LFS object rejected ({}): {}",
                error.code, error.message
            )));
        }

        let actions = object.actions.unwrap_or_default();
        let Some(upload) = actions.upload else {
            info!(oid, "LFS object already present, skipping transfer");
            return Ok(());
        };

        if upload.header.contains_key("chunk_size") {
            self.put_multipart(file, oid, &upload).await?;
        } else {
            let handle = tokio::fs::File::open(file).await?;
            let length = handle.metadata().await?.len();
            let mut request = self
                .http
                .put(&upload.href)
                .timeout(self.transfer_timeout(length))
                .header(reqwest::header::CONTENT_LENGTH, length)
                .body(reqwest::Body::from(handle));
            for (name, value) in &upload.header {
                request = request.header(name.as_str(), value.as_str());
            }
            check_status("LFS upload", request.send().await?).await?;
        }

        if let Some(verify) = actions.verify {
            let mut request = self
                .http
                .post(&verify.href)
                .timeout(self.timeout)
                .header(reqwest::header::ACCEPT, LFS_CONTENT_TYPE)
                .header(reqwest::header::CONTENT_TYPE, LFS_CONTENT_TYPE)
                .body(json!({ "oid": oid, "size": size }).to_string());
            if let Some(token) = &self.token {
                request = request.basic_auth("USER", Some(token));
            }
            for (name, value) in &verify.header {
                request = request.header(name.as_str(), value.as_str());
            }
            check_status("LFS verify", request.send().await?).await?;
        }

        Ok(())
    }

    /// Upload in parts: one presigned URL per chunk, then a completion call
    async fn put_multipart(&self, file: &Path, oid: &str, upload: &LfsAction) -> Result<(), HubError> {
        let chunk_size: u64 = upload
            .header
            .get("chunk_size")
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| HubError::Protocol("invalid multipart chunk_size".to_string()))?;

        let mut parts: Vec<(u32, &String)> = upload
            .header
            .iter()
            .filter_map(|(key, url)| key.parse::<u32>().ok().filter(|&n| n > 0).map(|n| (n, url)))
            .collect();
        parts.sort_by_key(|(n, _)| *n);
        if parts.is_empty() {
            return Err(HubError::Protocol("multipart upload without part URLs".to_string()));
        }

        let mut handle = tokio::fs::File::open(file).await?;
        let size = handle.metadata().await?.len();
        let mut etags = Vec::with_capacity(parts.len());

        for (number, url) in parts {
            let offset = u64::from(number - 1).saturating_mul(chunk_size);
            let len = chunk_size.min(size.saturating_sub(offset));
            let mut chunk = vec![0u8; usize::try_from(len).map_err(|_| {
                HubError::Protocol("multipart chunk too large for this platform".to_string())
            })?];
            handle.seek(SeekFrom::Start(offset)).await?;
            handle.read_exact(&mut chunk).await?;

            let request = self.http.put(url).timeout(self.transfer_timeout(len)).body(chunk);
            let response = check_status("LFS part upload", request.send().await?).await?;
            let etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| HubError::Protocol(format!("part {} returned no ETag", number)))?
                .to_string();

            debug!(oid, part = number, "Uploaded LFS part");
            etags.push(json!({ "partNumber": number, "etag": etag }));
        }

        let completion = self
            .http
            .post(&upload.href)
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, LFS_CONTENT_TYPE)
            .header(reqwest::header::CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(json!({ "oid": oid, "parts": etags }).to_string())
            .send()
            .await?;
        check_status("LFS multipart completion", completion).await?;
        Ok(())
    }

    /// Create a commit with a single file operation
    pub async fn commit(&self, summary: &str, operation: &CommitOperation) -> Result<(), HubError> {
        let url = format!(
            "{}/api/models/{}/commit/{}",
            self.endpoint, self.repo, self.revision
        );

        let header = json!({
            "key": "header",
            "value": { "summary": summary, "description": "" },
        });
        let file: Value = match operation {
            CommitOperation::Inline { path, content } => json!({
                "key": "file",
                "value": {
                    "content": BASE64.encode(content),
                    "path": path,
                    "encoding": "base64",
                },
            }),
            CommitOperation::Lfs { path, oid, size } => json!({
                "key": "lfsFile",
                "value": {
                    "path": path,
                    "algo": "sha256",
                    "oid": oid,
                    "size": size,
                },
            }),
        };
        let payload = format!("{}\n{}\n", header, file);

        let response = self
            .authorized(self.http.post(&url))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(payload)
            .send()
            .await?;
        check_status("commit", response).await?;
        Ok(())
    }
}

async fn check_status(operation: &'static str, response: Response) -> Result<Response, HubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    Err(HubError::Status {
        operation,
        status: status.as_u16(),
        body,
    })
}
