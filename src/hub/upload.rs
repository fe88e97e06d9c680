//! Folder upload driver

use crate::hub::client::{CommitOperation, HubClient, UploadMode};
use crate::hub::error::HubError;
use crate::hub::retry::RetryPolicy;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Bytes sent with the preupload check
const SAMPLE_SIZE: u64 = 512;

/// Outcome of a folder upload
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Repo paths committed
    pub uploaded: Vec<String>,
    /// Repo paths the hub asked us to ignore
    pub ignored: Vec<String>,
    /// Repo paths that exhausted their retries, with the last error
    pub failed: Vec<(String, String)>,
}

impl UploadReport {
    /// True when every file made it
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Every regular file under `folder`, sorted, paired with its repo path
///
/// Repo paths are relative to `folder` and always `/`-separated.
pub fn collect_files(folder: &Path) -> Result<Vec<(PathBuf, String)>, HubError> {
    if !folder.is_dir() {
        return Err(HubError::MissingFolder(folder.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(folder)
            .map_err(|e| HubError::Protocol(e.to_string()))?;
        let repo_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), repo_path));
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Upload every file in `folder`, retrying each one independently
///
/// Only a missing folder is an error; per-file failures land in the report.
pub async fn upload_folder(
    client: &HubClient,
    folder: &Path,
    policy: &RetryPolicy,
) -> Result<UploadReport, HubError> {
    let files = collect_files(folder)?;
    info!(
        "Uploading {} files from {} to {}",
        files.len(),
        folder.display(),
        client.repo()
    );

    let mut report = UploadReport::default();
    for (index, (local, repo_path)) in files.iter().enumerate() {
        info!("[{}/{}] {}", index + 1, files.len(), repo_path);
        let result = policy
            .run(repo_path, || upload_file(client, local, repo_path))
            .await;
        match result {
            Ok(true) => report.uploaded.push(repo_path.clone()),
            Ok(false) => {
                info!("Hub ignores {}, skipped", repo_path);
                report.ignored.push(repo_path.clone());
            }
            Err(e) => {
                warn!("Giving up on {}: {}", repo_path, e);
                report.failed.push((repo_path.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Returns `false` when the hub told us to ignore the file
async fn upload_file(client: &HubClient, local: &Path, repo_path: &str) -> Result<bool, HubError> {
    let size = tokio::fs::metadata(local).await?.len();
    let sample = read_sample(local.to_path_buf()).await?;

    let preupload = client.preupload(repo_path, size, &sample).await?;
    if preupload.should_ignore {
        return Ok(false);
    }

    let operation = match preupload.mode {
        UploadMode::Regular => CommitOperation::Inline {
            path: repo_path.to_string(),
            content: tokio::fs::read(local).await?,
        },
        UploadMode::Lfs => {
            let oid = sha256_file(local.to_path_buf()).await?;
            client.upload_lfs_object(local, &oid, size).await?;
            CommitOperation::Lfs {
                path: repo_path.to_string(),
                oid,
                size,
            }
        }
    };

    client
        .commit(&format!("Upload {}", repo_path), &operation)
        .await?;
    info!("Uploaded {}", repo_path);
    Ok(true)
}

async fn read_sample(path: PathBuf) -> Result<Vec<u8>, HubError> {
    let sample = tokio::task::spawn_blocking(move || -> io::Result<Vec<u8>> {
        let mut sample = Vec::new();
        File::open(&path)?.take(SAMPLE_SIZE).read_to_end(&mut sample)?;
        Ok(sample)
    })
    .await
    .map_err(io::Error::other)??;
    Ok(sample)
}

/// Lower-case hex SHA-256 of a file, streamed
pub async fn sha256_file(path: PathBuf) -> Result<String, HubError> {
    let digest = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut hasher = Sha256::new();
        io::copy(&mut File::open(&path)?, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(io::Error::other)??;
    Ok(digest)
}
