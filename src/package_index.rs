//! Repository metadata builders.
//!
//! [`CreaterepoIndex`] shells out to `createrepo`, the real indexing
//! tool. [`FakeIndex`] mimics it closely enough for merge tests: it
//! writes the canonical metadata files naming the packages present.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::contract::{BoxError, PackageIndex};

const METADATA_DIRECTORY: &str = "repodata";

/// Builds repository metadata by running `createrepo --update`.
#[derive(Debug, Default)]
pub struct CreaterepoIndex;

#[async_trait]
impl PackageIndex for CreaterepoIndex {
    async fn build_index(&self, repository_dir: &Path) -> Result<Vec<String>, BoxError> {
        info!(repository_dir = %repository_dir.display(), "running createrepo");
        let status = tokio::process::Command::new("createrepo")
            .arg("--update")
            .arg("--quiet")
            .arg(repository_dir)
            .status()
            .await?;
        if !status.success() {
            return Err(format!("createrepo failed: {status}").into());
        }
        list_metadata(repository_dir).await
    }
}

/// Test double for `createrepo`: writes the four canonical metadata
/// files, each naming every package file in the repository.
#[derive(Debug, Default)]
pub struct FakeIndex;

const FAKE_METADATA_FILES: [&str; 4] = [
    "repomd.xml",
    "filelists.xml.gz",
    "other.xml.gz",
    "primary.xml.gz",
];

#[async_trait]
impl PackageIndex for FakeIndex {
    async fn build_index(&self, repository_dir: &Path) -> Result<Vec<String>, BoxError> {
        let metadata_dir = repository_dir.join(METADATA_DIRECTORY);
        tokio::fs::create_dir_all(&metadata_dir).await?;

        let mut packages = Vec::new();
        let mut entries = tokio::fs::read_dir(repository_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                packages.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        packages.sort();

        let content = format!("metadata content for: {}", packages.join(","));
        for filename in FAKE_METADATA_FILES {
            tokio::fs::write(metadata_dir.join(filename), &content).await?;
        }
        list_metadata(repository_dir).await
    }
}

/// The metadata files under `repodata/`, relative to the repository dir.
async fn list_metadata(repository_dir: &Path) -> Result<Vec<String>, BoxError> {
    let mut metadata = Vec::new();
    let mut entries = tokio::fs::read_dir(repository_dir.join(METADATA_DIRECTORY)).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            metadata.push(format!(
                "{METADATA_DIRECTORY}/{}",
                entry.file_name().to_string_lossy()
            ));
        }
    }
    metadata.sort();
    Ok(metadata)
}
