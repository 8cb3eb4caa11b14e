//! Fetching built packages from the build server.
//!
//! [`HttpPackageSource`] scrapes the build server's directory listing and
//! downloads the package files for a release. [`DirectoryPackageSource`]
//! serves the same contract from a local directory (`file://` build
//! servers), which is also what the merge tests run against.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use futures::future::try_join_all;
use regex::Regex;
use tracing::info;

use crate::contract::{BoxError, PackageSource};
use crate::version::make_rpm_version;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).expect("static pattern"));

/// Fetches packages over HTTP from an autoindexed repository directory.
#[derive(Debug, Default)]
pub struct HttpPackageSource {
    client: reqwest::Client,
}

impl HttpPackageSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageSource for HttpPackageSource {
    async fn fetch_packages(
        &self,
        source_repo: &str,
        target_dir: &Path,
        packages: &[String],
        version: &str,
    ) -> Result<Vec<String>, BoxError> {
        // Package files are named `<package>-<rpm version>-<release>...`,
        // so the rpm version picks this release's builds out of the
        // listing.
        let rpm_version = make_rpm_version(version)?;
        let base = if source_repo.ends_with('/') {
            source_repo.to_owned()
        } else {
            format!("{source_repo}/")
        };

        info!(source_repo = %base, "listing build server repository");
        let listing = self
            .client
            .get(&base)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let names = matching_links(&listing, packages, &rpm_version.version);

        let downloads = names.iter().map(|name| {
            let url = format!("{base}{name}");
            async move {
                let bytes = self
                    .client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                tokio::fs::write(target_dir.join(name.as_str()), &bytes).await?;
                Ok::<_, BoxError>(())
            }
        });
        try_join_all(downloads).await?;

        info!(fetched = names.len(), "downloaded packages");
        Ok(names)
    }
}

/// The listing filenames that belong to the requested packages at the
/// given rpm version, in listing order and deduplicated.
fn matching_links(listing: &str, packages: &[String], rpm_version: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in LINK_RE.captures_iter(listing) {
        let target = &captures[1];
        let name = target.rsplit('/').next().unwrap_or(target);
        if name.is_empty() || name.contains('?') {
            continue;
        }
        let wanted = packages
            .iter()
            .any(|package| name.starts_with(&format!("{package}-{rpm_version}")));
        if wanted && !names.iter().any(|existing| existing == name) {
            names.push(name.to_owned());
        }
    }
    names
}

/// Fetches packages from a local repository directory, addressed either
/// as a plain path or a `file://` URL. Copies every file whose name
/// starts with a requested package name.
#[derive(Debug, Default)]
pub struct DirectoryPackageSource;

#[async_trait]
impl PackageSource for DirectoryPackageSource {
    async fn fetch_packages(
        &self,
        source_repo: &str,
        target_dir: &Path,
        packages: &[String],
        _version: &str,
    ) -> Result<Vec<String>, BoxError> {
        let directory = match source_repo.strip_prefix("file://") {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(source_repo),
        };

        let mut fetched = Vec::new();
        let mut entries = tokio::fs::read_dir(&directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if packages.iter().any(|package| name.starts_with(package.as_str())) {
                tokio::fs::copy(entry.path(), target_dir.join(&name)).await?;
                fetched.push(name);
            }
        }
        fetched.sort();
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packages(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn matching_links_picks_package_files_at_the_right_version() {
        let listing = concat!(
            r#"<a href="../">../</a>"#,
            r#"<a href="clusterhq-flocker-cli-0.3.2-1.noarch.rpm">cli</a>"#,
            r#"<a href="clusterhq-flocker-cli-0.3.1-1.noarch.rpm">old cli</a>"#,
            r#"<a href="clusterhq-flocker-node-0.3.2-1.noarch.rpm">node</a>"#,
            r#"<a href="unrelated-0.3.2.rpm">other</a>"#,
        );
        let names = matching_links(
            listing,
            &packages(&["clusterhq-flocker-cli", "clusterhq-flocker-node"]),
            "0.3.2",
        );
        assert_eq!(
            names,
            vec![
                "clusterhq-flocker-cli-0.3.2-1.noarch.rpm",
                "clusterhq-flocker-node-0.3.2-1.noarch.rpm",
            ]
        );
    }

    #[test]
    fn matching_links_strips_directories_and_deduplicates() {
        let listing = concat!(
            r#"<a href="sub/pkg-1.0-1.rpm">nested</a>"#,
            r#"<a href="pkg-1.0-1.rpm">plain</a>"#,
        );
        let names = matching_links(listing, &packages(&["pkg"]), "1.0");
        assert_eq!(names, vec!["pkg-1.0-1.rpm"]);
    }

    #[tokio::test]
    async fn directory_source_copies_matching_files() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("pkg-a-1.0.rpm"), b"a").unwrap();
        std::fs::write(repo.path().join("pkg-b-1.0.rpm"), b"b").unwrap();
        std::fs::write(repo.path().join("other-1.0.rpm"), b"x").unwrap();
        let target = tempfile::tempdir().unwrap();

        let fetched = DirectoryPackageSource
            .fetch_packages(
                &format!("file://{}", repo.path().display()),
                target.path(),
                &packages(&["pkg-a", "pkg-b"]),
                "1.0",
            )
            .await
            .unwrap();

        assert_eq!(fetched, vec!["pkg-a-1.0.rpm", "pkg-b-1.0.rpm"]);
        assert!(target.path().join("pkg-a-1.0.rpm").exists());
        assert!(!target.path().join("other-1.0.rpm").exists());
    }
}
