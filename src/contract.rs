//! Capability contracts for the external collaborators of the release
//! pipeline: the object store behind the documentation and package
//! buckets, the build-server package source, and the repository metadata
//! builder.
//!
//! The orchestration code in [`crate::publish`] and [`crate::repository`]
//! only ever talks to these traits. Implement them to plug in a real
//! client; tests use the generated `mockall` doubles or the concrete
//! fakes in [`crate::object_store`] and [`crate::package_index`].

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Boxed error used by all capability traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A bucket-and-prefix object store with website routing rules and a CDN
/// distribution in front of it.
///
/// Key names are path-like strings; `list_keys` returns them with the
/// query prefix stripped, and the other operations re-prepend a prefix to
/// each key they touch.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the keys under `prefix`, with the prefix stripped.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<BTreeSet<String>, BoxError>;

    /// Copy every key in `keys` from one bucket/prefix pair to another.
    async fn copy_keys(
        &self,
        source_bucket: &str,
        source_prefix: &str,
        destination_bucket: &str,
        destination_prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), BoxError>;

    /// Delete `prefix + key` for every key in `keys`.
    async fn delete_keys(
        &self,
        bucket: &str,
        prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), BoxError>;

    /// Point the website routing rule for `prefix` at `target_prefix`.
    ///
    /// Returns the previous target, or `None` when there was no rule for
    /// `prefix` or the rule already pointed at `target_prefix`.
    async fn update_routing_rule(
        &self,
        bucket: &str,
        prefix: &str,
        target_prefix: &str,
    ) -> Result<Option<String>, BoxError>;

    /// Ask the CDN distribution known by `cname` to invalidate `paths`.
    async fn create_invalidation(
        &self,
        cname: &str,
        paths: &BTreeSet<String>,
    ) -> Result<(), BoxError>;

    /// Download every key under `prefix` whose name ends in one of
    /// `extensions` into `target_dir`, preserving the key structure below
    /// the prefix. An empty `extensions` list downloads everything.
    async fn download_keys_recursively(
        &self,
        bucket: &str,
        prefix: &str,
        target_dir: &Path,
        extensions: Vec<String>,
    ) -> Result<(), BoxError>;

    /// Upload `files` (paths relative to `source_dir`) into the bucket
    /// under `key`.
    async fn upload_recursively(
        &self,
        source_dir: &Path,
        bucket: &str,
        key: &str,
        files: &BTreeSet<String>,
    ) -> Result<(), BoxError>;
}

/// A source of built packages, usually the build server.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Fetch the named `packages` at `version` from `source_repo` into
    /// `target_dir`, returning the filenames written.
    async fn fetch_packages(
        &self,
        source_repo: &str,
        target_dir: &Path,
        packages: &[String],
        version: &str,
    ) -> Result<Vec<String>, BoxError>;
}

/// A repository metadata builder (`createrepo` or a stand-in).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Rebuild the repository metadata for `repository_dir`.
    ///
    /// Returns the metadata files created or updated, as paths relative
    /// to `repository_dir`.
    async fn build_index(&self, repository_dir: &Path) -> Result<Vec<String>, BoxError>;
}
