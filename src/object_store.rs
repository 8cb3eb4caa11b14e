//! Concrete [`ObjectStore`] implementations.
//!
//! [`InMemoryObjectStore`] is the first-class test double: enough of a
//! bucket store to exercise `publish_docs` and `update_repo` end to end,
//! with accessors for seeding and asserting on state.
//!
//! [`FsObjectStore`] keeps buckets as directories under a root and is
//! what the CLI wires in. The real S3/CloudFront client lives behind the
//! same trait, outside this crate.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::{BoxError, ObjectStore};

/// A recorded CDN invalidation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub cname: String,
    pub paths: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    /// bucket -> key -> content
    buckets: HashMap<String, BTreeMap<String, Vec<u8>>>,
    /// bucket -> prefix -> target prefix
    routing_rules: HashMap<String, BTreeMap<String, String>>,
    invalidations: Vec<Invalidation>,
}

/// In-memory object store, mirroring the remote store's observable
/// behaviour: prefix-stripped listings, routing-rule updates that report
/// the previous target, and recorded invalidation requests.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    state: Mutex<StoreState>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object into a bucket.
    pub fn put_object(&self, bucket: &str, key: &str, content: &[u8]) {
        let mut state = self.state.lock().expect("store mutex");
        state
            .buckets
            .entry(bucket.to_owned())
            .or_default()
            .insert(key.to_owned(), content.to_vec());
    }

    /// Seed a routing rule.
    pub fn set_routing_rule(&self, bucket: &str, prefix: &str, target_prefix: &str) {
        let mut state = self.state.lock().expect("store mutex");
        state
            .routing_rules
            .entry(bucket.to_owned())
            .or_default()
            .insert(prefix.to_owned(), target_prefix.to_owned());
    }

    /// The current routing target for `prefix`, if any.
    pub fn routing_rule(&self, bucket: &str, prefix: &str) -> Option<String> {
        let state = self.state.lock().expect("store mutex");
        state
            .routing_rules
            .get(bucket)
            .and_then(|rules| rules.get(prefix))
            .cloned()
    }

    /// The content of an object, if present.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().expect("store mutex");
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    /// Every key currently in `bucket`.
    pub fn keys(&self, bucket: &str) -> BTreeSet<String> {
        let state = self.state.lock().expect("store mutex");
        state
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every invalidation requested so far, oldest first.
    pub fn invalidations(&self) -> Vec<Invalidation> {
        let state = self.state.lock().expect("store mutex");
        state.invalidations.clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<BTreeSet<String>, BoxError> {
        let state = self.state.lock().expect("store mutex");
        Ok(state
            .buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .keys()
                    .filter(|key| key.starts_with(prefix))
                    .map(|key| key[prefix.len()..].to_owned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn copy_keys(
        &self,
        source_bucket: &str,
        source_prefix: &str,
        destination_bucket: &str,
        destination_prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), BoxError> {
        let mut state = self.state.lock().expect("store mutex");
        for key in keys {
            let source_key = format!("{source_prefix}{key}");
            let content = state
                .buckets
                .get(source_bucket)
                .and_then(|objects| objects.get(&source_key))
                .cloned()
                .ok_or_else(|| format!("no such key: {source_bucket}/{source_key}"))?;
            state
                .buckets
                .entry(destination_bucket.to_owned())
                .or_default()
                .insert(format!("{destination_prefix}{key}"), content);
        }
        Ok(())
    }

    async fn delete_keys(
        &self,
        bucket: &str,
        prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), BoxError> {
        let mut state = self.state.lock().expect("store mutex");
        for key in keys {
            let full_key = format!("{prefix}{key}");
            state
                .buckets
                .get_mut(bucket)
                .and_then(|objects| objects.remove(&full_key))
                .ok_or_else(|| format!("no such key: {bucket}/{full_key}"))?;
        }
        Ok(())
    }

    async fn update_routing_rule(
        &self,
        bucket: &str,
        prefix: &str,
        target_prefix: &str,
    ) -> Result<Option<String>, BoxError> {
        let mut state = self.state.lock().expect("store mutex");
        let previous = state
            .routing_rules
            .entry(bucket.to_owned())
            .or_default()
            .insert(prefix.to_owned(), target_prefix.to_owned());
        // An unchanged rule reports no previous target, like the remote
        // website configuration does.
        Ok(previous.filter(|target| target != target_prefix))
    }

    async fn create_invalidation(
        &self,
        cname: &str,
        paths: &BTreeSet<String>,
    ) -> Result<(), BoxError> {
        let mut state = self.state.lock().expect("store mutex");
        state.invalidations.push(Invalidation {
            cname: cname.to_owned(),
            paths: paths.clone(),
        });
        Ok(())
    }

    async fn download_keys_recursively(
        &self,
        bucket: &str,
        prefix: &str,
        target_dir: &Path,
        extensions: Vec<String>,
    ) -> Result<(), BoxError> {
        let prefix = directory_prefix(prefix);
        let entries: Vec<(String, Vec<u8>)> = {
            let state = self.state.lock().expect("store mutex");
            state
                .buckets
                .get(bucket)
                .map(|objects| {
                    objects
                        .iter()
                        .filter(|(key, _)| {
                            key.starts_with(&prefix) && matches_extension(key, &extensions)
                        })
                        .map(|(key, content)| (key[prefix.len()..].to_owned(), content.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        for (relative, content) in entries {
            let path = target_dir.join(&relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, content).await?;
        }
        Ok(())
    }

    async fn upload_recursively(
        &self,
        source_dir: &Path,
        bucket: &str,
        key: &str,
        files: &BTreeSet<String>,
    ) -> Result<(), BoxError> {
        let prefix = directory_prefix(key);
        for file in files {
            let content = tokio::fs::read(source_dir.join(file)).await?;
            let mut state = self.state.lock().expect("store mutex");
            state
                .buckets
                .entry(bucket.to_owned())
                .or_default()
                .insert(format!("{prefix}{file}"), content);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RoutingRules {
    rules: BTreeMap<String, String>,
}

/// Filesystem-backed object store: each bucket is a directory under the
/// root, keys are relative file paths, and routing rules live in a JSON
/// sidecar next to the bucket directory. Invalidation requests are only
/// logged; the CDN distribution is an external system.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn rules_path(&self, bucket: &str) -> PathBuf {
        self.root.join(format!("{bucket}.routing-rules.json"))
    }

    fn load_rules(&self, bucket: &str) -> Result<RoutingRules, BoxError> {
        let path = self.rules_path(bucket);
        if !path.exists() {
            return Ok(RoutingRules::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn store_rules(&self, bucket: &str, rules: &RoutingRules) -> Result<(), BoxError> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.rules_path(bucket), serde_json::to_string_pretty(rules)?)?;
        Ok(())
    }

    /// Keys in `bucket` starting with `prefix`, prefix included.
    fn keys_under(&self, bucket: &str, prefix: &str) -> Result<BTreeSet<String>, BoxError> {
        let bucket_dir = self.bucket_dir(bucket);
        let mut keys = BTreeSet::new();
        for path in walk_files(&bucket_dir)? {
            let relative = path.strip_prefix(&bucket_dir)?;
            let key = relative.to_string_lossy().into_owned();
            if key.starts_with(prefix) {
                keys.insert(key);
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<BTreeSet<String>, BoxError> {
        Ok(self
            .keys_under(bucket, prefix)?
            .into_iter()
            .map(|key| key[prefix.len()..].to_owned())
            .collect())
    }

    async fn copy_keys(
        &self,
        source_bucket: &str,
        source_prefix: &str,
        destination_bucket: &str,
        destination_prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), BoxError> {
        for key in keys {
            let source = self
                .bucket_dir(source_bucket)
                .join(format!("{source_prefix}{key}"));
            let destination = self
                .bucket_dir(destination_bucket)
                .join(format!("{destination_prefix}{key}"));
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(source, destination).await?;
        }
        Ok(())
    }

    async fn delete_keys(
        &self,
        bucket: &str,
        prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), BoxError> {
        for key in keys {
            tokio::fs::remove_file(self.bucket_dir(bucket).join(format!("{prefix}{key}"))).await?;
        }
        Ok(())
    }

    async fn update_routing_rule(
        &self,
        bucket: &str,
        prefix: &str,
        target_prefix: &str,
    ) -> Result<Option<String>, BoxError> {
        let mut rules = self.load_rules(bucket)?;
        let previous = rules
            .rules
            .insert(prefix.to_owned(), target_prefix.to_owned());
        self.store_rules(bucket, &rules)?;
        Ok(previous.filter(|target| target != target_prefix))
    }

    async fn create_invalidation(
        &self,
        cname: &str,
        paths: &BTreeSet<String>,
    ) -> Result<(), BoxError> {
        // The CDN is external to the filesystem store; record the request
        // in the log so operators can replay it.
        info!(cname, paths = paths.len(), "cache invalidation requested");
        debug!(?paths, "invalidation paths");
        Ok(())
    }

    async fn download_keys_recursively(
        &self,
        bucket: &str,
        prefix: &str,
        target_dir: &Path,
        extensions: Vec<String>,
    ) -> Result<(), BoxError> {
        let prefix = directory_prefix(prefix);
        for key in self.keys_under(bucket, &prefix)? {
            if !matches_extension(&key, &extensions) {
                continue;
            }
            let target = target_dir.join(&key[prefix.len()..]);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(self.bucket_dir(bucket).join(&key), target).await?;
        }
        Ok(())
    }

    async fn upload_recursively(
        &self,
        source_dir: &Path,
        bucket: &str,
        key: &str,
        files: &BTreeSet<String>,
    ) -> Result<(), BoxError> {
        let prefix = directory_prefix(key);
        for file in files {
            let destination = self.bucket_dir(bucket).join(format!("{prefix}{file}"));
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(source_dir.join(file), destination).await?;
        }
        Ok(())
    }
}

/// `prefix` with a trailing slash unless empty or already terminated.
fn directory_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_owned()
    } else {
        format!("{prefix}/")
    }
}

fn matches_extension(key: &str, extensions: &[String]) -> bool {
    extensions.is_empty() || extensions.iter().any(|extension| key.ends_with(extension))
}

/// All regular files below `root`, in no particular order. A missing
/// root is an empty listing.
fn walk_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(directory) = pending.pop() {
        for entry in std::fs::read_dir(&directory)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                pending.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}
