//! Merging freshly built packages into the remote package repositories.
//!
//! The repository on the object store is persistent: a release adds its
//! packages to it without discarding the unrelated packages already
//! there. To do that we download the current repository, add the new
//! packages, rebuild the metadata, and upload only what this merge
//! produced. A failed merge is not rolled back; the remote repository is
//! left in whatever partial state the store reflects.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;

use crate::contract::{ObjectStore, PackageIndex, PackageSource};
use crate::docs::{get_doc_version, is_release, is_weekly_release};
use crate::errors::ReleaseError;

/// Packages shipped to the distribution repositories.
pub const FLOCKER_PACKAGES: [&str; 3] = [
    "clusterhq-python-flocker",
    "clusterhq-flocker-cli",
    "clusterhq-flocker-node",
];

/// Default bucket `upload-packages` publishes to.
pub const ARCHIVE_BUCKET: &str = "flocker-archive";

/// Default build server packages are fetched from.
pub const BUILD_SERVER: &str = "http://build.flocker.io";

/// The distributions a release ships packages for.
const DISTRIBUTIONS: [Distribution; 2] = [
    Distribution {
        staging_directory: "fedora-20-x86_64",
        key_suffix: "fedora/20/x86_64",
        repo_suffix: "fedora-20",
    },
    Distribution {
        staging_directory: "centos-7-x86_64",
        key_suffix: "centos/7/x86_64",
        repo_suffix: "centos-7",
    },
];

struct Distribution {
    staging_directory: &'static str,
    key_suffix: &'static str,
    repo_suffix: &'static str,
}

/// Merge `packages` at `version` from `source_repo` into the repository
/// at `target_bucket`/`target_key`.
///
/// The upload covers exactly the newly fetched packages plus the
/// metadata files the index builder reports; pre-existing packages are
/// neither re-uploaded nor deleted.
#[allow(clippy::too_many_arguments)]
pub async fn update_repo<S, P, I>(
    store: &S,
    source: &P,
    index: &I,
    rpm_directory: &Path,
    target_bucket: &str,
    target_key: &str,
    source_repo: &str,
    packages: &[String],
    version: &str,
) -> Result<(), ReleaseError>
where
    S: ObjectStore + ?Sized,
    P: PackageSource + ?Sized,
    I: PackageIndex + ?Sized,
{
    info!(target_bucket, target_key, source_repo, "updating repository");

    tokio::fs::create_dir_all(rpm_directory)
        .await
        .map_err(|error| ReleaseError::Remote(error.into()))?;

    store
        .download_keys_recursively(
            target_bucket,
            target_key,
            rpm_directory,
            vec![".rpm".to_owned()],
        )
        .await
        .map_err(ReleaseError::Remote)?;

    let downloaded_packages = source
        .fetch_packages(source_repo, rpm_directory, packages, version)
        .await
        .map_err(ReleaseError::Remote)?;
    info!(fetched = downloaded_packages.len(), "fetched new packages");

    let repository_metadata = index
        .build_index(rpm_directory)
        .await
        .map_err(ReleaseError::Remote)?;

    let files: BTreeSet<String> = downloaded_packages
        .into_iter()
        .chain(repository_metadata)
        .collect();
    info!(files = files.len(), "uploading merged repository");
    store
        .upload_recursively(rpm_directory, target_bucket, target_key, &files)
        .await
        .map_err(ReleaseError::Remote)?;

    Ok(())
}

/// Upload the packages built for `version` to every distribution
/// repository under `target_bucket`.
///
/// Fails with [`ReleaseError::NotARelease`] for versions that are neither
/// marketing nor weekly releases, and with
/// [`ReleaseError::DocumentationRelease`] for documentation-only releases,
/// both before any download starts.
pub async fn upload_packages<S, P, I>(
    store: &S,
    source: &P,
    index: &I,
    scratch_directory: &Path,
    target_bucket: &str,
    version: &str,
    build_server: &str,
) -> Result<(), ReleaseError>
where
    S: ObjectStore + ?Sized,
    P: PackageSource + ?Sized,
    I: PackageIndex + ?Sized,
{
    if !(is_release(version) || is_weekly_release(version)) {
        return Err(ReleaseError::NotARelease);
    }
    if get_doc_version(version) != version {
        return Err(ReleaseError::DocumentationRelease);
    }

    let release_type = if is_release(version) {
        "marketing"
    } else {
        "development"
    };

    let packages: Vec<String> = FLOCKER_PACKAGES.iter().map(|name| (*name).to_owned()).collect();

    for distribution in &DISTRIBUTIONS {
        update_repo(
            store,
            source,
            index,
            &scratch_directory.join(distribution.staging_directory),
            target_bucket,
            &format!("{release_type}/{}", distribution.key_suffix),
            &format!(
                "{build_server}/results/omnibus/{version}/{}",
                distribution.repo_suffix
            ),
            &packages,
            version,
        )
        .await?;
    }

    Ok(())
}
