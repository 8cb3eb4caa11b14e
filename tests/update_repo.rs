//! Behaviour of the package repository merge and the upload-packages
//! orchestration, against the in-memory store, the directory package
//! source and the fake index builder.

use std::collections::BTreeSet;

use flocker_release::contract::{MockObjectStore, MockPackageIndex, MockPackageSource};
use flocker_release::errors::ReleaseError;
use flocker_release::object_store::InMemoryObjectStore;
use flocker_release::package_index::FakeIndex;
use flocker_release::package_source::DirectoryPackageSource;
use flocker_release::repository::{update_repo, upload_packages};
use tempfile::tempdir;

fn packages(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

#[tokio::test]
async fn merge_preserves_existing_packages() {
    let store = InMemoryObjectStore::new();
    let target_key = "development/centos/7/x86_64";
    store.put_object(
        "archive",
        &format!("{target_key}/existing-pkg-0.3.0-1.noarch.rpm"),
        b"existing package",
    );
    store.put_object(
        "archive",
        &format!("{target_key}/repodata/repomd.xml"),
        b"old metadata",
    );

    let source_repo = tempdir().unwrap();
    std::fs::write(
        source_repo.path().join("clusterhq-flocker-cli-0.3.2-1.noarch.rpm"),
        b"new cli package",
    )
    .unwrap();
    let scratch = tempdir().unwrap();

    update_repo(
        &store,
        &DirectoryPackageSource,
        &FakeIndex,
        &scratch.path().join("repo"),
        "archive",
        target_key,
        &format!("file://{}", source_repo.path().display()),
        &packages(&["clusterhq-flocker-cli"]),
        "0.3.2",
    )
    .await
    .unwrap();

    let keys = store.keys("archive");
    // The unrelated pre-existing package is untouched.
    assert!(keys.contains(&format!("{target_key}/existing-pkg-0.3.0-1.noarch.rpm")));
    assert_eq!(
        store.object("archive", &format!("{target_key}/existing-pkg-0.3.0-1.noarch.rpm")),
        Some(b"existing package".to_vec())
    );
    // The new package and the regenerated metadata are uploaded.
    assert!(keys.contains(&format!("{target_key}/clusterhq-flocker-cli-0.3.2-1.noarch.rpm")));
    let metadata = store
        .object("archive", &format!("{target_key}/repodata/repomd.xml"))
        .unwrap();
    let metadata = String::from_utf8(metadata).unwrap();
    // The index saw the merged repository: old and new packages together.
    assert!(metadata.contains("existing-pkg-0.3.0-1.noarch.rpm"));
    assert!(metadata.contains("clusterhq-flocker-cli-0.3.2-1.noarch.rpm"));
}

#[tokio::test]
async fn merge_uploads_exactly_the_fetched_packages_and_metadata() {
    let mut store = MockObjectStore::new();
    store
        .expect_download_keys_recursively()
        .returning(|_, _, target_dir, _| {
            std::fs::create_dir_all(target_dir).unwrap();
            std::fs::write(
                target_dir.join("existing-pkg-0.3.0-1.noarch.rpm"),
                b"existing",
            )
            .unwrap();
            Ok(())
        });
    store
        .expect_upload_recursively()
        .withf(|_, bucket, key, files| {
            let expected: BTreeSet<String> = [
                "clusterhq-flocker-cli-0.3.2-1.noarch.rpm",
                "repodata/filelists.xml.gz",
                "repodata/other.xml.gz",
                "repodata/primary.xml.gz",
                "repodata/repomd.xml",
            ]
            .iter()
            .map(|file| (*file).to_owned())
            .collect();
            bucket == "archive" && key == "marketing/fedora/20/x86_64" && *files == expected
        })
        .returning(|_, _, _, _| Ok(()));

    let source_repo = tempdir().unwrap();
    std::fs::write(
        source_repo.path().join("clusterhq-flocker-cli-0.3.2-1.noarch.rpm"),
        b"new cli package",
    )
    .unwrap();
    let scratch = tempdir().unwrap();

    update_repo(
        &store,
        &DirectoryPackageSource,
        &FakeIndex,
        &scratch.path().join("repo"),
        "archive",
        "marketing/fedora/20/x86_64",
        &format!("file://{}", source_repo.path().display()),
        &packages(&["clusterhq-flocker-cli"]),
        "0.3.2",
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn merge_aborts_when_the_index_builder_fails() {
    let mut store = MockObjectStore::new();
    store
        .expect_download_keys_recursively()
        .returning(|_, _, _, _| Ok(()));
    // No upload expectation: an upload after the failed index would
    // panic the mock.

    let mut index = MockPackageIndex::new();
    index
        .expect_build_index()
        .returning(|_| Err("createrepo failed: exit status: 1".into()));

    let source_repo = tempdir().unwrap();
    let scratch = tempdir().unwrap();

    let result = update_repo(
        &store,
        &DirectoryPackageSource,
        &index,
        &scratch.path().join("repo"),
        "archive",
        "marketing/fedora/20/x86_64",
        &format!("file://{}", source_repo.path().display()),
        &packages(&["clusterhq-flocker-cli"]),
        "0.3.2",
    )
    .await;

    assert!(matches!(result, Err(ReleaseError::Remote(_))));
}

#[tokio::test]
async fn upload_packages_fills_every_distribution_repository() {
    let store = InMemoryObjectStore::new();
    let build_server = tempdir().unwrap();
    for distribution in ["fedora-20", "centos-7"] {
        let repo = build_server
            .path()
            .join("results/omnibus/0.3.2")
            .join(distribution);
        std::fs::create_dir_all(&repo).unwrap();
        for package in [
            "clusterhq-python-flocker",
            "clusterhq-flocker-cli",
            "clusterhq-flocker-node",
        ] {
            std::fs::write(
                repo.join(format!("{package}-0.3.2-1.noarch.rpm")),
                b"package",
            )
            .unwrap();
        }
    }
    let scratch = tempdir().unwrap();

    upload_packages(
        &store,
        &DirectoryPackageSource,
        &FakeIndex,
        scratch.path(),
        "archive",
        "0.3.2",
        &format!("file://{}", build_server.path().display()),
    )
    .await
    .unwrap();

    let keys = store.keys("archive");
    for key_suffix in ["fedora/20/x86_64", "centos/7/x86_64"] {
        assert!(keys.contains(&format!(
            "marketing/{key_suffix}/clusterhq-flocker-cli-0.3.2-1.noarch.rpm"
        )));
        assert!(keys.contains(&format!("marketing/{key_suffix}/repodata/repomd.xml")));
    }
}

#[tokio::test]
async fn weekly_versions_upload_to_the_development_repository() {
    let store = InMemoryObjectStore::new();
    let build_server = tempdir().unwrap();
    for distribution in ["fedora-20", "centos-7"] {
        let repo = build_server
            .path()
            .join("results/omnibus/0.3.2dev1")
            .join(distribution);
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(
            repo.join("clusterhq-flocker-cli-0.3.2-0.dev.1.noarch.rpm"),
            b"package",
        )
        .unwrap();
    }
    let scratch = tempdir().unwrap();

    upload_packages(
        &store,
        &DirectoryPackageSource,
        &FakeIndex,
        scratch.path(),
        "archive",
        "0.3.2dev1",
        &format!("file://{}", build_server.path().display()),
    )
    .await
    .unwrap();

    let keys = store.keys("archive");
    assert!(keys.contains(
        "development/fedora/20/x86_64/clusterhq-flocker-cli-0.3.2-0.dev.1.noarch.rpm"
    ));
}

#[tokio::test]
async fn non_release_fails_before_any_download() {
    let store = MockObjectStore::new();
    let source = MockPackageSource::new();
    let index = MockPackageIndex::new();
    let scratch = tempdir().unwrap();

    let result = upload_packages(
        &store,
        &source,
        &index,
        scratch.path(),
        "archive",
        "0.3.2-1-gabc1234",
        "http://build.example.com",
    )
    .await;

    assert!(matches!(result, Err(ReleaseError::NotARelease)));
}

#[tokio::test]
async fn documentation_release_fails_before_any_download() {
    let store = MockObjectStore::new();
    let source = MockPackageSource::new();
    let index = MockPackageIndex::new();
    let scratch = tempdir().unwrap();

    let result = upload_packages(
        &store,
        &source,
        &index,
        scratch.path(),
        "archive",
        "0.3.0+doc1",
        "http://build.example.com",
    )
    .await;

    assert!(matches!(result, Err(ReleaseError::DocumentationRelease)));
}
