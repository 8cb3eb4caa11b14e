//! Command-line interface: argument parsing and wiring of the concrete
//! collaborators into the orchestration code.
//!
//! All business logic lives in [`crate::publish`] and
//! [`crate::repository`]; this module is CLI glue. The async [`run`]
//! entrypoint is separate from `main` so integration tests can invoke it
//! with a constructed [`Cli`].

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::contract::PackageSource;
use crate::docs::get_doc_version;
use crate::object_store::FsObjectStore;
use crate::package_index::CreaterepoIndex;
use crate::package_source::{DirectoryPackageSource, HttpPackageSource};
use crate::publish::{publish_docs, DocumentationConfiguration, Environment};
use crate::repository::{upload_packages, ARCHIVE_BUCKET, BUILD_SERVER};

/// Release automation: publish documentation and upload distribution
/// packages.
#[derive(Parser)]
#[clap(
    name = "flocker-release",
    version,
    about = "Publish documentation trees and merge built packages into the distribution repositories"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Root directory backing the object store
    #[clap(long, global = true, default_value = "/srv/object-store", env = "OBJECT_STORE_ROOT")]
    pub store_root: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a built documentation tree and repoint the stable alias
    PublishDocs {
        /// The version the documentation was built from
        #[clap(long, default_value = env!("CARGO_PKG_VERSION"))]
        flocker_version: String,

        /// The version to publish the documentation as; defaults to the
        /// doc version derived from --flocker-version
        #[clap(long)]
        doc_version: Option<String>,

        /// Publish to production instead of staging
        #[clap(long)]
        production: bool,
    },
    /// Merge freshly built packages into the distribution repositories
    UploadPackages {
        /// The version to upload packages for
        version: String,

        /// The bucket to upload packages to
        #[clap(long, default_value = ARCHIVE_BUCKET)]
        target: String,

        /// The URL of the build server
        #[clap(long, default_value = BUILD_SERVER)]
        build_server: String,
    },
}

/// Async CLI entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let store = FsObjectStore::new(cli.store_root);

    match cli.command {
        Commands::PublishDocs {
            flocker_version,
            doc_version,
            production,
        } => {
            let environment = if production {
                Environment::Production
            } else {
                Environment::Staging
            };
            let doc_version =
                doc_version.unwrap_or_else(|| get_doc_version(&flocker_version));
            let configuration = DocumentationConfiguration::for_environment(environment);

            info!(command = "publish-docs", flocker_version, doc_version, "starting");
            publish_docs(
                &store,
                &configuration,
                environment,
                &flocker_version,
                &doc_version,
            )
            .await?;
            info!(command = "publish-docs", "documentation published");
            Ok(())
        }
        Commands::UploadPackages {
            version,
            target,
            build_server,
        } => {
            // file:// build servers are served straight from the
            // filesystem, anything else through HTTP.
            let source: Box<dyn PackageSource> = if build_server.starts_with("file://") {
                Box::new(DirectoryPackageSource)
            } else {
                Box::new(HttpPackageSource::new())
            };
            let scratch_directory = tempfile::Builder::new()
                .prefix("flocker-upload-rpm-")
                .tempdir()?;

            info!(command = "upload-packages", version, target, "starting");
            let result = upload_packages(
                &store,
                source.as_ref(),
                &CreaterepoIndex,
                scratch_directory.path(),
                &target,
                &version,
                &build_server,
            )
            .await;
            // The scratch directory is removed on drop, success or
            // failure.
            drop(scratch_directory);
            result?;
            info!(command = "upload-packages", "repositories updated");
            Ok(())
        }
    }
}
