//! Release automation for the Flocker distribution pipeline.
//!
//! Two orchestrations make up the crate: [`publish::publish_docs`]
//! synchronises a built documentation tree into the documentation bucket
//! and repoints the stable alias, and [`repository::upload_packages`]
//! merges freshly built packages into the persistent distribution
//! repositories. Both speak to their collaborators only through the
//! traits in [`contract`], so tests substitute in-memory fakes and
//! generated mocks.

pub mod cli;
pub mod contract;
pub mod docs;
pub mod errors;
pub mod object_store;
pub mod package_index;
pub mod package_source;
pub mod publish;
pub mod repository;
pub mod version;

pub use cli::{run, Cli, Commands};
