//! Publishing a built documentation tree to the documentation bucket and
//! repointing the stable alias at it.
//!
//! The synchronisation is best-effort idempotent: every run re-lists the
//! current remote state and converges on it, so re-running after a
//! partial failure is the recovery mechanism. Nothing here protects
//! against two simultaneous runs for the same documentation version; they
//! can race on the routing-rule update and the stale-key deletion. That
//! hazard is accepted, not locked around.

use std::collections::BTreeSet;

use tracing::info;

use crate::contract::ObjectStore;
use crate::docs::{get_doc_version, is_release, is_weekly_release};
use crate::errors::ReleaseError;

/// The environments documentation can be published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Staging,
}

/// Per-environment publishing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationConfiguration {
    /// Bucket the documentation is published to.
    pub documentation_bucket: String,
    /// CNAME of the CDN distribution in front of the documentation bucket.
    pub cloudfront_cname: String,
    /// Bucket the build server uploads documentation trees to.
    pub dev_bucket: String,
}

impl DocumentationConfiguration {
    /// The static configuration table, keyed by environment.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => DocumentationConfiguration {
                documentation_bucket: "flocker-docs".to_owned(),
                cloudfront_cname: "docs.flocker.io".to_owned(),
                dev_bucket: "flocker-dev-docs".to_owned(),
            },
            Environment::Staging => DocumentationConfiguration {
                documentation_bucket: "flocker-staging-docs".to_owned(),
                cloudfront_cname: "docs.staging.flocker.io".to_owned(),
                dev_bucket: "flocker-dev-docs".to_owned(),
            },
        }
    }
}

/// Publish the documentation tree built for `flocker_version` under
/// documentation version `doc_version`.
///
/// Fails with [`ReleaseError::NotARelease`] when `doc_version` is neither
/// a marketing nor a weekly release, and with [`ReleaseError::NotTagged`]
/// when publishing to production a build whose tag does not match
/// `doc_version`. Both checks run before any remote call.
///
/// The stable alias (`en/latest/` for marketing releases, `en/devel/`
/// otherwise) is repointed at `en/<doc_version>/` only after the new keys
/// are confirmed copied, and the CDN cache is invalidated for every path
/// the publish may have changed.
pub async fn publish_docs<S>(
    store: &S,
    configuration: &DocumentationConfiguration,
    environment: Environment,
    flocker_version: &str,
    doc_version: &str,
) -> Result<(), ReleaseError>
where
    S: ObjectStore + ?Sized,
{
    if !(is_release(doc_version) || is_weekly_release(doc_version)) {
        return Err(ReleaseError::NotARelease);
    }
    if environment == Environment::Production && get_doc_version(flocker_version) != doc_version {
        return Err(ReleaseError::NotTagged);
    }

    let dev_prefix = format!("{flocker_version}/");
    let version_prefix = format!("en/{doc_version}/");

    // Key off being a marketing release rather than a weekly one: a
    // non-marketing build must never land under en/latest/.
    let stable_prefix = if is_release(doc_version) {
        "en/latest/"
    } else {
        "en/devel/"
    };

    info!(
        flocker_version,
        doc_version,
        ?environment,
        stable_prefix,
        "publishing documentation"
    );

    let new_version_keys = store
        .list_keys(&configuration.dev_bucket, &dev_prefix)
        .await
        .map_err(ReleaseError::Remote)?;

    // Only non-empty when re-publishing an existing version, i.e. a
    // documentation release.
    let existing_version_keys = store
        .list_keys(&configuration.documentation_bucket, &version_prefix)
        .await
        .map_err(ReleaseError::Remote)?;

    info!(
        new = new_version_keys.len(),
        existing = existing_version_keys.len(),
        "copying documentation keys"
    );
    store
        .copy_keys(
            &configuration.dev_bucket,
            &dev_prefix,
            &configuration.documentation_bucket,
            &version_prefix,
            &new_version_keys,
        )
        .await
        .map_err(ReleaseError::Remote)?;

    // Prune keys left over from a previous publish of the same version.
    let stale_keys: BTreeSet<String> = existing_version_keys
        .difference(&new_version_keys)
        .cloned()
        .collect();
    store
        .delete_keys(&configuration.documentation_bucket, &version_prefix, &stale_keys)
        .await
        .map_err(ReleaseError::Remote)?;

    let old_prefix = store
        .update_routing_rule(
            &configuration.documentation_bucket,
            stable_prefix,
            &version_prefix,
        )
        .await
        .map_err(ReleaseError::Remote)?;

    // When the stable alias moved, the previous version's pages are now
    // stale in the CDN as well.
    let previous_version_keys = match &old_prefix {
        Some(old) => store
            .list_keys(&configuration.documentation_bucket, old)
            .await
            .map_err(ReleaseError::Remote)?,
        None => BTreeSet::new(),
    };

    let changed_paths = invalidation_paths(
        &new_version_keys,
        &existing_version_keys,
        &previous_version_keys,
        stable_prefix,
        &version_prefix,
    );

    info!(paths = changed_paths.len(), "requesting cache invalidation");
    store
        .create_invalidation(&configuration.cloudfront_cname, &changed_paths)
        .await
        .map_err(ReleaseError::Remote)?;

    Ok(())
}

/// Every path a publish may have changed, expanded over both the stable
/// alias prefix and the version prefix.
///
/// The changed keys are the newly copied keys, the keys deleted from this
/// version, and the keys of the previously aliased version. A changed
/// `.../index.html` also changes its directory path, since the store
/// serves the index file for the bare directory. The bucket root is
/// always included: the routing rule itself changed.
pub fn invalidation_paths(
    new_keys: &BTreeSet<String>,
    existing_keys: &BTreeSet<String>,
    previous_keys: &BTreeSet<String>,
    stable_prefix: &str,
    version_prefix: &str,
) -> BTreeSet<String> {
    let mut changed_keys: BTreeSet<String> = new_keys
        .iter()
        .chain(existing_keys)
        .chain(previous_keys)
        .cloned()
        .collect();

    let directories: Vec<String> = changed_keys
        .iter()
        .filter(|key| key.ends_with("/index.html"))
        .map(|key| key[..key.len() - "index.html".len()].to_owned())
        .collect();
    changed_keys.extend(directories);

    changed_keys.insert(String::new());

    changed_keys
        .iter()
        .flat_map(|key| {
            [stable_prefix, version_prefix]
                .into_iter()
                .map(move |prefix| format!("{prefix}{key}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn root_is_always_invalidated() {
        let empty = BTreeSet::new();
        let paths = invalidation_paths(&empty, &empty, &empty, "en/latest/", "en/0.3.1/");
        assert_eq!(paths, keys(&["en/latest/", "en/0.3.1/"]));
    }

    #[test]
    fn keys_are_expanded_over_both_prefixes() {
        let new = keys(&["page.html"]);
        let empty = BTreeSet::new();
        let paths = invalidation_paths(&new, &empty, &empty, "en/devel/", "en/0.3.1dev2/");
        assert!(paths.contains("en/devel/page.html"));
        assert!(paths.contains("en/0.3.1dev2/page.html"));
    }

    #[test]
    fn changed_index_html_also_invalidates_its_directory() {
        let new = keys(&["sub/index.html"]);
        let empty = BTreeSet::new();
        let paths = invalidation_paths(&new, &empty, &empty, "en/latest/", "en/0.3.1/");
        assert!(paths.contains("en/latest/sub/"));
        assert!(paths.contains("en/0.3.1/sub/"));
        assert!(paths.contains("en/latest/sub/index.html"));
    }

    #[test]
    fn a_root_index_html_key_is_not_treated_as_a_directory() {
        // Only keys ending in "/index.html" get the directory treatment;
        // the bare root key is covered by the always-included root.
        let new = keys(&["index.html"]);
        let empty = BTreeSet::new();
        let paths = invalidation_paths(&new, &empty, &empty, "en/latest/", "en/0.3.1/");
        assert_eq!(
            paths,
            keys(&[
                "en/latest/",
                "en/0.3.1/",
                "en/latest/index.html",
                "en/0.3.1/index.html",
            ])
        );
    }

    #[test]
    fn deleted_and_previous_keys_are_included() {
        let new = keys(&["new.html"]);
        let existing = keys(&["stale.html"]);
        let previous = keys(&["old.html"]);
        let paths = invalidation_paths(&new, &existing, &previous, "en/latest/", "en/0.3.1/");
        for key in ["new.html", "stale.html", "old.html"] {
            assert!(paths.contains(&format!("en/latest/{key}")));
            assert!(paths.contains(&format!("en/0.3.1/{key}")));
        }
    }
}
