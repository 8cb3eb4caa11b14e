//! Parsing of versioneer-style version strings into RPM-compatible form.
//!
//! A version string looks like `0.1.2pre2-69-gd2ff20c-dirty`: a tag,
//! optionally decorated with a commit distance, a short commit id and a
//! `dirty` marker. Pre-release tags follow the Fedora pre-release naming
//! guidelines, so `0.1.2pre2` packages as version `0.1.2`, release
//! `0.pre.2`.

use thiserror::Error;

/// An RPM-compatible `(version, release)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpmVersion {
    pub version: String,
    pub release: String,
}

/// Recognised pre-release suffix kinds, in the order they are tried.
/// `pre` wins when both could match.
pub const PRE_RELEASE_SUFFIXES: [&str; 2] = ["pre", "dev"];

/// A `pre` or `dev` suffix whose number is not entirely digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("non-integer value \"{number}\" for \"{suffix}\" in version \"{input}\"")]
pub struct InvalidPreReleaseNumber {
    pub number: String,
    pub suffix: &'static str,
    pub input: String,
}

/// Parse a versioneer-style version string into an [`RpmVersion`].
///
/// The tag is split on the last occurrence of a recognised suffix kind.
/// A matched suffix yields version `base` and release tokens
/// `["0", suffix, number]`; without one the tag itself is the version and
/// the release starts as `["1"]`. Any distance/shortid/dirty tokens after
/// the tag are appended verbatim, so `0.1.2pre2-69-gd2ff20c-dirty`
/// becomes `("0.1.2", "0.pre.2.69.gd2ff20c.dirty")`.
pub fn make_rpm_version(flocker_version: &str) -> Result<RpmVersion, InvalidPreReleaseNumber> {
    let mut parts = flocker_version.split('-');
    let tag = parts.next().unwrap_or("");
    let remainder: Vec<&str> = parts.collect();

    let (version, mut release) = match split_pre_release(tag) {
        Some((base, suffix, number)) => {
            if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
                return Err(InvalidPreReleaseNumber {
                    number: number.to_owned(),
                    suffix,
                    input: flocker_version.to_owned(),
                });
            }
            (
                base.to_owned(),
                vec!["0".to_owned(), suffix.to_owned(), number.to_owned()],
            )
        }
        None => (tag.to_owned(), vec!["1".to_owned()]),
    };

    release.extend(remainder.into_iter().map(str::to_owned));

    Ok(RpmVersion {
        version,
        release: release.join("."),
    })
}

/// Split `tag` on the last occurrence of the first matching suffix kind.
fn split_pre_release(tag: &str) -> Option<(&str, &'static str, &str)> {
    for suffix in PRE_RELEASE_SUFFIXES {
        if let Some(index) = tag.rfind(suffix) {
            return Some((&tag[..index], suffix, &tag[index + suffix.len()..]));
        }
    }
    None
}
