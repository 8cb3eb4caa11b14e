//! Release classification: which versions are releases, and which
//! documentation version a build is published under.
//!
//! The grammar here is release policy:
//! - marketing release: `X.Y.Z`, optionally with a `+docN` counter for a
//!   documentation-only re-release of the same code;
//! - weekly release: `X.Y.ZdevN`, the automated development cadence.
//!
//! The two predicates are mutually exclusive over well-formed input.

use std::sync::LazyLock;

use regex::Regex;

static RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+(\+doc\d+)?$").expect("static pattern"));

static WEEKLY_RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+dev\d+$").expect("static pattern"));

static DOC_RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+\.\d+)\+doc\d+$").expect("static pattern"));

/// Is `version` a marketing release?
pub fn is_release(version: &str) -> bool {
    RELEASE_RE.is_match(version)
}

/// Is `version` a weekly development release?
pub fn is_weekly_release(version: &str) -> bool {
    WEEKLY_RELEASE_RE.is_match(version)
}

/// The version under which the documentation built from `version` is
/// publicly addressed.
///
/// Identity for everything except documentation releases, whose `+docN`
/// counter is stripped: the docs for `0.3.0+doc1` live under `0.3.0`.
pub fn get_doc_version(version: &str) -> String {
    match DOC_RELEASE_RE.captures(version) {
        Some(captures) => captures[1].to_owned(),
        None => version.to_owned(),
    }
}
