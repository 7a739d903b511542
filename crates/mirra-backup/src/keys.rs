//! Blob key scheme.
//!
//! Every name, version and tag is percent-encoded into a single segment,
//! so scoped and unscoped names can never produce the same key.
//!
//! ```text
//! <name>/package-files/<version>.json
//! <name>/dist-tags/<tag>
//! <name>/unpublished.json
//! ```

use mirra_utils::name::{basename, decode_segment, encode_segment};

const PACKAGE_FILES: &str = "package-files";
const DIST_TAGS: &str = "dist-tags";
const UNPUBLISHED: &str = "unpublished.json";

pub fn package_files_prefix(name: &str) -> String {
    format!("{}/{PACKAGE_FILES}/", encode_segment(name))
}

pub fn dist_tags_prefix(name: &str) -> String {
    format!("{}/{DIST_TAGS}/", encode_segment(name))
}

pub fn package_file_key(name: &str, version: &str) -> String {
    format!("{}{}.json", package_files_prefix(name), encode_segment(version))
}

pub fn dist_tag_key(name: &str, tag: &str) -> String {
    format!("{}{}", dist_tags_prefix(name), encode_segment(tag))
}

pub fn unpublish_key(name: &str) -> String {
    format!("{}/{UNPUBLISHED}", encode_segment(name))
}

/// Blob key of a mirrored tarball, also exposed as `dist.key`.
pub fn tarball_key(name: &str, version: &str) -> String {
    format!("/{name}/-/{}-{version}.tgz", basename(name))
}

/// Version encoded in a package-file key listed under `name`.
pub fn version_from_key(name: &str, key: &str) -> Option<String> {
    key.strip_prefix(&package_files_prefix(name))?
        .strip_suffix(".json")
        .and_then(decode_segment)
}

/// Tag encoded in a dist-tag key listed under `name`.
pub fn tag_from_key(name: &str, key: &str) -> Option<String> {
    key.strip_prefix(&dist_tags_prefix(name))
        .and_then(decode_segment)
}
