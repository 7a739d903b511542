//! Helpers for npm-style package names (`name` or `@scope/name`).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{NameError, NameResult};

const MAX_NAME_LEN: usize = 214;

/// Characters escaped when a name or tag becomes one key or path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'/')
    .add(b'\\')
    .add(b'?')
    .add(b'#')
    .add(b':');

/// Returns `true` if `name` is a scoped name such as `@scope/pkg`.
pub fn is_scoped(name: &str) -> bool {
    name.starts_with('@')
}

/// Returns the `@scope` part of a scoped name.
///
/// ```
/// use mirra_utils::name::scope;
///
/// assert_eq!(scope("@sindresorhus/df"), Some("@sindresorhus"));
/// assert_eq!(scope("byte"), None);
/// ```
pub fn scope(name: &str) -> Option<&str> {
    if !is_scoped(name) {
        return None;
    }
    name.split_once('/').map(|(scope, _)| scope)
}

/// Returns the unscoped part of a name, used for tarball file names.
///
/// ```
/// use mirra_utils::name::basename;
///
/// assert_eq!(basename("@sindresorhus/df"), "df");
/// assert_eq!(basename("byte"), "byte");
/// ```
pub fn basename(name: &str) -> &str {
    match name.split_once('/') {
        Some((_, base)) if is_scoped(name) => base,
        _ => name,
    }
}

/// Encodes `segment` so it occupies exactly one key or path segment.
///
/// `@scope/name` and a hypothetical `@scope%2Fname` map to distinct
/// outputs, since `%` itself is escaped.
///
/// ```
/// use mirra_utils::name::encode_segment;
///
/// assert_eq!(encode_segment("@sindresorhus/df"), "@sindresorhus%2Fdf");
/// assert_eq!(encode_segment("byte"), "byte");
/// ```
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Reverses [`encode_segment`]. Returns `None` for invalid UTF-8.
pub fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Checks that `name` is a plausible registry package name.
///
/// This is deliberately looser than the npm publish rules: legacy names with
/// capitals still exist upstream and must remain syncable.
pub fn validate(name: &str) -> NameResult<()> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong {
            name: name.to_string(),
        });
    }
    if let Some(found) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '\\' | '%' | '?' | '#'))
    {
        return Err(NameError::InvalidCharacter {
            name: name.to_string(),
            found,
        });
    }

    if is_scoped(name) {
        let well_formed = name[1..].split_once('/').is_some_and(|(scope, rest)| {
            !scope.is_empty() && !rest.is_empty() && !rest.contains('/')
        });
        if !well_formed {
            return Err(NameError::MalformedScope {
                name: name.to_string(),
            });
        }
    } else if let Some(found) = name.chars().find(|c| *c == '/') {
        return Err(NameError::InvalidCharacter {
            name: name.to_string(),
            found,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_and_basename() {
        assert!(is_scoped("@cnpmtest/google"));
        assert!(!is_scoped("google"));
        assert_eq!(scope("@cnpmtest/google"), Some("@cnpmtest"));
        assert_eq!(basename("@cnpmtest/google"), "google");
        assert_eq!(basename("google"), "google");
    }

    #[test]
    fn test_encode_segment_is_collision_free() {
        assert_eq!(encode_segment("@scope/a"), "@scope%2Fa");
        assert_eq!(encode_segment("@scope%2Fa"), "@scope%252Fa");
        assert_ne!(encode_segment("@scope/a"), encode_segment("@scope%2Fa"));
        assert_eq!(encode_segment("1.0.0-beta.1"), "1.0.0-beta.1");
        assert!(!encode_segment("../../etc").contains('/'));
        assert_eq!(
            decode_segment(&encode_segment("@scope%2Fa")).as_deref(),
            Some("@scope%2Fa")
        );
        assert_eq!(decode_segment("%FF"), None);
    }

    #[test]
    fn test_validate_accepts_common_names() {
        assert!(validate("byte").is_ok());
        assert!(validate("@sindresorhus/df").is_ok());
        assert!(validate("JSONStream").is_ok());
        assert!(validate("mk2test-module-cnpmsync").is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_names() {
        assert!(matches!(validate(""), Err(NameError::Empty)));
        assert!(matches!(
            validate("@scope"),
            Err(NameError::MalformedScope { .. })
        ));
        assert!(matches!(
            validate("@scope/a/b"),
            Err(NameError::MalformedScope { .. })
        ));
        assert!(matches!(
            validate("a/b"),
            Err(NameError::InvalidCharacter { found: '/', .. })
        ));
        assert!(matches!(
            validate("a b"),
            Err(NameError::InvalidCharacter { found: ' ', .. })
        ));
        assert!(matches!(
            validate(&"a".repeat(215)),
            Err(NameError::TooLong { .. })
        ));
    }
}
