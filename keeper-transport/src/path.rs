//! Node path validation.

use thiserror::Error;

/// A path that violates node path syntax.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path {path:?}: {reason}")]
pub struct MalformedPathError {
    /// The rejected path.
    pub path: String,
    /// What is wrong with it.
    pub reason: PathViolation,
}

/// The rule a malformed path breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathViolation {
    /// Zero-length path.
    #[error("path length must be > 0")]
    Empty,
    /// Path does not begin with `/`.
    #[error("path must start with / character")]
    NotAbsolute,
    /// Path other than `/` ends with `/`.
    #[error("path must not end with / character")]
    TrailingSlash,
    /// NUL character.
    #[error("null character not allowed @{0}")]
    NullCharacter(usize),
    /// Two consecutive slashes.
    #[error("empty node name specified @{0}")]
    EmptyNodeName(usize),
    /// A `.` or `..` segment.
    #[error("relative paths not allowed @{0}")]
    RelativeSegment(usize),
    /// Control, private-use or specials character.
    #[error("invalid character @{0}")]
    InvalidCharacter(usize),
}

/// Validate a node path.
///
/// Rules: absolute, no trailing slash except for the root, no empty
/// segment, no `.` or `..` segment, and none of the characters the server
/// rejects. Indices in errors are character positions.
pub fn validate_path(path: &str) -> Result<(), MalformedPathError> {
    let fail = |reason| {
        Err(MalformedPathError {
            path: path.to_string(),
            reason,
        })
    };

    let chars: Vec<char> = path.chars().collect();
    if chars.is_empty() {
        return fail(PathViolation::Empty);
    }
    if chars[0] != '/' {
        return fail(PathViolation::NotAbsolute);
    }
    if chars.len() == 1 {
        return Ok(());
    }
    if chars[chars.len() - 1] == '/' {
        return fail(PathViolation::TrailingSlash);
    }

    let segment_ends = |i: usize| i + 1 == chars.len() || chars[i + 1] == '/';

    for i in 1..chars.len() {
        let c = chars[i];
        let last = chars[i - 1];
        if c == '\0' {
            return fail(PathViolation::NullCharacter(i));
        } else if c == '/' && last == '/' {
            return fail(PathViolation::EmptyNodeName(i));
        } else if c == '.' && last == '.' {
            if chars[i - 2] == '/' && segment_ends(i) {
                return fail(PathViolation::RelativeSegment(i));
            }
        } else if c == '.' {
            if last == '/' && segment_ends(i) {
                return fail(PathViolation::RelativeSegment(i));
            }
        } else if is_forbidden(c) {
            return fail(PathViolation::InvalidCharacter(i));
        }
    }
    Ok(())
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\u{1}'..='\u{1f}'
        | '\u{7f}'..='\u{9f}'
        | '\u{e000}'..='\u{f8ff}'
        | '\u{fff0}'..='\u{ffff}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(path: &str) -> PathViolation {
        validate_path(path).expect_err("path should be rejected").reason
    }

    #[test]
    fn test_valid_paths() {
        for path in ["/", "/a", "/a/b/c", "/a.b", "/..a", "/a/.b", "/a/b..", "/zookeeper"] {
            assert!(validate_path(path).is_ok(), "{path} should be valid");
        }
    }

    #[test]
    fn test_structural_violations() {
        assert_eq!(violation(""), PathViolation::Empty);
        assert_eq!(violation("a/b"), PathViolation::NotAbsolute);
        assert_eq!(violation("/a/"), PathViolation::TrailingSlash);
        assert_eq!(violation("/bad//path"), PathViolation::EmptyNodeName(5));
    }

    #[test]
    fn test_relative_segments() {
        assert_eq!(violation("/."), PathViolation::RelativeSegment(1));
        assert_eq!(violation("/a/./b"), PathViolation::RelativeSegment(3));
        assert_eq!(violation("/a/.."), PathViolation::RelativeSegment(4));
        assert_eq!(violation("/../b"), PathViolation::RelativeSegment(2));
    }

    #[test]
    fn test_forbidden_characters() {
        assert_eq!(violation("/a\0b"), PathViolation::NullCharacter(2));
        assert_eq!(violation("/a\u{1}"), PathViolation::InvalidCharacter(2));
        assert_eq!(violation("/\u{85}"), PathViolation::InvalidCharacter(1));
        assert_eq!(violation("/x\u{e000}"), PathViolation::InvalidCharacter(2));
        assert_eq!(violation("/\u{fff0}"), PathViolation::InvalidCharacter(1));
    }

    #[test]
    fn test_error_message_names_path() {
        let err = validate_path("/bad//path").expect_err("rejected");
        assert_eq!(
            err.to_string(),
            "invalid path \"/bad//path\": empty node name specified @5"
        );
    }
}
