//! Backend correlation tags.
//!
//! A tag is the normalized slug the backend uses to identify the index it
//! builds for a subject address. Client and backend must agree on it, so the
//! derivation is deterministic and independent of any session state.

use once_cell::sync::Lazy;
use regex::Regex;

/// Tag used when an address normalizes to nothing.
pub const UNKNOWN_TAG: &str = "unknown";

static DISALLOWED_RUN: Lazy<Regex> = Lazy::new(|| {
    // The pattern is a literal; failure here is a programming error.
    Regex::new(r"[^a-z0-9_-]+").expect("tag pattern is valid")
});

/// Derives the backend tag for a subject address.
///
/// Steps: trim surrounding whitespace, lower-case, replace every maximal run
/// of characters outside `[a-z0-9_-]` with a single `-`, strip leading and
/// trailing `-`. An empty result becomes [`UNKNOWN_TAG`].
///
/// The function is total and idempotent.
///
/// # Examples
///
/// ```
/// use sleuth_core::session::sanitize_tag;
///
/// assert_eq!(sanitize_tag("  0xABC123... "), "0xabc123");
/// assert_eq!(sanitize_tag("vitalik.eth"), "vitalik-eth");
/// assert_eq!(sanitize_tag("   "), "unknown");
/// ```
pub fn sanitize_tag(address: &str) -> String {
    let lowered = address.trim().to_lowercase();
    let collapsed = DISALLOWED_RUN.replace_all(&lowered, "-");
    let stripped = collapsed.trim_matches('-');

    if stripped.is_empty() {
        UNKNOWN_TAG.to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lowercases_and_collapses_runs() {
        assert_eq!(sanitize_tag("0xABC123...DEF"), "0xabc123-def");
        assert_eq!(sanitize_tag("a  b\t\tc"), "a-b-c");
        assert_eq!(sanitize_tag("Wallet #1 / Cold"), "wallet-1-cold");
    }

    #[test]
    fn test_keeps_underscore_and_dash() {
        assert_eq!(sanitize_tag("my_wallet-2"), "my_wallet-2");
    }

    #[test]
    fn test_strips_edge_dashes() {
        assert_eq!(sanitize_tag("--abc--"), "abc");
        assert_eq!(sanitize_tag("...abc!!!"), "abc");
    }

    #[test]
    fn test_empty_and_whitespace_fall_back_to_unknown() {
        assert_eq!(sanitize_tag(""), UNKNOWN_TAG);
        assert_eq!(sanitize_tag("   \n\t"), UNKNOWN_TAG);
        assert_eq!(sanitize_tag("!!!"), UNKNOWN_TAG);
        assert_eq!(sanitize_tag("---"), UNKNOWN_TAG);
    }

    #[test]
    fn test_non_ascii_is_replaced() {
        assert_eq!(sanitize_tag("Ünïcode Addr"), "n-code-addr");
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(input in any::<String>()) {
            let once = sanitize_tag(&input);
            prop_assert_eq!(sanitize_tag(&once), once);
        }

        #[test]
        fn sanitize_yields_a_valid_tag(input in any::<String>()) {
            let tag = sanitize_tag(&input);
            prop_assert!(!tag.is_empty());
            prop_assert!(!tag.starts_with('-') && !tag.ends_with('-'));
            prop_assert!(tag
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'));
        }

        #[test]
        fn sanitize_keeps_clean_tags(tag in "[a-z0-9_]([a-z0-9_-]{0,20}[a-z0-9_])?") {
            prop_assert_eq!(sanitize_tag(&tag), tag);
        }
    }
}
