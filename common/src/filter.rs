//! Name-based filtering for filtered mirror tasks
//!
//! A filtered task only copies entries whose *file name* matches a regular expression. The
//! default pattern selects sources of the `fl_` family:
//!
//! ```
//! use common::filter::NameFilter;
//!
//! let filter = NameFilter::default();
//! assert!(filter.matches(std::ffi::OsStr::new("fl_parser.cpp")));
//! assert!(filter.matches(std::ffi::OsStr::new("fl_parser.h")));
//! assert!(!filter.matches(std::ffi::OsStr::new("readme.md")));
//! ```
//!
//! # Directories
//!
//! The pattern is a file-name pattern and knows nothing about directories. How it interacts
//! with subdirectories is decided by [`FilterPolicy`].

use anyhow::Context;

/// Two-letter `fl` prefix, `_`, a word-character base name, and a `.h` or `.cpp` extension.
pub const DEFAULT_PATTERN: &str = r"^fl_\w*\.(h|cpp)$";

#[derive(Debug, Clone)]
pub struct NameFilter {
    regex: regex::Regex,
}

impl NameFilter {
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let regex = regex::Regex::new(pattern)
            .with_context(|| format!("invalid filter pattern: {pattern:?}"))?;
        Ok(Self { regex })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Names that are not valid UTF-8 never match.
    pub fn matches(&self, name: &std::ffi::OsStr) -> bool {
        name.to_str().is_some_and(|name| self.regex.is_match(name))
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self {
            regex: regex::Regex::new(DEFAULT_PATTERN).expect("default filter pattern is valid"),
        }
    }
}

/// How a filtered walk treats subdirectories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    /// When false, filtering is a flat name test on every entry and directories are never
    /// descended into. When true, directories are always descended and only files are tested.
    pub filter_applies_to_files_only: bool,
}

/// What a filtered walk does with one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Descend,
    Transfer,
    Skip,
}

impl FilterPolicy {
    pub fn decide(&self, filter: &NameFilter, name: &std::ffi::OsStr, is_dir: bool) -> Decision {
        match (is_dir, self.filter_applies_to_files_only) {
            (true, true) => Decision::Descend,
            (true, false) => Decision::Skip,
            (false, _) if filter.matches(name) => Decision::Transfer,
            (false, _) => Decision::Skip,
        }
    }

    /// Entries that can be rejected by name alone, before any stat call.
    pub fn rejects_by_name(&self, filter: &NameFilter, name: &std::ffi::OsStr) -> bool {
        !self.filter_applies_to_files_only && !filter.matches(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn default_pattern_matches_sources_and_headers() {
        let filter = NameFilter::default();
        for name in ["fl_foo.h", "fl_bar.cpp", "fl_.h", "fl_parser_objects.cpp"] {
            assert!(filter.matches(OsStr::new(name)), "{name} should match");
        }
    }

    #[test]
    fn default_pattern_is_anchored_and_case_sensitive() {
        let filter = NameFilter::default();
        for name in [
            "readme.md",
            "FL_foo.h",
            "fl_foo.H",
            "fl_foo.hpp",
            "xfl_foo.h",
            "fl_foo.cpp.bak",
            "fl-foo.h",
            "fl_foo.c",
        ] {
            assert!(!filter.matches(OsStr::new(name)), "{name} should not match");
        }
    }

    #[test]
    fn custom_pattern() -> anyhow::Result<()> {
        let filter = NameFilter::new(r"^ab_\w+\.rs$")?;
        assert!(filter.matches(OsStr::new("ab_main.rs")));
        assert!(!filter.matches(OsStr::new("fl_foo.h")));
        assert_eq!(filter.pattern(), r"^ab_\w+\.rs$");
        Ok(())
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let error = NameFilter::new("fl_(").unwrap_err();
        assert!(format!("{error:#}").contains("invalid filter pattern"));
    }

    #[test]
    fn legacy_policy_never_descends() {
        let filter = NameFilter::default();
        let policy = FilterPolicy::default();
        assert_eq!(
            policy.decide(&filter, OsStr::new("fl_dir.h"), true),
            Decision::Skip
        );
        assert_eq!(
            policy.decide(&filter, OsStr::new("objects"), true),
            Decision::Skip
        );
        assert_eq!(
            policy.decide(&filter, OsStr::new("fl_foo.h"), false),
            Decision::Transfer
        );
        assert!(policy.rejects_by_name(&filter, OsStr::new("objects")));
    }

    #[test]
    fn files_only_policy_descends_every_directory() {
        let filter = NameFilter::default();
        let policy = FilterPolicy {
            filter_applies_to_files_only: true,
        };
        assert_eq!(
            policy.decide(&filter, OsStr::new("objects"), true),
            Decision::Descend
        );
        assert_eq!(
            policy.decide(&filter, OsStr::new("readme.md"), false),
            Decision::Skip
        );
        assert!(!policy.rejects_by_name(&filter, OsStr::new("objects")));
    }
}
