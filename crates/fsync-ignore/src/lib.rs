//! `.stignore`-style pattern matcher (§4.2 step 4, §6). Grounded on
//! `vrift-vdird::ignore::IgnoreMatcher`'s glob-suffix + exact-component
//! matching, extended with a deletable marker and a content hash so the
//! scanner can detect when the pattern set itself changed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub is_ignored: bool,
    /// True for patterns marked deletable (`(?d)prefix`): children matching
    /// these may be removed as part of a directory deletion (§4.3.7) even
    /// though they are otherwise ignored.
    pub is_deletable: bool,
}

impl MatchResult {
    const NONE: MatchResult = MatchResult {
        is_ignored: false,
        is_deletable: false,
    };
}

#[derive(Debug, Clone)]
enum Pattern {
    /// `*.ext` — matches by filename suffix.
    Suffix { suffix: String, deletable: bool },
    /// Any other literal pattern — matches any path component exactly.
    Component { text: String, deletable: bool },
}

#[derive(Default)]
pub struct IgnoreMatcher {
    patterns: Vec<Pattern>,
    raw: Vec<String>,
}

impl IgnoreMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads patterns from `.stignore` content, one per line. Blank lines
    /// and `#`-prefixed comments are skipped.
    pub fn load(content: &str) -> Self {
        let mut m = Self::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            m.add_pattern(line);
        }
        m
    }

    pub fn with_patterns(patterns: &[&str]) -> Self {
        let mut m = Self::new();
        for p in patterns {
            m.add_pattern(p);
        }
        m
    }

    fn add_pattern(&mut self, raw: &str) {
        self.raw.push(raw.to_string());
        let (deletable, rest) = match raw.strip_prefix("(?d)") {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if let Some(suffix) = rest.strip_prefix('*') {
            self.patterns.push(Pattern::Suffix {
                suffix: suffix.to_string(),
                deletable,
            });
        } else {
            self.patterns.push(Pattern::Component {
                text: rest.trim_end_matches('/').to_string(),
                deletable,
            });
        }
    }

    pub fn matches(&self, name: &str) -> MatchResult {
        let components: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
        let filename = components.last().copied().unwrap_or(name);
        for pattern in &self.patterns {
            match pattern {
                Pattern::Suffix { suffix, deletable } if filename.ends_with(suffix.as_str()) => {
                    return MatchResult {
                        is_ignored: true,
                        is_deletable: *deletable,
                    };
                }
                Pattern::Component { text, deletable }
                    if components.iter().any(|c| c == text) =>
                {
                    return MatchResult {
                        is_ignored: true,
                        is_deletable: *deletable,
                    };
                }
                _ => {}
            }
        }
        MatchResult::NONE
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.matches(name).is_ignored
    }

    /// Content hash over the normalized pattern set, used by the scanner to
    /// detect `.stignore` changes between runs (§4.2 step 4).
    pub fn hash(&self) -> [u8; 32] {
        let mut sorted = self.raw.clone();
        sorted.sort();
        let joined = sorted.join("\n");
        *blake3::hash(joined.as_bytes()).as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_component_ignores_dir_and_descendants() {
        let m = IgnoreMatcher::with_patterns(&["ignDir"]);
        assert!(m.is_ignored("ignDir"));
        assert!(m.is_ignored("ignDir/ignFile"));
        assert!(!m.is_ignored("knownDir/knownFile"));
    }

    #[test]
    fn glob_suffix_matches_by_filename() {
        let m = IgnoreMatcher::with_patterns(&["*.tmp"]);
        assert!(m.is_ignored("a/b/c.tmp"));
        assert!(!m.is_ignored("a/b/c.txt"));
    }

    #[test]
    fn deletable_marker_is_reported() {
        let m = IgnoreMatcher::with_patterns(&["(?d)*.cache"]);
        let r = m.matches("x.cache");
        assert!(r.is_ignored);
        assert!(r.is_deletable);
    }

    #[test]
    fn hash_is_stable_under_pattern_reordering() {
        let a = IgnoreMatcher::with_patterns(&["x", "y"]);
        let b = IgnoreMatcher::with_patterns(&["y", "x"]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_changes_when_patterns_change() {
        let a = IgnoreMatcher::with_patterns(&["x"]);
        let b = IgnoreMatcher::with_patterns(&["x", "y"]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn load_skips_blank_lines_and_comments() {
        let m = IgnoreMatcher::load("# comment\n\nignDir\n");
        assert!(m.is_ignored("ignDir/f"));
    }
}
