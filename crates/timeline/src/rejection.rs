//! Rejection set: phrases whose cues are cut out.
//!
//! Matching is exact after trimming surrounding whitespace from both the
//! phrase and the cue text.

use std::collections::HashSet;
use std::path::Path;

use autocut_common::error::AutocutResult;

/// Filler phrases offered as a starting rejection list.
pub const BUILTIN_FILLERS: &[&str] = &[
    "OK",
    "okay",
    "啊",
    "那",
    "嗯",
    "哦",
    "呃",
    "对吧",
    "对不对",
    "对不对啊",
    "懂了吧",
    "是不是",
    "明白吗",
    "明白了吗",
    "明白了吧",
    "清楚了吧",
    "听懂没有",
    "听懂了吗",
    "能明白吧",
    "能明白吗",
    "能听懂吗",
    "能听懂了吗",
    "听明白了吗",
    "听懂了没有",
    "听懂了吧",
    "这样能听明白吗",
];

/// Set of normalized phrases to reject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionSet {
    phrases: HashSet<String>,
}

impl RejectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from lines; blank lines are ignored.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self { phrases }
    }

    /// Parse a line-oriented rejection list.
    pub fn parse(content: &str) -> Self {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        Self::from_lines(content.lines())
    }

    /// Load a rejection list. A missing file yields an empty set.
    pub fn load(path: &Path) -> AutocutResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Rejection file not found; rejecting nothing");
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let set = Self::parse(&content);
        tracing::info!(path = %path.display(), phrases = set.len(), "Loaded rejection list");
        Ok(set)
    }

    /// The built-in filler phrases.
    pub fn builtin_fillers() -> Self {
        Self::from_lines(BUILTIN_FILLERS.iter())
    }

    /// Add every phrase of `other`.
    pub fn extend(&mut self, other: RejectionSet) {
        self.phrases.extend(other.phrases);
    }

    /// Whether `text`, once trimmed, is rejected.
    pub fn contains(&self, text: &str) -> bool {
        self.phrases.contains(text.trim())
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}
