//! Fuzzy keyword matching
//!
//! A token matches a keyword when it is equal to it or within
//! `max_distance` Levenshtein edits. Distances are counted over chars, so
//! `ü` and `u` are different letters.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use super::dictionary::{AllergenCategory, Dictionary};
use crate::config::MatchSettings;

/// One detected allergen occurrence. Identity is (token, category): a token
/// matching several keywords of one category is a single finding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Finding {
    /// Token as it appeared in the (lowercased) text
    pub token: String,
    /// Category of the matched keyword
    pub category: AllergenCategory,
}

impl Finding {
    pub fn new(token: impl Into<String>, category: AllergenCategory) -> Self {
        Self {
            token: token.into(),
            category,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.token, self.category)
    }
}

/// Deduplicated findings, ordered by token then category
pub type FindingSet = BTreeSet<Finding>;

/// Levenshtein distance over chars
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Matches tokens against a dictionary with a fixed edit tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyMatcher {
    max_distance: usize,
}

impl FuzzyMatcher {
    pub fn new(max_distance: usize) -> Self {
        Self { max_distance }
    }

    /// Matcher that only accepts identical strings
    pub fn exact() -> Self {
        Self::new(0)
    }

    pub fn max_distance(&self) -> usize {
        self.max_distance
    }

    /// Whether `token` matches `keyword`
    pub fn is_match(&self, token: &str, keyword: &str) -> bool {
        token == keyword || edit_distance(token, keyword) <= self.max_distance
    }

    /// Match every token against every keyword and collect findings.
    ///
    /// Only keywords whose length is within `max_distance` of the token are
    /// compared; the others cannot be within reach anyway.
    pub fn find<I, S>(&self, tokens: I, dictionary: &Dictionary) -> FindingSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut findings = FindingSet::new();
        let mut token_count = 0usize;

        for token in tokens {
            let token = token.as_ref();
            token_count += 1;
            let mut matched: BTreeSet<AllergenCategory> = BTreeSet::new();

            for (category, keyword) in dictionary.candidates(token.chars().count(), self.max_distance) {
                if matched.contains(&category) {
                    continue;
                }
                if self.is_match(token, keyword) {
                    matched.insert(category);
                }
            }

            for category in matched {
                findings.insert(Finding::new(token, category));
            }
        }

        debug!(
            "Matched {} tokens (max_distance={}): {} findings",
            token_count,
            self.max_distance,
            findings.len()
        );
        findings
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::from(&MatchSettings::default())
    }
}

impl From<&MatchSettings> for FuzzyMatcher {
    fn from(settings: &MatchSettings) -> Self {
        Self::new(settings.max_distance)
    }
}

/// Match tokens against `dictionary` within `max_distance` edits
pub fn match_tokens<I, S>(tokens: I, dictionary: &Dictionary, max_distance: usize) -> FindingSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    FuzzyMatcher::new(max_distance).find(tokens, dictionary)
}
