// src/sites/keywords.rs

//! Keyword matching of detail-page text against a filter.
//!
//! Include entries are groups: `"foo"` requires `foo`, `"foo|bar"` requires
//! at least one of `foo` and `bar`. Every group must be satisfied. Any
//! exclude entry found in the text rejects the match. Comparison is a
//! case-insensitive substring search. Alternatives inside a group are
//! trimmed; singleton includes and excludes keep their spacing, so
//! `" ps4 "` does not match `ps4pro`.

use crate::models::Filter;

/// One include requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordGroup {
    Required(String),
    AnyOf(Vec<String>),
}

impl KeywordGroup {
    /// Parse a raw include entry. Alternatives are trimmed and lowercased;
    /// blank ones are dropped. `None` if nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.contains('|') {
            let alternatives: Vec<String> = raw
                .split('|')
                .map(str::trim)
                .filter_map(lowercase_non_blank)
                .collect();
            (!alternatives.is_empty()).then_some(Self::AnyOf(alternatives))
        } else {
            lowercase_non_blank(raw).map(Self::Required)
        }
    }

    /// `text` must already be lowercase.
    fn is_satisfied(&self, text: &str) -> bool {
        match self {
            Self::Required(term) => text.contains(term.as_str()),
            Self::AnyOf(terms) => terms.iter().any(|t| text.contains(t.as_str())),
        }
    }
}

/// Lowercase `term` as written. `None` if it is only whitespace.
fn lowercase_non_blank(term: &str) -> Option<String> {
    (!term.trim().is_empty()).then(|| term.to_lowercase())
}

/// Whether every include group is satisfied. No groups always passes.
pub fn includes_satisfied(include: &[String], text: &str) -> bool {
    let text = text.to_lowercase();
    include
        .iter()
        .filter_map(|raw| KeywordGroup::parse(raw))
        .all(|group| group.is_satisfied(&text))
}

/// Whether any exclude term occurs in the text.
pub fn excludes_hit(exclude: &[String], text: &str) -> bool {
    let text = text.to_lowercase();
    exclude
        .iter()
        .filter_map(|raw| lowercase_non_blank(raw))
        .any(|term| text.contains(term.as_str()))
}

/// Full keyword check of a filter against detail text.
pub fn matches(filter: &Filter, text: &str) -> bool {
    includes_satisfied(&filter.include_keywords, text) && !excludes_hit(&filter.exclude_keywords, text)
}
