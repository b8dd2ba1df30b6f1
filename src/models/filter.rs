// src/models/filter.rs

//! User-defined search filters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a filter.
pub type FilterId = Uuid;

/// A user subscription against one search results URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Filter {
    /// Opaque identifier, also keys the processed-listing bucket
    pub id: FilterId,

    /// Display title used in notifications
    pub title: String,

    /// Search results URL on the target site
    pub url: String,

    /// Required terms; an entry `"a|b|c"` requires any one of the alternatives
    #[serde(default)]
    pub include_keywords: Vec<String>,

    /// Any hit disqualifies a listing
    #[serde(default)]
    pub exclude_keywords: Vec<String>,

    /// Notify about matches found during the very first sweep
    #[serde(default)]
    pub initial_pull: bool,

    /// Set once the first sweep finished without aborting; never reset
    #[serde(default)]
    pub first_run_completed: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Filter {
    /// Create an enabled filter with a fresh id and no keywords.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            url: url.into(),
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            initial_pull: false,
            first_run_completed: false,
            enabled: true,
        }
    }

    pub fn with_include<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_initial_pull(mut self, initial_pull: bool) -> Self {
        self.initial_pull = initial_pull;
        self
    }

    /// Whether matches found now should reach subscribers.
    pub fn should_notify(&self) -> bool {
        self.first_run_completed || self.initial_pull
    }

    /// Record that the first sweep finished. Monotonic.
    pub fn mark_first_run_completed(&mut self) {
        self.first_run_completed = true;
    }
}
