// src/models/listing.rs

//! Scraped listings and the record of listings already seen.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::FilterId;

/// One search result. Identity is the detail-page link alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Absolute URL of the detail page
    pub link: String,

    /// Creation date as shown by the site, empty if absent
    #[serde(default)]
    pub creation_date: String,

    /// Price as shown by the site, empty if absent
    #[serde(default)]
    pub price: String,
}

impl Listing {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            creation_date: String::new(),
            price: String::new(),
        }
    }

    /// Format a listing for display using a template.
    ///
    /// Supported placeholders: `{title}` (filter title), `{link}`, `{date}`, `{price}`
    pub fn format(&self, title: &str, template: &str) -> String {
        template
            .replace("{title}", title)
            .replace("{link}", &self.link)
            .replace("{date}", &self.creation_date)
            .replace("{price}", &self.price)
    }
}

impl PartialEq for Listing {
    fn eq(&self, other: &Self) -> bool {
        self.link == other.link
    }
}

impl Eq for Listing {}

impl Hash for Listing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.link.hash(state);
    }
}

/// A listing link seen for a filter, with the last time a scrape returned it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedEntry {
    pub uri: String,
    pub last_found: DateTime<Utc>,
}

impl ProcessedEntry {
    pub fn new(uri: impl Into<String>, last_found: DateTime<Utc>) -> Self {
        Self {
            uri: uri.into(),
            last_found,
        }
    }
}

/// Seen listings per filter, as persisted.
pub type ProcessedMap = HashMap<FilterId, Vec<ProcessedEntry>>;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_equality_uses_link_only() {
        let a = Listing {
            link: "https://example.com/a/1".into(),
            creation_date: "Heute".into(),
            price: "10 €".into(),
        };
        let b = Listing::new("https://example.com/a/1");
        assert_eq!(a, b);

        let set: HashSet<Listing> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_format() {
        let listing = Listing {
            link: "https://example.com/a/1".into(),
            creation_date: "Gestern".into(),
            price: "VB".into(),
        };
        let result = listing.format("Desk", "[{title}] {link} ({price}, {date})");
        assert_eq!(result, "[Desk] https://example.com/a/1 (VB, Gestern)");
    }
}
