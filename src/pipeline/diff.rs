//! Diff of a page scrape against the listings already seen.
//!
//! Splits a scrape into listings that need a detail check and listings
//! that only need their `last_found` refreshed. The processed set is not
//! touched here; callers update it after iterating.

use std::collections::HashSet;

use crate::models::Listing;

/// Result of [`split_new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDiff {
    /// Not seen before, in scrape order
    pub new: Vec<Listing>,
    /// Already in the processed set
    pub known: Vec<Listing>,
}

impl ListingDiff {
    pub fn has_new(&self) -> bool {
        !self.new.is_empty()
    }

    pub fn total(&self) -> usize {
        self.new.len() + self.known.len()
    }
}

/// Split listings by whether their link is in `known`.
///
/// A link occurring more than once (e.g. shifted onto the next page while
/// paging) is kept only at its first position.
pub fn split_new<I>(listings: I, known: &HashSet<String>) -> ListingDiff
where
    I: IntoIterator<Item = Listing>,
{
    let mut seen = HashSet::new();
    let mut diff = ListingDiff::default();

    for listing in listings {
        if !seen.insert(listing.link.clone()) {
            continue;
        }
        if known.contains(&listing.link) {
            diff.known.push(listing);
        } else {
            diff.new.push(listing);
        }
    }

    diff
}
