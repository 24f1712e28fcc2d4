use std::collections::HashMap;

use crate::models::{Listing, ListingCategory};

#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
    pub building: String,
    pub category: ListingCategory,
    pub listing: Listing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Added,
    Upgraded,
    Duplicate,
}

// Per-user set of matches keyed by listing key. A key seen again only replaces
// the stored entry when its category outranks the stored one
// (sold > leased > new); the first-seen position is kept.
#[derive(Debug, Default)]
pub struct ListingSet {
    entries: Vec<DigestEntry>,
    index: HashMap<String, usize>,
}

impl ListingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Listings without a key are dropped by the caller's required-field check.
    pub fn insert(&mut self, building: &str, listing: Listing, category: ListingCategory) -> Insert {
        let Some(key) = listing.key().map(str::to_string) else {
            return Insert::Duplicate;
        };

        match self.index.get(&key).copied() {
            Some(pos) => {
                let existing = &mut self.entries[pos];
                if category.priority() > existing.category.priority() {
                    existing.category = category;
                    existing.listing = listing;
                    Insert::Upgraded
                } else {
                    Insert::Duplicate
                }
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(DigestEntry {
                    building: building.to_string(),
                    category,
                    listing,
                });
                Insert::Added
            }
        }
    }

    pub fn entries(&self) -> &[DigestEntry] {
        &self.entries
    }

    // Buildings in first-seen order, entries within a building ordered
    // sold, leased, new.
    pub fn by_building(&self) -> Vec<BuildingSection<'_>> {
        let mut sections: Vec<BuildingSection<'_>> = Vec::new();
        for entry in &self.entries {
            match sections.iter_mut().find(|s| s.building == entry.building) {
                Some(section) => section.entries.push(entry),
                None => sections.push(BuildingSection {
                    building: &entry.building,
                    entries: vec![entry],
                }),
            }
        }
        for section in &mut sections {
            section
                .entries
                .sort_by_key(|e| std::cmp::Reverse(e.category.priority()));
        }
        sections
    }
}

#[derive(Debug)]
pub struct BuildingSection<'a> {
    pub building: &'a str,
    pub entries: Vec<&'a DigestEntry>,
}

impl BuildingSection<'_> {
    pub fn in_category(&self, category: ListingCategory) -> Vec<&DigestEntry> {
        self.entries
            .iter()
            .copied()
            .filter(|e| e.category == category)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(key: &str, price: f64) -> Listing {
        Listing {
            listing_key: Some(key.to_string()),
            unparsed_address: Some("100 Harbour St".to_string()),
            list_price: Some(price),
            ..Default::default()
        }
    }

    #[test]
    fn test_sold_beats_leased_beats_new() {
        let mut set = ListingSet::new();
        assert_eq!(set.insert("A", listing("K1", 1.0), ListingCategory::New), Insert::Added);
        assert_eq!(set.insert("A", listing("K1", 2.0), ListingCategory::Leased), Insert::Upgraded);
        assert_eq!(set.insert("A", listing("K1", 3.0), ListingCategory::Sold), Insert::Upgraded);
        assert_eq!(set.len(), 1);
        assert_eq!(set.entries()[0].category, ListingCategory::Sold);
        assert_eq!(set.entries()[0].listing.list_price, Some(3.0));
    }

    #[test]
    fn test_lower_priority_does_not_replace() {
        let mut set = ListingSet::new();
        set.insert("A", listing("K1", 3.0), ListingCategory::Sold);
        assert_eq!(set.insert("A", listing("K1", 1.0), ListingCategory::New), Insert::Duplicate);
        assert_eq!(set.insert("A", listing("K1", 2.0), ListingCategory::Leased), Insert::Duplicate);
        assert_eq!(set.insert("A", listing("K1", 4.0), ListingCategory::Sold), Insert::Duplicate);
        assert_eq!(set.entries()[0].category, ListingCategory::Sold);
        assert_eq!(set.entries()[0].listing.list_price, Some(3.0));
    }

    #[test]
    fn test_keeps_first_seen_order() {
        let mut set = ListingSet::new();
        set.insert("A", listing("K1", 1.0), ListingCategory::New);
        set.insert("A", listing("K2", 1.0), ListingCategory::New);
        set.insert("A", listing("K1", 1.0), ListingCategory::Sold);
        let keys: Vec<_> = set.entries().iter().map(|e| e.listing.key().unwrap()).collect();
        assert_eq!(keys, vec!["K1", "K2"]);
    }

    #[test]
    fn test_keyless_listing_ignored() {
        let mut set = ListingSet::new();
        let mut l = listing("", 1.0);
        l.listing_key = None;
        assert_eq!(set.insert("A", l, ListingCategory::New), Insert::Duplicate);
        assert!(set.is_empty());
    }

    #[test]
    fn test_grouped_by_building() {
        let mut set = ListingSet::new();
        set.insert("100 Harbour St", listing("K1", 1.0), ListingCategory::New);
        set.insert("8 Mercer St", listing("K2", 1.0), ListingCategory::Leased);
        set.insert("100 Harbour St", listing("K3", 1.0), ListingCategory::Sold);

        let sections = set.by_building();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].building, "100 Harbour St");
        let keys: Vec<_> = sections[0]
            .entries
            .iter()
            .map(|e| e.listing.key().unwrap())
            .collect();
        assert_eq!(keys, vec!["K3", "K1"]);
        assert_eq!(sections[0].in_category(ListingCategory::Sold).len(), 1);
        assert_eq!(sections[1].in_category(ListingCategory::Leased).len(), 1);
    }
}
