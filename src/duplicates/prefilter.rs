//! Candidate pruning ahead of the scorer
//!
//! Persons are bucketed by surname key (last and maiden names both count)
//! and again by the phonetic code of that key, so spelling variants such as
//! Kuznetsov/Kusnetsov still meet. A pair survives only if it shares a bucket
//! and its birth years, when both are known, fall within the window. Persons
//! with no surname are bucketed by given name instead.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::names::{normalized, phonetic_key, surname_key};
use super::scorer::PairKey;
use crate::model::{Person, PersonId};

#[derive(Debug, Clone)]
pub struct Prefilter {
    year_window: i32,
}

impl Prefilter {
    pub fn new(year_window: i32) -> Self {
        Self {
            year_window: year_window.max(0),
        }
    }

    /// Surviving pairs, sorted. With `focus`, only pairs with at least one
    /// member in the focus set are kept.
    pub fn candidate_pairs(&self, persons: &[&Person], focus: Option<&HashSet<PersonId>>) -> Vec<PairKey> {
        let mut buckets: BTreeMap<String, Vec<&Person>> = BTreeMap::new();
        for person in persons {
            for key in bucket_keys(person) {
                buckets.entry(key).or_default().push(*person);
            }
        }

        let mut pairs = BTreeSet::new();
        for members in buckets.values() {
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    if a.id == b.id || !self.years_compatible(a, b) {
                        continue;
                    }
                    if let Some(focus) = focus {
                        if !focus.contains(&a.id) && !focus.contains(&b.id) {
                            continue;
                        }
                    }
                    pairs.insert(PairKey::new(a.id.clone(), b.id.clone()));
                }
            }
        }
        pairs.into_iter().collect()
    }

    fn years_compatible(&self, a: &Person, b: &Person) -> bool {
        match (a.birth_year(), b.birth_year()) {
            (Some(x), Some(y)) => (x - y).abs() <= self.year_window,
            _ => true,
        }
    }
}

/// Every unordered pair, for scans run without pruning
pub fn all_pairs(persons: &[&Person], focus: Option<&HashSet<PersonId>>) -> Vec<PairKey> {
    let mut pairs = BTreeSet::new();
    for (i, a) in persons.iter().enumerate() {
        for b in &persons[i + 1..] {
            if a.id == b.id {
                continue;
            }
            if let Some(focus) = focus {
                if !focus.contains(&a.id) && !focus.contains(&b.id) {
                    continue;
                }
            }
            pairs.insert(PairKey::new(a.id.clone(), b.id.clone()));
        }
    }
    pairs.into_iter().collect()
}

fn bucket_keys(person: &Person) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for surname in [&person.last_name, &person.maiden_name].into_iter().flatten() {
        let key = surname_key(surname);
        if key.is_empty() {
            continue;
        }
        let code = phonetic_key(&key);
        if !code.is_empty() {
            keys.insert(format!("p:{}", code));
        }
        keys.insert(format!("s:{}", key));
    }
    if keys.is_empty() {
        if let Some(first) = normalized(person.first_name.as_deref()) {
            keys.insert(format!("f:{}", first));
        }
    }
    keys
}
