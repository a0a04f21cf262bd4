//! Depth Classification
//!
//! Buckets a proband's close relatives by the exact hop distance at which a
//! bounded walk first reaches them, never by the declared relation string.
//! A grandparent declared through two `parent` hops therefore always lands
//! in `grandparents`, not `parents`.

use chrono::NaiveDate;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::traversal::distances;
use super::FamilyGraph;
use crate::model::{PersonId, PersonSummary};

/// A spouse entry with union dates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpouseSummary {
    #[serde(flatten)]
    pub person: PersonSummary,
    pub marriage_date: Option<NaiveDate>,
    pub divorce_date: Option<NaiveDate>,
}

/// Exact-distance relative buckets; no person appears in two buckets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthClassification {
    pub parents: Vec<PersonSummary>,
    pub grandparents: Vec<PersonSummary>,
    pub children: Vec<PersonSummary>,
    pub grandchildren: Vec<PersonSummary>,
    pub siblings: Vec<PersonSummary>,
    pub spouses: Vec<SpouseSummary>,
}

impl DepthClassification {
    /// Classify relatives of the graph's root
    pub fn classify(graph: &FamilyGraph) -> Self {
        let root = graph.root();
        let ancestors = distances(graph, root, Direction::Incoming, 2);
        let descendants = distances(graph, root, Direction::Outgoing, 2);

        let mut assigned: HashSet<PersonId> = HashSet::from([root.clone()]);

        let parent_ids = at_distance(&ancestors, 1);
        let grandparent_ids = at_distance(&ancestors, 2);
        let child_ids = at_distance(&descendants, 1);
        let grandchild_ids = at_distance(&descendants, 2);

        let parents = take(graph, parent_ids.iter().collect(), &mut assigned);
        let grandparents = take(graph, grandparent_ids.iter().collect(), &mut assigned);
        let children = take(graph, child_ids.iter().collect(), &mut assigned);
        let grandchildren = take(graph, grandchild_ids.iter().collect(), &mut assigned);

        // Persons sharing at least one parent, plus explicitly declared siblings
        let mut sibling_ids: Vec<&PersonId> = parent_ids
            .iter()
            .flat_map(|p| graph.children(p))
            .chain(graph.declared_siblings(root))
            .collect();
        sibling_ids.sort();
        sibling_ids.dedup();
        let siblings = take(graph, sibling_ids, &mut assigned);

        let mut spouses: Vec<SpouseSummary> = graph
            .unions_of(root)
            .into_iter()
            .filter_map(|u| {
                let partner = u.partner_of(root)?;
                if !assigned.insert(partner.clone()) {
                    return None;
                }
                Some(SpouseSummary {
                    person: PersonSummary::from(graph.person(partner)?),
                    marriage_date: u.marriage_date,
                    divorce_date: u.divorce_date,
                })
            })
            .collect();
        spouses.sort_by(|a, b| {
            a.marriage_date
                .cmp(&b.marriage_date)
                .then_with(|| a.person.id.cmp(&b.person.id))
        });

        Self {
            parents,
            grandparents,
            children,
            grandchildren,
            siblings,
            spouses,
        }
    }

    pub fn total(&self) -> usize {
        self.parents.len()
            + self.grandparents.len()
            + self.children.len()
            + self.grandchildren.len()
            + self.siblings.len()
            + self.spouses.len()
    }
}

fn at_distance(map: &HashMap<PersonId, usize>, distance: usize) -> Vec<PersonId> {
    map.iter()
        .filter(|(_, d)| **d == distance)
        .map(|(id, _)| id.clone())
        .collect()
}

/// Move not-yet-assigned persons into a sorted bucket
fn take(graph: &FamilyGraph, ids: Vec<&PersonId>, assigned: &mut HashSet<PersonId>) -> Vec<PersonSummary> {
    let mut bucket: Vec<PersonSummary> = ids
        .into_iter()
        .filter(|id| assigned.insert((*id).clone()))
        .filter_map(|id| graph.person(id))
        .map(PersonSummary::from)
        .collect();
    sort_bucket(&mut bucket);
    bucket
}

/// Birth date (unknown last), then name, then id
fn sort_bucket(bucket: &mut [PersonSummary]) {
    bucket.sort_by(|a, b| {
        let date = match (a.birth_date, b.birth_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        date.then_with(|| a.name.cmp(&b.name)).then_with(|| a.id.cmp(&b.id))
    });
}
