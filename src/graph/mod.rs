//! Family Graph
//!
//! Arena-style person graph built from flat relationship declarations.
//! Persons live in a map keyed by id; parent→child edges live in a petgraph
//! `DiGraph` whose node weights are person ids, so every walk is index
//! based and cycle detection is a visited-set check. Unions (marriages and
//! partnerships) are separate nodes keyed by a deterministic union id.
//!
//! This module is shared between:
//! - TreeTraversal (ancestor/descendant/hourglass subgraphs)
//! - DepthClassifier (exact-distance relative buckets)

pub mod builder;
pub mod classify;
pub mod diagnostics;
pub mod traversal;

pub use builder::GraphBuilder;
pub use classify::{DepthClassification, SpouseSummary};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use traversal::{TreeDepth, TreeMode, TreeView};

use chrono::NaiveDate;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::model::{Halfness, Person, PersonId};

/// Deterministic union identifier
pub type UnionId = String;

/// Derive the union id for a pair of partners.
///
/// The pair is sorted before hashing, so `union_id(a, b) == union_id(b, a)`
/// and independent spouse declarations converge on the same union.
pub fn union_id(a: &str, b: &str) -> UnionId {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let hash = Sha256::digest(format!("{}|{}", lo, hi).as_bytes());
    let hex = format!("{:x}", hash);
    format!("u_{}", &hex[..16])
}

/// Parent → child edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentChildEdge {
    pub parent_id: PersonId,
    pub child_id: PersonId,
}

/// Marriage/partnership node connecting two persons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Union {
    pub union_id: UnionId,
    #[serde(rename = "p1")]
    pub partner_a: PersonId,
    #[serde(rename = "p2")]
    pub partner_b: PersonId,
    pub marriage_date: Option<NaiveDate>,
    pub divorce_date: Option<NaiveDate>,
}

impl Union {
    /// Create a union with partners stored in sorted order
    pub fn new(a: &str, b: &str) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self {
            union_id: union_id(lo, hi),
            partner_a: lo.to_string(),
            partner_b: hi.to_string(),
            marriage_date: None,
            divorce_date: None,
        }
    }

    pub fn involves(&self, id: &str) -> bool {
        self.partner_a == id || self.partner_b == id
    }

    /// The other partner, if `id` is one of them
    pub fn partner_of(&self, id: &str) -> Option<&PersonId> {
        if self.partner_a == id {
            Some(&self.partner_b)
        } else if self.partner_b == id {
            Some(&self.partner_a)
        } else {
            None
        }
    }
}

/// Membership of a child in a union
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnionChild {
    pub union_id: UnionId,
    pub child_id: PersonId,
}

/// Person name search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonMatch {
    pub id: PersonId,
    pub name: String,
    pub score: i64,
}

/// The family graph for one proband's connected component
#[derive(Debug, Clone)]
pub struct FamilyGraph {
    /// Proband the graph was built around
    pub(crate) root: PersonId,

    /// Parent → child edges, weighted by the declared kind of parenthood
    pub(crate) graph: DiGraph<PersonId, Halfness>,

    /// Person records indexed by id
    pub(crate) persons: HashMap<PersonId, Person>,

    /// Node index lookup: person id -> NodeIndex
    pub(crate) node_indices: HashMap<PersonId, NodeIndex>,

    /// Unions keyed by union id
    pub(crate) unions: BTreeMap<UnionId, Union>,

    pub(crate) union_children: BTreeSet<UnionChild>,

    /// Explicitly declared sibling pairs, stored sorted
    pub(crate) sibling_links: BTreeSet<(PersonId, PersonId)>,

    /// Parent/child cycles (strongly connected components with >1 member)
    pub(crate) cycles: Vec<Vec<PersonId>>,

    /// Findings from the build
    pub diagnostics: Diagnostics,
}

impl FamilyGraph {
    pub(crate) fn empty(root: PersonId) -> Self {
        Self {
            root,
            graph: DiGraph::new(),
            persons: HashMap::new(),
            node_indices: HashMap::new(),
            unions: BTreeMap::new(),
            union_children: BTreeSet::new(),
            sibling_links: BTreeSet::new(),
            cycles: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    // ========== Construction helpers (used by the builder) ==========

    pub(crate) fn add_person(&mut self, person: Person) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&person.id) {
            return idx;
        }
        let idx = self.graph.add_node(person.id.clone());
        self.node_indices.insert(person.id.clone(), idx);
        self.persons.insert(person.id.clone(), person);
        idx
    }

    /// Add a parent → child edge; returns false if it was already present
    pub(crate) fn add_parent_edge(&mut self, parent: &str, child: &str, kind: Halfness) -> bool {
        let (Some(&p), Some(&c)) = (self.node_indices.get(parent), self.node_indices.get(child)) else {
            return false;
        };
        if self.graph.find_edge(p, c).is_some() {
            return false;
        }
        self.graph.add_edge(p, c, kind);
        true
    }

    pub(crate) fn has_parent_edge(&self, parent: &str, child: &str) -> bool {
        match (self.node_indices.get(parent), self.node_indices.get(child)) {
            (Some(&p), Some(&c)) => self.graph.find_edge(p, c).is_some(),
            _ => false,
        }
    }

    /// Find or create the union for a pair of partners
    pub(crate) fn union_mut(&mut self, a: &str, b: &str) -> &mut Union {
        let id = union_id(a, b);
        self.unions.entry(id).or_insert_with(|| Union::new(a, b))
    }

    // ========== Public API ==========

    /// Proband id
    pub fn root(&self) -> &PersonId {
        &self.root
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.persons.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.persons.contains_key(id)
    }

    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    pub fn person_count(&self) -> usize {
        self.persons.len()
    }

    /// Number of parent → child edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_indices.get(id).copied()
    }

    pub(crate) fn id_at(&self, idx: NodeIndex) -> Option<&PersonId> {
        self.graph.node_weight(idx)
    }

    /// Immediate parents of a person
    pub fn parents(&self, id: &str) -> Vec<&PersonId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Immediate children of a person
    pub fn children(&self, id: &str) -> Vec<&PersonId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&PersonId> {
        let Some(node_idx) = self.node_index(id) else {
            return Vec::new();
        };

        let mut ids: Vec<&PersonId> = self
            .graph
            .edges_directed(node_idx, direction)
            .filter_map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                self.graph.node_weight(other)
            })
            .collect();
        ids.sort();
        ids
    }

    /// Declared kind of the parent → child edge, if present
    pub fn parenthood(&self, parent: &str, child: &str) -> Option<Halfness> {
        let p = self.node_index(parent)?;
        let c = self.node_index(child)?;
        let edge = self.graph.find_edge(p, c)?;
        self.graph.edge_weight(edge).copied()
    }

    /// All parent → child edges, sorted
    pub fn parent_child_edges(&self) -> Vec<ParentChildEdge> {
        let mut edges: Vec<ParentChildEdge> = self
            .graph
            .edge_references()
            .filter_map(|e| {
                Some(ParentChildEdge {
                    parent_id: self.graph.node_weight(e.source())?.clone(),
                    child_id: self.graph.node_weight(e.target())?.clone(),
                })
            })
            .collect();
        edges.sort();
        edges
    }

    pub fn unions(&self) -> impl Iterator<Item = &Union> {
        self.unions.values()
    }

    pub fn union(&self, union_id: &str) -> Option<&Union> {
        self.unions.get(union_id)
    }

    /// Unions a person is a partner in
    pub fn unions_of(&self, id: &str) -> Vec<&Union> {
        self.unions.values().filter(|u| u.involves(id)).collect()
    }

    pub fn union_children(&self) -> impl Iterator<Item = &UnionChild> {
        self.union_children.iter()
    }

    /// Persons explicitly declared as siblings of `id`
    pub fn declared_siblings(&self, id: &str) -> Vec<&PersonId> {
        self.sibling_links
            .iter()
            .filter_map(|(a, b)| {
                if a == id {
                    Some(b)
                } else if b == id {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Parent/child cycles found at build time
    pub fn cycles(&self) -> &[Vec<PersonId>] {
        &self.cycles
    }

    /// Cycles that touch any of the given persons
    pub fn cycles_touching<'a>(&'a self, ids: &'a HashSet<PersonId>) -> impl Iterator<Item = &'a Vec<PersonId>> {
        self.cycles.iter().filter(move |c| c.iter().any(|m| ids.contains(m)))
    }

    /// Search persons by name (fuzzy)
    pub fn search(&self, query: &str, limit: usize) -> Vec<PersonMatch> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default().ignore_case();
        let mut results: Vec<(i64, &Person)> = Vec::new();

        for person in self.persons.values() {
            let name = person.display_name();
            let best = [Some(name.as_str()), person.maiden_name.as_deref(), person.nickname.as_deref()]
                .into_iter()
                .flatten()
                .filter_map(|candidate| matcher.fuzzy_match(candidate, query))
                .max();

            if let Some(score) = best {
                results.push((score, person));
            }
        }

        // Sort by score descending, id for stable ties
        results.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));

        results
            .into_iter()
            .take(limit)
            .map(|(score, person)| PersonMatch {
                id: person.id.clone(),
                name: person.display_name(),
                score,
            })
            .collect()
    }
}
