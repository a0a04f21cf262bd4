//! Tree Traversal
//!
//! Bounded breadth-first walks over parent/child edges producing a
//! serializable subgraph in `ancestors`, `descendants` or `hourglass` mode.

use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use super::{DiagnosticCode, DiagnosticItem, Diagnostics, FamilyGraph, ParentChildEdge, Union, UnionChild};
use crate::error::KinshipError;
use crate::model::{Person, PersonId};

// =============================================================================
// Mode and Depth
// =============================================================================

/// Traversal direction(s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeMode {
    Ancestors,
    Descendants,
    #[default]
    Hourglass,
}

impl TreeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeMode::Ancestors => "ancestors",
            TreeMode::Descendants => "descendants",
            TreeMode::Hourglass => "hourglass",
        }
    }

    fn directions(&self) -> &'static [Direction] {
        match self {
            TreeMode::Ancestors => &[Direction::Incoming],
            TreeMode::Descendants => &[Direction::Outgoing],
            TreeMode::Hourglass => &[Direction::Incoming, Direction::Outgoing],
        }
    }
}

impl fmt::Display for TreeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeMode {
    type Err = KinshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ancestors" => Ok(TreeMode::Ancestors),
            "descendants" => Ok(TreeMode::Descendants),
            "hourglass" => Ok(TreeMode::Hourglass),
            other => Err(KinshipError::InvalidCode(format!("tree mode '{}'", other))),
        }
    }
}

/// Traversal depth, always within [1, 10]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeDepth(u8);

impl TreeDepth {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Clamp a requested depth into range; the flag is true if it moved
    pub fn clamped(requested: i64) -> (Self, bool) {
        let value = requested.clamp(Self::MIN as i64, Self::MAX as i64) as u8;
        (Self(value), value as i64 != requested)
    }

    pub fn new(requested: i64) -> Self {
        Self::clamped(requested).0
    }

    pub fn get(&self) -> usize {
        self.0 as usize
    }
}

impl Default for TreeDepth {
    fn default() -> Self {
        Self(3)
    }
}

// =============================================================================
// Walks
// =============================================================================

/// Breadth-first hop distances from `root` following edges in `direction`
/// (Incoming = towards parents). The root is included at distance 0.
///
/// Each person is expanded once, so a malformed cycle cannot loop forever.
pub fn distances(
    graph: &FamilyGraph,
    root: &str,
    direction: Direction,
    max_depth: usize,
) -> HashMap<PersonId, usize> {
    let mut result = HashMap::new();
    let Some(start) = graph.node_index(root) else {
        return result;
    };

    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);

    while let Some((node_idx, depth)) = queue.pop_front() {
        if let Some(id) = graph.id_at(node_idx) {
            result.insert(id.clone(), depth);
        }
        if depth >= max_depth {
            continue;
        }

        for edge in graph.graph.edges_directed(node_idx, direction) {
            let next = match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            if visited.insert(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }

    result
}

// =============================================================================
// Tree View
// =============================================================================

/// Serializable subgraph returned by a tree query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView {
    pub root_id: PersonId,
    pub mode: TreeMode,
    pub depth: TreeDepth,
    pub persons: Vec<Person>,
    pub parent_child: Vec<ParentChildEdge>,
    pub unions: Vec<Union>,
    pub union_children: Vec<UnionChild>,
    #[serde(default, skip_serializing_if = "Diagnostics::is_empty")]
    pub warnings: Diagnostics,
}

impl TreeView {
    /// Walk the graph from its root in the requested mode.
    ///
    /// Out-of-range depths are clamped and noted in `warnings`.
    pub fn build(graph: &FamilyGraph, mode: TreeMode, requested_depth: i64) -> Self {
        let mut warnings = Diagnostics::new();
        let (depth, was_clamped) = TreeDepth::clamped(requested_depth);
        if was_clamped {
            tracing::debug!(requested = requested_depth, depth = depth.get(), "Tree depth clamped");
            warnings.report(
                graph.root().clone(),
                DiagnosticCode::DepthClamped,
                format!("Depth {} clamped to {}", requested_depth, depth.get()),
            );
        }

        let mut reached: HashSet<PersonId> = HashSet::from([graph.root().clone()]);
        for &direction in mode.directions() {
            reached.extend(distances(graph, graph.root(), direction, depth.get()).into_keys());
        }

        for cycle in graph.cycles_touching(&reached) {
            warnings.push(
                DiagnosticItem::new(
                    cycle.first().cloned().unwrap_or_default(),
                    DiagnosticCode::ParentCycle,
                    "Traversal crossed a parent/child cycle; repeated persons were not re-expanded",
                )
                .with_context(format!("members: {}", cycle.join(", "))),
            );
        }

        let mut persons: Vec<Person> = reached
            .iter()
            .filter_map(|id| graph.person(id).cloned())
            .collect();
        persons.sort_by(|a, b| a.id.cmp(&b.id));

        let parent_child: Vec<ParentChildEdge> = graph
            .parent_child_edges()
            .into_iter()
            .filter(|e| reached.contains(&e.parent_id) && reached.contains(&e.child_id))
            .collect();

        let unions: Vec<Union> = graph
            .unions()
            .filter(|u| reached.contains(&u.partner_a) && reached.contains(&u.partner_b))
            .cloned()
            .collect();

        let included: HashSet<&str> = unions.iter().map(|u| u.union_id.as_str()).collect();
        let union_children: Vec<UnionChild> = graph
            .union_children()
            .filter(|m| included.contains(m.union_id.as_str()) && reached.contains(&m.child_id))
            .cloned()
            .collect();

        tracing::debug!(
            root = %graph.root(),
            mode = %mode,
            depth = depth.get(),
            persons = persons.len(),
            "Tree traversal complete"
        );

        Self {
            root_id: graph.root().clone(),
            mode,
            depth,
            persons,
            parent_child,
            unions,
            union_children,
            warnings,
        }
    }

    pub fn person_ids(&self) -> Vec<&str> {
        self.persons.iter().map(|p| p.id.as_str()).collect()
    }

    /// Export the tree to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str("digraph FamilyTree {\n");
        output.push_str("  rankdir=TB;\n");
        output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10];\n");
        output.push_str("  edge [color=\"#606060\"];\n");
        output.push('\n');

        for person in &self.persons {
            let color = match person.gender {
                crate::model::Gender::Female => "#F8BBD0",
                crate::model::Gender::Male => "#BBDEFB",
                _ => "#E0E0E0",
            };
            let border = if person.id == self.root_id { ", penwidth=2" } else { "" };
            let dates = match (person.birth_year(), person.death_date) {
                (Some(b), Some(d)) => format!("\\n{}–{}", b, chrono::Datelike::year(&d)),
                (Some(b), None) => format!("\\nb. {}", b),
                _ => String::new(),
            };
            output.push_str(&format!(
                "  \"{}\" [label=\"{}{}\", fillcolor=\"{}\"{}];\n",
                dot_id(&person.id),
                person.display_name().replace('"', "'"),
                dates,
                color,
                border
            ));
        }

        output.push('\n');

        for union in &self.unions {
            output.push_str(&format!(
                "  \"{}\" [shape=point, width=0.08];\n",
                dot_id(&union.union_id)
            ));
            for partner in [&union.partner_a, &union.partner_b] {
                output.push_str(&format!(
                    "  \"{}\" -> \"{}\" [dir=none, style=dashed];\n",
                    dot_id(partner),
                    dot_id(&union.union_id)
                ));
            }
        }

        for edge in &self.parent_child {
            output.push_str(&format!(
                "  \"{}\" -> \"{}\";\n",
                dot_id(&edge.parent_id),
                dot_id(&edge.child_id)
            ));
        }

        output.push_str("}\n");
        output
    }
}

fn dot_id(id: &str) -> String {
    id.replace(['/', '.', '-', '"'], "_")
}
