//! Graph Building
//!
//! Bounds the declaration log to the proband's connected component, then
//! translates each surviving declaration into parent/child edges, unions and
//! union memberships. Finally computes parent/child cycles (SCCs).

use petgraph::algo::kosaraju_scc;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::{DiagnosticCode, FamilyGraph, UnionChild};
use crate::error::{KinshipError, Result};
use crate::model::{DirectRelation, Person, PersonId, RelationshipDeclaration};

/// Builds a [`FamilyGraph`] around one proband
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    root: PersonId,
}

impl GraphBuilder {
    pub fn new(root: impl Into<PersonId>) -> Self {
        Self { root: root.into() }
    }

    /// Build the graph from a declaration snapshot and the person records
    /// it refers to.
    ///
    /// Fails only when the proband has no person record. Every per-declaration
    /// problem is recorded in `graph.diagnostics` and the declaration skipped.
    pub fn build(
        &self,
        declarations: &[RelationshipDeclaration],
        persons: impl IntoIterator<Item = Person>,
    ) -> Result<FamilyGraph> {
        let mut records: HashMap<PersonId, Person> =
            persons.into_iter().map(|p| (p.id.clone(), p)).collect();

        let root_person = records
            .remove(&self.root)
            .ok_or_else(|| KinshipError::not_found(&self.root))?;

        let connected = connected_declarations(&self.root, declarations);

        let mut graph = FamilyGraph::empty(self.root.clone());
        graph.add_person(root_person);

        // Persons first, in declaration order, so node indices are stable
        for decl in &connected {
            for id in decl.mentioned_ids() {
                if let Some(person) = records.remove(id) {
                    graph.add_person(person);
                }
            }
        }

        let mut declared_children: Vec<(PersonId, PersonId)> = Vec::new();
        for decl in &connected {
            translate(&mut graph, decl, &mut declared_children);
        }

        attach_union_children(&mut graph, &declared_children);
        detect_cycles(&mut graph);

        tracing::debug!(
            root = %self.root,
            declarations = connected.len(),
            persons = graph.person_count(),
            edges = graph.edge_count(),
            unions = graph.unions.len(),
            diagnostics = graph.diagnostics.len(),
            "Family graph built"
        );

        Ok(graph)
    }
}

/// Fixed-point closure: every declaration reachable from `root` through the
/// ids it mentions. Each id is expanded at most once.
pub fn connected_declarations<'a>(
    root: &str,
    declarations: &'a [RelationshipDeclaration],
) -> Vec<&'a RelationshipDeclaration> {
    let mut by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, decl) in declarations.iter().enumerate() {
        for id in decl.mentioned_ids() {
            by_id.entry(id.as_str()).or_default().push(i);
        }
    }

    let mut visited: HashSet<&str> = HashSet::from([root]);
    let mut queue: VecDeque<&str> = VecDeque::from([root]);
    let mut included: BTreeSet<usize> = BTreeSet::new();

    while let Some(id) = queue.pop_front() {
        let Some(indices) = by_id.get(id) else {
            continue;
        };
        for &i in indices {
            if !included.insert(i) {
                continue;
            }
            for next in declarations[i].mentioned_ids() {
                if visited.insert(next.as_str()) {
                    queue.push_back(next.as_str());
                }
            }
        }
    }

    included.into_iter().map(|i| &declarations[i]).collect()
}

/// Translate one declaration into semantic edges
fn translate(
    graph: &mut FamilyGraph,
    decl: &RelationshipDeclaration,
    declared_children: &mut Vec<(PersonId, PersonId)>,
) {
    let label = decl.describe();

    let Some(subject) = decl.subject_id.as_deref() else {
        graph.diagnostics.report(
            label,
            DiagnosticCode::PendingSubject,
            format!("{} declared by {} has no person record yet", decl.relation, decl.declarer_id),
        );
        return;
    };

    if subject == decl.declarer_id {
        graph.diagnostics.report(label, DiagnosticCode::SelfRelation, "Subject is the declarer");
        return;
    }

    for id in decl.mentioned_ids() {
        if !graph.contains(id) {
            graph.diagnostics.report(
                label,
                DiagnosticCode::UnknownPerson,
                format!("Referenced person '{}' does not exist", id),
            );
            return;
        }
    }

    let related = decl.related_subject_id.as_deref();
    if related == Some(subject) {
        graph.diagnostics.report(label, DiagnosticCode::SelfRelation, "Subject is its own intermediate relative");
        return;
    }
    let anchor = related.unwrap_or(decl.declarer_id.as_str());

    let (parent, child) = match decl.relation {
        DirectRelation::Parent => (subject, anchor),
        DirectRelation::Child => {
            if related.is_none() {
                declared_children.push((decl.declarer_id.clone(), subject.to_string()));
            }
            (anchor, subject)
        }
        DirectRelation::Grandparent | DirectRelation::Grandchild => {
            let Some(via) = related else {
                graph.diagnostics.report(
                    label,
                    DiagnosticCode::UnanchoredDeclaration,
                    format!("{} declared without the intermediate parent", decl.relation),
                );
                return;
            };
            if decl.relation == DirectRelation::Grandparent {
                (subject, via)
            } else {
                (via, subject)
            }
        }
        DirectRelation::Sibling => {
            let pair = if anchor <= subject {
                (anchor.to_string(), subject.to_string())
            } else {
                (subject.to_string(), anchor.to_string())
            };
            graph.sibling_links.insert(pair);
            return;
        }
        DirectRelation::Spouse => {
            let union = graph.union_mut(anchor, subject);
            if union.marriage_date.is_none() {
                union.marriage_date = decl.marriage_date;
            }
            if union.divorce_date.is_none() {
                union.divorce_date = decl.divorce_date;
            }
            return;
        }
    };

    if graph.has_parent_edge(child, parent) {
        graph.diagnostics.push(
            super::DiagnosticItem::new(
                label,
                DiagnosticCode::ContradictoryEdge,
                format!("'{}' is already declared as the child of '{}'", parent, child),
            )
            .with_context(format!("ignored edge: {} -> {}", parent, child)),
        );
        return;
    }

    graph.add_parent_edge(parent, child, decl.qualifiers.halfness);
}

/// Link children to the union of their parents.
///
/// A child belongs to a union when both partners are its parents. A child
/// declared by a member who is in exactly one union also belongs to it.
fn attach_union_children(graph: &mut FamilyGraph, declared_children: &[(PersonId, PersonId)]) {
    let mut memberships: BTreeSet<UnionChild> = BTreeSet::new();
    let mut ambiguous = Vec::new();

    for union in graph.unions.values() {
        let a: HashSet<&PersonId> = graph.children(&union.partner_a).into_iter().collect();
        for child in graph.children(&union.partner_b) {
            if a.contains(child) {
                memberships.insert(UnionChild {
                    union_id: union.union_id.clone(),
                    child_id: child.clone(),
                });
            }
        }
    }

    for (declarer, child) in declared_children {
        let already = memberships.iter().any(|m| {
            &m.child_id == child
                && graph.unions.get(&m.union_id).map(|u| u.involves(declarer)).unwrap_or(false)
        });
        if already {
            continue;
        }

        let unions = graph.unions_of(declarer);
        match unions.as_slice() {
            [] => {}
            [only] => {
                memberships.insert(UnionChild {
                    union_id: only.union_id.clone(),
                    child_id: child.clone(),
                });
            }
            several => {
                let mut item = super::DiagnosticItem::new(
                    child.clone(),
                    DiagnosticCode::AmbiguousUnion,
                    format!("'{}' is in {} unions; child not attached to any", declarer, several.len()),
                );
                for u in several {
                    item = item.with_context(u.union_id.clone());
                }
                ambiguous.push(item);
            }
        }
    }

    graph.diagnostics.extend(ambiguous);
    graph.union_children = memberships;
}

/// Report parent/child cycles as data-quality warnings
fn detect_cycles(graph: &mut FamilyGraph) {
    let mut cycles: Vec<Vec<PersonId>> = kosaraju_scc(&graph.graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<PersonId> =
                scc.iter().filter_map(|idx| graph.graph.node_weight(*idx).cloned()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();

    for members in &cycles {
        graph.diagnostics.push(
            super::DiagnosticItem::new(
                members.first().cloned().unwrap_or_default(),
                DiagnosticCode::ParentCycle,
                format!("Parent/child cycle among {} persons", members.len()),
            )
            .with_context(format!("members: {}", members.join(", "))),
        );
    }

    graph.cycles = cycles;
}
