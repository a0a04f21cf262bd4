//! Record store boundary
//!
//! The engine never owns persistence. It reads person and declaration
//! records through [`RecordStore`]; [`Snapshot`] is the file-backed
//! implementation used by the CLI and the tests.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{KinshipError, Result};
use crate::graph::builder::connected_declarations;
use crate::model::{Person, PersonId, RelationshipDeclaration};

/// Read-only source of person and relationship records
pub trait RecordStore {
    /// Declarations that mention `person_id` as declarer, subject or
    /// intermediate relative
    fn list_relationship_declarations(&self, person_id: &str) -> Result<Vec<RelationshipDeclaration>>;

    fn get_person(&self, id: &str) -> Result<Person>;

    /// Records for the given ids; unknown ids are left out
    fn list_persons_by_ids(&self, ids: &[PersonId]) -> Result<Vec<Person>>;

    /// Population for duplicate scans
    fn list_all_persons(&self) -> Result<Vec<Person>>;

    fn list_all_declarations(&self) -> Result<Vec<RelationshipDeclaration>>;

    /// The root's whole connected component in one call, for stores that can
    /// close it server-side. `Ok(None)` means unsupported; callers then walk
    /// it with [`RecordStore::list_relationship_declarations`].
    fn connected_declarations(&self, _root_id: &str) -> Result<Option<Vec<RelationshipDeclaration>>> {
        Ok(None)
    }
}

/// In-memory record set, usually loaded from a JSON file:
///
/// ```json
/// { "persons": [ { "id": "p1", "first_name": "Anna" } ],
///   "declarations": [ { "declarer_id": "p1", "relation": "parent", "subject_id": "p2" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub declarations: Vec<RelationshipDeclaration>,
}

impl Snapshot {
    pub fn new(persons: Vec<Person>, declarations: Vec<RelationshipDeclaration>) -> Self {
        Self { persons, declarations }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        tracing::debug!(
            persons = snapshot.persons.len(),
            declarations = snapshot.declarations.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl RecordStore for Snapshot {
    fn list_relationship_declarations(&self, person_id: &str) -> Result<Vec<RelationshipDeclaration>> {
        Ok(self
            .declarations
            .iter()
            .filter(|d| d.mentioned_ids().any(|id| id == person_id))
            .cloned()
            .collect())
    }

    fn get_person(&self, id: &str) -> Result<Person> {
        self.persons
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| KinshipError::not_found(id))
    }

    fn list_persons_by_ids(&self, ids: &[PersonId]) -> Result<Vec<Person>> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .persons
            .iter()
            .filter(|p| wanted.contains(p.id.as_str()))
            .cloned()
            .collect())
    }

    fn list_all_persons(&self) -> Result<Vec<Person>> {
        Ok(self.persons.clone())
    }

    fn list_all_declarations(&self) -> Result<Vec<RelationshipDeclaration>> {
        Ok(self.declarations.clone())
    }

    fn connected_declarations(&self, root_id: &str) -> Result<Option<Vec<RelationshipDeclaration>>> {
        Ok(Some(
            connected_declarations(root_id, &self.declarations)
                .into_iter()
                .cloned()
                .collect(),
        ))
    }
}

/// Close the root's component with one store call per newly reached id.
/// Slower than [`RecordStore::connected_declarations`] but yields the same
/// declaration set.
pub fn walk_declarations<S: RecordStore + ?Sized>(store: &S, root_id: &str) -> Result<Vec<RelationshipDeclaration>> {
    let mut visited: HashSet<PersonId> = HashSet::from([root_id.to_string()]);
    let mut frontier: Vec<PersonId> = vec![root_id.to_string()];
    let mut seen: HashSet<String> = HashSet::new();
    let mut collected = Vec::new();

    while let Some(id) = frontier.pop() {
        for decl in store.list_relationship_declarations(&id)? {
            if !seen.insert(declaration_key(&decl)) {
                continue;
            }
            for next in decl.mentioned_ids() {
                if visited.insert(next.clone()) {
                    frontier.push(next.clone());
                }
            }
            collected.push(decl);
        }
    }
    Ok(collected)
}

/// Identity of a declaration across repeated store calls
fn declaration_key(decl: &RelationshipDeclaration) -> String {
    match &decl.id {
        Some(id) => format!("id:{}", id),
        None => format!(
            "{}|{}|{}|{}",
            decl.declarer_id,
            decl.relation,
            decl.subject_id.as_deref().unwrap_or(""),
            decl.related_subject_id.as_deref().unwrap_or("")
        ),
    }
}
