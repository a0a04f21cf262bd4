//! Engine facade
//!
//! Wires a [`RecordStore`] to the graph, kinship and duplicate components.
//! Every call reads fresh records and returns a value; nothing is cached
//! between calls.

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::duplicates::{CancelFlag, DuplicateQueue, DuplicateScanner, ScanRequest, ScanResponse, ScanType};
use crate::error::Result;
use crate::graph::{DepthClassification, FamilyGraph, GraphBuilder, PersonMatch, TreeMode, TreeView};
use crate::kinship::{compute_relationship, generate_label_str, resolve_kinship, KinshipResult, Locale, RelationCode};
use crate::model::{DirectRelation, Gender, PersonId, Qualifiers, RelationshipDeclaration};
use crate::store::{walk_declarations, RecordStore};

pub struct KinshipEngine<S: RecordStore> {
    store: S,
    config: EngineConfig,
}

impl<S: RecordStore> KinshipEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn with_defaults(store: S) -> Self {
        Self::new(store, EngineConfig::default())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Graph
    // ========================================================================

    /// Build the root's connected family graph.
    ///
    /// Uses the store's one-shot component query when it has one and falls
    /// back to walking declarations id by id otherwise; both paths feed the
    /// same builder.
    pub fn build_graph(&self, root_id: &str) -> Result<FamilyGraph> {
        let root = self.store.get_person(root_id)?;
        let declarations = self.root_declarations(root_id)?;

        let ids: BTreeSet<PersonId> = declarations
            .iter()
            .flat_map(|d| d.mentioned_ids().cloned())
            .filter(|id| id != root_id)
            .collect();
        let ids: Vec<PersonId> = ids.into_iter().collect();

        let mut persons = self.store.list_persons_by_ids(&ids)?;
        persons.push(root);

        GraphBuilder::new(root_id).build(&declarations, persons)
    }

    fn root_declarations(&self, root_id: &str) -> Result<Vec<RelationshipDeclaration>> {
        match self.store.connected_declarations(root_id) {
            Ok(Some(declarations)) => Ok(declarations),
            Ok(None) => {
                debug!(root = %root_id, "store has no component query, walking declarations");
                walk_declarations(&self.store, root_id)
            }
            Err(e) => {
                warn!(root = %root_id, error = %e, "component query failed, walking declarations");
                walk_declarations(&self.store, root_id)
            }
        }
    }

    /// Tree query; `None` picks the configured default
    pub fn tree(&self, root_id: &str, mode: Option<TreeMode>, depth: Option<i64>) -> Result<TreeView> {
        let graph = self.build_graph(root_id)?;
        let mode = mode.unwrap_or(self.config.traversal.default_mode);
        let depth = depth.unwrap_or(self.config.traversal.default_depth);
        Ok(TreeView::build(&graph, mode, depth))
    }

    pub fn classify(&self, root_id: &str) -> Result<DepthClassification> {
        let graph = self.build_graph(root_id)?;
        Ok(DepthClassification::classify(&graph))
    }

    /// Fuzzy name search within the root's family
    pub fn search(&self, root_id: &str, query: &str, limit: usize) -> Result<Vec<PersonMatch>> {
        Ok(self.build_graph(root_id)?.search(query, limit))
    }

    // ========================================================================
    // Kinship
    // ========================================================================

    pub fn relationship(&self, intermediate_code: &str, new_code: &str, gender: Option<Gender>) -> String {
        compute_relationship(intermediate_code, new_code, gender)
    }

    /// Label in `locale`, or the configured default locale
    pub fn label(&self, code: &str, gender: Gender, qualifiers: &Qualifiers, locale: Option<Locale>) -> String {
        let locale = locale.unwrap_or(self.config.labels.default_locale);
        generate_label_str(code, gender, qualifiers, locale)
    }

    pub fn kinship(
        &self,
        intermediate: RelationCode,
        next: DirectRelation,
        gender: Gender,
        qualifiers: &Qualifiers,
    ) -> KinshipResult {
        resolve_kinship(intermediate, next, gender, qualifiers)
    }

    // ========================================================================
    // Duplicates
    // ========================================================================

    /// Request pre-filled from configuration
    pub fn default_scan_request(&self, scan_type: ScanType) -> ScanRequest {
        self.config.duplicates.scan_request(scan_type)
    }

    pub fn scan_duplicates(
        &self,
        request: &ScanRequest,
        queue: &dyn DuplicateQueue,
        cancel: &CancelFlag,
    ) -> Result<ScanResponse> {
        let persons = self.store.list_all_persons()?;
        let declarations = if request.include_relationship_matching {
            self.store.list_all_declarations()?
        } else {
            Vec::new()
        };
        DuplicateScanner::from_config(&self.config.duplicates).scan(&persons, &declarations, request, queue, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KinshipError;
    use crate::model::Person;
    use crate::store::Snapshot;

    fn engine() -> KinshipEngine<Snapshot> {
        KinshipEngine::with_defaults(Snapshot::new(
            vec![
                Person::new("p", "Pavel", "Orlov"),
                Person::new("m", "Maria", "Orlova"),
                Person::new("g", "Galina", "Orlova"),
            ],
            vec![
                RelationshipDeclaration::new("p", DirectRelation::Parent, "m"),
                RelationshipDeclaration::new("m", DirectRelation::Parent, "g"),
            ],
        ))
    }

    #[test]
    fn test_unknown_root_is_not_found() {
        assert!(matches!(engine().tree("nobody", None, None), Err(KinshipError::NotFound { .. })));
    }

    #[test]
    fn test_tree_uses_configured_defaults() {
        let view = engine().tree("p", None, None).unwrap();
        assert_eq!(view.mode, TreeMode::Hourglass);
        assert_eq!(view.depth.get(), 3);
        assert_eq!(view.person_ids(), vec!["g", "m", "p"]);
    }

    #[test]
    fn test_label_uses_default_locale() {
        let mut config = EngineConfig::default();
        config.labels.default_locale = Locale::Ru;
        let engine = KinshipEngine::new(Snapshot::default(), config);
        assert_eq!(engine.label("aunt", Gender::Female, &Qualifiers::default(), None), "тётя");
        assert_eq!(
            engine.label("aunt", Gender::Female, &Qualifiers::default(), Some(Locale::En)),
            "aunt"
        );
    }

    #[test]
    fn test_relationship() {
        assert_eq!(engine().relationship("parent", "parent", None), "grandparent");
    }
}
