//! End-to-end tests over JSON fixtures
//!
//! `family.json` is a four-generation family around proband `p` plus an
//! unrelated pair (`x`, `y`). `duplicates.json` holds two likely duplicate
//! pairs: a deceased Ivanov with three shared children, and a living Anna
//! Kim entered once in Latin and once in Cyrillic.

use chrono::{TimeZone, Utc};

use kinship_engine::duplicates::ReviewStatus;
use kinship_engine::graph::DiagnosticCode;
use kinship_engine::model::{Gender, Qualifiers};
use kinship_engine::store::RecordStore;
use kinship_engine::{
    compute_relationship, generate_label, union_id, CancelFlag, DirectRelation, EngineConfig, InMemoryQueue,
    KinshipChain, KinshipEngine, KinshipError, Locale, PairKey, Person, PersonSummary, RelationCode, RelationshipDeclaration,
    Result, ScanRequest, ScanType, Snapshot, TreeMode, TreeView,
};

fn family() -> Snapshot {
    Snapshot::from_json(include_str!("fixtures/family.json")).unwrap()
}

fn duplicates() -> Snapshot {
    Snapshot::from_json(include_str!("fixtures/duplicates.json")).unwrap()
}

fn ids(bucket: &[PersonSummary]) -> Vec<&str> {
    bucket.iter().map(|p| p.id.as_str()).collect()
}

// =============================================================================
// Tree traversal
// =============================================================================

#[test]
fn test_two_generation_hourglass() {
    let snapshot = Snapshot::new(
        vec![
            Person::new("P", "Pavel", "Orlov"),
            Person::new("M", "Maria", "Orlova"),
            Person::new("G", "Galina", "Smirnova"),
        ],
        vec![
            RelationshipDeclaration::new("P", DirectRelation::Parent, "M"),
            RelationshipDeclaration::new("M", DirectRelation::Parent, "G"),
        ],
    );
    let engine = KinshipEngine::with_defaults(snapshot);

    let view = engine.tree("P", Some(TreeMode::Hourglass), Some(2)).unwrap();
    assert_eq!(view.person_ids(), vec!["G", "M", "P"]);
    let edges: Vec<(&str, &str)> = view
        .parent_child
        .iter()
        .map(|e| (e.parent_id.as_str(), e.child_id.as_str()))
        .collect();
    assert_eq!(edges, vec![("G", "M"), ("M", "P")]);

    let buckets = engine.classify("P").unwrap();
    assert_eq!(ids(&buckets.parents), vec!["M"]);
    assert_eq!(ids(&buckets.grandparents), vec!["G"]);
}

#[test]
fn test_person_count_never_shrinks_with_depth() {
    let engine = KinshipEngine::with_defaults(family());
    for mode in [TreeMode::Ancestors, TreeMode::Descendants, TreeMode::Hourglass] {
        let mut previous = 0;
        for depth in 1..=10 {
            let count = engine.tree("p", Some(mode), Some(depth)).unwrap().persons.len();
            assert!(count >= previous, "{} shrank at depth {}", mode, depth);
            previous = count;
        }
    }
}

#[test]
fn test_hourglass_depths_on_family() {
    let engine = KinshipEngine::with_defaults(family());

    let one = engine.tree("p", Some(TreeMode::Hourglass), Some(1)).unwrap();
    assert_eq!(one.person_ids(), vec!["c", "f", "m", "p"]);
    // Parents' union is inside; p's own union is not, since w was never walked to
    assert_eq!(one.unions.len(), 1);
    assert_eq!(one.unions[0].union_id, union_id("m", "f"));
    assert_eq!(one.union_children.len(), 1);
    assert_eq!(one.union_children[0].child_id, "p");

    let three = engine.tree("p", Some(TreeMode::Ancestors), Some(3)).unwrap();
    assert_eq!(three.person_ids(), vec!["f", "g", "gg", "m", "p"]);

    let down = engine.tree("p", Some(TreeMode::Descendants), Some(10)).unwrap();
    assert_eq!(down.person_ids(), vec!["c", "p"]);
}

#[test]
fn test_out_of_range_depth_is_clamped() {
    let engine = KinshipEngine::with_defaults(family());

    let deep = engine.tree("p", Some(TreeMode::Ancestors), Some(99)).unwrap();
    assert_eq!(deep.depth.get(), 10);
    assert!(deep.warnings.has_code(DiagnosticCode::DepthClamped));

    let shallow = engine.tree("p", Some(TreeMode::Ancestors), Some(-4)).unwrap();
    assert_eq!(shallow.depth.get(), 1);
    assert_eq!(shallow.person_ids(), vec!["f", "m", "p"]);
}

#[test]
fn test_unrelated_component_is_excluded() {
    let graph = KinshipEngine::with_defaults(family()).build_graph("p").unwrap();
    assert!(!graph.contains("x"));
    assert!(!graph.contains("y"));
    assert!(graph.diagnostics.has_code(DiagnosticCode::PendingSubject));
}

#[test]
fn test_tree_json_shape() {
    let view = KinshipEngine::with_defaults(family())
        .tree("p", Some(TreeMode::Hourglass), Some(1))
        .unwrap();
    let json = serde_json::to_value(&view).unwrap();

    assert!(json["persons"].is_array());
    assert_eq!(json["parentChild"][0]["parent_id"], "f");
    assert_eq!(json["unions"][0]["p1"], "f");
    assert_eq!(json["unions"][0]["p2"], "m");
    assert_eq!(json["unions"][0]["marriage_date"], "1978-08-12");
    assert!(json["unionChildren"].is_array());
}

// =============================================================================
// Depth classification
// =============================================================================

#[test]
fn test_classification_buckets() {
    let c = KinshipEngine::with_defaults(family()).classify("p").unwrap();

    // Sorted by birth date: Fedor 1953, Maria 1955
    assert_eq!(ids(&c.parents), vec!["f", "m"]);
    assert!(!c.parents[0].is_alive);
    assert_eq!(ids(&c.grandparents), vec!["g"]);
    assert_eq!(ids(&c.children), vec!["c"]);
    assert!(c.grandchildren.is_empty());
    assert_eq!(ids(&c.siblings), vec!["s"]);
    assert_eq!(c.spouses.len(), 1);
    assert_eq!(c.spouses[0].person.id, "w");
    assert_eq!(c.spouses[0].marriage_date.map(|d| d.to_string()), Some("2005-06-18".into()));

    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json["spouses"][0]["id"], "w");
    assert_eq!(json["spouses"][0]["marriage_date"], "2005-06-18");
    assert_eq!(json["parents"][1]["name"], "Maria Orlova");
}

// =============================================================================
// Degraded store
// =============================================================================

/// A store whose one-shot component query is broken or missing
struct DegradedStore {
    inner: Snapshot,
    fail: bool,
}

impl RecordStore for DegradedStore {
    fn list_relationship_declarations(&self, person_id: &str) -> Result<Vec<RelationshipDeclaration>> {
        self.inner.list_relationship_declarations(person_id)
    }

    fn get_person(&self, id: &str) -> Result<Person> {
        self.inner.get_person(id)
    }

    fn list_persons_by_ids(&self, ids: &[String]) -> Result<Vec<Person>> {
        self.inner.list_persons_by_ids(ids)
    }

    fn list_all_persons(&self) -> Result<Vec<Person>> {
        self.inner.list_all_persons()
    }

    fn list_all_declarations(&self) -> Result<Vec<RelationshipDeclaration>> {
        self.inner.list_all_declarations()
    }

    fn connected_declarations(&self, _root_id: &str) -> Result<Option<Vec<RelationshipDeclaration>>> {
        if self.fail {
            Err(KinshipError::Store("component query timed out".into()))
        } else {
            Ok(None)
        }
    }
}

fn same_shape(a: &TreeView, b: &TreeView) {
    assert_eq!(a.persons, b.persons);
    assert_eq!(a.parent_child, b.parent_child);
    assert_eq!(a.unions, b.unions);
    assert_eq!(a.union_children, b.union_children);
}

#[test]
fn test_degraded_store_gives_same_tree() {
    let fast = KinshipEngine::with_defaults(family())
        .tree("p", Some(TreeMode::Hourglass), Some(10))
        .unwrap();

    for fail in [true, false] {
        let slow = KinshipEngine::with_defaults(DegradedStore { inner: family(), fail })
            .tree("p", Some(TreeMode::Hourglass), Some(10))
            .unwrap();
        same_shape(&fast, &slow);
    }

    let buckets = KinshipEngine::with_defaults(DegradedStore {
        inner: family(),
        fail: true,
    })
    .classify("p")
    .unwrap();
    assert_eq!(buckets, KinshipEngine::with_defaults(family()).classify("p").unwrap());
}

// =============================================================================
// Kinship
// =============================================================================

#[test]
fn test_relationship_composition() {
    assert_eq!(compute_relationship("parent", "parent", None), "grandparent");
    assert_eq!(compute_relationship("parent", "sibling", Some(Gender::Female)), "aunt");
    assert_eq!(compute_relationship("sibling", "child", Some(Gender::Male)), "nephew");
}

#[test]
fn test_second_cousin_chain_labels() {
    let kinship = KinshipChain::new()
        .then(DirectRelation::Parent, Gender::Unknown)
        .then(DirectRelation::Parent, Gender::Unknown)
        .then(DirectRelation::Sibling, Gender::Unknown)
        .then(DirectRelation::Child, Gender::Unknown)
        .then(DirectRelation::Child, Gender::Female)
        .fold()
        .unwrap();

    assert_eq!(kinship.code.neutral(), RelationCode::Cousin);
    assert_eq!(kinship.qualifiers.degree(), 2);
    assert_eq!(kinship.qualifiers.cousin_removed, 0);
    assert_eq!(
        generate_label(kinship.code, Gender::Female, &kinship.qualifiers, Locale::En),
        "second cousin"
    );
}

#[test]
fn test_labels_never_empty() {
    let engine = KinshipEngine::with_defaults(Snapshot::default());
    let qualifiers = Qualifiers {
        cousin_degree: Some(42),
        cousin_removed: 7,
        level: 12,
        ..Qualifiers::default()
    };
    for code in RelationCode::ALL {
        for locale in [Locale::En, Locale::Ru] {
            let label = engine.label(code.as_str(), Gender::Nonbinary, &qualifiers, Some(locale));
            assert!(!label.trim().is_empty(), "{} / {:?}", code, locale);
        }
    }
}

// =============================================================================
// Duplicate scans
// =============================================================================

#[test]
fn test_full_scan_and_idempotent_rescan() {
    let engine = KinshipEngine::with_defaults(duplicates());
    let queue = InMemoryQueue::new();
    let request = engine.default_scan_request(ScanType::Full);

    let first = engine.scan_duplicates(&request, &queue, &CancelFlag::new()).unwrap();
    assert!(first.completed);
    assert_eq!(first.profiles_scanned, 8);
    assert_eq!(first.duplicates_found, 2);
    assert_eq!(first.duplicates_inserted, 2);

    let kim = &first.duplicates[0];
    assert_eq!((kim.profile_a_id.as_str(), kim.profile_b_id.as_str()), ("k1", "k2"));
    assert_eq!(kim.confidence_score, 70);

    let ivanov = &first.duplicates[1];
    assert!(ivanov.is_deceased_pair);
    assert_eq!(ivanov.shared_relatives_count, 3);
    assert_eq!(ivanov.confidence_score, 49);
    assert!(ivanov.confidence_score >= request.min_confidence);

    let again = engine.scan_duplicates(&request, &queue, &CancelFlag::new()).unwrap();
    assert_eq!(again.duplicates_inserted, 0);
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_relationship_matching_off_drops_ivanov_pair() {
    let engine = KinshipEngine::with_defaults(duplicates());
    let request = ScanRequest {
        include_relationship_matching: false,
        ..engine.default_scan_request(ScanType::DeceasedOnly)
    };
    let response = engine
        .scan_duplicates(&request, &InMemoryQueue::new(), &CancelFlag::new())
        .unwrap();
    assert_eq!(response.profiles_scanned, 2);
    assert_eq!(response.duplicates_found, 0);
}

#[test]
fn test_incremental_scan() {
    let engine = KinshipEngine::with_defaults(duplicates());
    let request = ScanRequest {
        since: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        ..engine.default_scan_request(ScanType::Incremental)
    };
    let response = engine
        .scan_duplicates(&request, &InMemoryQueue::new(), &CancelFlag::new())
        .unwrap();
    assert_eq!(response.duplicates_found, 1);
    assert_eq!(response.duplicates[0].key(), PairKey::new("k2", "k1"));
}

#[test]
fn test_review_queue_ranking() {
    let engine = KinshipEngine::with_defaults(duplicates());
    let queue = InMemoryQueue::new();
    engine
        .scan_duplicates(&engine.default_scan_request(ScanType::Full), &queue, &CancelFlag::new())
        .unwrap();

    let top = queue.pending(1, 1).unwrap();
    assert_eq!(top.total, 2);
    assert_eq!(top.items[0].candidate.confidence_score, 70);

    queue
        .set_status(&PairKey::new("k1", "k2"), ReviewStatus::ConfirmedSame)
        .unwrap();
    let rest = queue.pending(1, 10).unwrap();
    assert_eq!(rest.total, 1);
    assert_eq!(rest.items[0].candidate.key(), PairKey::new("iv1", "iv2"));
}

#[test]
fn test_scan_response_json_shape() {
    let mut config = EngineConfig::default();
    config.duplicates.min_confidence = 60;
    let engine = KinshipEngine::new(duplicates(), config);
    let response = engine
        .scan_duplicates(&engine.default_scan_request(ScanType::Full), &InMemoryQueue::new(), &CancelFlag::new())
        .unwrap();
    assert_eq!(response.duplicates_found, 1);

    let json = serde_json::to_value(&response).unwrap();
    for key in [
        "profilesScanned",
        "duplicatesFound",
        "duplicatesInserted",
        "duplicatesSkipped",
        "insertFailures",
        "durationMs",
        "completed",
        "duplicates",
    ] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(json["duplicates"][0]["profile_a_id"], "k1");
    assert!(json["duplicates"][0]["match_reasons"]["birth_place"].is_object());
}
