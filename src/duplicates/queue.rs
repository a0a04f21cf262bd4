//! Duplicate scan management
//!
//! A scan picks a population slice, prunes it to candidate pairs, scores
//! each pair and hands everything at or above the cutoff to a
//! [`DuplicateQueue`]. The queue owns persistence and the uniqueness of the
//! ordered pair key; a lost insert race comes back as
//! [`InsertOutcome::AlreadyExists`] and is not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::prefilter::{all_pairs, Prefilter};
use super::scorer::{DuplicateCandidate, DuplicateScorer, PairKey};
use crate::config::DuplicatesConfig;
use crate::error::{KinshipError, Result};
use crate::model::{Person, PersonId, RelationshipDeclaration};

// ============================================================================
// Request / response
// ============================================================================

/// Population slice a scan covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    #[default]
    Full,
    DeceasedOnly,
    /// Persons updated since `since`, paired against everyone
    Incremental,
}

impl std::str::FromStr for ScanType {
    type Err = KinshipError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "full" => Ok(Self::Full),
            "deceased_only" | "deceased" => Ok(Self::DeceasedOnly),
            "incremental" => Ok(Self::Incremental),
            other => Err(KinshipError::InvalidCode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanRequest {
    pub scan_type: ScanType,
    pub min_confidence: u32,
    pub include_relationship_matching: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    /// Wall-clock budget; an exhausted budget ends the scan early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            scan_type: ScanType::Full,
            min_confidence: 40,
            include_relationship_matching: true,
            since: None,
            deadline_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub profiles_scanned: usize,
    pub duplicates_found: usize,
    pub duplicates_inserted: usize,
    /// Pairs that failed to score
    pub duplicates_skipped: usize,
    /// Candidates the queue failed to store; they are still listed in `duplicates`
    pub insert_failures: usize,
    pub duration_ms: u64,
    /// False when the scan was cancelled or ran out of time
    pub completed: bool,
    pub duplicates: Vec<DuplicateCandidate>,
}

/// Caller-side cancellation, checked between pairs
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Queue boundary
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    ConfirmedSame,
    ConfirmedDifferent,
    Merged,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(flatten)]
    pub candidate: DuplicateCandidate,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

/// One page of results; `page` is 1-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

/// Persistence of candidate pairs, owned by the storage collaborator.
/// `insert` must be atomic on the ordered pair key.
pub trait DuplicateQueue: Send + Sync {
    fn contains(&self, key: &PairKey) -> Result<bool>;

    fn insert(&self, candidate: &DuplicateCandidate) -> Result<InsertOutcome>;

    /// Every pair the queue has ever seen, whatever its review status
    fn known_pairs(&self) -> Result<HashSet<PairKey>>;
}

/// Reference queue held in memory
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    entries: Mutex<BTreeMap<PairKey, QueueEntry>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<PairKey, QueueEntry>>> {
        self.entries
            .lock()
            .map_err(|_| KinshipError::Store("duplicate queue lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &PairKey) -> Result<Option<QueueEntry>> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// Record a review decision
    pub fn set_status(&self, key: &PairKey, status: ReviewStatus) -> Result<()> {
        let mut entries = self.lock()?;
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| KinshipError::not_found(key.to_string()))?;
        entry.status = status;
        Ok(())
    }

    /// Pending entries ranked by confidence, highest first
    pub fn pending(&self, page: usize, page_size: usize) -> Result<Page<QueueEntry>> {
        let entries = self.lock()?;
        let pending: Vec<QueueEntry> = entries
            .values()
            .filter(|e| e.status == ReviewStatus::Pending)
            .cloned()
            .collect();
        Ok(rank_page(pending, page, page_size))
    }
}

impl DuplicateQueue for InMemoryQueue {
    fn contains(&self, key: &PairKey) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    fn insert(&self, candidate: &DuplicateCandidate) -> Result<InsertOutcome> {
        let mut entries = self.lock()?;
        let key = candidate.key();
        if entries.contains_key(&key) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        entries.insert(
            key,
            QueueEntry {
                candidate: candidate.clone(),
                status: ReviewStatus::Pending,
                created_at: Utc::now(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    fn known_pairs(&self) -> Result<HashSet<PairKey>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// Sort by confidence desc then pair key, and cut out one page
pub fn rank_page(mut entries: Vec<QueueEntry>, page: usize, page_size: usize) -> Page<QueueEntry> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    entries.sort_by(|a, b| {
        b.candidate
            .confidence_score
            .cmp(&a.candidate.confidence_score)
            .then_with(|| a.candidate.key().cmp(&b.candidate.key()))
    });
    let total = entries.len();
    let items = entries
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();
    Page {
        items,
        page,
        page_size,
        total,
    }
}

// ============================================================================
// Relationship overlap
// ============================================================================

/// Undirected neighbour sets built from declarations
pub fn relative_index(declarations: &[RelationshipDeclaration]) -> HashMap<PersonId, HashSet<PersonId>> {
    let mut index: HashMap<PersonId, HashSet<PersonId>> = HashMap::new();
    for decl in declarations {
        let Some(subject) = decl.subject_id.as_ref() else {
            continue;
        };
        let anchor = decl.related_subject_id.as_ref().unwrap_or(&decl.declarer_id);
        if anchor == subject {
            continue;
        }
        index.entry(anchor.clone()).or_default().insert(subject.clone());
        index.entry(subject.clone()).or_default().insert(anchor.clone());
    }
    index
}

/// Relatives both persons have, not counting each other
pub fn shared_relatives(index: &HashMap<PersonId, HashSet<PersonId>>, a: &str, b: &str) -> usize {
    match (index.get(a), index.get(b)) {
        (Some(x), Some(y)) => x.intersection(y).filter(|id| *id != a && *id != b).count(),
        _ => 0,
    }
}

// ============================================================================
// Scanner
// ============================================================================

#[derive(Debug, Clone)]
pub struct DuplicateScanner {
    scorer: DuplicateScorer,
    prefilter: Option<Prefilter>,
}

impl Default for DuplicateScanner {
    fn default() -> Self {
        Self::from_config(&DuplicatesConfig::default())
    }
}

impl DuplicateScanner {
    pub fn new(scorer: DuplicateScorer, prefilter: Option<Prefilter>) -> Self {
        Self { scorer, prefilter }
    }

    pub fn from_config(config: &DuplicatesConfig) -> Self {
        let window = config.birth_year_window as i32;
        let scorer = DuplicateScorer::new(config.weights.clone(), config.fuzzy_threshold, window);
        let prefilter = config.prefilter.then(|| Prefilter::new(window));
        Self::new(scorer, prefilter)
    }

    pub fn scorer(&self) -> &DuplicateScorer {
        &self.scorer
    }

    pub fn scan(
        &self,
        persons: &[Person],
        declarations: &[RelationshipDeclaration],
        request: &ScanRequest,
        queue: &dyn DuplicateQueue,
        cancel: &CancelFlag,
    ) -> Result<ScanResponse> {
        let started = Instant::now();
        let deadline = request.deadline_ms.map(Duration::from_millis);

        let population: Vec<&Person> = persons
            .iter()
            .filter(|p| request.scan_type != ScanType::DeceasedOnly || !p.is_alive())
            .collect();

        let focus: Option<HashSet<PersonId>> = match (request.scan_type, request.since) {
            (ScanType::Incremental, Some(since)) => Some(
                population
                    .iter()
                    .filter(|p| p.updated_at.is_some_and(|t| t >= since))
                    .map(|p| p.id.clone())
                    .collect(),
            ),
            (ScanType::Incremental, None) => {
                debug!("incremental scan without `since`, scanning everyone");
                None
            }
            _ => None,
        };

        info!(
            scan_type = ?request.scan_type,
            profiles = population.len(),
            min_confidence = request.min_confidence,
            "duplicate scan started"
        );

        let pairs = match &self.prefilter {
            Some(prefilter) => prefilter.candidate_pairs(&population, focus.as_ref()),
            None => all_pairs(&population, focus.as_ref()),
        };

        let relatives = request
            .include_relationship_matching
            .then(|| relative_index(declarations));
        let known = queue.known_pairs()?;
        let by_id: HashMap<&str, &Person> = population.iter().map(|p| (p.id.as_str(), *p)).collect();

        let mut found = Vec::new();
        let mut skipped = 0;
        let mut completed = true;

        for key in &pairs {
            if cancel.is_cancelled() || deadline.is_some_and(|d| started.elapsed() >= d) {
                completed = false;
                break;
            }
            if known.contains(key) {
                continue;
            }
            let (Some(a), Some(b)) = (by_id.get(key.a.as_str()), by_id.get(key.b.as_str())) else {
                continue;
            };
            let shared = relatives
                .as_ref()
                .map(|index| shared_relatives(index, &key.a, &key.b))
                .unwrap_or(0);

            match self.scorer.score(a, b, shared) {
                Ok(candidate) if candidate.confidence_score >= request.min_confidence => found.push(candidate),
                Ok(_) => {}
                Err(e) => {
                    debug!(pair = %key, error = %e, "pair not scored");
                    skipped += 1;
                }
            }
        }

        found.sort_by(|a, b| {
            b.confidence_score
                .cmp(&a.confidence_score)
                .then_with(|| a.key().cmp(&b.key()))
        });

        let mut inserted = 0;
        let mut insert_failures = 0;
        for candidate in &found {
            match queue.insert(candidate) {
                Ok(InsertOutcome::Inserted) => inserted += 1,
                Ok(InsertOutcome::AlreadyExists) => {
                    debug!(pair = %candidate.key(), "pair already queued");
                }
                Err(e) => {
                    warn!(pair = %candidate.key(), error = %e, "failed to queue pair");
                    insert_failures += 1;
                }
            }
        }

        let response = ScanResponse {
            profiles_scanned: population.len(),
            duplicates_found: found.len(),
            duplicates_inserted: inserted,
            duplicates_skipped: skipped,
            insert_failures,
            duration_ms: started.elapsed().as_millis() as u64,
            completed,
            duplicates: found,
        };

        info!(
            pairs = pairs.len(),
            found = response.duplicates_found,
            inserted = response.duplicates_inserted,
            skipped = response.duplicates_skipped,
            insert_failures = response.insert_failures,
            completed = response.completed,
            "duplicate scan finished"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DirectRelation;
    use chrono::{NaiveDate, TimeZone};

    fn deceased(id: &str, first: &str, last: &str, year: i32) -> Person {
        let mut p = Person::new(id, first, last).born(NaiveDate::from_ymd_opt(year, 6, 1).unwrap());
        p.is_deceased = true;
        p
    }

    fn population() -> (Vec<Person>, Vec<RelationshipDeclaration>) {
        let persons = vec![
            deceased("iv1", "", "Ivanov", 1930),
            deceased("iv2", "", "Ivanov", 1931),
            Person::new("k1", "Anna", "Kim"),
            Person::new("k2", "Anna", "Kim"),
            Person::new("z", "Boris", "Zotov"),
        ];
        let decls = ["r1", "r2", "r3"]
            .iter()
            .flat_map(|r| {
                [
                    RelationshipDeclaration::new(*r, DirectRelation::Child, "iv1"),
                    RelationshipDeclaration::new(*r, DirectRelation::Child, "iv2"),
                ]
            })
            .collect();
        (persons, decls)
    }

    #[test]
    fn test_shared_relatives() {
        let (_, decls) = population();
        let index = relative_index(&decls);
        assert_eq!(shared_relatives(&index, "iv1", "iv2"), 3);
        assert_eq!(shared_relatives(&index, "iv1", "z"), 0);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let (persons, decls) = population();
        let queue = InMemoryQueue::new();
        let scanner = DuplicateScanner::default();
        let request = ScanRequest::default();

        let first = scanner.scan(&persons, &decls, &request, &queue, &CancelFlag::new()).unwrap();
        assert!(first.completed);
        assert_eq!(first.profiles_scanned, 5);
        assert_eq!(first.duplicates_found, 2);
        assert_eq!(first.duplicates_inserted, 2);
        // k1/k2: 40 on names alone; Ivanov pair: 20 + 8 + 21
        assert_eq!(first.duplicates[0].confidence_score, 49);
        assert_eq!(first.duplicates[0].key(), PairKey::new("iv1", "iv2"));

        let second = scanner.scan(&persons, &decls, &request, &queue, &CancelFlag::new()).unwrap();
        assert_eq!(second.duplicates_inserted, 0);
        assert_eq!(second.duplicates_found, 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_deceased_only_scan() {
        let (persons, decls) = population();
        let queue = InMemoryQueue::new();
        let request = ScanRequest {
            scan_type: ScanType::DeceasedOnly,
            ..ScanRequest::default()
        };
        let response = DuplicateScanner::default()
            .scan(&persons, &decls, &request, &queue, &CancelFlag::new())
            .unwrap();
        assert_eq!(response.profiles_scanned, 2);
        assert_eq!(response.duplicates_inserted, 1);
    }

    /// A queue whose known-pairs snapshot is always stale, as seen by a
    /// scan racing another one
    struct StaleQueue(InMemoryQueue);

    impl DuplicateQueue for StaleQueue {
        fn contains(&self, key: &PairKey) -> Result<bool> {
            self.0.contains(key)
        }
        fn insert(&self, candidate: &DuplicateCandidate) -> Result<InsertOutcome> {
            self.0.insert(candidate)
        }
        fn known_pairs(&self) -> Result<HashSet<PairKey>> {
            Ok(HashSet::new())
        }
    }

    #[test]
    fn test_lost_insert_race_is_not_an_error() {
        let (persons, decls) = population();
        let queue = StaleQueue(InMemoryQueue::new());
        let scanner = DuplicateScanner::default();
        let request = ScanRequest::default();

        scanner.scan(&persons, &decls, &request, &queue, &CancelFlag::new()).unwrap();
        let again = scanner.scan(&persons, &decls, &request, &queue, &CancelFlag::new()).unwrap();
        assert_eq!(again.duplicates_found, 2);
        assert_eq!(again.duplicates_inserted, 0);
        assert_eq!(queue.0.len(), 2);
    }

    #[test]
    fn test_cancelled_scan_is_partial() {
        let (persons, decls) = population();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let response = DuplicateScanner::default()
            .scan(&persons, &decls, &ScanRequest::default(), &InMemoryQueue::new(), &cancel)
            .unwrap();
        assert!(!response.completed);
        assert_eq!(response.duplicates_found, 0);
        assert_eq!(response.profiles_scanned, 5);
    }

    /// A queue that refuses to store one particular pair
    struct FlakyQueue {
        inner: InMemoryQueue,
        refuse: PairKey,
    }

    impl DuplicateQueue for FlakyQueue {
        fn contains(&self, key: &PairKey) -> Result<bool> {
            self.inner.contains(key)
        }
        fn insert(&self, candidate: &DuplicateCandidate) -> Result<InsertOutcome> {
            if candidate.key() == self.refuse {
                return Err(KinshipError::Store("transient write failure".to_string()));
            }
            self.inner.insert(candidate)
        }
        fn known_pairs(&self) -> Result<HashSet<PairKey>> {
            self.inner.known_pairs()
        }
    }

    #[test]
    fn test_failed_insert_keeps_the_rest_of_the_scan() {
        let (persons, decls) = population();
        let queue = FlakyQueue {
            inner: InMemoryQueue::new(),
            refuse: PairKey::new("k1", "k2"),
        };
        let response = DuplicateScanner::default()
            .scan(&persons, &decls, &ScanRequest::default(), &queue, &CancelFlag::new())
            .unwrap();

        assert!(response.completed);
        assert_eq!(response.duplicates_found, 2);
        assert_eq!(response.duplicates_inserted, 1);
        assert_eq!(response.insert_failures, 1);
        assert_eq!(response.duplicates.len(), 2);
        assert_eq!(queue.inner.len(), 1);
        assert!(queue.inner.get(&PairKey::new("iv1", "iv2")).unwrap().is_some());
    }

    #[test]
    fn test_unscorable_pairs_are_counted() {
        let (mut persons, decls) = population();
        // Joins the Kim bucket through the maiden name but has no first or last name
        let mut nameless = Person::new("nk", "", "");
        nameless.maiden_name = Some("Kim".into());
        persons.push(nameless);

        let response = DuplicateScanner::default()
            .scan(&persons, &decls, &ScanRequest::default(), &InMemoryQueue::new(), &CancelFlag::new())
            .unwrap();
        assert!(response.completed);
        assert_eq!(response.duplicates_skipped, 2);
        assert_eq!(response.duplicates_found, 2);
    }

    #[test]
    fn test_exhausted_deadline_ends_scan_early() {
        let (persons, decls) = population();
        let queue = InMemoryQueue::new();
        let request = ScanRequest {
            deadline_ms: Some(0),
            ..ScanRequest::default()
        };
        let response = DuplicateScanner::default()
            .scan(&persons, &decls, &request, &queue, &CancelFlag::new())
            .unwrap();
        assert!(!response.completed);
        assert_eq!(response.duplicates_found, 0);
        assert!(queue.is_empty());

        let relaxed = ScanRequest {
            deadline_ms: Some(60_000),
            ..ScanRequest::default()
        };
        let response = DuplicateScanner::default()
            .scan(&persons, &decls, &relaxed, &queue, &CancelFlag::new())
            .unwrap();
        assert!(response.completed);
        assert_eq!(response.duplicates_inserted, 2);
    }

    #[test]
    fn test_incremental_scan_pairs_only_updated_persons() {
        let (mut persons, decls) = population();
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        persons[2].updated_at = Some(since + chrono::Duration::days(1));
        let request = ScanRequest {
            scan_type: ScanType::Incremental,
            since: Some(since),
            ..ScanRequest::default()
        };
        let response = DuplicateScanner::default()
            .scan(&persons, &decls, &request, &InMemoryQueue::new(), &CancelFlag::new())
            .unwrap();
        assert_eq!(response.duplicates_found, 1);
        assert_eq!(response.duplicates[0].key(), PairKey::new("k1", "k2"));
    }

    #[test]
    fn test_pending_pages_rank_by_confidence() {
        let (persons, decls) = population();
        let queue = InMemoryQueue::new();
        DuplicateScanner::default()
            .scan(&persons, &decls, &ScanRequest::default(), &queue, &CancelFlag::new())
            .unwrap();

        let page = queue.pending(1, 1).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].candidate.confidence_score, 49);

        queue.set_status(&PairKey::new("iv1", "iv2"), ReviewStatus::Dismissed).unwrap();
        let page = queue.pending(1, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].candidate.key(), PairKey::new("k1", "k2"));
        assert!(queue.set_status(&PairKey::new("x", "y"), ReviewStatus::Merged).is_err());
    }

    #[test]
    fn test_page_far_past_the_end_is_empty() {
        let (persons, decls) = population();
        let queue = InMemoryQueue::new();
        DuplicateScanner::default()
            .scan(&persons, &decls, &ScanRequest::default(), &queue, &CancelFlag::new())
            .unwrap();

        let page = queue.pending(usize::MAX, usize::MAX).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 2);
        assert_eq!(page.page, usize::MAX);
    }
}
