//! Pairwise duplicate scoring
//!
//! Additive, capped at 100. Each signal that fires is itemised in
//! `match_reasons` so reviewers can see why a pair was proposed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::names::{are_variants, normalize_name, normalized, similarity, surname_key};
use crate::error::{KinshipError, Result};
use crate::model::{Person, PersonId};

pub const MAX_CONFIDENCE: u32 = 100;

/// Points awarded per signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub first_name: u32,
    pub last_name: u32,
    pub name_variant: u32,
    /// Upper bound of the fuzzy bonus, scaled by similarity
    pub fuzzy_max: u32,
    pub maiden_name: u32,
    pub nickname: u32,
    pub birth_exact: u32,
    pub birth_same_year: u32,
    pub birth_near_year: u32,
    pub death_exact: u32,
    pub death_same_year: u32,
    pub death_near_year: u32,
    pub birth_place: u32,
    pub death_place: u32,
    pub shared_relative_deceased: u32,
    pub shared_relatives_deceased_cap: u32,
    pub shared_relative: u32,
    pub shared_relatives_cap: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            first_name: 20,
            last_name: 20,
            name_variant: 15,
            fuzzy_max: 10,
            maiden_name: 5,
            nickname: 5,
            birth_exact: 25,
            birth_same_year: 15,
            birth_near_year: 8,
            death_exact: 15,
            death_same_year: 10,
            death_near_year: 5,
            birth_place: 5,
            death_place: 5,
            shared_relative_deceased: 7,
            shared_relatives_deceased_cap: 25,
            shared_relative: 4,
            shared_relatives_cap: 12,
        }
    }
}

/// Ordered pair key; `a < b` always
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub a: PersonId,
    pub b: PersonId,
}

impl PairKey {
    pub fn new(x: impl Into<PersonId>, y: impl Into<PersonId>) -> Self {
        let (x, y) = (x.into(), y.into());
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.a, self.b)
    }
}

/// One fired signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReason {
    pub points: u32,
    pub detail: String,
}

/// A scored pair of person records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub profile_a_id: PersonId,
    pub profile_b_id: PersonId,
    pub confidence_score: u32,
    pub match_reasons: BTreeMap<String, MatchReason>,
    pub is_deceased_pair: bool,
    pub shared_relatives_count: usize,
}

impl DuplicateCandidate {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.profile_a_id.clone(), self.profile_b_id.clone())
    }
}

/// Name parts prepared once per person
struct NameParts {
    first: Option<String>,
    last: Option<String>,
    last_key: Option<String>,
    maiden_key: Option<String>,
    nickname: Option<String>,
}

impl NameParts {
    fn of(person: &Person) -> Self {
        let last = normalized(person.last_name.as_deref());
        Self {
            first: normalized(person.first_name.as_deref()),
            last_key: person.last_name.as_deref().map(surname_key).filter(|s| !s.is_empty()),
            last,
            maiden_key: person.maiden_name.as_deref().map(surname_key).filter(|s| !s.is_empty()),
            nickname: normalized(person.nickname.as_deref()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DuplicateScorer {
    weights: ScoringWeights,
    fuzzy_threshold: f64,
    year_window: i32,
}

impl Default for DuplicateScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default(), 0.8, 2)
    }
}

impl DuplicateScorer {
    pub fn new(weights: ScoringWeights, fuzzy_threshold: f64, year_window: i32) -> Self {
        Self {
            weights,
            fuzzy_threshold,
            year_window: year_window.max(0),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score two records. `shared_relatives` is the graph overlap computed
    /// by the caller (0 when relationship matching is off).
    pub fn score(&self, a: &Person, b: &Person, shared_relatives: usize) -> Result<DuplicateCandidate> {
        if a.id == b.id {
            return Err(KinshipError::scoring_skipped(&a.id, &b.id, "same record"));
        }
        let (pa, pb) = (NameParts::of(a), NameParts::of(b));
        for (person, parts) in [(a, &pa), (b, &pb)] {
            if parts.first.is_none() && parts.last.is_none() {
                return Err(KinshipError::scoring_skipped(
                    &a.id,
                    &b.id,
                    format!("{} has no usable name", person.id),
                ));
            }
        }

        let w = &self.weights;
        let mut reasons = BTreeMap::new();
        let mut add = |key: &str, points: u32, detail: String| {
            if points > 0 {
                reasons.insert(key.to_string(), MatchReason { points, detail });
            }
        };

        // Given name
        if let (Some(fa), Some(fb)) = (&pa.first, &pb.first) {
            if fa == fb {
                add("first_name", w.first_name, fa.clone());
            } else if are_variants(fa, fb) {
                add("first_name_variant", w.name_variant, format!("{} ~ {}", fa, fb));
            } else if let Some(points) = self.fuzzy_points(fa, fb) {
                add("first_name_fuzzy", points, format!("{} ~ {}", fa, fb));
            }
        }

        // Surname, with feminine forms folded
        let mut last_matched = false;
        if let (Some(ka), Some(kb)) = (&pa.last_key, &pb.last_key) {
            if ka == kb {
                last_matched = true;
                add("last_name", w.last_name, ka.clone());
            } else if let (Some(la), Some(lb)) = (&pa.last, &pb.last) {
                if let Some(points) = self.fuzzy_points(la, lb) {
                    last_matched = true;
                    add("last_name_fuzzy", points, format!("{} ~ {}", la, lb));
                }
            }
        }

        if !last_matched {
            if let Some(name) = maiden_match(&pa, &pb).or_else(|| maiden_match(&pb, &pa)) {
                add("maiden_name", w.maiden_name, name);
            }
        }

        let nickname = |x: &NameParts, y: &NameParts| -> Option<String> {
            let nick = x.nickname.as_ref()?;
            let hit = y.first.as_ref().is_some_and(|f| f == nick || are_variants(f, nick))
                || y.nickname.as_ref() == Some(nick);
            hit.then(|| nick.clone())
        };
        if let Some(nick) = nickname(&pa, &pb).or_else(|| nickname(&pb, &pa)) {
            add("nickname", w.nickname, nick);
        }

        // Dates
        if let Some((points, detail)) = date_points(
            a.birth_date,
            b.birth_date,
            self.year_window,
            (w.birth_exact, w.birth_same_year, w.birth_near_year),
        ) {
            add("birth_date", points, detail);
        }

        let is_deceased_pair = !a.is_alive() && !b.is_alive();
        if is_deceased_pair {
            if let Some((points, detail)) = date_points(
                a.death_date,
                b.death_date,
                self.year_window,
                (w.death_exact, w.death_same_year, w.death_near_year),
            ) {
                add("death_date", points, detail);
            }
        }

        if let Some(place) = same_place(a.birth_place.as_deref(), b.birth_place.as_deref()) {
            add("birth_place", w.birth_place, place);
        }
        if let Some(place) = same_place(a.death_place.as_deref(), b.death_place.as_deref()) {
            add("death_place", w.death_place, place);
        }

        // Graph overlap weighs more when contact details cannot disambiguate
        if shared_relatives > 0 {
            let count = shared_relatives as u32;
            let points = if is_deceased_pair {
                (w.shared_relative_deceased * count).min(w.shared_relatives_deceased_cap)
            } else {
                (w.shared_relative * count).min(w.shared_relatives_cap)
            };
            add("shared_relatives", points, shared_relatives.to_string());
        }

        let total: u32 = reasons.values().map(|r| r.points).sum();
        let key = PairKey::new(a.id.clone(), b.id.clone());

        Ok(DuplicateCandidate {
            profile_a_id: key.a,
            profile_b_id: key.b,
            confidence_score: total.min(MAX_CONFIDENCE),
            match_reasons: reasons,
            is_deceased_pair,
            shared_relatives_count: shared_relatives,
        })
    }

    fn fuzzy_points(&self, a: &str, b: &str) -> Option<u32> {
        let sim = similarity(a, b);
        (sim >= self.fuzzy_threshold).then(|| (self.weights.fuzzy_max as f64 * sim).round() as u32)
    }
}

/// `x`'s maiden name against `y`'s current or maiden surname
fn maiden_match(x: &NameParts, y: &NameParts) -> Option<String> {
    let maiden = x.maiden_key.as_ref()?;
    (y.last_key.as_ref() == Some(maiden) || y.maiden_key.as_ref() == Some(maiden)).then(|| maiden.clone())
}

/// Exact / same year / within window tiers
fn date_points(
    a: Option<chrono::NaiveDate>,
    b: Option<chrono::NaiveDate>,
    window: i32,
    (exact, same_year, near): (u32, u32, u32),
) -> Option<(u32, String)> {
    use chrono::Datelike;

    let (a, b) = (a?, b?);
    if a == b {
        return Some((exact, a.to_string()));
    }
    let gap = (a.year() - b.year()).abs();
    if gap == 0 {
        Some((same_year, a.year().to_string()))
    } else if gap <= window {
        Some((near, format!("{} / {}", a.year().min(b.year()), a.year().max(b.year()))))
    } else {
        None
    }
}

fn same_place(a: Option<&str>, b: Option<&str>) -> Option<String> {
    let a = normalize_name(a?);
    let b = normalize_name(b?);
    (!a.is_empty() && a == b).then_some(a)
}
