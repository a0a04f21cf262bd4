//! Person and relationship-declaration records
//!
//! These are the read-only snapshot types the engine consumes from the
//! record store. Declarations are one-sided claims; the graph builder turns
//! them into symmetric semantic edges.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KinshipError;

/// Stable person identifier as issued by the record store
pub type PersonId = String;

/// Gender as explicitly supplied by a member (never inferred)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Nonbinary,
    #[default]
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Nonbinary => "nonbinary",
            Gender::Unknown => "unknown",
        }
    }
}

impl FromStr for Gender {
    type Err = KinshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "nonbinary" | "non-binary" | "nb" => Ok(Gender::Nonbinary),
            "unknown" | "" => Ok(Gender::Unknown),
            other => Err(KinshipError::InvalidCode(format!("gender '{}'", other))),
        }
    }
}

/// A person record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub maiden_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
    /// Explicitly marked deceased even without a known death date
    #[serde(default)]
    pub is_deceased: bool,
    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub death_place: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Last modification time, used by incremental duplicate scans
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Person {
    /// Create a person with only an id and a name
    pub fn new(id: impl Into<PersonId>, first_name: &str, last_name: &str) -> Self {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
        Self {
            id: id.into(),
            first_name: non_empty(first_name),
            last_name: non_empty(last_name),
            middle_name: None,
            maiden_name: None,
            nickname: None,
            gender: Gender::Unknown,
            birth_date: None,
            death_date: None,
            is_deceased: false,
            birth_place: None,
            death_place: None,
            avatar_url: None,
            updated_at: None,
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    pub fn born(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    pub fn died(mut self, date: NaiveDate) -> Self {
        self.death_date = Some(date);
        self
    }

    /// Alive iff there is no death date and the record is not marked deceased
    pub fn is_alive(&self) -> bool {
        self.death_date.is_none() && !self.is_deceased
    }

    pub fn birth_year(&self) -> Option<i32> {
        self.birth_date.map(|d| d.year())
    }

    /// "First Middle Last", skipping missing parts; falls back to the id
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            self.id.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Direct relation code carried by a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectRelation {
    Parent,
    Child,
    Sibling,
    Spouse,
    Grandparent,
    Grandchild,
}

impl DirectRelation {
    pub const ALL: [DirectRelation; 6] = [
        DirectRelation::Parent,
        DirectRelation::Child,
        DirectRelation::Sibling,
        DirectRelation::Spouse,
        DirectRelation::Grandparent,
        DirectRelation::Grandchild,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DirectRelation::Parent => "parent",
            DirectRelation::Child => "child",
            DirectRelation::Sibling => "sibling",
            DirectRelation::Spouse => "spouse",
            DirectRelation::Grandparent => "grandparent",
            DirectRelation::Grandchild => "grandchild",
        }
    }
}

impl fmt::Display for DirectRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirectRelation {
    type Err = KinshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DirectRelation::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| KinshipError::InvalidCode(s.to_string()))
    }
}

/// Sibling/parent relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Halfness {
    #[default]
    Full,
    Half,
    Adoptive,
    Foster,
}

/// Which side of the family a relative is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lineage {
    Maternal,
    Paternal,
    Both,
    #[default]
    Unknown,
}

/// Modifiers on a relation used to refine label generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Qualifiers {
    #[serde(default)]
    pub halfness: Halfness,
    #[serde(default)]
    pub lineage: Lineage,
    /// 1 = first cousin; `None` is treated as 1
    #[serde(default)]
    pub cousin_degree: Option<u32>,
    #[serde(default)]
    pub cousin_removed: u32,
    /// Extra generations beyond the immediate one ("great-" count)
    #[serde(default)]
    pub level: u32,
}

impl Qualifiers {
    pub fn degree(&self) -> u32 {
        self.cousin_degree.unwrap_or(1).max(1)
    }
}

/// A one-sided relationship claim as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDeclaration {
    #[serde(default)]
    pub id: Option<String>,
    pub declarer_id: PersonId,
    /// The person the claim is about; null until they have a record
    #[serde(default)]
    pub subject_id: Option<PersonId>,
    pub relation: DirectRelation,
    /// Already-declared relative through whom this relation was declared
    /// (e.g. "my grandmother" declared as the parent of my mother)
    #[serde(default)]
    pub related_subject_id: Option<PersonId>,
    #[serde(default)]
    pub qualifiers: Qualifiers,
    #[serde(default)]
    pub is_deceased: bool,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub marriage_date: Option<NaiveDate>,
    #[serde(default)]
    pub divorce_date: Option<NaiveDate>,
}

impl RelationshipDeclaration {
    pub fn new(
        declarer_id: impl Into<PersonId>,
        relation: DirectRelation,
        subject_id: impl Into<PersonId>,
    ) -> Self {
        Self {
            id: None,
            declarer_id: declarer_id.into(),
            subject_id: Some(subject_id.into()),
            relation,
            related_subject_id: None,
            qualifiers: Qualifiers::default(),
            is_deceased: false,
            date_of_birth: None,
            marriage_date: None,
            divorce_date: None,
        }
    }

    /// Declare through an intermediate relative
    pub fn via(mut self, related_subject_id: impl Into<PersonId>) -> Self {
        self.related_subject_id = Some(related_subject_id.into());
        self
    }

    pub fn with_qualifiers(mut self, qualifiers: Qualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    pub fn married(mut self, date: NaiveDate) -> Self {
        self.marriage_date = Some(date);
        self
    }

    pub fn divorced(mut self, date: NaiveDate) -> Self {
        self.divorce_date = Some(date);
        self
    }

    /// A label for diagnostics: the stored id, or "declarer:relation:subject"
    pub fn describe(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!(
                "{}:{}:{}",
                self.declarer_id,
                self.relation,
                self.subject_id.as_deref().unwrap_or("?")
            ),
        }
    }

    /// Every person id this declaration mentions
    pub fn mentioned_ids(&self) -> impl Iterator<Item = &PersonId> {
        std::iter::once(&self.declarer_id)
            .chain(self.subject_id.iter())
            .chain(self.related_subject_id.iter())
    }
}

/// Compact person projection returned by tree and classification queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: PersonId,
    pub name: String,
    pub gender: Gender,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub photo_url: Option<String>,
    pub is_alive: bool,
}

impl From<&Person> for PersonSummary {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id.clone(),
            name: person.display_name(),
            gender: person.gender,
            birth_date: person.birth_date,
            death_date: person.death_date,
            photo_url: person.avatar_url.clone(),
            is_alive: person.is_alive(),
        }
    }
}
