//! Kinship Algebra
//!
//! Composes two hops of direct relations into an indirect relation code
//! through a lookup table keyed by `(intermediate, next)`.
//!
//! The table only covers two-hop inputs. Longer chains are resolved by a
//! left fold ([`KinshipChain::fold`]): the result of hops 1–2 becomes the
//! intermediate for hop 3, and so on. The fold also carries generation
//! counts (`level`, cousin `removed`) that the two-hop table cannot express.
//! Whether fold order matters when a chain passes through an in-law or step
//! hop is unresolved; such chains are marked inexact instead of guessed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KinshipError;
use crate::model::{DirectRelation, Gender, Qualifiers};

/// Resolved (possibly indirect) relation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationCode {
    Parent,
    Child,
    Sibling,
    Spouse,
    Grandparent,
    Grandchild,
    GreatGrandparent,
    GreatGrandchild,
    AuntUncle,
    Aunt,
    Uncle,
    NieceNephew,
    Niece,
    Nephew,
    Cousin,
    ParentInLaw,
    ChildInLaw,
    SiblingInLaw,
    StepParent,
    StepChild,
    StepSibling,
}

impl RelationCode {
    pub const ALL: [RelationCode; 21] = [
        RelationCode::Parent,
        RelationCode::Child,
        RelationCode::Sibling,
        RelationCode::Spouse,
        RelationCode::Grandparent,
        RelationCode::Grandchild,
        RelationCode::GreatGrandparent,
        RelationCode::GreatGrandchild,
        RelationCode::AuntUncle,
        RelationCode::Aunt,
        RelationCode::Uncle,
        RelationCode::NieceNephew,
        RelationCode::Niece,
        RelationCode::Nephew,
        RelationCode::Cousin,
        RelationCode::ParentInLaw,
        RelationCode::ChildInLaw,
        RelationCode::SiblingInLaw,
        RelationCode::StepParent,
        RelationCode::StepChild,
        RelationCode::StepSibling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
            Self::Sibling => "sibling",
            Self::Spouse => "spouse",
            Self::Grandparent => "grandparent",
            Self::Grandchild => "grandchild",
            Self::GreatGrandparent => "great_grandparent",
            Self::GreatGrandchild => "great_grandchild",
            Self::AuntUncle => "aunt_uncle",
            Self::Aunt => "aunt",
            Self::Uncle => "uncle",
            Self::NieceNephew => "niece_nephew",
            Self::Niece => "niece",
            Self::Nephew => "nephew",
            Self::Cousin => "cousin",
            Self::ParentInLaw => "parent_in_law",
            Self::ChildInLaw => "child_in_law",
            Self::SiblingInLaw => "sibling_in_law",
            Self::StepParent => "step_parent",
            Self::StepChild => "step_child",
            Self::StepSibling => "step_sibling",
        }
    }

    /// Collapse gendered codes onto their neutral form
    pub fn neutral(self) -> Self {
        match self {
            Self::Aunt | Self::Uncle => Self::AuntUncle,
            Self::Niece | Self::Nephew => Self::NieceNephew,
            other => other,
        }
    }

    /// Gender implied by the code itself, if any
    pub fn implied_gender(self) -> Option<Gender> {
        match self {
            Self::Aunt | Self::Niece => Some(Gender::Female),
            Self::Uncle | Self::Nephew => Some(Gender::Male),
            _ => None,
        }
    }

    /// Resolve gender-ambiguous codes with the target's gender.
    /// Unknown and nonbinary keep the neutral code.
    pub fn with_gender(self, gender: Gender) -> Self {
        match (self.neutral(), gender) {
            (Self::AuntUncle, Gender::Female) => Self::Aunt,
            (Self::AuntUncle, Gender::Male) => Self::Uncle,
            (Self::NieceNephew, Gender::Female) => Self::Niece,
            (Self::NieceNephew, Gender::Male) => Self::Nephew,
            _ => self,
        }
    }

    /// Relations by marriage or remarriage
    pub fn is_affinal(self) -> bool {
        matches!(
            self,
            Self::Spouse
                | Self::ParentInLaw
                | Self::ChildInLaw
                | Self::SiblingInLaw
                | Self::StepParent
                | Self::StepChild
                | Self::StepSibling
        )
    }
}

impl From<DirectRelation> for RelationCode {
    fn from(relation: DirectRelation) -> Self {
        match relation {
            DirectRelation::Parent => Self::Parent,
            DirectRelation::Child => Self::Child,
            DirectRelation::Sibling => Self::Sibling,
            DirectRelation::Spouse => Self::Spouse,
            DirectRelation::Grandparent => Self::Grandparent,
            DirectRelation::Grandchild => Self::Grandchild,
        }
    }
}

impl fmt::Display for RelationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationCode {
    type Err = KinshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        let normalized = match normalized.as_str() {
            "great_grand_parent" => "great_grandparent",
            "great_grand_child" => "great_grandchild",
            "stepparent" => "step_parent",
            "stepchild" => "step_child",
            "stepsibling" => "step_sibling",
            other => other,
        }
        .to_string();

        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| KinshipError::InvalidCode(s.to_string()))
    }
}

// =============================================================================
// Two-hop table
// =============================================================================

/// Two-hop composition table: what is `next` of my `intermediate` to me?
fn lookup(intermediate: RelationCode, next: DirectRelation) -> Option<RelationCode> {
    use DirectRelation as D;
    use RelationCode as R;

    let code = match (intermediate.neutral(), next) {
        (R::Parent, D::Parent) => R::Grandparent,
        (R::Parent, D::Sibling) => R::AuntUncle,
        (R::Parent, D::Child) => R::Sibling,
        (R::Parent, D::Spouse) => R::StepParent,
        (R::Parent, D::Grandparent) => R::GreatGrandparent,

        (R::Grandparent, D::Parent) => R::GreatGrandparent,
        (R::Grandparent, D::Child) => R::AuntUncle,
        (R::Grandparent, D::Sibling) => R::AuntUncle,
        (R::GreatGrandparent, D::Parent) => R::GreatGrandparent,

        (R::Child, D::Child) => R::Grandchild,
        (R::Child, D::Grandchild) => R::GreatGrandchild,
        (R::Child, D::Sibling) => R::Child,
        (R::Child, D::Spouse) => R::ChildInLaw,
        (R::Grandchild, D::Child) => R::GreatGrandchild,
        (R::GreatGrandchild, D::Child) => R::GreatGrandchild,

        (R::Sibling, D::Parent) => R::Parent,
        (R::Sibling, D::Sibling) => R::Sibling,
        (R::Sibling, D::Child) => R::NieceNephew,
        (R::Sibling, D::Grandchild) => R::NieceNephew,
        (R::Sibling, D::Spouse) => R::SiblingInLaw,

        (R::Spouse, D::Parent) => R::ParentInLaw,
        (R::Spouse, D::Sibling) => R::SiblingInLaw,
        (R::Spouse, D::Child) => R::StepChild,

        (R::AuntUncle, D::Child) => R::Cousin,
        (R::AuntUncle, D::Sibling) => R::AuntUncle,
        (R::AuntUncle, D::Spouse) => R::AuntUncle,
        (R::NieceNephew, D::Sibling) => R::NieceNephew,
        (R::NieceNephew, D::Child) => R::NieceNephew,
        (R::Cousin, D::Sibling) => R::Cousin,
        (R::Cousin, D::Child) => R::Cousin,

        (R::StepParent, D::Child) => R::StepSibling,

        _ => return None,
    };
    Some(code)
}

/// Compose `intermediate` with the `next` relation of that intermediate.
///
/// Gender-ambiguous results are resolved with `gender`; a missing table
/// entry falls back to `next` itself.
pub fn compose(intermediate: RelationCode, next: DirectRelation, gender: Gender) -> RelationCode {
    lookup(intermediate, next)
        .unwrap_or_else(|| RelationCode::from(next))
        .with_gender(gender)
}

/// String-level entry point: `compute_relationship("parent", "sibling", Some(Female)) == "aunt"`.
///
/// Never fails. Unparseable input falls back to `new_code` as given.
pub fn compute_relationship(intermediate_code: &str, new_code: &str, gender: Option<Gender>) -> String {
    let gender = gender.unwrap_or_default();
    match (intermediate_code.parse::<RelationCode>(), new_code.parse::<DirectRelation>()) {
        (Ok(intermediate), Ok(next)) => compose(intermediate, next, gender).as_str().to_string(),
        (_, Ok(next)) => RelationCode::from(next).with_gender(gender).as_str().to_string(),
        _ => {
            tracing::debug!(intermediate = intermediate_code, new = new_code, "Unknown relation code, using new code");
            new_code.trim().to_string()
        }
    }
}

// =============================================================================
// Chain folding
// =============================================================================

/// One step in a relation chain: `relation` of the previous person, who has `gender`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub relation: DirectRelation,
    #[serde(default)]
    pub gender: Gender,
}

impl Hop {
    pub fn new(relation: DirectRelation, gender: Gender) -> Self {
        Self { relation, gender }
    }
}

/// Result of folding a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kinship {
    pub code: RelationCode,
    pub qualifiers: Qualifiers,
    /// False when some hop had no table entry and fell back to the raw relation
    pub exact: bool,
}

/// A chain of hops starting at the proband
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinshipChain {
    hops: Vec<Hop>,
}

impl KinshipChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, relation: DirectRelation, gender: Gender) -> Self {
        self.hops.push(Hop::new(relation, gender));
        self
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Left-fold the chain; `None` for an empty chain
    pub fn fold(&self) -> Option<Kinship> {
        let (first, rest) = self.hops.split_first()?;
        let mut acc = Kinship {
            code: RelationCode::from(first.relation),
            qualifiers: Qualifiers::default(),
            exact: true,
        };

        // Cousin generation sits above the proband's until `removed` drains
        let mut above = false;
        for hop in rest {
            acc = step(acc, hop.relation, &mut above);
        }

        let last_gender = self.hops.last().map(|h| h.gender).unwrap_or_default();
        acc.code = acc.code.with_gender(last_gender);
        Some(acc)
    }
}

/// Fold one more hop into an accumulated kinship
fn step(acc: Kinship, next: DirectRelation, above: &mut bool) -> Kinship {
    use DirectRelation as D;
    use RelationCode as R;

    let mut q = acc.qualifiers;
    let mut exact = acc.exact;
    let current = acc.code.neutral();

    let code = match (current, next) {
        (R::GreatGrandparent, D::Parent) | (R::GreatGrandchild, D::Child) | (R::NieceNephew, D::Child) => {
            q.level += 1;
            current
        }
        (R::Grandparent, D::Sibling) => {
            q.level = 1;
            R::AuntUncle
        }
        (R::GreatGrandparent, D::Sibling) => {
            q.level += 2;
            R::AuntUncle
        }
        (R::Sibling, D::Grandchild) => {
            q.level = 1;
            R::NieceNephew
        }
        (R::AuntUncle, D::Child) => {
            q.cousin_removed = q.level;
            *above = q.level > 0;
            q.level = 0;
            q.cousin_degree = Some(1);
            R::Cousin
        }
        (R::Cousin, D::Child) if *above => {
            q.cousin_degree = Some(q.degree() + 1);
            q.cousin_removed -= 1;
            *above = q.cousin_removed > 0;
            R::Cousin
        }
        (R::Cousin, D::Child) => {
            q.cousin_removed += 1;
            R::Cousin
        }
        _ => match lookup(current, next) {
            Some(code) => code,
            None => {
                exact = false;
                tracing::debug!(intermediate = %current, next = %next, "No composition entry; chain is inexact");
                q = Qualifiers::default();
                R::from(next)
            }
        },
    };

    Kinship { code, qualifiers: q, exact }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_compositions() {
        assert_eq!(compute_relationship("parent", "parent", None), "grandparent");
        assert_eq!(compute_relationship("parent", "sibling", Some(Gender::Female)), "aunt");
        assert_eq!(compute_relationship("sibling", "child", Some(Gender::Male)), "nephew");
        assert_eq!(compute_relationship("aunt_uncle", "child", None), "cousin");
        assert_eq!(compute_relationship("grandparent", "parent", None), "great_grandparent");
        assert_eq!(compute_relationship("grandchild", "child", None), "great_grandchild");
        assert_eq!(compute_relationship("child", "child", None), "grandchild");
    }

    #[test]
    fn test_unknown_gender_keeps_neutral_code() {
        assert_eq!(compute_relationship("parent", "sibling", None), "aunt_uncle");
        assert_eq!(compute_relationship("parent", "sibling", Some(Gender::Nonbinary)), "aunt_uncle");
    }

    #[test]
    fn test_gendered_intermediate_is_neutralised() {
        assert_eq!(compute_relationship("uncle", "child", Some(Gender::Female)), "cousin");
    }

    #[test]
    fn test_fallback_to_new_code() {
        assert_eq!(compute_relationship("cousin", "spouse", None), "spouse");
        assert_eq!(compute_relationship("bogus", "parent", None), "parent");
        assert_eq!(compute_relationship("parent", "bogus", None), "bogus");
    }

    #[test]
    fn test_fold_great_great_grandparent() {
        let k = KinshipChain::new()
            .then(DirectRelation::Parent, Gender::Female)
            .then(DirectRelation::Parent, Gender::Male)
            .then(DirectRelation::Parent, Gender::Male)
            .then(DirectRelation::Parent, Gender::Female)
            .fold()
            .unwrap();
        assert_eq!(k.code, RelationCode::GreatGrandparent);
        assert_eq!(k.qualifiers.level, 1);
        assert!(k.exact);
    }

    #[test]
    fn test_fold_first_cousin_once_removed() {
        // parent's sibling's child's child
        let k = KinshipChain::new()
            .then(DirectRelation::Parent, Gender::Male)
            .then(DirectRelation::Sibling, Gender::Female)
            .then(DirectRelation::Child, Gender::Male)
            .then(DirectRelation::Child, Gender::Female)
            .fold()
            .unwrap();
        assert_eq!(k.code, RelationCode::Cousin);
        assert_eq!(k.qualifiers.degree(), 1);
        assert_eq!(k.qualifiers.cousin_removed, 1);
    }

    #[test]
    fn test_fold_great_aunt_child_is_removed_cousin() {
        let k = KinshipChain::new()
            .then(DirectRelation::Grandparent, Gender::Female)
            .then(DirectRelation::Sibling, Gender::Female)
            .then(DirectRelation::Child, Gender::Male)
            .fold()
            .unwrap();
        assert_eq!(k.code, RelationCode::Cousin);
        assert_eq!(k.qualifiers.cousin_removed, 1);
        assert_eq!(k.qualifiers.level, 0);
    }

    #[test]
    fn test_fold_down_from_great_aunt_raises_degree() {
        let chain = KinshipChain::new()
            .then(DirectRelation::Parent, Gender::Male)
            .then(DirectRelation::Parent, Gender::Male)
            .then(DirectRelation::Sibling, Gender::Female)
            .then(DirectRelation::Child, Gender::Male)
            .then(DirectRelation::Child, Gender::Male);
        let k = chain.clone().fold().unwrap();
        assert_eq!(k.code, RelationCode::Cousin);
        assert_eq!(k.qualifiers.degree(), 2);
        assert_eq!(k.qualifiers.cousin_removed, 0);

        let k = chain.then(DirectRelation::Child, Gender::Female).fold().unwrap();
        assert_eq!(k.qualifiers.degree(), 2);
        assert_eq!(k.qualifiers.cousin_removed, 1);
    }

    #[test]
    fn test_fold_through_in_law_marks_inexact() {
        let k = KinshipChain::new()
            .then(DirectRelation::Spouse, Gender::Female)
            .then(DirectRelation::Parent, Gender::Female)
            .then(DirectRelation::Sibling, Gender::Male)
            .fold()
            .unwrap();
        assert_eq!(k.code, RelationCode::Sibling);
        assert!(!k.exact);
    }

    #[test]
    fn test_fold_resolves_final_gender() {
        let k = KinshipChain::new()
            .then(DirectRelation::Sibling, Gender::Male)
            .then(DirectRelation::Child, Gender::Female)
            .fold()
            .unwrap();
        assert_eq!(k.code, RelationCode::Niece);
        assert!(KinshipChain::new().fold().is_none());
    }

    #[test]
    fn test_code_parsing() {
        assert_eq!("great-grandparent".parse::<RelationCode>().unwrap(), RelationCode::GreatGrandparent);
        assert_eq!("Step Parent".parse::<RelationCode>().unwrap(), RelationCode::StepParent);
        assert!("second_cousin".parse::<RelationCode>().is_err());
    }
}
