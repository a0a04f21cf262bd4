//! Label Generation
//!
//! Renders a relation code plus gender and qualifiers into a localized noun
//! phrase. Each locale has gendered base nouns, ordinal tables for cousin
//! degree and removal, and "great-" style prefixes for generational level.
//! Every table has a formulaic fallback, so a valid code never renders to an
//! empty string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::algebra::{compose, RelationCode};
use crate::error::KinshipError;
use crate::model::{DirectRelation, Gender, Halfness, Lineage, Qualifiers};

/// Supported label locales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ru => "ru",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = KinshipError;

    /// Accepts language tags such as `ru-RU` or `en_GB`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = s.trim().to_lowercase();
        match lang.split(['-', '_']).next().unwrap_or("") {
            "en" => Ok(Locale::En),
            "ru" => Ok(Locale::Ru),
            _ => Err(KinshipError::InvalidCode(format!("locale '{}'", s))),
        }
    }
}

/// A resolved indirect relation with labels in both locales
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinshipResult {
    pub code: RelationCode,
    pub label_en: String,
    pub label_ru: String,
}

impl KinshipResult {
    pub fn new(code: RelationCode, gender: Gender, qualifiers: &Qualifiers) -> Self {
        Self {
            code,
            label_en: generate_label(code, gender, qualifiers, Locale::En),
            label_ru: generate_label(code, gender, qualifiers, Locale::Ru),
        }
    }
}

/// Compose two hops and label the result in both locales
pub fn resolve_kinship(
    intermediate: RelationCode,
    next: DirectRelation,
    gender: Gender,
    qualifiers: &Qualifiers,
) -> KinshipResult {
    KinshipResult::new(compose(intermediate, next, gender), gender, qualifiers)
}

/// Render `code` for a target of `gender` in `locale`
pub fn generate_label(code: RelationCode, gender: Gender, qualifiers: &Qualifiers, locale: Locale) -> String {
    let gender = code.implied_gender().unwrap_or(gender);
    let label = match locale {
        Locale::En => english(code.neutral(), gender, qualifiers),
        Locale::Ru => russian(code.neutral(), gender, qualifiers),
    };

    if label.trim().is_empty() {
        code.as_str().replace('_', " ")
    } else {
        label
    }
}

/// String-level entry point; an unknown code is echoed back rather than dropped
pub fn generate_label_str(code: &str, gender: Gender, qualifiers: &Qualifiers, locale: Locale) -> String {
    match code.parse::<RelationCode>() {
        Ok(code) => generate_label(code, gender, qualifiers, locale),
        Err(_) if !code.trim().is_empty() => code.trim().replace('_', " "),
        Err(_) => "relative".to_string(),
    }
}

// =============================================================================
// English
// =============================================================================

const ORDINALS_EN: [&str; 10] = [
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

const REMOVED_EN: [&str; 3] = ["once removed", "twice removed", "thrice removed"];

fn pick<'a>(gender: Gender, female: &'a str, male: &'a str, neutral: &'a str) -> &'a str {
    match gender {
        Gender::Female => female,
        Gender::Male => male,
        Gender::Nonbinary | Gender::Unknown => neutral,
    }
}

/// Generational prefixes spelled out up to this count; beyond it a count is written
const MAX_SPELLED_PREFIXES: u32 = 5;

fn greats_en(count: u32) -> String {
    if count <= MAX_SPELLED_PREFIXES {
        "great-".repeat(count as usize)
    } else {
        format!("{}× great-", count)
    }
}

fn ordinal_en(n: u32) -> String {
    if let Some(word) = ORDINALS_EN.get((n as usize).wrapping_sub(1)) {
        return word.to_string();
    }
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn lineage_en(lineage: Lineage) -> &'static str {
    match lineage {
        Lineage::Maternal => "maternal ",
        Lineage::Paternal => "paternal ",
        Lineage::Both | Lineage::Unknown => "",
    }
}

fn english(code: RelationCode, gender: Gender, q: &Qualifiers) -> String {
    use RelationCode as R;

    let g = |f, m, n| pick(gender, f, m, n);
    let adoption = match q.halfness {
        Halfness::Adoptive => "adoptive ",
        Halfness::Foster => "foster ",
        Halfness::Full | Halfness::Half => "",
    };

    match code {
        R::Parent => format!("{}{}", adoption, g("mother", "father", "parent")),
        R::Child => format!("{}{}", adoption, g("daughter", "son", "child")),
        R::Sibling => {
            let noun = g("sister", "brother", "sibling");
            match q.halfness {
                Halfness::Full => noun.to_string(),
                Halfness::Half => format!("{}half-{}", lineage_en(q.lineage), noun),
                Halfness::Adoptive | Halfness::Foster => format!("{}{}", adoption, noun),
            }
        }
        R::Spouse => g("wife", "husband", "spouse").to_string(),
        R::Grandparent | R::GreatGrandparent => {
            let extra = if code == R::GreatGrandparent { 1 } else { 0 };
            format!(
                "{}{}{}",
                lineage_en(q.lineage),
                greats_en(q.level.saturating_add(extra)),
                g("grandmother", "grandfather", "grandparent")
            )
        }
        R::Grandchild | R::GreatGrandchild => {
            let extra = if code == R::GreatGrandchild { 1 } else { 0 };
            format!("{}{}", greats_en(q.level.saturating_add(extra)), g("granddaughter", "grandson", "grandchild"))
        }
        R::AuntUncle => format!(
            "{}{}{}",
            lineage_en(q.lineage),
            greats_en(q.level),
            g("aunt", "uncle", "aunt/uncle")
        ),
        R::NieceNephew => {
            if q.level == 0 {
                g("niece", "nephew", "niece/nephew").to_string()
            } else {
                format!(
                    "{}grand{}",
                    greats_en(q.level - 1),
                    g("niece", "nephew", "niece/nephew")
                )
            }
        }
        R::Cousin => {
            let mut label = format!("{}{} cousin", lineage_en(q.lineage), ordinal_en(q.degree()));
            match q.cousin_removed {
                0 => {}
                n => {
                    let removed = REMOVED_EN
                        .get(n as usize - 1)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("{} times removed", n));
                    label.push(' ');
                    label.push_str(&removed);
                }
            }
            label
        }
        R::ParentInLaw => g("mother-in-law", "father-in-law", "parent-in-law").to_string(),
        R::ChildInLaw => g("daughter-in-law", "son-in-law", "child-in-law").to_string(),
        R::SiblingInLaw => g("sister-in-law", "brother-in-law", "sibling-in-law").to_string(),
        R::StepParent => g("stepmother", "stepfather", "step-parent").to_string(),
        R::StepChild => g("stepdaughter", "stepson", "stepchild").to_string(),
        R::StepSibling => g("stepsister", "stepbrother", "step-sibling").to_string(),
        R::Aunt | R::Uncle | R::Niece | R::Nephew => String::new(),
    }
}

// =============================================================================
// Russian
// =============================================================================

/// Cousin degree stems: 1 = двоюродн-, 2 = троюродн-, ...
const COUSIN_STEMS_RU: [&str; 7] = [
    "двоюродн", "троюродн", "четвероюродн", "пятиюродн", "шестиюродн", "семиюродн", "восьмиюродн",
];

const REMOVED_RU: [&str; 4] = [
    "через одно поколение",
    "через два поколения",
    "через три поколения",
    "через четыре поколения",
];

/// Female/male forms; the neutral form lists both
fn pick_ru(gender: Gender, female: &str, male: &str) -> String {
    match gender {
        Gender::Female => female.to_string(),
        Gender::Male => male.to_string(),
        Gender::Nonbinary | Gender::Unknown => format!("{} или {}", male, female),
    }
}

fn pra(count: u32) -> String {
    if count <= MAX_SPELLED_PREFIXES {
        "пра".repeat(count as usize)
    } else {
        format!("{}×пра", count)
    }
}

fn lineage_ru(lineage: Lineage) -> &'static str {
    match lineage {
        Lineage::Maternal => " по матери",
        Lineage::Paternal => " по отцу",
        Lineage::Both | Lineage::Unknown => "",
    }
}

fn russian(code: RelationCode, gender: Gender, q: &Qualifiers) -> String {
    use RelationCode as R;

    let adoption = |female: &str, male: &str| -> Option<(String, String)> {
        match q.halfness {
            Halfness::Adoptive => Some((format!("приёмная {}", female), format!("приёмный {}", male))),
            Halfness::Foster => Some((format!("названая {}", female), format!("названый {}", male))),
            Halfness::Full | Halfness::Half => None,
        }
    };

    match code {
        R::Parent => match adoption("мать", "отец") {
            Some((f, m)) => pick_ru(gender, &f, &m),
            None => match gender {
                Gender::Female => "мать".to_string(),
                Gender::Male => "отец".to_string(),
                _ => "родитель".to_string(),
            },
        },
        R::Child => match adoption("дочь", "сын") {
            Some((f, m)) => pick_ru(gender, &f, &m),
            None => match gender {
                Gender::Female => "дочь".to_string(),
                Gender::Male => "сын".to_string(),
                _ => "ребёнок".to_string(),
            },
        },
        R::Sibling => {
            let (f, m) = match (q.halfness, q.lineage) {
                (Halfness::Full, _) => ("сестра".to_string(), "брат".to_string()),
                (Halfness::Half, Lineage::Paternal) => {
                    ("единокровная сестра".to_string(), "единокровный брат".to_string())
                }
                (Halfness::Half, Lineage::Maternal) => {
                    ("единоутробная сестра".to_string(), "единоутробный брат".to_string())
                }
                (Halfness::Half, _) => ("неполнородная сестра".to_string(), "неполнородный брат".to_string()),
                (Halfness::Adoptive | Halfness::Foster, _) => {
                    adoption("сестра", "брат").unwrap_or_else(|| ("сестра".to_string(), "брат".to_string()))
                }
            };
            pick_ru(gender, &f, &m)
        }
        R::Spouse => match gender {
            Gender::Female => "жена".to_string(),
            Gender::Male => "муж".to_string(),
            _ => "супруг".to_string(),
        },
        R::Grandparent | R::GreatGrandparent => {
            let extra = if code == R::GreatGrandparent { 1 } else { 0 };
            let prefix = pra(q.level.saturating_add(extra));
            format!(
                "{}{}",
                pick_ru(gender, &format!("{}бабушка", prefix), &format!("{}дедушка", prefix)),
                lineage_ru(q.lineage)
            )
        }
        R::Grandchild | R::GreatGrandchild => {
            let extra = if code == R::GreatGrandchild { 1 } else { 0 };
            let prefix = pra(q.level.saturating_add(extra));
            pick_ru(gender, &format!("{}внучка", prefix), &format!("{}внук", prefix))
        }
        R::AuntUncle => {
            let base = if q.level == 0 {
                pick_ru(gender, "тётя", "дядя")
            } else {
                let prefix = pra(q.level - 1);
                pick_ru(
                    gender,
                    &format!("двоюродная {}бабушка", prefix),
                    &format!("двоюродный {}дедушка", prefix),
                )
            };
            format!("{}{}", base, lineage_ru(q.lineage))
        }
        R::NieceNephew => {
            if q.level == 0 {
                pick_ru(gender, "племянница", "племянник")
            } else {
                let prefix = pra(q.level - 1);
                pick_ru(
                    gender,
                    &format!("{}внучатая племянница", prefix),
                    &format!("{}внучатый племянник", prefix),
                )
            }
        }
        R::Cousin => {
            let degree = q.degree();
            let (f, m) = match COUSIN_STEMS_RU.get(degree as usize - 1) {
                Some(stem) => (format!("{}ая сестра", stem), format!("{}ый брат", stem)),
                None => (
                    format!("{}-юродная сестра", degree.saturating_add(1)),
                    format!("{}-юродный брат", degree.saturating_add(1)),
                ),
            };
            let mut label = format!("{}{}", pick_ru(gender, &f, &m), lineage_ru(q.lineage));
            if q.cousin_removed > 0 {
                let n = q.cousin_removed;
                let removed = REMOVED_RU
                    .get(n as usize - 1)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("через {} поколений", n));
                label.push_str(&format!(" ({})", removed));
            }
            label
        }
        R::ParentInLaw => match gender {
            Gender::Female => "свекровь/тёща".to_string(),
            Gender::Male => "свёкор/тесть".to_string(),
            _ => "родитель супруга".to_string(),
        },
        R::ChildInLaw => pick_ru(gender, "невестка", "зять"),
        R::SiblingInLaw => pick_ru(gender, "свойственница", "свойственник"),
        R::StepParent => pick_ru(gender, "мачеха", "отчим"),
        R::StepChild => pick_ru(gender, "падчерица", "пасынок"),
        R::StepSibling => pick_ru(gender, "сводная сестра", "сводный брат"),
        R::Aunt | R::Uncle | R::Niece | R::Nephew => String::new(),
    }
}
