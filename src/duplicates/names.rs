//! Name normalisation and cross-language variants
//!
//! Names are compared in a canonical Latin form: lowercased, Cyrillic
//! transliterated, diacritics folded, punctuation dropped. Given-name
//! equivalents across languages and diminutives (Ivan/John/Vanya) come from
//! a static variant dictionary.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn transliterate_char(c: char) -> Option<&'static str> {
    let s = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' | 'є' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' | 'і' => "i",
        'ї' => "yi",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'ю' => "yu",
        'я' => "ya",
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ą' => "a",
        'é' | 'è' | 'ê' | 'ë' | 'ę' | 'ě' => "e",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => "o",
        'ú' | 'ù' | 'û' | 'ü' | 'ů' => "u",
        'ñ' | 'ń' => "n",
        'ç' | 'č' | 'ć' => "c",
        'š' | 'ś' => "s",
        'ž' | 'ź' | 'ż' => "z",
        'ł' => "l",
        'ř' => "r",
        'ß' => "ss",
        _ => return None,
    };
    Some(s)
}

/// Lowercase and transliterate to Latin; other characters pass through
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        match transliterate_char(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

fn non_letters() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z]+").expect("static pattern"))
}

/// Canonical comparison form of a name part; empty if nothing is left
pub fn normalize_name(input: &str) -> String {
    let latin = transliterate(input);
    non_letters().replace_all(&latin, " ").trim().to_string()
}

/// Normalised, non-empty form of an optional name part
pub fn normalized(part: Option<&str>) -> Option<String> {
    part.map(normalize_name).filter(|s| !s.is_empty())
}

/// Surname key with Slavic feminine endings folded onto the masculine form
/// (Ivanova → ivanov, Dostoevskaya → dostoevskiy)
pub fn surname_key(input: &str) -> String {
    let name = normalize_name(input);
    if let Some(stem) = name.strip_suffix("skaya") {
        if !stem.is_empty() {
            return format!("{}skiy", stem);
        }
    }
    for feminine in ["ova", "eva", "ina", "yna"] {
        if name.ends_with(feminine) && name.len() > feminine.len() {
            return name[..name.len() - 1].to_string();
        }
    }
    name
}

fn soundex_digit(c: char) -> Option<char> {
    match c {
        'b' | 'f' | 'p' | 'v' => Some('1'),
        'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
        'd' | 't' => Some('3'),
        'l' => Some('4'),
        'm' | 'n' => Some('5'),
        'r' => Some('6'),
        _ => None,
    }
}

/// Soundex-style code of a name (Kuznetsov and Kusnetsov both give `K253`);
/// empty if the name has no Latin letters after normalisation
pub fn phonetic_key(input: &str) -> String {
    let name = normalize_name(input);
    let mut letters = name.chars().filter(|c| c.is_ascii_lowercase());
    let Some(first) = letters.next() else {
        return String::new();
    };

    let mut code = String::with_capacity(4);
    code.push(first.to_ascii_uppercase());
    let mut last = soundex_digit(first);
    for c in letters {
        if code.len() == 4 {
            break;
        }
        match soundex_digit(c) {
            Some(digit) if last != Some(digit) => {
                code.push(digit);
                last = Some(digit);
            }
            Some(_) => {}
            // h and w do not separate equal codes; vowels do
            None if c == 'h' || c == 'w' => {}
            None => last = None,
        }
    }
    while code.len() < 4 {
        code.push('0');
    }
    code
}

/// Equivalence groups in normalised form
const VARIANT_GROUPS: &[&[&str]] = &[
    &["ivan", "john", "johann", "johannes", "jan", "juan", "giovanni", "vanya", "evan", "sean"],
    &["maria", "mariya", "mary", "marie", "masha", "maryam", "miriam", "mariia"],
    &["aleksandr", "alexander", "alexandr", "aleksander", "sasha", "alex", "sandro", "alejandro", "shura"],
    &["aleksandra", "alexandra", "sasha", "alex", "sandra", "shura"],
    &["ekaterina", "yekaterina", "katerina", "catherine", "katherine", "kathryn", "katya", "katia", "kate", "caterina"],
    &["mikhail", "michael", "misha", "michel", "miguel", "michal", "mike"],
    &["nikolai", "nikolay", "nicholas", "nikolaus", "nicolas", "kolya", "nick"],
    &["petr", "pyotr", "peter", "pierre", "pedro", "petya", "pietro"],
    &["sergei", "sergey", "sergiy", "serge", "sergio", "seryozha", "serezha"],
    &["dmitri", "dmitry", "dmitriy", "dimitri", "demetrius", "dima"],
    &["anna", "ann", "anne", "anya", "hanna", "hannah", "ana"],
    &["elena", "yelena", "helen", "helena", "lena", "ellen", "alena"],
    &["olga", "olya", "helga"],
    &["tatiana", "tatyana", "tanya", "tania"],
    &["natalia", "natalya", "nataliya", "natalie", "natasha", "nathalie"],
    &["yuri", "yuriy", "iurii", "yura", "georgy", "georgiy", "george", "jurgen", "jorge"],
    &["vladimir", "volodya", "vova", "waldemar"],
    &["andrei", "andrey", "andriy", "andrew", "andreas", "andre", "andres"],
    &["aleksei", "alexei", "alexey", "aleksey", "alexis", "alesha", "lesha"],
    &["evgeny", "evgeniy", "yevgeny", "eugene", "zhenya"],
    &["evgenia", "evgeniya", "yevgenia", "eugenia", "zhenya"],
    &["fedor", "fyodor", "feodor", "theodore", "fedya"],
    &["pavel", "paul", "pablo", "paolo", "pasha"],
    &["yakov", "iakov", "jacob", "jakob", "james", "yasha"],
    &["iosif", "osip", "joseph", "josef", "jose", "giuseppe"],
    &["elizaveta", "elizabeth", "elisabeth", "liza", "lisa", "betty"],
    &["sofia", "sofya", "sofiya", "sophia", "sophie", "sonya"],
    &["grigory", "grigoriy", "gregory", "grisha"],
    &["boris", "borya"],
    &["lyudmila", "ludmila", "luda", "mila"],
    &["irina", "irene", "ira"],
    &["svetlana", "sveta"],
    &["vasily", "vasiliy", "basil", "vasya"],
    &["stepan", "stephen", "steven", "stefan", "esteban", "stepa"],
    &["matvei", "matvey", "matthew", "matthias", "mateo"],
];

fn variant_index() -> &'static HashMap<&'static str, Vec<usize>> {
    static INDEX: OnceLock<HashMap<&'static str, Vec<usize>>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index: HashMap<&'static str, Vec<usize>> = HashMap::new();
        for (group, names) in VARIANT_GROUPS.iter().enumerate() {
            for name in names.iter() {
                index.entry(*name).or_default().push(group);
            }
        }
        index
    })
}

/// True if two already-normalised names are listed as equivalents
pub fn are_variants(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() || a == b {
        return false;
    }
    let index = variant_index();
    match (index.get(a), index.get(b)) {
        (Some(ga), Some(gb)) => ga.iter().any(|g| gb.contains(g)),
        _ => false,
    }
}

/// Edit-distance similarity in [0, 1] of two normalised names
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_damerau_levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transliteration() {
        assert_eq!(normalize_name("Иванов"), "ivanov");
        assert_eq!(normalize_name("Щукина"), "shchukina");
        assert_eq!(normalize_name("Фёдор"), "fedor");
        assert_eq!(normalize_name("  José-María "), "jose maria");
        assert_eq!(normalize_name("O'Brien"), "o brien");
        assert_eq!(normalize_name("123"), "");
    }

    #[test]
    fn test_surname_key_folds_feminine_forms() {
        assert_eq!(surname_key("Ivanova"), "ivanov");
        assert_eq!(surname_key("Иванова"), surname_key("Ivanov"));
        assert_eq!(surname_key("Достоевская"), surname_key("Dostoevskiy"));
        assert_eq!(surname_key("Pushkina"), "pushkin");
        assert_eq!(surname_key("Smith"), "smith");
    }

    #[test]
    fn test_phonetic_key() {
        assert_eq!(phonetic_key("Kuznetsov"), "K253");
        assert_eq!(phonetic_key("Kusnetsov"), "K253");
        assert_eq!(phonetic_key("Кузнецов"), "K253");
        assert_eq!(phonetic_key("Ivanov"), "I151");
        assert_eq!(phonetic_key("Petrov"), "P361");
        assert_eq!(phonetic_key("Ashcraft"), "A261");
        assert_eq!(phonetic_key("Lee"), "L000");
        assert_eq!(phonetic_key("--"), "");
    }

    #[test]
    fn test_variants() {
        assert!(are_variants("ivan", "john"));
        assert!(are_variants(&normalize_name("Саша"), "alexandra"));
        assert!(are_variants("sasha", "aleksandr"));
        assert!(!are_variants("ivan", "ivan"));
        assert!(!are_variants("ivan", "peter"));
        assert!(!are_variants("", "john"));
    }

    #[test]
    fn test_similarity() {
        assert!(similarity("ivanov", "ivanova") > 0.8);
        assert!(similarity("petr", "pavel") < 0.5);
        assert_eq!(similarity("", "x"), 0.0);
    }
}
