//! String normalization for cross-provider name matching.
//!
//! Providers disagree on accents, spacing, punctuation, club prefixes
//! ("FC ", "1. "), and women's/youth qualifiers ("WFC", "Under-21"). The
//! functions here reduce names to a canonical lowercase-ASCII form before any
//! similarity computation. All functions are pure; null handling lives at the
//! call sites, which skip null cells entirely.

pub mod assignment;
pub mod similarity;

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, SyncError};

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid static regex"))
}

/// Replace the Unicode no-break space (U+00A0) with a plain space and trim.
pub fn clean_spaces(input: &str) -> String {
    input.trim().replace('\u{00A0}', " ")
}

/// Transliterate to ASCII-compatible text: NFKD decomposition with combining
/// marks dropped, plus the handful of Latin letters NFKD leaves intact.
pub fn strip_accents(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().nfkd().filter(|c| !is_combining_mark(*c)) {
        match c {
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'ß' => out.push_str("ss"),
            'ø' => out.push('o'),
            'Ø' => out.push('O'),
            'đ' | 'ð' => out.push('d'),
            'Đ' | 'Ð' => out.push('D'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            'þ' => out.push_str("th"),
            'Þ' => out.push_str("Th"),
            _ => out.push(c),
        }
    }
    out
}

/// Full generic normalization: space cleaning, accent stripping, non-word
/// runs collapsed to one space, whitespace runs collapsed, lowercased,
/// trimmed.
pub fn normalize(input: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let result = clean_spaces(input);
    let result = strip_accents(&result);
    let result = cached(&NON_WORD, r"[\W_]+").replace_all(&result, " ");
    let result = cached(&SPACES, r"\s+").replace_all(&result, " ");
    result.to_lowercase().trim().to_string()
}

/// Remove the catalogue of women's-team qualifiers from a club name.
pub fn remove_womens_suffixes(input: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            r",?\s+Women'+s$",
            r",?\s+Womens$",
            r",?\s+Women$",
            r",?\s+W$",
            r"\s+WFC$",
            r"\s+LFC$",
            r"\s+Ladies$",
            r"\s+F$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid static regex"))
        .collect()
    });

    let mut result = input.trim().to_string();
    for re in patterns {
        result = re.replace_all(&result, "").into_owned();
    }
    result
        .replace(", Women's", "")
        .replace(", Women", "")
        .replace(" Women's", "")
        .replace(" WFC", "")
        .replace(" Femenino", "")
        .replace(" Femminile", "")
        .replace("Féminas", "")
        .trim()
        .to_string()
}

/// Reduce youth-team markers (" Under-21", " Sub 20", " U-19") to the " UN"
/// form, then strip a trailing " UN" marker entirely.
pub fn remove_youth_suffixes(input: &str) -> String {
    static UNDER: OnceLock<Regex> = OnceLock::new();
    static SUB: OnceLock<Regex> = OnceLock::new();
    static UNDER_SPACED: OnceLock<Regex> = OnceLock::new();
    static U_DASH: OnceLock<Regex> = OnceLock::new();
    static U_TRAILING: OnceLock<Regex> = OnceLock::new();

    let result = cached(&UNDER, r" Under-?").replace_all(input.trim(), " U");
    let result = cached(&SUB, r" Sub-?").replace_all(&result, " U");
    let result = cached(&UNDER_SPACED, r" Under ").replace_all(&result, " U");
    let result = cached(&U_DASH, r" U-").replace_all(&result, " U");
    let result = cached(&U_TRAILING, r" U\s?\d+$").replace_all(&result, "");
    result.trim().to_string()
}

/// Remove trailing club tokens ("FC", "SC", "Ladies", ...) from a team name.
pub fn remove_team_suffixes(input: &str) -> String {
    static SUFFIXES: OnceLock<Regex> = OnceLock::new();
    let re = cached(
        &SUFFIXES,
        r" SC$| Sc$| sc$| FC$| fc$| Fc$| LFC$| CF$| CD$| WFC$| FCW$| HSC$| AC$| AF$| FCO$| Ladies$| Women$| W$|\sW$|, W$| F$| Women's$| VF$| FF$| Football$",
    );
    re.replace_all(input, "").into_owned()
}

/// Remove leading club tokens ("FC ", "1. ", "Olympique de ", ...) from a
/// team name.
pub fn remove_team_prefixes(input: &str) -> String {
    static PREFIXES: OnceLock<Regex> = OnceLock::new();
    let re = cached(
        &PREFIXES,
        r"^SC |^FC |^CF |^CD |^RC |^OL |^Olympique de |^Olympique |^WNT |^SKN |^SK |^1\. ",
    );
    re.replace_all(input, "").into_owned()
}

/// Team-name normalization: women's and youth qualifiers, then club
/// suffix/prefix tokens, then generic [`normalize`].
pub fn normalize_team_name(input: &str) -> String {
    let result = remove_womens_suffixes(input);
    let result = remove_youth_suffixes(&result);
    let result = remove_team_suffixes(&result);
    let result = remove_team_prefixes(&result);
    normalize(&result)
}

/// Split a string into character n-grams after stripping punctuation
/// separators (`,-./;`) and whitespace. Strings shorter than `n` yield an
/// empty list; `n` must be greater than zero.
pub fn n_grams(input: &str, n: usize) -> Result<Vec<String>> {
    if n == 0 {
        return Err(SyncError::InvalidNgramSize { n });
    }
    let chars: Vec<char> = input
        .chars()
        .filter(|c| !matches!(c, ',' | '-' | '.' | '/' | ';') && !c.is_whitespace())
        .collect();
    if chars.len() < n {
        return Ok(Vec::new());
    }
    Ok(chars.windows(n).map(|w| w.iter().collect()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_accents() {
        assert_eq!(
            strip_accents("  Átlanta Beat  WFC  Under-21  "),
            "Atlanta Beat  WFC  Under-21"
        );
        assert_eq!(strip_accents("Ødegaard"), "Odegaard");
        assert_eq!(strip_accents("Müller"), "Muller");
    }

    #[test]
    fn test_clean_spaces_replaces_no_break_space() {
        assert_eq!(clean_spaces(" a\u{00A0}b "), "a b");
    }

    #[test]
    fn test_remove_womens_suffixes() {
        assert_eq!(
            remove_womens_suffixes("  Átlanta Beat  WFC  Under-21  "),
            "Átlanta Beat   Under-21"
        );
        assert_eq!(remove_womens_suffixes("Atlanta Beat WFC"), "Atlanta Beat");
        assert_eq!(remove_womens_suffixes("Arsenal, Women"), "Arsenal");
        assert_eq!(remove_womens_suffixes("Chelsea Women's"), "Chelsea");
    }

    #[test]
    fn test_remove_youth_suffixes() {
        assert_eq!(
            remove_youth_suffixes("  Átlanta Beat  WFC  Under-21  "),
            "Átlanta Beat  WFC"
        );
        assert_eq!(remove_youth_suffixes("Brazil Sub-20"), "Brazil");
        assert_eq!(remove_youth_suffixes("Spain U-19"), "Spain");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Átlanta   Beat  "), "atlanta beat");
        assert_eq!(normalize("O'Connor-Smith"), "o connor smith");
    }

    #[test]
    fn test_normalize_team_name() {
        assert_eq!(normalize_team_name("Atlanta Beat WFC"), "atlanta beat");
        assert_eq!(normalize_team_name("FC Barcelona"), "barcelona");
        assert_eq!(normalize_team_name("1. FC Köln"), "fc koln");
        assert_eq!(normalize_team_name("FC Köln"), "koln");
        assert_eq!(normalize_team_name("Real Madrid Under-19"), "real madrid");
    }

    #[test]
    fn test_n_grams_happy_path() {
        assert_eq!(n_grams("test", 3).unwrap(), vec!["tes", "est"]);
        assert_eq!(
            n_grams("Test;Test", 4).unwrap(),
            vec!["Test", "estT", "stTe", "tTes", "Test"]
        );
        assert_eq!(
            n_grams("Test Test", 4).unwrap(),
            vec!["Test", "estT", "stTe", "tTes", "Test"]
        );
    }

    #[test]
    fn test_n_grams_short_input_is_empty() {
        assert!(n_grams("ab", 3).unwrap().is_empty());
        assert!(n_grams("", 3).unwrap().is_empty());
    }

    #[test]
    fn test_n_grams_zero_n_fails() {
        assert!(matches!(
            n_grams("test", 0),
            Err(SyncError::InvalidNgramSize { n: 0 })
        ));
    }
}
