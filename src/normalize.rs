//! Station name normalization.
//!
//! Both networks label the same physical station inconsistently
//! (`"CEMADEN - Igarapé do Quarenta (Zona Leste)"` vs `"Igarapé do Quarenta"`).
//! Every downstream grouping uses the canonical form produced here.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---

/// A station identity after normalization. The sole grouping key downstream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalStation(String);

impl CanonicalStation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalStation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalStation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source tags prepended to station names by the upstream collectors.
pub const DEFAULT_PREFIXES: &[&str] = &["CEMADEN - ", "DEFESA CIVIL - "];

fn bracketed() -> &'static Regex {
    static BRACKETED: OnceLock<Regex> = OnceLock::new();
    BRACKETED.get_or_init(|| {
        Regex::new(r"\s*[(\[].*?[)\]]").expect("bracket pattern is a valid regex")
    })
}

/// Canonicalizes free-text station names.
#[derive(Debug, Clone)]
pub struct Normalizer {
    prefixes: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_prefixes(DEFAULT_PREFIXES.iter().copied())
    }
}

impl Normalizer {
    // ---
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalize a raw station name.
    ///
    /// Strips source prefixes, deletes parenthesized/bracketed annotations,
    /// collapses whitespace and trims. The steps are repeated until the name
    /// stops changing, so `normalize(normalize(x)) == normalize(x)` holds for
    /// every input. Each step only deletes characters, so this terminates.
    pub fn normalize(&self, raw: &str) -> String {
        // ---
        let mut current = raw.to_string();
        loop {
            let next = self.normalize_once(&current);
            if next == current {
                return next;
            }
            current = next;
        }
    }

    /// Normalize anything printable (numeric station codes, etc).
    pub fn normalize_value<T: fmt::Display + ?Sized>(&self, raw: &T) -> String {
        self.normalize(&raw.to_string())
    }

    pub fn canonical(&self, raw: &str) -> CanonicalStation {
        CanonicalStation(self.normalize(raw))
    }

    fn normalize_once(&self, raw: &str) -> String {
        // ---
        let mut name = raw;
        'strip: loop {
            for prefix in self.prefixes.iter().filter(|p| !p.is_empty()) {
                if let Some(rest) = name.strip_prefix(prefix.as_str()) {
                    name = rest;
                    continue 'strip;
                }
            }
            break;
        }

        let without_notes = bracketed().replace_all(name, "");
        without_notes.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Normalize with the default prefixes.
pub fn normalize(raw: &str) -> String {
    Normalizer::default().normalize(raw)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_strips_prefix_and_annotation() {
        // ---
        assert_eq!(
            normalize("CEMADEN - Igarapé do Quarenta (Zona Leste)"),
            "Igarapé do Quarenta"
        );
    }

    #[test]
    fn test_removes_square_brackets_and_collapses_whitespace() {
        // ---
        assert_eq!(normalize("  Santa   Luzia [ref 12]  "), "Santa Luzia");
        assert_eq!(normalize("Flores (A) (B)"), "Flores");
    }

    #[test]
    fn test_unbalanced_bracket_is_kept() {
        // ---
        assert_eq!(normalize("Compensa (norte"), "Compensa (norte");
    }

    #[test]
    fn test_plain_names_pass_through() {
        // ---
        assert_eq!(normalize("EST_MINDU"), "EST_MINDU");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_idempotent_on_nested_prefixes() {
        // ---
        let tricky = [
            "CEMADEN - CEMADEN - Tarumã",
            "(antigo) CEMADEN - Redenção",
            "CEMADEN -  (x) CEMADEN - Flores",
            "DEFESA CIVIL - CEMADEN - Puraquequara (Leste)",
            "a\t\tb\n(c)",
        ];
        for raw in tricky {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
        assert_eq!(normalize("(antigo) CEMADEN - Redenção"), "Redenção");
    }

    #[test]
    fn test_normalize_value_coerces_non_strings() {
        // ---
        let n = Normalizer::default();
        assert_eq!(n.normalize_value(&1234), "1234");
        assert_eq!(n.normalize_value(&3.5), "3.5");
    }

    #[test]
    fn test_custom_prefixes() {
        // ---
        let n = Normalizer::with_prefixes(["INMET: "]);
        assert_eq!(n.normalize("INMET: Manaus (A101)"), "Manaus");
        assert_eq!(n.normalize("CEMADEN - Flores"), "CEMADEN - Flores");
    }

    #[test]
    fn test_same_station_under_different_labels_is_one_identity() {
        // ---
        let n = Normalizer::default();
        assert_eq!(
            n.canonical("CEMADEN - Mauazinho (Zona Leste)"),
            n.canonical("Mauazinho")
        );
    }
}
