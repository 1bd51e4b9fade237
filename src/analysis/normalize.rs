//! Display-label normalization for collectives and sources.
//!
//! Grouping correctness depends on these functions being total and
//! deterministic: the same raw value always yields the same label.

/// Label substituted for missing collectives and sources.
pub const UNKNOWN_LABEL: &str = "Desconocido";

/// Known collective identifiers and their canonical labels.
///
/// Keys are lowercase with words joined by hyphens, which is also how
/// lookups are keyed. Canonical labels map back onto themselves.
const COLLECTIVE_SYNONYMS: &[(&str, &str)] = &[
    ("asesorias", "Asesorías"),
    ("abogados", "Abogados"),
    ("entidades-sociales", "EESS"),
    ("eess", "EESS"),
    ("clinicas", "Clínicas"),
    ("formacion", "Formación"),
    ("odontologos", "Odontólogos"),
];

/// Canonical display label for a raw collective identifier.
///
/// Known synonyms map to their fixed label; anything else has hyphens
/// turned into spaces and each word title-cased. Missing or blank input
/// yields [`UNKNOWN_LABEL`].
pub fn normalize_collective(raw: Option<&str>) -> String {
    let words: Vec<String> = raw
        .unwrap_or("")
        .split(|c: char| c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    if words.is_empty() {
        return UNKNOWN_LABEL.to_string();
    }

    let key = words.join("-");
    if let Some((_, label)) = COLLECTIVE_SYNONYMS.iter().find(|(k, _)| *k == key) {
        return label.to_string();
    }

    words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display label for a raw source channel: trimmed, or [`UNKNOWN_LABEL`].
pub fn source_label(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
