use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Removes combining marks after canonical decomposition ("Álcool" → "Alcool").
pub fn strip_accents(raw: &str) -> String {
    raw.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Accent-stripped, uppercased, whitespace-collapsed text. Punctuation is
/// kept, so `"Diesel S10 (Lts)"` folds to `"DIESEL S10 (LTS)"`.
pub fn fold_text(raw: &str) -> String {
    let upper: String = strip_accents(raw).chars().flat_map(char::to_uppercase).collect();
    collapse_whitespace(&upper)
}

/// Base cleanup for unit names, applied before the alias rules.
///
/// Ordinal indicators are dropped, every other non-alphanumeric character
/// becomes a space.
pub fn clean_unit_text(raw: &str) -> String {
    let stripped = strip_accents(raw);
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            'º' | 'ª' | '°' => {}
            c if c.is_alphanumeric() => out.extend(c.to_uppercase()),
            _ => out.push(' '),
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
