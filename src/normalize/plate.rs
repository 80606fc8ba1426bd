/// Uppercases and keeps only `[A-Z0-9]`.
pub fn normalize_plate(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}
