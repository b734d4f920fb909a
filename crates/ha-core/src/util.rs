//! Small string helpers shared by the core and integrations

use regex::Regex;
use std::sync::OnceLock;

fn non_slug_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// Turn arbitrary text into an object_id-safe slug
///
/// Lowercases, replaces every run of characters outside `[a-z0-9]` with a
/// single `_`, and trims leading/trailing underscores.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    non_slug_chars()
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My min_max"), "my_min_max");
        assert_eq!(slugify("Living Room -- Max"), "living_room_max");
        assert_eq!(slugify("__edge__"), "edge");
        assert_eq!(slugify(""), "");
    }
}
