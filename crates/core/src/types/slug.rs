//! URL slugs for catalog entities.

/// Build a lowercase, hyphen-separated slug from a display name.
///
/// ASCII letters and digits are kept, every other run of characters becomes a
/// single hyphen, and leading/trailing hyphens are removed.
///
/// ```
/// use drape_core::slugify;
///
/// assert_eq!(slugify("Kanjivaram Silk – Ruby Red"), "kanjivaram-silk-ruby-red");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Banarasi Saree"), "banarasi-saree");
    }

    #[test]
    fn test_slugify_collapses_punctuation() {
        assert_eq!(slugify("  Festive -- Edit!! 2026 "), "festive-edit-2026");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Chanderi ✨ Cotton"), "chanderi-cotton");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("!!!"), "");
    }
}
