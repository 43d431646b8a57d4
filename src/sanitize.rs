//! Markup escaping for user text.
//!
//! Raw answer text is escaped exactly once per render. Escaping an already
//! escaped string turns `&amp;` into `&amp;amp;`, so callers keep raw text
//! around and never feed rendered markup back in here.

/// Escape `&`, `<` and `>` into their entity forms. Nothing else changes.
///
/// The ampersand is handled in the same left-to-right pass as the angle
/// brackets, so entities produced here are never re-escaped.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain_text_unchanged() {
        assert_eq!(escape("The cat sat"), "The cat sat");
    }

    #[test]
    fn test_escape_empty() {
        assert_eq!(escape(""), "");
    }

    #[test]
    fn test_escape_tags() {
        assert_eq!(
            escape("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_escape_ampersand_not_doubled() {
        assert_eq!(escape("a & b < c"), "a &amp; b &lt; c");
    }

    #[test]
    fn test_escape_existing_entity_is_treated_as_text() {
        assert_eq!(escape("&lt;"), "&amp;lt;");
    }

    #[test]
    fn test_escape_quotes_untouched() {
        assert_eq!(escape("\"it's\""), "\"it's\"");
    }

    #[test]
    fn test_escape_unicode_untouched() {
        assert_eq!(escape("organisations’ mission → ö"), "organisations’ mission → ö");
    }
}
