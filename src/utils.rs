//! Utility functions shared by the transformer and generators

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LOWER_UPPER_RE: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
    static ref ACRONYM_RE: Regex = Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap();
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Join a title's words into the capitalized compound used as a tag
/// name: `Hero 2 Column` -> `Hero2Column`, `social icons` -> `SocialIcons`.
pub fn compound_name(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first.to_ascii_uppercase(), chars.as_str()),
                None => String::new(),
            }
        })
        .collect()
}

/// Convert a capitalized compound name or a free-form title to
/// hyphenated lowercase: `ProductCard` -> `product-card`,
/// `Social Icons` -> `social-icons`, `SVGIcon` -> `svg-icon`.
///
/// Titles go through [`compound_name`] first, so a title and the tag
/// written for it always agree: `Hero 2 Column` and `Hero2Column` both
/// give `hero2-column`.
pub fn kebab_case(name: &str) -> String {
    let compound = compound_name(name);
    let split = ACRONYM_RE.replace_all(&compound, "$1-$2");
    let split = LOWER_UPPER_RE.replace_all(&split, "$1-$2");
    split.to_lowercase()
}

/// Lowercase, hyphenated slug from a display title
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Escape text for an HTML text node or attribute value
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape a value for use inside a single-quoted PHP string literal
pub fn php_single_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_case() {
        assert_eq!(kebab_case("ProductCard"), "product-card");
        assert_eq!(kebab_case("SocialIcons"), "social-icons");
        assert_eq!(kebab_case("Button"), "button");
        assert_eq!(kebab_case("SVGIcon"), "svg-icon");
        assert_eq!(kebab_case("Hero2Column"), "hero2-column");
        assert_eq!(kebab_case("Social Icons"), "social-icons");
    }

    #[test]
    fn test_title_and_tag_agree() {
        for (title, tag) in [
            ("Hero 2 Column", "Hero2Column"),
            ("Social Icons", "SocialIcons"),
            ("product card", "ProductCard"),
            ("FAQ / Accordion", "FAQAccordion"),
        ] {
            assert_eq!(compound_name(title), tag);
            assert_eq!(kebab_case(title), kebab_case(tag));
        }
        assert_eq!(kebab_case("Hero 2 Column"), "hero2-column");
        assert_eq!(kebab_case("FAQ / Accordion"), "faq-accordion");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Hero Banner! "), "hero-banner");
        assert_eq!(slugify("FAQ / Accordion"), "faq-accordion");
    }

    #[test]
    fn test_escape_helpers() {
        assert_eq!(escape_html(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
        assert_eq!(php_single_quote(r"it's a \ path"), r"it\'s a \\ path");
    }
}
