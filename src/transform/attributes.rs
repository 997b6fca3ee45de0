//! Tag attribute parsing
//!
//! A small hand-written scanner over the attribute section of a start tag.
//! Callers only see `TagAttributes`, so the scanner can be swapped for a
//! full HTML tokenizer without touching them.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Value with quotes stripped; `None` for bare attributes like `hidden`
    pub value: Option<String>,
    pub quoted: bool,
    /// Exact source text of the attribute
    pub raw: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagAttributes {
    attributes: Vec<Attribute>,
}

/// Offset just past the `?>` of a PHP block opening at `pos`. An
/// unterminated block runs to the end of the source.
pub(crate) fn php_block_end(source: &str, pos: usize) -> Option<usize> {
    if !source.as_bytes()[pos..].starts_with(b"<?") {
        return None;
    }
    Some(
        source[pos + 2..]
            .find("?>")
            .map(|offset| pos + 2 + offset + 2)
            .unwrap_or(source.len()),
    )
}

/// Index of the `>` closing a start tag whose attribute section begins at
/// `from`. Quoted values and `<?php ... ?>` blocks may contain `>`. Returns
/// `None` when the tag is cut off by another `<` or the end of input.
pub fn find_tag_end(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut pos = from;
    while pos < bytes.len() {
        match bytes[pos] {
            b'<' => pos = php_block_end(source, pos)?,
            b'"' | b'\'' => pos = quoted_end(source, pos) + 1,
            b'>' => return Some(pos),
            _ => pos += 1,
        }
    }
    None
}

/// Index of the quote closing the value that opens at `pos`, skipping PHP
/// blocks inside it
fn quoted_end(source: &str, pos: usize) -> usize {
    let bytes = source.as_bytes();
    let quote = bytes[pos];
    let mut end = pos + 1;
    while end < bytes.len() && bytes[end] != quote {
        end = php_block_end(source, end).unwrap_or(end + 1);
    }
    end.min(bytes.len())
}

impl TagAttributes {
    /// Parse the text between a tag name and its closing `>` or `/>`
    pub fn parse(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut attributes = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b'/') {
                pos += 1;
            }
            if pos >= bytes.len() {
                break;
            }

            let start = pos;
            if let Some(end) = php_block_end(source, pos) {
                // Attributes printed by PHP, kept as one opaque entry
                attributes.push(Attribute {
                    name: source[start..end].to_string(),
                    value: None,
                    quoted: false,
                    raw: source[start..end].to_string(),
                });
                pos = end;
                continue;
            }
            while pos < bytes.len()
                && !bytes[pos].is_ascii_whitespace()
                && bytes[pos] != b'='
                && bytes[pos] != b'/'
            {
                pos += 1;
            }
            let name = source[start..pos].to_string();

            let mut lookahead = pos;
            while lookahead < bytes.len() && bytes[lookahead].is_ascii_whitespace() {
                lookahead += 1;
            }

            if lookahead < bytes.len() && bytes[lookahead] == b'=' {
                pos = lookahead + 1;
                while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }

                let (value, quoted) = if pos < bytes.len() && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
                    let end = quoted_end(source, pos);
                    let value = source[pos + 1..end].to_string();
                    pos = (end + 1).min(bytes.len());
                    (value, true)
                } else {
                    let value_start = pos;
                    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
                        pos = php_block_end(source, pos).unwrap_or(pos + 1);
                    }
                    (source[value_start..pos].to_string(), false)
                };

                attributes.push(Attribute {
                    name,
                    value: Some(value),
                    quoted,
                    raw: source[start..pos].to_string(),
                });
            } else if !name.is_empty() {
                attributes.push(Attribute {
                    raw: name.clone(),
                    name,
                    value: None,
                    quoted: false,
                });
            } else {
                pos += 1;
            }
        }

        Self { attributes }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Value of the first attribute named `name` (ASCII case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
            .and_then(|attr| attr.value.as_deref())
    }

    /// Remove and return every attribute named `name`, first one returned
    pub fn take(&mut self, name: &str) -> Option<Attribute> {
        let mut taken = None;
        self.attributes.retain(|attr| {
            if attr.name.eq_ignore_ascii_case(name) {
                if taken.is_none() {
                    taken = Some(attr.clone());
                }
                false
            } else {
                true
            }
        });
        taken
    }

    /// Quoted `key="value"` pairs as a map; values kept verbatim
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .filter(|attr| attr.quoted)
            .filter_map(|attr| attr.value.clone().map(|value| (attr.name.clone(), value)))
            .collect()
    }

    /// Re-emit the attributes from their original source text
    pub fn to_source(&self) -> String {
        self.attributes
            .iter()
            .map(|attr| attr.raw.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_and_bare() {
        let attrs = TagAttributes::parse(r#" id="hero" data-x='a "b"' hidden aria-label = "Go now" "#);
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs.get("id"), Some("hero"));
        assert_eq!(attrs.get("data-x"), Some(r#"a "b""#));
        assert_eq!(attrs.get("hidden"), None);
        assert_eq!(attrs.get("ARIA-LABEL"), Some("Go now"));
        assert_eq!(
            attrs.to_source(),
            r#"id="hero" data-x='a "b"' hidden aria-label = "Go now""#
        );
    }

    #[test]
    fn test_values_are_verbatim() {
        let attrs = TagAttributes::parse(r#"twitter="x" url="https://a.test/?q=1&amp;r=2" empty="""#);
        let map = attrs.to_map();
        assert_eq!(map.get("twitter").map(String::as_str), Some("x"));
        assert_eq!(map.get("url").map(String::as_str), Some("https://a.test/?q=1&amp;r=2"));
        assert_eq!(map.get("empty").map(String::as_str), Some(""));
    }

    #[test]
    fn test_map_skips_unquoted_and_bare() {
        let attrs = TagAttributes::parse("size=3 hidden label=\"Go\"");
        let map = attrs.to_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("label").map(String::as_str), Some("Go"));
    }

    #[test]
    fn test_take_removes_all_matches() {
        let mut attrs = TagAttributes::parse(r#"class="a" id="x" CLASS="b""#);
        let class = attrs.take("class").unwrap();
        assert_eq!(class.value.as_deref(), Some("a"));
        assert_eq!(attrs.to_source(), r#"id="x""#);
    }

    #[test]
    fn test_php_inside_values_and_between_attributes() {
        let source = r#" id="<?php echo esc_attr("a>b"); ?>" <?php echo $extra; ?> data-n=<?= $n ?>"#;
        let attrs = TagAttributes::parse(source);
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("id"), Some(r#"<?php echo esc_attr("a>b"); ?>"#));
        assert_eq!(attrs.get("data-n"), Some("<?= $n ?>"));
        assert_eq!(attrs.to_source(), source.trim());
    }

    #[test]
    fn test_multibyte_values() {
        let attrs = TagAttributes::parse(r#" title="Café <?= $x ?> naïve" alt=résumé"#);
        assert_eq!(attrs.get("title"), Some("Café <?= $x ?> naïve"));
        assert_eq!(attrs.get("alt"), Some("résumé"));
    }

    #[test]
    fn test_find_tag_end() {
        let source = r#"<div id="<?php echo $a > 1 ? 'x' : 'y'; ?>" title='>'>body</div>"#;
        let end = find_tag_end(source, 4).unwrap();
        assert_eq!(&source[end..], ">body</div>");
        assert_eq!(find_tag_end("<div class=\"a\" <span>", 4), None);
        assert_eq!(find_tag_end("<div hidden", 4), None);
    }

    #[test]
    fn test_trailing_slash_ignored() {
        let attrs = TagAttributes::parse(r#" label="Go" /"#);
        assert_eq!(attrs.len(), 1);
    }
}
