//! Markup clean-up applied after symbol output is spliced in

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Elements that may legitimately self-close: HTML void elements plus
/// common SVG leaf elements. Compared lowercase.
pub const SELF_CLOSING_ALLOWED: &[&str] = &[
    // HTML
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
    // SVG
    "path", "circle", "ellipse", "line", "polygon", "polyline", "rect", "use", "stop",
    "image", "animate", "animatemotion", "animatetransform", "set", "mpath",
    "feblend", "fecolormatrix", "fegaussianblur", "femergenode", "feoffset",
];

lazy_static! {
    static ref SELF_CLOSING_TAG_RE: Regex = Regex::new(
        r#"<([a-z][A-Za-z0-9-]*)((?:\s+[^\s=/>"']+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*/>"#
    )
    .unwrap();
}

pub fn is_self_closing_allowed(tag: &str) -> bool {
    let lowered = tag.to_ascii_lowercase();
    SELF_CLOSING_ALLOWED.contains(&lowered.as_str())
}

/// Expand `<button ... />` into `<button ...></button>` for every lowercase
/// tag that is not allowed to self-close. Capitalized tags are components
/// and are left untouched.
pub fn normalize_self_closing(html: &str) -> String {
    if !html.contains("/>") {
        return html.to_string();
    }

    SELF_CLOSING_TAG_RE
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[1];
            if is_self_closing_allowed(tag) {
                caps[0].to_string()
            } else {
                format!("<{}{}></{}>", tag, &caps[2], tag)
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_void_expanded() {
        assert_eq!(
            normalize_self_closing(r#"<button class="btn" type="button" />"#),
            r#"<button class="btn" type="button"></button>"#
        );
        assert_eq!(normalize_self_closing("<div/>"), "<div></div>");
    }

    #[test]
    fn test_void_and_svg_leaves_kept() {
        let html = r#"<img src="a.png" /><br/><svg viewBox="0 0 1 1"><path d="M0 0" /><circle r="1"/></svg>"#;
        assert_eq!(normalize_self_closing(html), html);
    }

    #[test]
    fn test_components_untouched() {
        let html = r#"<InnerBlocks allowedBlocks="x" /><span title="a > b" />"#;
        assert_eq!(
            normalize_self_closing(html),
            r#"<InnerBlocks allowedBlocks="x" /><span title="a > b"></span>"#
        );
    }
}
