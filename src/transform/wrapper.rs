//! `blockProps` placeholder expansion

use lazy_static::lazy_static;
use regex::Regex;

use super::attributes::{find_tag_end, php_block_end, TagAttributes};
use crate::utils::php_single_quote;

/// Reserved token marking the element that receives the wrapper attributes
pub const WRAPPER_PLACEHOLDER: &str = "blockProps";

pub const WRAPPER_CALL: &str = "<?php echo get_block_wrapper_attributes(); ?>";

lazy_static! {
    static ref TAG_NAME_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9-]*").unwrap();
}

/// Replace the `blockProps` token in each start tag with the runtime call
/// that prints the block's wrapper attributes. An existing `class` value
/// seeds the call; the other attributes follow it unchanged.
///
/// Tags are scanned with quotes and `<?php ... ?>` blocks respected, so
/// attributes printed by PHP do not hide the token. Markup echoed from
/// inside a PHP block is left alone.
pub fn expand_wrapper_attributes(template: &str) -> String {
    if !template.contains(WRAPPER_PLACEHOLDER) {
        return template.to_string();
    }

    let mut output = String::with_capacity(template.len() + 64);
    let mut copied = 0;
    let mut pos = 0;

    while let Some(offset) = template[pos..].find('<') {
        let start = pos + offset;
        if let Some(end) = php_block_end(template, start) {
            pos = end;
            continue;
        }

        let name_end = match TAG_NAME_RE.find(&template[start + 1..]) {
            Some(name) => start + 1 + name.end(),
            None => {
                pos = start + 1;
                continue;
            }
        };
        let close = match find_tag_end(template, name_end) {
            Some(close) => close,
            None => {
                pos = name_end;
                continue;
            }
        };

        let tag = &template[start + 1..name_end];
        if let Some(expanded) = expand_tag(tag, &template[name_end..close]) {
            output.push_str(&template[copied..start]);
            output.push_str(&expanded);
            copied = close + 1;
        }
        pos = close + 1;
    }

    output.push_str(&template[copied..]);
    output
}

/// Rewrite one start tag, or `None` when it carries no bare token
fn expand_tag(tag: &str, section: &str) -> Option<String> {
    let mut attributes = TagAttributes::parse(section);
    let has_token = attributes
        .iter()
        .any(|attr| attr.name == WRAPPER_PLACEHOLDER && attr.value.is_none());
    if !has_token {
        return None;
    }
    attributes.take(WRAPPER_PLACEHOLDER);

    let seed_class = attributes
        .take("class")
        .and_then(|attr| attr.value)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let call = match seed_class {
        Some(class) => format!(
            "<?php echo get_block_wrapper_attributes(['class' => '{}']); ?>",
            php_single_quote(&class)
        ),
        None => WRAPPER_CALL.to_string(),
    };

    let mut expanded = format!("<{} {}", tag, call);
    if !attributes.is_empty() {
        expanded.push(' ');
        expanded.push_str(&attributes.to_source());
    }
    if section.trim_end().ends_with('/') {
        expanded.push_str(" /");
    }
    expanded.push('>');
    Some(expanded)
}
