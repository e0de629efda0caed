//! HTML allow-list applied to tool descriptions and comment bodies before
//! they are written.

use std::collections::{HashMap, HashSet};

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "em", "u", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "a",
    "blockquote", "code", "pre",
];

const LINK_ATTRIBUTES: &[&str] = &["href", "title"];

/// Strip everything outside the allow-list. Script and style bodies are
/// dropped entirely rather than unwrapped.
pub fn sanitize_html(input: &str) -> String {
    let tags: HashSet<&str> = ALLOWED_TAGS.iter().copied().collect();
    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("a", LINK_ATTRIBUTES.iter().copied().collect::<HashSet<_>>());
    let generic: HashSet<&str> = ["class"].into_iter().collect();

    ammonia::Builder::default()
        .tags(tags)
        .tag_attributes(tag_attributes)
        .generic_attributes(generic)
        .link_rel(None)
        .clean(input)
        .to_string()
}
