use std::collections::HashSet;

use lazy_static::lazy_static;
use pulldown_cmark::{html, Parser};
use regex::Regex;

/// Tags a rendered post/comment body may keep. Everything else is stripped.
const ALLOWED_TAGS: [&str; 16] = [
    "a", "abbr", "acronym", "b", "blockquote", "code", "em", "i", "li", "ol", "pre", "strong",
    "ul", "h1", "h2", "h3",
];

const ALLOWED_COMMENT_TAGS: [&str; 10] = [
    "a", "abbr", "acronym", "b", "code", "em", "i", "strong", "p", "blockquote",
];

/// Renders Markdown to sanitized HTML. This is an explicit step the caller
/// runs when creating or updating a body; the stored `body_html` is exactly
/// what this function returned at write time.
pub fn render_markdown(body: &str) -> String {
    render_with_tags(body, &ALLOWED_TAGS)
}

/// Comment variant with a tighter tag allowlist (no headings or lists).
pub fn render_comment_markdown(body: &str) -> String {
    render_with_tags(body, &ALLOWED_COMMENT_TAGS)
}

fn render_with_tags(body: &str, allowed: &[&str]) -> String {
    let linked = autolink(body);
    let parser = Parser::new(&linked);
    let mut raw = String::new();
    html::push_html(&mut raw, parser);

    let tags: HashSet<&str> = allowed.iter().copied().collect();
    let mut cleaner = ammonia::Builder::default();
    cleaner.tags(tags);
    cleaner.clean(&raw).to_string()
}

/// Wraps bare URLs in angle brackets so the Markdown parser renders them as
/// links. URLs already inside link syntax (preceded by `(` or `<`) are left
/// alone; trailing sentence punctuation stays outside the link.
fn autolink(body: &str) -> String {
    lazy_static! {
        static ref BARE_URL_RE: Regex =
            Regex::new(r"(?P<pre>^|\s)(?P<url>https?://[^\s<>()]*[^\s<>().,;:!?])").unwrap();
    }
    BARE_URL_RE.replace_all(body, "${pre}<${url}>").into_owned()
}
