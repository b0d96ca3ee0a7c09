//! Auto-naming for imported steps.
//!
//! Derives short `verb-object` kebab-case names from the action kind and
//! the most discriminating part of the locator (testId > role name > label
//! > placeholder > visible text truncated to 30 chars). Names are ASCII
//! alphanumerics with hyphens, always at least two segments, and unique
//! within a scenario (`-2`, `-3`, … on collision).

use std::collections::HashMap;

use crate::scenario::schema::By;

/// Longest visible-text fragment considered for an object slug.
const TEXT_TRUNCATE: usize = 30;

/// Allocates unique kebab-case step names within one scenario.
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashMap<String, usize>,
}

impl NameAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `verb-object`, suffixed `-2`, `-3`… on collision.
    pub fn allocate(&mut self, verb: &str, object: &str) -> String {
        let object = if object.is_empty() { "step" } else { object };
        let base = format!("{verb}-{object}");
        let count = self.used.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}-{count}")
        }
    }
}

/// The verb segment for a step type.
#[must_use]
pub fn verb_for(kind: &str) -> &'static str {
    match kind {
        "goto" => "navigate-to",
        "back" => "go",
        "reload" => "reload",
        "dblclick" => "dblclick",
        "fill" => "fill",
        "press" => "press",
        "check" => "check",
        "uncheck" => "uncheck",
        "selectOption" => "select",
        "expectVisible" | "expectHidden" | "expectText" => "expect",
        "expectUrl" => "expect-url",
        "uploadFile" => "upload",
        _ => "click",
    }
}

/// The most discriminating object slug for a selector.
#[must_use]
pub fn object_for_selector(by: &By) -> String {
    let hint = match by {
        By::TestId(v) => Some(v.as_str()),
        By::Role { name: Some(n), .. } => Some(n.as_str()),
        By::Role { role, name: None } => Some(role.as_str()),
        By::Label(v) | By::Placeholder(v) => Some(v.as_str()),
        By::Css { text: Some(t), .. } => Some(t.as_str()),
        By::Css { css, text: None } => Some(css.as_str()),
        By::Text(v) => Some(v.as_str()),
        By::Any(candidates) => return candidates.first().map(object_for_selector).unwrap_or_default(),
    };
    hint.map(|h| slugify(truncate(h, TEXT_TRUNCATE))).unwrap_or_default()
}

/// Object slug for a navigation target: the first host label, with a
/// leading `www` dropped.
#[must_use]
pub fn object_for_url(url: &str) -> String {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let host = host.split(':').next().unwrap_or(host);
    let mut labels = host.split('.');
    let first = match labels.next() {
        Some("www") => labels.next(),
        other => other,
    };
    let slug = slugify(first.unwrap_or_default());
    if slug.is_empty() { "page".to_string() } else { slug }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// ASCII kebab-case slug. Non-ASCII characters are dropped.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut out = String::new();
    let mut dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_expected_shapes() {
        let mut alloc = NameAllocator::new();
        assert_eq!(
            alloc.allocate("navigate-to", &object_for_url("https://example.com/login")),
            "navigate-to-example"
        );
        assert_eq!(
            alloc.allocate("fill", &object_for_selector(&By::Label("Email".to_string()))),
            "fill-email"
        );
        assert_eq!(
            alloc.allocate(
                "click",
                &object_for_selector(&By::Role {
                    role: "button".to_string(),
                    name: Some("Sign in".to_string()),
                })
            ),
            "click-sign-in"
        );
    }

    #[test]
    fn collisions_get_numeric_suffix() {
        let mut alloc = NameAllocator::new();
        assert_eq!(alloc.allocate("click", "save"), "click-save");
        assert_eq!(alloc.allocate("click", "save"), "click-save-2");
        assert_eq!(alloc.allocate("click", "save"), "click-save-3");
    }

    #[test]
    fn names_always_have_two_segments() {
        let mut alloc = NameAllocator::new();
        let name = alloc.allocate("click", "");
        assert_eq!(name, "click-step");
        let shape = regex::Regex::new(r"^[a-z]+(-[a-z0-9]+)+$").unwrap();
        assert!(shape.is_match(&name));
        assert!(shape.is_match(&alloc.allocate("navigate-to", "example")));
    }

    #[test]
    fn text_is_truncated_before_slugging() {
        let long = "This is a very long button caption that keeps going";
        let object = object_for_selector(&By::Text(long.to_string()));
        assert!(object.len() <= TEXT_TRUNCATE + 5);
        assert!(object.starts_with("this-is-a-very"));
    }

    #[test]
    fn url_objects_drop_www_and_port() {
        assert_eq!(object_for_url("https://www.shop.example.co.jp/cart"), "shop");
        assert_eq!(object_for_url("http://localhost:3000/admin"), "localhost");
    }

    #[test]
    fn non_ascii_slugs_fall_back() {
        // A fully non-ASCII hint produces an empty slug; the allocator then
        // falls back to a generic object.
        assert_eq!(slugify("パスワード"), "");
        let mut alloc = NameAllocator::new();
        assert_eq!(alloc.allocate("fill", &slugify("パスワード")), "fill-step");
    }
}
