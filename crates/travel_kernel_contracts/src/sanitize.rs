#![forbid(unsafe_code)]

//! Free-text content policies.
//!
//! A policy receives an already type-checked string and either returns its canonical
//! form or rejects it. Policies compose through [`FieldSanitizer`]; the schema
//! validators run every free-text field through one before anything is persisted.

use std::sync::Arc;

use crate::ContractViolation;

pub trait ContentPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, field: &'static str, value: &str) -> Result<String, ContractViolation>;
}

/// Rejects any value that would change if all tags, attributes and comments were removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarkup;

impl ContentPolicy for NoMarkup {
    fn name(&self) -> &'static str {
        "no_markup"
    }

    fn apply(&self, field: &'static str, value: &str) -> Result<String, ContractViolation> {
        let clean = strip_markup(value);
        if clean != value {
            return Err(ContractViolation::ContainsMarkup { field });
        }
        Ok(clean)
    }
}

/// Ordered chain of content policies applied to a single field.
#[derive(Clone)]
pub struct FieldSanitizer {
    policies: Vec<Arc<dyn ContentPolicy>>,
}

impl FieldSanitizer {
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    pub fn no_markup() -> Self {
        Self::new().with_policy(NoMarkup)
    }

    pub fn with_policy(mut self, policy: impl ContentPolicy + 'static) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    pub fn sanitize(&self, field: &'static str, value: &str) -> Result<String, ContractViolation> {
        let mut current = value.to_string();
        for policy in &self.policies {
            current = policy.apply(field, &current)?;
        }
        Ok(current)
    }
}

impl Default for FieldSanitizer {
    fn default() -> Self {
        Self::no_markup()
    }
}

impl std::fmt::Debug for FieldSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSanitizer")
            .field("policies", &self.policy_names())
            .finish()
    }
}

// Elements whose text content is dropped along with the tags.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "noscript", "iframe"];

/// Removes tags, attributes, comments and declarations, keeping plain text.
///
/// A `<` only opens markup when followed by an ASCII letter, `/`, `!` or `?`; otherwise it
/// is ordinary text (`1 < 2` survives). An unterminated tag swallows the rest of the input.
pub fn strip_markup(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut text_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' || !opens_markup(bytes.get(i + 1).copied()) {
            i += 1;
            continue;
        }
        out.push_str(&input[text_start..i]);

        if input[i..].starts_with("<!--") {
            i = match input[i + 4..].find("-->") {
                Some(end) => i + 4 + end + 3,
                None => bytes.len(),
            };
            text_start = i;
            continue;
        }

        let tag_end = find_tag_end(bytes, i + 1);
        let tag_name = tag_name(&input[i + 1..tag_end.min(bytes.len())]);
        i = (tag_end + 1).min(bytes.len());

        if let Some(name) = tag_name.filter(|n| RAW_TEXT_ELEMENTS.contains(&n.as_str())) {
            let closing = format!("</{name}");
            let rest = input[i..].to_ascii_lowercase();
            i = match rest.find(&closing) {
                Some(pos) => (find_tag_end(bytes, i + pos + 1) + 1).min(bytes.len()),
                None => bytes.len(),
            };
        }
        text_start = i;
    }
    out.push_str(&input[text_start.min(bytes.len())..]);
    out
}

fn opens_markup(next: Option<u8>) -> bool {
    matches!(next, Some(b) if b.is_ascii_alphabetic() || b == b'/' || b == b'!' || b == b'?')
}

// Index of the closing '>' for a tag starting at `from`, skipping quoted attribute values.
// Returns `bytes.len()` when the tag is never closed.
fn find_tag_end(bytes: &[u8], from: usize) -> usize {
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return i,
            None => {}
        }
        i += 1;
    }
    bytes.len()
}

fn tag_name(tag_body: &str) -> Option<String> {
    let name: String = tag_body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_returned_verbatim() {
        let s = FieldSanitizer::no_markup();
        assert_eq!(s.sanitize("name", "Ann O'Neil").unwrap(), "Ann O'Neil");
        assert_eq!(s.sanitize("name", "1 < 2 > 0").unwrap(), "1 < 2 > 0");
        assert_eq!(s.sanitize("name", "Tom & Jerry").unwrap(), "Tom & Jerry");
        assert_eq!(s.sanitize("name", "").unwrap(), "");
    }

    #[test]
    fn tags_are_rejected() {
        let s = FieldSanitizer::no_markup();
        for bad in [
            "<b>Ann</b>",
            "Ann<br/>",
            "<img src=x onerror=alert(1)>",
            "x<script>alert(1)</script>",
            "<!-- hi -->Ann",
            "Ann <a href='>'",
            "</p>",
        ] {
            assert_eq!(
                s.sanitize("name", bad),
                Err(ContractViolation::ContainsMarkup { field: "name" }),
                "{bad}"
            );
        }
    }

    #[test]
    fn strip_markup_keeps_text_and_drops_script_bodies() {
        assert_eq!(strip_markup("<b>Ann</b> Lee"), "Ann Lee");
        assert_eq!(strip_markup("a<script>evil()</script>b"), "ab");
        assert_eq!(strip_markup("a<STYLE>p{}</style >b"), "ab");
        assert_eq!(strip_markup("<a title=\"x>y\">link</a>"), "link");
        assert_eq!(strip_markup("keep <!-- gone --> this"), "keep  this");
        assert_eq!(strip_markup("tail <b"), "tail ");
    }

    #[derive(Debug)]
    struct NoDigits;

    impl ContentPolicy for NoDigits {
        fn name(&self) -> &'static str {
            "no_digits"
        }

        fn apply(&self, field: &'static str, value: &str) -> Result<String, ContractViolation> {
            if value.chars().any(|c| c.is_ascii_digit()) {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "must not contain digits",
                });
            }
            Ok(value.to_string())
        }
    }

    #[test]
    fn policies_compose_in_order() {
        let s = FieldSanitizer::no_markup().with_policy(NoDigits);
        assert_eq!(s.policy_names(), vec!["no_markup", "no_digits"]);
        assert!(s.sanitize("country", "US").is_ok());
        assert!(matches!(
            s.sanitize("country", "US1"),
            Err(ContractViolation::InvalidValue { .. })
        ));
        assert!(matches!(
            s.sanitize("country", "<i>1</i>"),
            Err(ContractViolation::ContainsMarkup { .. })
        ));
    }
}
