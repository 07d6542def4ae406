//! Route template compilation and reverse substitution.
//!
//! # Template Syntax
//! - `{name}` - one path segment, captured as `name`
//! - `{name:type}` - typed capture (`int`, `hex`, `alpha`, `slug`, `uuid`,
//!   `str`/`any`, `all`/`*`)
//! - `{:int}`, `{:hex}`, `{}` - the same, without a name (positional)
//! - a trailing `?` makes the placeholder optional; a `/` right before an
//!   optional placeholder becomes part of the optional group
//!
//! # Design Decisions
//! - Literal text is always escaped, so `.` or `(` in a template are literal
//! - Unknown type names fall back to the one-segment fragment
//! - Compiled expressions are anchored and tolerate a `?query`/`#fragment` tail
//! - Positional placeholders compile to reserved named groups so captures
//!   added by custom filters never shift them

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use crate::routing::params::{decode, Params};

/// Fragment used for `{name}` and for unknown types.
const SEGMENT: &str = "[^/]+";

/// Group-name prefix for positional placeholders.
const POSITIONAL: &str = "__pos";

/// Accepted after the path: query string or fragment.
const SUFFIX: &str = r"(?:[?#].*)?";

#[derive(Debug, Clone, Error)]
pub enum PatternError {
    #[error("invalid placeholder name `{name}` in pattern `{pattern}`")]
    InvalidName { pattern: String, name: String },

    #[error("pattern `{pattern}` does not compile: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Slot(Slot),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    name: Option<String>,
    kind: Option<String>,
    optional: bool,
    /// The `/` preceding this optional slot was folded into it.
    leading_slash: bool,
    /// Original `{...}` text including a trailing `?`.
    raw: String,
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        let Some(width) = rest[open..].find('}') else {
            break;
        };
        let close = open + width;
        literal.push_str(&rest[..open]);

        let inner = &rest[open + 1..close];
        let mut end = close + 1;
        let optional = rest[end..].starts_with('?');
        if optional {
            end += 1;
        }

        let (name, kind) = match inner.split_once(':') {
            Some((name, kind)) => (name.trim(), Some(kind.trim())),
            None => (inner.trim(), None),
        };

        let leading_slash = optional && literal.ends_with('/');
        if leading_slash {
            literal.pop();
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }

        tokens.push(Token::Slot(Slot {
            name: (!name.is_empty()).then(|| name.to_string()),
            kind: kind.filter(|k| !k.is_empty()).map(str::to_string),
            optional,
            leading_slash,
            raw: rest[open..end].to_string(),
        }));
        rest = &rest[end..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

/// Regex fragment for a placeholder type.
fn fragment(kind: Option<&str>) -> &'static str {
    match kind {
        Some("int") => r"\d+",
        Some("hex") => "[0-9A-Fa-f]+",
        Some("alpha") => "[A-Za-z]+",
        Some("slug") => "[A-Za-z0-9_-]+",
        Some("uuid") => "[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}",
        Some("str") | Some("any") => SEGMENT,
        Some("all") | Some("*") => ".*",
        _ => SEGMENT,
    }
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(POSITIONAL)
}

/// Build the anchored regex source for `pattern`.
pub fn expression(
    pattern: &str,
    filters: &HashMap<String, String>,
) -> Result<String, PatternError> {
    let mut source = String::from("^");
    let mut positional = 0usize;

    for token in tokenize(pattern) {
        match token {
            Token::Literal(text) => source.push_str(&regex::escape(&text)),
            Token::Slot(slot) => {
                let group = match &slot.name {
                    Some(name) => {
                        if !valid_name(name) {
                            return Err(PatternError::InvalidName {
                                pattern: pattern.to_string(),
                                name: name.clone(),
                            });
                        }
                        let body = filters
                            .get(name)
                            .map(String::as_str)
                            .unwrap_or_else(|| fragment(slot.kind.as_deref()));
                        format!("(?P<{name}>{body})")
                    }
                    None => {
                        let group = format!(
                            "(?P<{POSITIONAL}{positional}>{})",
                            fragment(slot.kind.as_deref())
                        );
                        positional += 1;
                        group
                    }
                };

                if slot.optional {
                    let sep = if slot.leading_slash { "/" } else { "" };
                    source.push_str(&format!("(?:{sep}{group})?"));
                } else {
                    source.push_str(&group);
                }
            }
        }
    }

    source.push_str(SUFFIX);
    source.push('$');
    Ok(source)
}

/// Compile `pattern` with per-placeholder `filters` into an anchored regex.
pub fn compile(pattern: &str, filters: &HashMap<String, String>) -> Result<Regex, PatternError> {
    let source = expression(pattern, filters)?;
    Regex::new(&source).map_err(|source| PatternError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Fill the placeholders of `pattern` from `args`.
///
/// Named placeholders take the value of the same name, positional ones take
/// positional values in order. Missing optional placeholders disappear along
/// with their leading `/`; missing required ones are left as written.
pub fn substitute(pattern: &str, args: &Params) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut positional = args.positional();

    for token in tokenize(pattern) {
        match token {
            Token::Literal(text) => out.push_str(&text),
            Token::Slot(slot) => {
                let value = match &slot.name {
                    Some(name) => args.get(name),
                    None => positional.next(),
                };
                match value {
                    Some(value) => {
                        if slot.leading_slash {
                            out.push('/');
                        }
                        out.push_str(value);
                    }
                    None if slot.optional => {}
                    None => {
                        if slot.leading_slash {
                            out.push('/');
                        }
                        out.push_str(&slot.raw);
                    }
                }
            }
        }
    }
    out
}

/// A template together with its compiled regex.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    regex: Regex,
}

impl CompiledPattern {
    pub fn new(template: &str, filters: &HashMap<String, String>) -> Result<Self, PatternError> {
        Ok(Self {
            template: template.to_string(),
            regex: compile(template, filters)?,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The compiled regex source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` and return the decoded captures, named and positional,
    /// in template order. Optional placeholders that did not participate are
    /// omitted.
    pub fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::new();
        for name in self.regex.capture_names().flatten() {
            let Some(m) = caps.name(name) else {
                continue;
            };
            if name.starts_with(POSITIONAL) {
                params.push(decode(m.as_str()));
            } else {
                params.insert(name, decode(m.as_str()));
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_filters() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_named_segment() {
        let p = CompiledPattern::new("/users/{id}", &no_filters()).unwrap();
        let params = p.captures("/users/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert!(p.captures("/users/42/posts").is_none());
        assert!(p.captures("/users").is_none());
    }

    #[test]
    fn test_typed_int() {
        let p = CompiledPattern::new("/users/{id:int}", &no_filters()).unwrap();
        assert!(p.is_match("/users/42"));
        assert!(!p.is_match("/users/abc"));
    }

    #[test]
    fn test_query_and_fragment_tolerated() {
        let p = CompiledPattern::new("/users/{id:int}", &no_filters()).unwrap();
        assert_eq!(p.captures("/users/7?sort=asc").unwrap().get("id"), Some("7"));
        assert_eq!(p.captures("/users/7#top").unwrap().get("id"), Some("7"));
    }

    #[test]
    fn test_unnamed_placeholders_are_positional() {
        let p = CompiledPattern::new("/color/{:hex}/{}", &no_filters()).unwrap();
        let params = p.captures("/color/ff00aa/bright").unwrap();
        assert_eq!(params.positional().collect::<Vec<_>>(), vec!["ff00aa", "bright"]);
        assert!(params.named().next().is_none());
    }

    #[test]
    fn test_optional_catch_all() {
        let p = CompiledPattern::new("/files/{path:*}?", &no_filters()).unwrap();
        assert!(p.captures("/files").unwrap().get("path").is_none());
        assert_eq!(p.captures("/files/a/b/c.txt").unwrap().get("path"), Some("a/b/c.txt"));
    }

    #[test]
    fn test_filter_overrides_fragment() {
        let mut filters = HashMap::new();
        filters.insert("slug".to_string(), "[a-z]+".to_string());
        let p = CompiledPattern::new("/posts/{slug}", &filters).unwrap();
        assert!(p.is_match("/posts/hello"));
        assert!(!p.is_match("/posts/Hello-1"));
    }

    #[test]
    fn test_filter_groups_do_not_shift_positionals() {
        let mut filters = HashMap::new();
        filters.insert("lang".to_string(), "(en|fr)".to_string());
        let p = CompiledPattern::new("/{lang}/{:int}", &filters).unwrap();
        let params = p.captures("/fr/12").unwrap();
        assert_eq!(params.get("lang"), Some("fr"));
        assert_eq!(params.positional().collect::<Vec<_>>(), vec!["12"]);
    }

    #[test]
    fn test_literals_are_escaped() {
        let p = CompiledPattern::new("/feed.xml", &no_filters()).unwrap();
        assert!(p.is_match("/feed.xml"));
        assert!(!p.is_match("/feedxxml"));

        let p = CompiledPattern::new("/v(1)/{id}", &no_filters()).unwrap();
        assert!(p.is_match("/v(1)/9"));
    }

    #[test]
    fn test_str_and_any_stay_in_one_segment() {
        for template in ["/tag/{name:str}", "/tag/{name:any}", "/tag/{:str}"] {
            let p = CompiledPattern::new(template, &no_filters()).unwrap();
            assert!(p.is_match("/tag/rust-lang.org"), "{template}");
            assert!(!p.is_match("/tag/a/b"), "{template}");
        }
        let p = CompiledPattern::new("/tag/{name:all}", &no_filters()).unwrap();
        assert!(p.is_match("/tag/a/b"));
    }

    #[test]
    fn test_unknown_type_falls_back_to_segment() {
        let p = CompiledPattern::new("/x/{id:bogus}", &no_filters()).unwrap();
        assert!(p.is_match("/x/anything"));
        assert!(!p.is_match("/x/a/b"));
    }

    #[test]
    fn test_captures_are_decoded() {
        let p = CompiledPattern::new("/search/{term}", &no_filters()).unwrap();
        assert_eq!(p.captures("/search/caf%C3%A9").unwrap().get("term"), Some("café"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = compile("/a/{bad-name}", &no_filters()).unwrap_err();
        assert!(matches!(err, PatternError::InvalidName { .. }));
    }

    #[test]
    fn test_broken_filter_reports_regex_error() {
        let mut filters = HashMap::new();
        filters.insert("id".to_string(), "([0-9".to_string());
        assert!(matches!(
            compile("/a/{id}", &filters),
            Err(PatternError::Regex { .. })
        ));
    }

    #[test]
    fn test_substitute_fills_and_collapses() {
        let args = Params::from([("id", "42")]);
        assert_eq!(substitute("/users/{id:int}", &args), "/users/42");
        assert_eq!(substitute("/files/{path:*}?", &Params::new()), "/files");
        assert_eq!(
            substitute("/files/{path:*}?", &Params::from([("path", "a/b")])),
            "/files/a/b"
        );
    }

    #[test]
    fn test_substitute_keeps_missing_required() {
        assert_eq!(
            substitute("/users/{id:int}/posts", &Params::new()),
            "/users/{id:int}/posts"
        );
    }

    #[test]
    fn test_substitute_positional() {
        let mut args = Params::new();
        args.push("ff");
        args.push("x");
        assert_eq!(substitute("/c/{:hex}/{}", &args), "/c/ff/x");
    }

    #[test]
    fn test_round_trip_named() {
        let templates = [
            "/users/{id}",
            "/blog/{year:int}/{month:int}/{slug:slug}",
            "/shop/{category}/{item:alpha}",
        ];
        let values = Params::from([
            ("id", "abc"),
            ("year", "2024"),
            ("month", "07"),
            ("slug", "hello-world"),
            ("category", "tools"),
            ("item", "hammer"),
        ]);
        for template in templates {
            let path = substitute(template, &values);
            let p = CompiledPattern::new(template, &no_filters()).unwrap();
            let captured = p.captures(&path).unwrap();
            for (name, value) in captured.named() {
                assert_eq!(values.get(name), Some(value), "{template}");
            }
            assert_eq!(captured.len(), template.matches('{').count());
        }
    }
}
