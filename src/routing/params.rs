//! Ordered parameter bags.
//!
//! Captured route parameters, explicit invocation arguments and the request
//! param bag all share this type. Entries keep insertion order; unnamed
//! entries are positional and are addressed by their order among the other
//! unnamed entries.

use percent_encoding::percent_decode_str;

/// One parameter value, optionally keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamEntry {
    pub name: Option<String>,
    pub value: String,
}

/// An ordered mix of named and positional parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<ParamEntry>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set a named value, replacing an existing entry in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|e| e.name.as_deref() == Some(name.as_str()))
        {
            Some(entry) => entry.value = value,
            None => self.entries.push(ParamEntry {
                name: Some(name),
                value,
            }),
        }
    }

    /// Append an unnamed value.
    pub fn push(&mut self, value: impl Into<String>) {
        self.entries.push(ParamEntry {
            name: None,
            value: value.into(),
        });
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
            .map(|e| e.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Unnamed values in order.
    pub fn positional(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|e| e.name.is_none())
            .map(|e| e.value.as_str())
    }

    /// Named values in order.
    pub fn named(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.name.as_deref().map(|n| (n, e.value.as_str())))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamEntry> + '_ {
        self.entries.iter()
    }

    /// Merge `other` into `self`; named values from `other` win.
    pub fn merge_from(&mut self, other: &Params) {
        for entry in &other.entries {
            match &entry.name {
                Some(name) => self.insert(name.clone(), entry.value.clone()),
                None => self.push(entry.value.clone()),
            }
        }
    }

    /// Combine captured values with explicit ones. Captured entries come first
    /// and keep their value when an explicit entry reuses the same name.
    pub fn merged_ahead(&self, explicit: &Params) -> Params {
        let mut merged = self.clone();
        for entry in &explicit.entries {
            match &entry.name {
                Some(name) if merged.contains(name) => {}
                Some(name) => merged.insert(name.clone(), entry.value.clone()),
                None => merged.push(entry.value.clone()),
            }
        }
        merged
    }

    /// Parse an `a=1&b=2` query string, percent-decoding keys and values.
    pub fn from_query(query: &str) -> Params {
        let mut params = Params::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            // Split on the first '=' only so values may contain '='
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            params.insert(decode(&key.replace('+', " ")), decode(&value.replace('+', " ")));
        }
        params
    }
}

/// Percent-decode a path or query component, replacing invalid UTF-8.
pub fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut params = Params::from([("a", "1"), ("b", "2")]);
        params.insert("a", "3");
        let names: Vec<_> = params.named().collect();
        assert_eq!(names, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_captured_values_win() {
        let captured = Params::from([("id", "42")]);
        let explicit = Params::from([("id", "7"), ("page", "2")]);
        let merged = captured.merged_ahead(&explicit);
        assert_eq!(merged.get("id"), Some("42"));
        assert_eq!(merged.get("page"), Some("2"));
    }

    #[test]
    fn test_positional_order() {
        let mut params = Params::new();
        params.push("x");
        params.insert("k", "v");
        params.push("y");
        assert_eq!(params.positional().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_query_parsing() {
        let params = Params::from_query("q=hello%20world&token=abc==&flag");
        assert_eq!(params.get("q"), Some("hello world"));
        assert_eq!(params.get("token"), Some("abc=="));
        assert_eq!(params.get("flag"), Some(""));
    }
}
