//! Cookie name/value mapping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Cookies keyed by name; a later `add` for the same name replaces the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cookies {
    entries: HashMap<String, String>,
}

impl Cookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every cookie of `other` in, overwriting same-named entries.
    pub fn merge(&mut self, other: &Cookies) {
        for (name, value) in &other.entries {
            self.entries.insert(name.clone(), value.clone());
        }
    }

    /// `"a=1; b=2"`, sorted by name so the header is stable across calls.
    pub fn to_header_value(&self) -> String {
        let mut pairs: Vec<_> = self.entries.iter().collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Cookies {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Extract `(name, value)` from a `Set-Cookie` header value such as
/// `session=abc123; Path=/`. Returns `None` when there is no `=` or the name
/// is empty.
pub fn parse_set_cookie(value: &str) -> Option<(String, String)> {
    let (name, rest) = value.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = rest.split(';').next().unwrap_or_default().trim();
    Some((name.to_string(), value.to_string()))
}
