//! Ordered header collection with validation limits.
//!
//! Entries are stored as raw `"Name: Value"` lines, which is the shape
//! libcurl consumes for `CURLOPT_HTTPHEADER` and produces in its header
//! callback. Insertion order is kept for sending; lookups ignore case.

use crate::error::{Error, Result};

/// Maximum number of entries a collection holds.
pub const MAX_HEADERS_COUNT: usize = 1000;
/// Maximum length of a raw `"Name: Value"` line.
pub const MAX_HEADER_SIZE: usize = 8192;
pub const MAX_HEADER_NAME_SIZE: usize = 256;
pub const MAX_HEADER_VALUE_SIZE: usize = 4096;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs, stopping at the first invalid one.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.add(name.as_ref(), value.as_ref())?;
        }
        Ok(headers)
    }

    pub fn add(&mut self, name: &str, value: &str) -> Result<()> {
        validate_name(name)?;
        validate_value(value)?;
        self.push(format!("{name}: {value}"))
    }

    /// Parse and append a raw `"Name: Value"` line.
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        if line.len() > MAX_HEADER_SIZE {
            return Err(Error::validation(format!(
                "header line too large, current: {} exceed the limit {MAX_HEADER_SIZE}",
                line.len()
            )));
        }
        let colon = line
            .find(':')
            .ok_or_else(|| Error::validation("header line has no colon"))?;
        if colon == 0 || colon == line.len() - 1 {
            return Err(Error::validation("header line has no name or no value"));
        }

        let name = line[..colon].trim();
        let value = line[colon + 1..].trim_start();
        self.add(name, value)
    }

    /// Remove every entry whose name matches, ignoring case.
    pub fn remove(&mut self, name: &str) {
        if validate_name(name).is_err() {
            return;
        }
        self.entries.retain(|entry| !name_matches(entry, name));
    }

    /// Value of the first entry whose name matches, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| value_if_named(entry, name))
    }

    /// Values of every entry whose name matches, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter_map(move |entry| value_if_named(entry, name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| name_matches(entry, name))
    }

    pub fn all(&self) -> &[String] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Append every entry of `other` after the existing ones.
    pub fn extend_from(&mut self, other: &Headers) -> Result<()> {
        for entry in &other.entries {
            self.push(entry.clone())?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn push(&mut self, entry: String) -> Result<()> {
        if self.entries.len() >= MAX_HEADERS_COUNT {
            return Err(Error::capacity(MAX_HEADERS_COUNT));
        }
        self.entries.push(entry);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("header name is empty"));
    }
    if name.len() > MAX_HEADER_NAME_SIZE {
        return Err(Error::validation(format!(
            "header name too large, current: {} exceed the limit {MAX_HEADER_NAME_SIZE}",
            name.len()
        )));
    }
    if !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
        return Err(Error::validation(format!("header name {name:?} contains an invalid character")));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<()> {
    if value.len() > MAX_HEADER_VALUE_SIZE {
        return Err(Error::validation(format!(
            "header value too large, current: {} exceed the limit {MAX_HEADER_VALUE_SIZE}",
            value.len()
        )));
    }
    if value.bytes().any(|b| b.is_ascii_control() && b != b'\t') {
        return Err(Error::validation("header value contains a control character"));
    }
    Ok(())
}

fn name_matches(entry: &str, name: &str) -> bool {
    entry
        .split_once(':')
        .is_some_and(|(entry_name, _)| entry_name.trim().eq_ignore_ascii_case(name))
}

fn value_if_named<'a>(entry: &'a str, name: &str) -> Option<&'a str> {
    let (entry_name, value) = entry.split_once(':')?;
    entry_name
        .trim()
        .eq_ignore_ascii_case(name)
        .then(|| value.trim_start())
}
