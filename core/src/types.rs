//! Value types for the individual facets of a request.
//!
//! # Design
//! Each type wraps one primitive (a string, a map, a duration) and carries no
//! behavior beyond construction and accessors. None of them validate
//! structure: `Session::send` parses the URL, proxies go to libcurl verbatim.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Target URL as given by the caller; parsed only when a request is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Url(String);

impl Url {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Url {
    fn from(url: &str) -> Self {
        Self(url.to_string())
    }
}

impl From<String> for Url {
    fn from(url: String) -> Self {
        Self(url)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body(Vec<u8>);

impl Body {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Serialize `value` as a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> crate::Result<Self> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Body {
    fn from(body: &str) -> Self {
        Self(body.as_bytes().to_vec())
    }
}

impl From<String> for Body {
    fn from(body: String) -> Self {
        Self(body.into_bytes())
    }
}

impl From<Vec<u8>> for Body {
    fn from(body: Vec<u8>) -> Self {
        Self(body)
    }
}

/// Transfer timeout. Zero means "use the session's setting".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeout(Duration);

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// Negative and non-finite inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self(Duration::from_secs_f64(secs))
        } else {
            Self(Duration::ZERO)
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

/// Authentication scheme selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    None,
    Basic,
    Digest,
}

/// Credentials plus the scheme used to present them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Auth {
    kind: AuthType,
    username: String,
    password: String,
}

impl Auth {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: AuthType::Basic,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn digest(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: AuthType::Digest,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Basic credentials from `"user:pass"`, split on the first colon.
    /// Without a colon the whole string is the username.
    pub fn from_user_pass(user_pass: &str) -> Self {
        match user_pass.split_once(':') {
            Some((user, pass)) => Self::basic(user, pass),
            None => Self::basic(user_pass, ""),
        }
    }

    pub fn kind(&self) -> AuthType {
        self.kind
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `"username:password"`, or an empty string for `AuthType::None`.
    pub fn user_pass(&self) -> String {
        match self.kind {
            AuthType::None => String::new(),
            _ => format!("{}:{}", self.username, self.password),
        }
    }
}

// Keeps passwords out of logs.
impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Proxy URL in `scheme://host:port` form. Empty means no proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proxy(String);

impl Proxy {
    pub fn new(proxy: impl Into<String>) -> Self {
        Self(proxy.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Proxy {
    fn from(proxy: &str) -> Self {
        Self(proxy.to_string())
    }
}

/// Redirect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirects {
    allow: bool,
    max_redirects: u32,
}

impl Redirects {
    pub const DEFAULT_MAX: u32 = 30;

    /// Follow up to 30 hops when `allow`, otherwise never follow.
    pub fn new(allow: bool) -> Self {
        Self {
            allow,
            max_redirects: if allow { Self::DEFAULT_MAX } else { 0 },
        }
    }

    pub fn with_max(allow: bool, max_redirects: u32) -> Self {
        Self { allow, max_redirects }
    }

    pub fn allow(&self) -> bool {
        self.allow
    }

    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }
}

impl Default for Redirects {
    fn default() -> Self {
        Self::new(true)
    }
}

/// TLS certificate and host-name verification switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verify(bool);

impl Verify {
    pub fn new(verify: bool) -> Self {
        Self(verify)
    }

    pub fn enabled(&self) -> bool {
        self.0
    }
}

impl Default for Verify {
    fn default() -> Self {
        Self(true)
    }
}

impl From<bool> for Verify {
    fn from(verify: bool) -> Self {
        Self(verify)
    }
}

/// Query parameters. Keys are unique and iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `k=v` pairs joined with `&`, both sides percent-encoded.
    pub fn to_query_string(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Form-field name and file path pairs for multipart uploads, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Files(Vec<(String, PathBuf)>);

impl Files {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, path: impl Into<PathBuf>) {
        self.0.push((field.into(), path.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.0.iter().map(|(field, path)| (field.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, P: Into<PathBuf>> FromIterator<(K, P)> for Files {
    fn from_iter<I: IntoIterator<Item = (K, P)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, p)| (k.into(), p.into())).collect())
    }
}

/// Percent-encode everything except the unreserved set `[A-Za-z0-9-_.~]`,
/// using uppercase hex.
pub fn percent_encode(value: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(value.len());
    for &b in value.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    out
}
