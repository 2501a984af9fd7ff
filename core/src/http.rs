//! HTTP method and the request descriptor.
//!
//! # Design
//! A `Request` is plain data: every facet lives in its own value type and
//! each `with_*` setter swaps one facet wholesale. Nothing is cross-checked
//! here; `Session::send` resolves conflicts (files take precedence over a
//! raw body) and is the only place a request is executed.
//!
//! Write and read hooks are shared closures so a request stays `Clone` and
//! can be moved onto a blocking worker by `Session::send_async`. Whatever
//! state a hook needs travels in its captures.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cookies::Cookies;
use crate::error::Error;
use crate::headers::Headers;
use crate::types::{Auth, Body, Files, Params, Proxy, Redirects, Timeout, Url, Verify};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Head,
        Method::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::validation(format!("unsupported http method: {s}")))
    }
}

/// Receives response body chunks; returning less than the chunk length aborts
/// the transfer.
pub type WriteCallback = Arc<dyn Fn(&[u8]) -> usize + Send + Sync>;

/// Fills the buffer with request body bytes and returns how many were
/// written; zero signals end of body.
pub type ReadCallback = Arc<dyn Fn(&mut [u8]) -> usize + Send + Sync>;

/// A request described as plain data.
#[derive(Clone, Default)]
pub struct Request {
    url: Url,
    method: Method,
    headers: Headers,
    body: Body,
    timeout: Timeout,
    auth: Auth,
    proxy: Proxy,
    cookies: Cookies,
    redirects: Redirects,
    verify: Verify,
    params: Params,
    files: Files,
    output_file: Option<PathBuf>,
    write_callback: Option<WriteCallback>,
    read_callback: Option<ReadCallback>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<Url>) -> Self {
        Self {
            url: url.into(),
            method,
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<Url>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<Proxy>) -> Self {
        self.proxy = proxy.into();
        self
    }

    pub fn with_cookies(mut self, cookies: Cookies) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_redirects(mut self, redirects: Redirects) -> Self {
        self.redirects = redirects;
        self
    }

    pub fn with_verify(mut self, verify: impl Into<Verify>) -> Self {
        self.verify = verify.into();
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_files(mut self, files: Files) -> Self {
        self.files = files;
        self
    }

    /// Stream the response body into `path` instead of memory.
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn with_write_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[u8]) -> usize + Send + Sync + 'static,
    {
        self.write_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_read_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut [u8]) -> usize + Send + Sync + 'static,
    {
        self.read_callback = Some(Arc::new(callback));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn redirects(&self) -> Redirects {
        self.redirects
    }

    pub fn verify(&self) -> Verify {
        self.verify
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    pub fn write_callback(&self) -> Option<&WriteCallback> {
        self.write_callback.as_ref()
    }

    pub fn read_callback(&self) -> Option<&ReadCallback> {
        self.read_callback.as_ref()
    }

    /// URL with `params` appended as a percent-encoded query string.
    ///
    /// The query string is introduced with `?`, or joined with `&` when the
    /// URL already carries a query, so existing parameters are kept intact.
    pub fn effective_url(&self) -> String {
        if self.params.is_empty() {
            return self.url.as_str().to_string();
        }
        let separator = if self.url.as_str().contains('?') { '&' } else { '?' };
        format!("{}{separator}{}", self.url, self.params.to_query_string())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("timeout", &self.timeout)
            .field("auth", &self.auth)
            .field("proxy", &self.proxy)
            .field("cookies", &self.cookies)
            .field("redirects", &self.redirects)
            .field("verify", &self.verify)
            .field("params", &self.params)
            .field("files", &self.files)
            .field("output_file", &self.output_file)
            .field("write_callback", &self.write_callback.is_some())
            .field("read_callback", &self.read_callback.is_some())
            .finish()
    }
}
